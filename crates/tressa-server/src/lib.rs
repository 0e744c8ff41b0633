//! HTTP server for the Tressa portal: configuration and the top-level
//! router. The binary in `main.rs` wires these to a SQLite store.

use std::path::{Path, PathBuf};

use axum::Router;
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tressa_api::{AppState, AuthConfig};
use tressa_core::store::PortalStore;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` layered with
/// `TRESSA_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                String,
  #[serde(default = "default_port")]
  pub port:                u16,
  #[serde(default = "default_store_path")]
  pub store_path:          PathBuf,
  #[serde(default = "default_attachment_dir")]
  pub attachment_dir:      PathBuf,
  pub admin_username:      String,
  pub admin_password_hash: String,
}

fn default_host() -> String { "127.0.0.1".to_string() }

fn default_port() -> u16 { 8080 }

fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/tressa/tressa.db") }

fn default_attachment_dir() -> PathBuf { PathBuf::from("~/.local/share/tressa/attachments") }

impl ServerConfig {
  /// Load from an optional TOML file, then environment variables with the
  /// given prefix (e.g. `TRESSA_PORT`).
  pub fn load(path: &Path, env_prefix: &str) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix(env_prefix))
      .build()?
      .try_deserialize()
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn auth(&self) -> AuthConfig {
    AuthConfig {
      admin_username:      self.admin_username.clone(),
      admin_password_hash: self.admin_password_hash.clone(),
    }
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// The API mounted at `/api`, with request tracing.
pub fn app<S>(state: AppState<S>) -> Router
where
  S: PortalStore + 'static,
{
  Router::new()
    .nest("/api", tressa_api::api_router(state))
    .layer(TraceLayer::new_for_http())
}
