//! JSON REST API for the Tressa portal.
//!
//! Exposes an axum [`Router`] backed by any
//! [`tressa_core::store::PortalStore`]. Admin routes live under `/admin`,
//! the signed-in client's routes under `/me`, and published posts are public.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", tressa_api::api_router(state))
//! ```

pub mod admin;
pub mod attachments;
pub mod auth;
pub mod error;
pub mod me;
pub mod posts;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  extract::DefaultBodyLimit,
  routing::{delete, get, post},
};
use serde::Deserialize;
use tressa_core::store::PortalStore;

pub use auth::{AuthConfig, Principal};
pub use error::ApiError;

/// Largest attachment upload accepted, in bytes.
pub const MAX_ATTACHMENT_BYTES: usize = 25 * 1024 * 1024;

/// Shared state handed to every handler.
pub struct AppState<S> {
  pub store:          Arc<S>,
  pub auth:           Arc<AuthConfig>,
  /// Directory attachment blobs are written under.
  pub attachment_dir: Arc<PathBuf>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:          Arc::clone(&self.store),
      auth:           Arc::clone(&self.auth),
      attachment_dir: Arc::clone(&self.attachment_dir),
    }
  }
}

// ─── Limits ──────────────────────────────────────────────────────────────────

pub const MAX_LIMIT: usize = 100;
pub const DEFAULT_RECENT_CLIENTS: usize = 5;
pub const DEFAULT_UPDATES: usize = 5;
pub const DEFAULT_POSTS: usize = 10;

/// `?limit=<n>` on list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct LimitParams {
  pub limit: Option<usize>,
}

impl LimitParams {
  /// The requested limit, or `default`, clamped to `1..=MAX_LIMIT`.
  pub fn resolve(&self, default: usize) -> usize {
    self.limit.unwrap_or(default).clamp(1, MAX_LIMIT)
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the fully-materialised API router.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: AppState<S>) -> Router<()>
where
  S: PortalStore + 'static,
{
  Router::new()
    // Dashboard
    .route("/admin/stats", get(admin::stats::<S>))
    .route("/admin/recent-clients", get(admin::recent_clients::<S>))
    .route("/admin/client-stats", get(admin::client_stats::<S>))
    // Clients
    .route(
      "/admin/clients",
      get(admin::list_clients::<S>).post(admin::create_client::<S>),
    )
    .route(
      "/admin/clients/{id}",
      get(admin::get_client::<S>)
        .patch(admin::update_client::<S>)
        .delete(admin::delete_client::<S>),
    )
    // Updates
    .route(
      "/admin/clients/{id}/updates",
      get(admin::list_updates::<S>).post(admin::create_update::<S>),
    )
    .route("/admin/updates/{id}", delete(admin::delete_update::<S>))
    .route(
      "/admin/updates/{id}/attachments",
      post(attachments::upload::<S>).layer(DefaultBodyLimit::max(MAX_ATTACHMENT_BYTES)),
    )
    // Appointments
    .route(
      "/admin/clients/{id}/appointments",
      get(admin::list_appointments::<S>).post(admin::create_appointment::<S>),
    )
    .route(
      "/admin/appointments/{id}/complete",
      post(admin::complete_appointment::<S>),
    )
    // Posts
    .route(
      "/admin/posts",
      get(admin::list_posts::<S>).post(admin::create_post::<S>),
    )
    .route("/admin/posts/{id}", delete(admin::delete_post::<S>))
    .route("/admin/posts/{id}/publish", post(admin::publish_post::<S>))
    // Client session
    .route("/me/profile", get(me::profile::<S>))
    .route("/me/updates", get(me::updates::<S>))
    .route("/me/updates/{id}/read", post(me::mark_read::<S>))
    .route("/me/updates/{id}/like", post(me::set_liked::<S>))
    .route("/me/updates/{id}/reactions", post(me::add_reaction::<S>))
    // Shared
    .route("/attachments/{id}", get(attachments::download::<S>))
    .route("/posts", get(posts::list::<S>))
    .with_state(state)
}

#[cfg(test)]
mod tests;
