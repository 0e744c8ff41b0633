use std::sync::Arc;

use thiserror::Error;

use crate::keys::QueryKey;

/// Errors surfaced by the sync layer.
///
/// `Clone` so a single fetch failure can be handed to every caller attached
/// to that fetch and kept on the cache entry at the same time.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
  #[error("transport error: {0}")]
  Transport(#[source] Arc<reqwest::Error>),

  #[error("server responded with {0}")]
  Status(reqwest::StatusCode),

  /// The server answered with an `{ "error": ... }` body.
  #[error("rejected: {0}")]
  Rejected(String),

  #[error("could not decode response: {0}")]
  Decode(#[source] Arc<serde_json::Error>),

  #[error("fetch was cancelled")]
  Cancelled,

  #[error("cached value under {0} has a different type")]
  TypeMismatch(QueryKey),
}

impl From<reqwest::Error> for SyncError {
  fn from(e: reqwest::Error) -> Self { Self::Transport(Arc::new(e)) }
}

impl From<serde_json::Error> for SyncError {
  fn from(e: serde_json::Error) -> Self { Self::Decode(Arc::new(e)) }
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;
