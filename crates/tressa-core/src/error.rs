//! Error types for `tressa-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("client not found: {0}")]
  ClientNotFound(Uuid),

  #[error("update not found: {0}")]
  UpdateNotFound(Uuid),

  #[error("invalid {field}: {reason}")]
  Invalid {
    field:  &'static str,
    reason: String,
  },

  #[error("unknown update category: {0:?}")]
  UnknownCategory(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Coarse classification of a failure, used to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  NotFound,
  Conflict,
  Invalid,
  Internal,
}

/// Errors that can say what kind of failure they are.
///
/// Store backends implement this for their error type so callers can tell
/// a missing row or duplicate email apart from a broken database.
pub trait Classify: std::error::Error + Send + Sync + 'static {
  fn kind(&self) -> ErrorKind;
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Error::ClientNotFound(_) | Error::UpdateNotFound(_) => ErrorKind::NotFound,
      Error::Invalid { .. } | Error::UnknownCategory(_) => ErrorKind::Invalid,
    }
  }
}
