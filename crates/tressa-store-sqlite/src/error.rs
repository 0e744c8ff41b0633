//! Error type for `tressa-store-sqlite`.

use thiserror::Error;
use tressa_core::{Classify, ErrorKind};

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] tressa_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("email already registered: {0}")]
  DuplicateEmail(String),

  #[error("client not found: {0}")]
  ClientNotFound(uuid::Uuid),

  #[error("update not found: {0}")]
  UpdateNotFound(uuid::Uuid),
}

impl Error {
  /// Whether this error was caused by a UNIQUE constraint.
  pub(crate) fn is_unique_violation(&self) -> bool {
    matches!(
      self,
      Error::Database(tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(e, _)))
        if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
  }
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Error::Core(e) => e.kind(),
      Error::DuplicateEmail(_) => ErrorKind::Conflict,
      Error::ClientNotFound(_) | Error::UpdateNotFound(_) => ErrorKind::NotFound,
      Error::Database(_) | Error::Json(_) | Error::Uuid(_) | Error::DateParse(_) => {
        ErrorKind::Internal
      }
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
