//! Error type for `canvass-store-sqlite`.

use canvass_core::{
  RemoteFailure, RemoteStoreError, ValidationError, model::EntityKind,
};
use rusqlite::{ErrorCode, ffi};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored enum column holds a value this build does not know.
  #[error("invalid stored value: {0}")]
  Invalid(#[from] ValidationError),
}

pub type Result<T, E = StorageError> = std::result::Result<T, E>;

impl StorageError {
  /// Classify a storage failure for callers of the `RemoteStore` contract.
  ///
  /// Unique-key violations become `Conflict`, dangling foreign keys become
  /// `Rejected`, and everything else is an opaque `Backend` failure.
  pub fn into_remote(self, op: &'static str, entity: EntityKind) -> RemoteStoreError {
    let failure = match self {
      StorageError::Database(tokio_rusqlite::Error::Rusqlite(
        rusqlite::Error::SqliteFailure(err, msg),
      )) if err.code == ErrorCode::ConstraintViolation => {
        let detail = msg.unwrap_or_else(|| err.to_string());
        if err.extended_code == ffi::SQLITE_CONSTRAINT_FOREIGNKEY {
          RemoteFailure::Rejected(detail)
        } else {
          RemoteFailure::Conflict(detail)
        }
      }
      StorageError::Database(tokio_rusqlite::Error::ConnectionClosed) => {
        RemoteFailure::Unavailable("database connection closed".into())
      }
      other => RemoteFailure::Backend(Box::new(other)),
    };
    RemoteStoreError::new(op, entity, failure)
  }
}
