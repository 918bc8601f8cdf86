use canvass_core::{RemoteStoreError, ValidationError};
use thiserror::Error;

pub type Result<T, E = SyncError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum SyncError {
  /// The on-device cache failed. Local writes never fail for connectivity
  /// reasons, so this is corruption, a full disk, or similar.
  #[error("local store error: {0}")]
  Local(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error(transparent)]
  Remote(#[from] RemoteStoreError),

  #[error(transparent)]
  Validation(#[from] ValidationError),

  #[error("no such {kind}: {key}")]
  Missing { kind: &'static str, key: String },

  #[error("invalid server url {0:?}")]
  InvalidUrl(String),

  #[error("http client error: {0}")]
  Client(#[from] reqwest::Error),
}

impl SyncError {
  pub fn local<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    SyncError::Local(Box::new(err))
  }
}
