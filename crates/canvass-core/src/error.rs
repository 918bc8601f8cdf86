//! Error types for `canvass-core`.

use thiserror::Error;

use crate::model::EntityKind;

// ─── Validation ──────────────────────────────────────────────────────────────

/// A malformed entity, rejected before any write reaches a store.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
  #[error("polygon needs at least 3 points, got {0}")]
  TooFewPoints(usize),

  #[error("polygon repeats vertex {0} consecutively")]
  RepeatedVertex(usize),

  #[error("polygon area {area:.3} m² is below the minimum of {min:.3} m²")]
  AreaTooSmall { area: f64, min: f64 },

  #[error("coordinate out of range: lat {lat}, lng {lng}")]
  CoordinateOutOfRange { lat: f64, lng: f64 },

  #[error("{0} must not be empty")]
  Empty(&'static str),

  #[error("invalid email address: {0:?}")]
  InvalidEmail(String),

  #[error("invalid phone number: {0:?}")]
  InvalidPhone(String),

  #[error("invalid date {0:?}, expected YYYY-MM-DD")]
  InvalidDate(String),

  #[error("invalid time {0:?}, expected HH:MM")]
  InvalidTime(String),

  #[error("unknown {field}: {value:?}")]
  UnknownVariant { field: &'static str, value: String },
}

// ─── Remote store ────────────────────────────────────────────────────────────

/// What went wrong talking to the system of record.
#[derive(Debug, Error)]
pub enum RemoteFailure {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("conflict: {0}")]
  Conflict(String),

  /// The backend refused the payload (e.g. it failed server-side validation).
  #[error("rejected: {0}")]
  Rejected(String),

  #[error("timed out")]
  Timeout,

  #[error("unavailable: {0}")]
  Unavailable(String),

  #[error("{0}")]
  Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Any failure of a [`crate::store::RemoteStore`] call, carrying the operation
/// name and the entity type it was acting on.
#[derive(Debug, Error)]
#[error("remote {op} on {entity} failed: {failure}")]
pub struct RemoteStoreError {
  pub op:      &'static str,
  pub entity:  EntityKind,
  #[source]
  pub failure: RemoteFailure,
}

impl RemoteStoreError {
  pub fn new(op: &'static str, entity: EntityKind, failure: RemoteFailure) -> Self {
    Self { op, entity, failure }
  }

  pub fn not_found(op: &'static str, entity: EntityKind, id: impl Into<String>) -> Self {
    Self::new(op, entity, RemoteFailure::NotFound(id.into()))
  }

  pub fn backend<E>(op: &'static str, entity: EntityKind, err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::new(op, entity, RemoteFailure::Backend(Box::new(err)))
  }

  pub fn is_not_found(&self) -> bool {
    matches!(self.failure, RemoteFailure::NotFound(_))
  }

  /// Whether retrying the same call later could succeed.
  pub fn is_transient(&self) -> bool {
    matches!(
      self.failure,
      RemoteFailure::Timeout | RemoteFailure::Unavailable(_) | RemoteFailure::Backend(_)
    )
  }
}
