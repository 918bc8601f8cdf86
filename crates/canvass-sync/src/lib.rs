//! Offline-first client side of the canvass system.
//!
//! [`HttpRemoteStore`] speaks to the canvass API. [`FieldTracker`] is the write
//! path for user actions: local cache first, backend when reachable.
//! [`SyncCoordinator`] reconciles whatever the cache still holds as dirty once
//! connectivity returns.

pub mod client;
pub mod coordinator;
pub mod error;
pub mod tracker;

#[cfg(test)]
mod testing;

pub use client::{ClientConfig, HttpRemoteStore};
pub use coordinator::{
  KindCounts, PENDING_TERRITORY_DELETES, SyncConfig, SyncCoordinator, SyncEvent, SyncFailure,
  SyncReport,
};
pub use error::{Result, SyncError};
pub use tracker::{FieldTracker, PlacedPin, Saved, VISIBLE_TERRITORIES};
