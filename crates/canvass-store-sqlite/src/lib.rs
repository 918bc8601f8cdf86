//! SQLite backends for the canvass stores.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. [`SqliteLocalStore`] is the on-device
//! offline cache; [`SqliteRecordStore`] is the durable system of record served
//! by the API.

mod encode;
mod local;
mod record;
mod schema;

pub mod error;

pub use error::{Result, StorageError};
pub use local::SqliteLocalStore;
pub use record::SqliteRecordStore;
