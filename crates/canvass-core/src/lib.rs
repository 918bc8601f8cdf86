//! Core types and trait definitions for the canvass field tracker.
//!
//! This crate is deliberately free of HTTP and database dependencies. It holds
//! the data model, the territory geometry, entity validation, and the two
//! storage contracts: the offline [`store::LocalStore`] cache and the
//! [`store::RemoteStore`] system of record.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod geometry;
pub mod matcher;
pub mod model;
pub mod store;
pub mod validate;

pub use error::{RemoteFailure, RemoteStoreError, ValidationError};
