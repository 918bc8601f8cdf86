//! JSON REST API for the canvass system of record.
//!
//! Exposes an axum [`Router`] backed by any [`RemoteStore`]: CRUD and upsert
//! for pins, territories, follow-ups and customers under `/api`, plus an
//! unauthenticated `GET /health` probe used by clients to decide whether they
//! are online.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = canvass_api::router(AppState::new(Arc::new(store)));
//! ```

pub mod auth;
pub mod customers;
pub mod error;
pub mod follow_ups;
pub mod pins;
pub mod territories;

use std::{path::PathBuf, sync::Arc};

use axum::{Json, Router, middleware, routing::get};
use canvass_core::{geometry::DEFAULT_MIN_AREA_M2, store::RemoteStore};
use serde::Deserialize;
use serde_json::{Value, json};

pub use auth::AuthConfig;
pub use error::{ApiError, ApiJson};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` layered with
/// `CANVASS_*` environment variables.
#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                  String,
  #[serde(default = "default_port")]
  pub port:                  u16,
  #[serde(default = "default_store_path")]
  pub store_path:            PathBuf,
  /// Basic auth is enforced only when both credentials are configured.
  #[serde(default)]
  pub auth_username:         Option<String>,
  #[serde(default)]
  pub auth_password_hash:    Option<String>,
  #[serde(default = "default_min_area")]
  pub min_territory_area_m2: f64,
}

fn default_host() -> String { "127.0.0.1".into() }

fn default_port() -> u16 { 8787 }

fn default_store_path() -> PathBuf { PathBuf::from("canvass.db") }

fn default_min_area() -> f64 { DEFAULT_MIN_AREA_M2 }

impl ServerConfig {
  pub fn auth(&self) -> Option<AuthConfig> {
    match (&self.auth_username, &self.auth_password_hash) {
      (Some(username), Some(password_hash)) => Some(AuthConfig {
        username:      username.clone(),
        password_hash: password_hash.clone(),
      }),
      _ => None,
    }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub store:       Arc<S>,
  pub auth:        Option<Arc<AuthConfig>>,
  /// Smallest territory accepted on write, in square metres.
  pub min_area_m2: f64,
}

impl<S> AppState<S> {
  /// Open state: no auth, default minimum territory area.
  pub fn new(store: Arc<S>) -> Self {
    Self { store, auth: None, min_area_m2: DEFAULT_MIN_AREA_M2 }
  }

  pub fn with_auth(mut self, auth: AuthConfig) -> Self {
    self.auth = Some(Arc::new(auth));
    self
  }

  pub fn with_min_area(mut self, min_area_m2: f64) -> Self {
    self.min_area_m2 = min_area_m2;
    self
  }
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:       self.store.clone(),
      auth:        self.auth.clone(),
      min_area_m2: self.min_area_m2,
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full router: `/health` plus the authenticated `/api` tree.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: RemoteStore + 'static,
{
  let api = Router::new()
    // Pins
    .route("/pins", get(pins::list::<S>).post(pins::create::<S>))
    .route(
      "/pins/{id}",
      get(pins::get_one::<S>)
        .patch(pins::update::<S>)
        .put(pins::upsert::<S>)
        .delete(pins::remove::<S>),
    )
    // Territories
    .route(
      "/territories",
      get(territories::list::<S>).post(territories::create::<S>),
    )
    .route("/territories/containing", get(territories::containing::<S>))
    .route(
      "/territories/{id}",
      get(territories::get_one::<S>)
        .patch(territories::update::<S>)
        .put(territories::upsert::<S>)
        .delete(territories::remove::<S>),
    )
    // Follow-ups
    .route(
      "/follow-ups",
      get(follow_ups::list::<S>).post(follow_ups::create::<S>),
    )
    .route(
      "/follow-ups/{id}",
      get(follow_ups::get_one::<S>)
        .patch(follow_ups::update::<S>)
        .put(follow_ups::upsert::<S>)
        .delete(follow_ups::remove::<S>),
    )
    // Customers
    .route("/customers", get(customers::list::<S>).post(customers::create::<S>))
    .route(
      "/customers/by-pin/{pin_id}",
      get(customers::get_by_pin::<S>)
        .put(customers::upsert_by_pin::<S>)
        .delete(customers::remove_by_pin::<S>),
    )
    .route(
      "/customers/{id}",
      get(customers::get_one::<S>)
        .patch(customers::update::<S>)
        .put(customers::upsert::<S>)
        .delete(customers::remove::<S>),
    )
    .route_layer(middleware::from_fn_with_state(
      state.clone(),
      auth::require_auth::<S>,
    ));

  Router::new()
    .route("/health", get(health))
    .nest("/api", api)
    .with_state(state)
}

/// `GET /health`
async fn health() -> Json<Value> { Json(json!({ "status": "ok" })) }

/// Reject a `PUT` whose body names a different record than its path.
fn ensure_path_matches(path: &str, body: &str, field: &str) -> Result<(), ApiError> {
  if path == body {
    Ok(())
  } else {
    Err(ApiError::BadRequest(format!(
      "path {field} {path:?} does not match body {field} {body:?}"
    )))
  }
}
