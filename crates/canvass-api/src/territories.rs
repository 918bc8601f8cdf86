//! Handlers for `/api/territories` endpoints.
//!
//! | Method   | Path                                | Notes |
//! |----------|-------------------------------------|-------|
//! | `GET`    | `/territories`                      | Newest first |
//! | `POST`   | `/territories`                      | Body: [`NewTerritory`]; polygon validated |
//! | `GET`    | `/territories/containing?lat=&lng=` | Every territory whose polygon holds the point |
//! | `GET`    | `/territories/{id}`                 | 404 if not found |
//! | `PATCH`  | `/territories/{id}`                 | Body: [`TerritoryPatch`] |
//! | `PUT`    | `/territories/{id}`                 | Body: full [`Territory`] |
//! | `DELETE` | `/territories/{id}`                 | 204 |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use canvass_core::{
  matcher::into_containing,
  model::{Coordinate, NewTerritory, Territory, TerritoryPatch},
  store::RemoteStore,
  validate::{validate_coordinate, validate_territory},
};
use chrono::Utc;
use serde::Deserialize;

use crate::{AppState, ensure_path_matches, error::{ApiError, ApiJson}};

/// `GET /territories`
pub async fn list<S: RemoteStore>(
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<Territory>>, ApiError> {
  Ok(Json(state.store.list_territories().await?))
}

/// `POST /territories`
pub async fn create<S: RemoteStore>(
  State(state): State<AppState<S>>,
  ApiJson(body): ApiJson<NewTerritory>,
) -> Result<impl IntoResponse, ApiError> {
  validate_territory(&body.clone().into_territory(Utc::now()), state.min_area_m2)?;
  let territory = state.store.create_territory(body).await?;
  Ok((StatusCode::CREATED, Json(territory)))
}

#[derive(Debug, Deserialize)]
pub struct PointParams {
  pub lat: f64,
  pub lng: f64,
}

/// `GET /territories/containing?lat=<lat>&lng=<lng>`
pub async fn containing<S: RemoteStore>(
  State(state): State<AppState<S>>,
  Query(params): Query<PointParams>,
) -> Result<Json<Vec<Territory>>, ApiError> {
  let point = Coordinate::new(params.lat, params.lng);
  validate_coordinate(point)?;
  let territories = state.store.list_territories().await?;
  Ok(Json(into_containing(point, territories)))
}

/// `GET /territories/{id}`
pub async fn get_one<S: RemoteStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<String>,
) -> Result<Json<Territory>, ApiError> {
  let territory = state
    .store
    .get_territory(&id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("territory {id} not found")))?;
  Ok(Json(territory))
}

/// `PATCH /territories/{id}`
pub async fn update<S: RemoteStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<String>,
  ApiJson(patch): ApiJson<TerritoryPatch>,
) -> Result<Json<Territory>, ApiError> {
  let mut preview = state
    .store
    .get_territory(&id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("territory {id} not found")))?;
  patch.clone().apply(&mut preview, Utc::now());
  validate_territory(&preview, state.min_area_m2)?;

  Ok(Json(state.store.update_territory(&id, patch).await?))
}

/// `PUT /territories/{id}`
pub async fn upsert<S: RemoteStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<String>,
  ApiJson(territory): ApiJson<Territory>,
) -> Result<Json<Territory>, ApiError> {
  ensure_path_matches(&id, &territory.id, "id")?;
  validate_territory(&territory, state.min_area_m2)?;
  Ok(Json(state.store.upsert_territory(territory).await?))
}

/// `DELETE /territories/{id}`
pub async fn remove<S: RemoteStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
  state.store.delete_territory(&id).await?;
  Ok(StatusCode::NO_CONTENT)
}
