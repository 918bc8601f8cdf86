//! Handlers for `/api/pins` endpoints.
//!
//! | Method   | Path          | Notes |
//! |----------|---------------|-------|
//! | `GET`    | `/pins`       | Newest first |
//! | `POST`   | `/pins`       | Body: [`NewPin`]; returns 201 + stored pin |
//! | `GET`    | `/pins/{id}`  | 404 if not found |
//! | `PATCH`  | `/pins/{id}`  | Body: [`PinPatch`] |
//! | `PUT`    | `/pins/{id}`  | Body: full [`Pin`]; create-or-update |
//! | `DELETE` | `/pins/{id}`  | 204; also removes the pin's customer |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use canvass_core::{
  model::{NewPin, Pin, PinPatch},
  store::RemoteStore,
  validate::validate_pin,
};
use chrono::Utc;

use crate::{AppState, ensure_path_matches, error::{ApiError, ApiJson}};

/// `GET /pins`
pub async fn list<S: RemoteStore>(
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<Pin>>, ApiError> {
  Ok(Json(state.store.list_pins().await?))
}

/// `POST /pins`
pub async fn create<S: RemoteStore>(
  State(state): State<AppState<S>>,
  ApiJson(body): ApiJson<NewPin>,
) -> Result<impl IntoResponse, ApiError> {
  validate_pin(&body.clone().into_pin(Utc::now()))?;
  let pin = state.store.create_pin(body).await?;
  Ok((StatusCode::CREATED, Json(pin)))
}

/// `GET /pins/{id}`
pub async fn get_one<S: RemoteStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<String>,
) -> Result<Json<Pin>, ApiError> {
  let pin = state
    .store
    .get_pin(&id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("pin {id} not found")))?;
  Ok(Json(pin))
}

/// `PATCH /pins/{id}`
pub async fn update<S: RemoteStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<String>,
  ApiJson(patch): ApiJson<PinPatch>,
) -> Result<Json<Pin>, ApiError> {
  let mut preview = state
    .store
    .get_pin(&id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("pin {id} not found")))?;
  patch.clone().apply(&mut preview, Utc::now());
  validate_pin(&preview)?;

  Ok(Json(state.store.update_pin(&id, patch).await?))
}

/// `PUT /pins/{id}`
pub async fn upsert<S: RemoteStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<String>,
  ApiJson(pin): ApiJson<Pin>,
) -> Result<Json<Pin>, ApiError> {
  ensure_path_matches(&id, &pin.id, "id")?;
  validate_pin(&pin)?;
  Ok(Json(state.store.upsert_pin(pin).await?))
}

/// `DELETE /pins/{id}`
pub async fn remove<S: RemoteStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
  state.store.delete_pin(&id).await?;
  Ok(StatusCode::NO_CONTENT)
}
