//! Handlers for `/api/follow-ups` endpoints.
//!
//! | Method   | Path                          | Notes |
//! |----------|-------------------------------|-------|
//! | `GET`    | `/follow-ups`                 | Soonest first; `?pin_id=` or `?from=&to=` |
//! | `POST`   | `/follow-ups`                 | Body: [`NewFollowUp`] |
//! | `GET`    | `/follow-ups/{id}`            | 404 if not found |
//! | `PATCH`  | `/follow-ups/{id}`            | Body: [`FollowUpPatch`] |
//! | `PUT`    | `/follow-ups/{id}`            | Body: full [`FollowUp`] |
//! | `DELETE` | `/follow-ups/{id}`            | 204 |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use canvass_core::{
  model::{FollowUp, FollowUpPatch, NewFollowUp},
  store::RemoteStore,
  validate::{validate_date, validate_follow_up},
};
use chrono::Utc;
use serde::Deserialize;

use crate::{AppState, ensure_path_matches, error::{ApiError, ApiJson}};

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub pin_id: Option<String>,
  /// Inclusive lower bound, `YYYY-MM-DD`. Requires `to`.
  pub from:   Option<String>,
  /// Inclusive upper bound, `YYYY-MM-DD`. Requires `from`.
  pub to:     Option<String>,
}

/// `GET /follow-ups[?pin_id=<id>][?from=<date>&to=<date>]`
pub async fn list<S: RemoteStore>(
  State(state): State<AppState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<FollowUp>>, ApiError> {
  let follow_ups = match (params.pin_id, params.from, params.to) {
    (None, None, None) => state.store.list_follow_ups().await?,
    (Some(pin_id), None, None) => state.store.list_follow_ups_by_pin(&pin_id).await?,
    (None, Some(from), Some(to)) => {
      validate_date(&from)?;
      validate_date(&to)?;
      state.store.list_follow_ups_between(&from, &to).await?
    }
    _ => {
      return Err(ApiError::BadRequest(
        "filter by either pin_id or both from and to".into(),
      ));
    }
  };
  Ok(Json(follow_ups))
}

/// `POST /follow-ups`
pub async fn create<S: RemoteStore>(
  State(state): State<AppState<S>>,
  ApiJson(body): ApiJson<NewFollowUp>,
) -> Result<impl IntoResponse, ApiError> {
  validate_follow_up(&body.clone().into_follow_up(Utc::now()))?;
  let follow_up = state.store.create_follow_up(body).await?;
  Ok((StatusCode::CREATED, Json(follow_up)))
}

/// `GET /follow-ups/{id}`
pub async fn get_one<S: RemoteStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<String>,
) -> Result<Json<FollowUp>, ApiError> {
  let follow_up = state
    .store
    .get_follow_up(&id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("follow-up {id} not found")))?;
  Ok(Json(follow_up))
}

/// `PATCH /follow-ups/{id}`
pub async fn update<S: RemoteStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<String>,
  ApiJson(patch): ApiJson<FollowUpPatch>,
) -> Result<Json<FollowUp>, ApiError> {
  let mut preview = state
    .store
    .get_follow_up(&id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("follow-up {id} not found")))?;
  patch.clone().apply(&mut preview, Utc::now());
  validate_follow_up(&preview)?;

  Ok(Json(state.store.update_follow_up(&id, patch).await?))
}

/// `PUT /follow-ups/{id}`
pub async fn upsert<S: RemoteStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<String>,
  ApiJson(follow_up): ApiJson<FollowUp>,
) -> Result<Json<FollowUp>, ApiError> {
  ensure_path_matches(&id, &follow_up.id, "id")?;
  validate_follow_up(&follow_up)?;
  Ok(Json(state.store.upsert_follow_up(follow_up).await?))
}

/// `DELETE /follow-ups/{id}`
pub async fn remove<S: RemoteStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
  state.store.delete_follow_up(&id).await?;
  Ok(StatusCode::NO_CONTENT)
}
