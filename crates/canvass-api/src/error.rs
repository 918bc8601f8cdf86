//! API error type, its [`axum::response::IntoResponse`] implementation and
//! the [`ApiJson`] body extractor.

use axum::{
  Json,
  extract::{FromRequest, Request, rejection::JsonRejection},
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use canvass_core::{RemoteFailure, RemoteStoreError, ValidationError};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("unauthorized")]
  Unauthorized,

  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Validation(#[from] ValidationError),

  /// A well-formed payload the store or the body schema refused.
  #[error("unprocessable: {0}")]
  Rejected(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("store error: {0}")]
  Store(#[source] RemoteStoreError),
}

impl From<RemoteStoreError> for ApiError {
  fn from(err: RemoteStoreError) -> Self {
    match &err.failure {
      RemoteFailure::NotFound(id) => ApiError::NotFound(format!("{} {id} not found", err.entity)),
      RemoteFailure::Conflict(msg) => ApiError::Conflict(msg.clone()),
      RemoteFailure::Rejected(msg) => ApiError::Rejected(msg.clone()),
      _ => ApiError::Store(err),
    }
  }
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self {
    match &rejection {
      JsonRejection::JsonDataError(_) => ApiError::Rejected(rejection.body_text()),
      _ => ApiError::BadRequest(rejection.body_text()),
    }
  }
}

/// [`Json`] whose rejections are reported as [`ApiError::BadRequest`], so a
/// malformed body gets the same `{"error": ...}` shape as every other error.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
  Json<T>: FromRequest<S, Rejection = JsonRejection>,
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
    let Json(value) = Json::<T>::from_request(req, state).await?;
    Ok(ApiJson(value))
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Validation(_) | ApiError::Rejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
      ApiError::Conflict(_) => StatusCode::CONFLICT,
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store failure");
        StatusCode::INTERNAL_SERVER_ERROR
      }
    };
    let message = match &self {
      ApiError::NotFound(m)
      | ApiError::BadRequest(m)
      | ApiError::Rejected(m)
      | ApiError::Conflict(m) => m.clone(),
      other => other.to_string(),
    };

    let mut res = (status, Json(json!({ "error": message }))).into_response();
    if status == StatusCode::UNAUTHORIZED {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"canvass\""),
      );
    }
    res
  }
}
