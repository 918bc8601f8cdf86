//! Handlers for `/api/customers` endpoints.
//!
//! Customers are addressable both by their own `id` and by the `pin_id` they
//! belong to; at most one customer exists per pin.
//!
//! | Method   | Path                          | Notes |
//! |----------|-------------------------------|-------|
//! | `GET`    | `/customers`                  | Newest first |
//! | `POST`   | `/customers`                  | Body: [`NewCustomer`]; pin must exist |
//! | `GET`    | `/customers/{id}`             | 404 if not found |
//! | `PATCH`  | `/customers/{id}`             | Body: [`CustomerPatch`] |
//! | `PUT`    | `/customers/{id}`             | Body: full [`Customer`]; keyed by id |
//! | `DELETE` | `/customers/{id}`             | 204 |
//! | `GET`    | `/customers/by-pin/{pin_id}`  | 404 if the pin has no customer |
//! | `PUT`    | `/customers/by-pin/{pin_id}`  | Keyed by pin; writes a placeholder pin if missing |
//! | `DELETE` | `/customers/by-pin/{pin_id}`  | 204 |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use canvass_core::{
  model::{Customer, CustomerPatch, NewCustomer},
  store::RemoteStore,
  validate::validate_customer,
};
use chrono::Utc;

use crate::{AppState, ensure_path_matches, error::{ApiError, ApiJson}};

/// `GET /customers`
pub async fn list<S: RemoteStore>(
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<Customer>>, ApiError> {
  Ok(Json(state.store.list_customers().await?))
}

/// `POST /customers`
pub async fn create<S: RemoteStore>(
  State(state): State<AppState<S>>,
  ApiJson(body): ApiJson<NewCustomer>,
) -> Result<impl IntoResponse, ApiError> {
  validate_customer(&body.clone().into_customer(Utc::now()))?;
  let customer = state.store.create_customer(body).await?;
  Ok((StatusCode::CREATED, Json(customer)))
}

/// `GET /customers/{id}`
pub async fn get_one<S: RemoteStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<String>,
) -> Result<Json<Customer>, ApiError> {
  let customer = state
    .store
    .get_customer(&id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("customer {id} not found")))?;
  Ok(Json(customer))
}

/// `PATCH /customers/{id}`
pub async fn update<S: RemoteStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<String>,
  ApiJson(patch): ApiJson<CustomerPatch>,
) -> Result<Json<Customer>, ApiError> {
  let mut preview = state
    .store
    .get_customer(&id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("customer {id} not found")))?;
  patch.clone().apply(&mut preview, Utc::now());
  validate_customer(&preview)?;

  Ok(Json(state.store.update_customer(&id, patch).await?))
}

/// `PUT /customers/{id}`
pub async fn upsert<S: RemoteStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<String>,
  ApiJson(customer): ApiJson<Customer>,
) -> Result<Json<Customer>, ApiError> {
  ensure_path_matches(&id, &customer.id, "id")?;
  validate_customer(&customer)?;
  Ok(Json(state.store.upsert_customer(customer).await?))
}

/// `DELETE /customers/{id}`
pub async fn remove<S: RemoteStore>(
  State(state): State<AppState<S>>,
  Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
  state.store.delete_customer(&id).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `GET /customers/by-pin/{pin_id}`
pub async fn get_by_pin<S: RemoteStore>(
  State(state): State<AppState<S>>,
  Path(pin_id): Path<String>,
) -> Result<Json<Customer>, ApiError> {
  let customer = state
    .store
    .get_customer_by_pin_id(&pin_id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("no customer for pin {pin_id}")))?;
  Ok(Json(customer))
}

/// `PUT /customers/by-pin/{pin_id}`
pub async fn upsert_by_pin<S: RemoteStore>(
  State(state): State<AppState<S>>,
  Path(pin_id): Path<String>,
  ApiJson(customer): ApiJson<Customer>,
) -> Result<Json<Customer>, ApiError> {
  ensure_path_matches(&pin_id, &customer.pin_id, "pin_id")?;
  validate_customer(&customer)?;
  Ok(Json(state.store.upsert_customer_by_pin_id(customer).await?))
}

/// `DELETE /customers/by-pin/{pin_id}`
pub async fn remove_by_pin<S: RemoteStore>(
  State(state): State<AppState<S>>,
  Path(pin_id): Path<String>,
) -> Result<StatusCode, ApiError> {
  state.store.delete_customer_by_pin_id(&pin_id).await?;
  Ok(StatusCode::NO_CONTENT)
}
