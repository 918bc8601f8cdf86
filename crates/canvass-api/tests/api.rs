//! HTTP-level tests of the router against an in-memory record store.

use std::sync::Arc;

use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
  response::Response,
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use canvass_api::{AppState, AuthConfig, router};
use canvass_store_sqlite::SqliteRecordStore;
use rand_core::OsRng;
use serde_json::{Value, json};
use tower::ServiceExt as _;

async fn app() -> Router {
  let store = SqliteRecordStore::open_in_memory().await.unwrap();
  router(AppState::new(Arc::new(store)))
}

async fn app_with_auth(password: &str) -> Router {
  let store = SqliteRecordStore::open_in_memory().await.unwrap();
  let salt  = SaltString::generate(&mut OsRng);
  let hash  = Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .unwrap()
    .to_string();
  router(AppState::new(Arc::new(store)).with_auth(AuthConfig {
    username:      "rep".into(),
    password_hash: hash,
  }))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> Response {
  let mut builder = Request::builder().method(method).uri(uri);
  let body = match body {
    Some(v) => {
      builder = builder.header(header::CONTENT_TYPE, "application/json");
      Body::from(v.to_string())
    }
    None => Body::empty(),
  };
  app.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
}

async fn json_body(resp: Response) -> Value {
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  serde_json::from_slice(&bytes).unwrap()
}

fn square(id: &str, lat: f64, lng: f64, side: f64) -> Value {
  json!({
    "id": id,
    "name": format!("Territory {id}"),
    "color": "#22c55e",
    "coordinates": [
      { "lat": lat,        "lng": lng },
      { "lat": lat,        "lng": lng + side },
      { "lat": lat + side, "lng": lng + side },
      { "lat": lat + side, "lng": lng },
    ],
  })
}

// ── Health and auth ──────────────────────────────────────────────────────────

#[tokio::test]
async fn health_is_open_even_with_auth() {
  let app  = app_with_auth("secret").await;
  let resp = send(&app, "GET", "/health", None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(json_body(resp).await, json!({ "status": "ok" }));
}

#[tokio::test]
async fn api_requires_credentials_when_configured() {
  let app  = app_with_auth("secret").await;
  let resp = send(&app, "GET", "/api/pins", None).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));

  let req = Request::builder()
    .uri("/api/pins")
    .header(header::AUTHORIZATION, format!("Basic {}", B64.encode("rep:secret")))
    .body(Body::empty())
    .unwrap();
  let resp = app.oneshot(req).await.unwrap();
  assert_eq!(resp.status(), StatusCode::OK);
}

// ── Pins ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_then_fetch_pin() {
  let app  = app().await;
  let resp = send(&app, "POST", "/api/pins", Some(json!({
    "lat": 40.7128, "lng": -74.006, "address": "1 Main St", "status": "not-home"
  })))
  .await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  let created = json_body(resp).await;
  assert_eq!(created["status"], "not-home");

  let id   = created["id"].as_str().unwrap();
  let resp = send(&app, "GET", &format!("/api/pins/{id}"), None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(json_body(resp).await, created);
}

#[tokio::test]
async fn invalid_pin_is_unprocessable() {
  let app  = app().await;
  let resp = send(&app, "POST", "/api/pins", Some(json!({
    "lat": 123.0, "lng": 0.0, "address": "nowhere"
  })))
  .await;
  assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
  assert!(json_body(resp).await["error"].is_string());
}

#[tokio::test]
async fn unknown_status_is_rejected() {
  let app  = app().await;
  let resp = send(&app, "POST", "/api/pins", Some(json!({
    "lat": 1.0, "lng": 1.0, "address": "a", "status": "maybe"
  })))
  .await;
  assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
  assert!(json_body(resp).await["error"].is_string());
}

#[tokio::test]
async fn malformed_body_is_400_with_json_error() {
  let app = app().await;
  let req = Request::builder()
    .method("POST")
    .uri("/api/pins")
    .header(header::CONTENT_TYPE, "application/json")
    .body(Body::from("{\"lat\": 1.0,"))
    .unwrap();
  let resp = app.clone().oneshot(req).await.unwrap();
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/json");
  assert!(json_body(resp).await["error"].is_string());

  let req = Request::builder()
    .method("PATCH")
    .uri("/api/territories/t1")
    .body(Body::from("{}"))
    .unwrap();
  let resp = app.oneshot(req).await.unwrap();
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  assert!(json_body(resp).await["error"].is_string());
}

#[tokio::test]
async fn missing_pin_is_404() {
  let app  = app().await;
  let resp = send(&app, "GET", "/api/pins/nope", None).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  assert!(json_body(resp).await["error"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn duplicate_pin_id_is_409() {
  let app  = app().await;
  let body = json!({ "id": "p1", "lat": 1.0, "lng": 1.0, "address": "a" });
  send(&app, "POST", "/api/pins", Some(body.clone())).await;
  let resp = send(&app, "POST", "/api/pins", Some(body)).await;
  assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn patch_and_delete_pin() {
  let app = app().await;
  send(&app, "POST", "/api/pins", Some(json!({
    "id": "p1", "lat": 1.0, "lng": 1.0, "address": "a"
  })))
  .await;

  let resp = send(&app, "PATCH", "/api/pins/p1", Some(json!({ "status": "onboarded" }))).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(json_body(resp).await["status"], "onboarded");

  let resp = send(&app, "DELETE", "/api/pins/p1", None).await;
  assert_eq!(resp.status(), StatusCode::NO_CONTENT);
  let resp = send(&app, "DELETE", "/api/pins/p1", None).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn put_with_mismatched_id_is_400() {
  let app  = app().await;
  let resp = send(&app, "PUT", "/api/pins/p1", Some(json!({
    "id": "p2", "lat": 1.0, "lng": 1.0, "address": "a", "status": "new",
    "created_at": "2024-01-01T00:00:00Z", "updated_at": "2024-01-01T00:00:00Z"
  })))
  .await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// ── Territories ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn degenerate_territory_is_unprocessable() {
  let app  = app().await;
  let resp = send(&app, "POST", "/api/territories", Some(json!({
    "name": "Line", "color": "#000",
    "coordinates": [{ "lat": 0.0, "lng": 0.0 }, { "lat": 1.0, "lng": 1.0 }]
  })))
  .await;
  assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn containing_returns_every_overlapping_territory() {
  let app = app().await;
  for body in [
    square("a", 40.0, -74.0, 0.01),
    square("b", 40.005, -73.995, 0.01),
    square("c", 41.0, -74.0, 0.01),
  ] {
    let resp = send(&app, "POST", "/api/territories", Some(body)).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
  }

  let resp = send(&app, "GET", "/api/territories/containing?lat=40.007&lng=-73.993", None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let mut ids: Vec<String> = json_body(resp)
    .await
    .as_array()
    .unwrap()
    .iter()
    .map(|t| t["id"].as_str().unwrap().to_owned())
    .collect();
  ids.sort();
  assert_eq!(ids, vec!["a", "b"]);

  let resp = send(&app, "GET", "/api/territories/containing?lat=0&lng=0", None).await;
  assert_eq!(json_body(resp).await, json!([]));
}

// ── Follow-ups ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn follow_up_filters() {
  let app = app().await;
  for (pin, date) in [("p1", "2030-01-01"), ("p1", "2030-01-05"), ("p2", "2030-02-01")] {
    let resp = send(&app, "POST", "/api/follow-ups", Some(json!({
      "pin_id": pin, "address": "a", "date": date, "time": "10:00"
    })))
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
  }

  let resp = send(&app, "GET", "/api/follow-ups?pin_id=p1", None).await;
  assert_eq!(json_body(resp).await.as_array().unwrap().len(), 2);

  let resp = send(&app, "GET", "/api/follow-ups?from=2030-01-02&to=2030-02-01", None).await;
  assert_eq!(json_body(resp).await.as_array().unwrap().len(), 2);

  let resp = send(&app, "GET", "/api/follow-ups?from=2030-01-02", None).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_follow_up_time_is_unprocessable() {
  let app  = app().await;
  let resp = send(&app, "POST", "/api/follow-ups", Some(json!({
    "pin_id": "p1", "address": "a", "date": "2030-01-01", "time": "25:00"
  })))
  .await;
  assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// ── Customers ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn customer_upsert_by_pin_creates_placeholder_pin() {
  let app  = app().await;
  let resp = send(&app, "PUT", "/api/customers/by-pin/p9", Some(json!({
    "id": "c1", "pin_id": "p9", "first_name": "Ada", "owns_crypto": true,
    "address": "9 Oak Ave",
    "created_at": "2024-01-01T00:00:00Z", "updated_at": "2024-01-01T00:00:00Z"
  })))
  .await;
  assert_eq!(resp.status(), StatusCode::OK);

  let pin = json_body(send(&app, "GET", "/api/pins/p9", None).await).await;
  assert_eq!(pin["lat"], 0.0);
  assert_eq!(pin["status"], "new");

  let customer = json_body(send(&app, "GET", "/api/customers/by-pin/p9", None).await).await;
  assert_eq!(customer["id"], "c1");
}

#[tokio::test]
async fn customer_with_bad_email_is_unprocessable() {
  let app  = app().await;
  let resp = send(&app, "POST", "/api/customers", Some(json!({
    "pin_id": "p1", "first_name": "Ada", "email": "not-an-email", "address": "a"
  })))
  .await;
  assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn customer_for_unknown_pin_is_unprocessable() {
  let app  = app().await;
  let resp = send(&app, "POST", "/api/customers", Some(json!({
    "pin_id": "ghost", "first_name": "Ada", "address": "a"
  })))
  .await;
  assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}
