//! [`RemoteStore`] over the canvass JSON API.
//!
//! Status codes map back onto [`RemoteFailure`] so callers see the same
//! taxonomy whether they talk to SQLite directly or through HTTP: 404 is
//! `NotFound`, 409 `Conflict`, 400/401/403/422 `Rejected`, 5xx `Unavailable`.
//! Transport timeouts become `Timeout` and refused connections `Unavailable`.

use std::time::Duration;

use canvass_core::{
  RemoteFailure, RemoteStoreError,
  model::{
    Customer, CustomerPatch, EntityKind, FollowUp, FollowUpPatch, NewCustomer,
    NewFollowUp, NewPin, NewTerritory, Pin, PinPatch, Territory, TerritoryPatch,
  },
  store::{RemoteResult, RemoteStore},
};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, de::DeserializeOwned};
use tracing::debug;

use crate::error::{Result, SyncError};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings for the canvass API.
#[derive(Debug, Clone)]
pub struct ClientConfig {
  pub base_url: String,
  pub username: Option<String>,
  pub password: Option<String>,
  /// Applied to every request, `/health` probes included.
  pub timeout:  Duration,
}

impl Default for ClientConfig {
  fn default() -> Self {
    Self {
      base_url: "http://127.0.0.1:8787".into(),
      username: None,
      password: None,
      timeout:  DEFAULT_TIMEOUT,
    }
  }
}

/// HTTP client for the canvass REST API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct HttpRemoteStore {
  client: Client,
  base:   Url,
  config: ClientConfig,
}

#[derive(Deserialize)]
struct ErrorBody {
  error: String,
}

impl HttpRemoteStore {
  pub fn new(config: ClientConfig) -> Result<Self> {
    let base = Url::parse(&config.base_url)
      .map_err(|_| SyncError::InvalidUrl(config.base_url.clone()))?;
    if base.cannot_be_a_base() {
      return Err(SyncError::InvalidUrl(config.base_url.clone()));
    }
    let client = Client::builder().timeout(config.timeout).build()?;
    Ok(Self { client, base, config })
  }

  pub fn base_url(&self) -> &str { self.base.as_str() }

  /// `true` when `GET /health` answers with a success status in time.
  pub async fn ping(&self) -> bool {
    let mut url = self.base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
      path.pop_if_empty().push("health");
    }
    match self.client.get(url).send().await {
      Ok(resp) => resp.status().is_success(),
      Err(err) => {
        debug!(error = %err, "health probe failed");
        false
      }
    }
  }

  /// `{base}/api/{segments...}`, each segment percent-encoded.
  fn api(&self, segments: &[&str]) -> Url {
    let mut url = self.base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
      path.pop_if_empty().push("api").extend(segments);
    }
    url
  }

  fn auth(&self, req: RequestBuilder) -> RequestBuilder {
    match &self.config.username {
      Some(username) => req.basic_auth(username, self.config.password.as_ref()),
      None => req,
    }
  }

  async fn execute(
    &self,
    op: &'static str,
    entity: EntityKind,
    req: RequestBuilder,
  ) -> RemoteResult<Response> {
    let resp = self
      .auth(req)
      .send()
      .await
      .map_err(|err| transport_error(op, entity, err))?;
    if resp.status().is_success() {
      Ok(resp)
    } else {
      Err(status_error(op, entity, resp).await)
    }
  }

  async fn fetch<T: DeserializeOwned>(
    &self,
    op: &'static str,
    entity: EntityKind,
    req: RequestBuilder,
  ) -> RemoteResult<T> {
    let resp = self.execute(op, entity, req).await?;
    resp.json().await.map_err(|err| RemoteStoreError::backend(op, entity, err))
  }

  /// Like [`Self::fetch`], but a 404 is `Ok(None)`.
  async fn fetch_optional<T: DeserializeOwned>(
    &self,
    op: &'static str,
    entity: EntityKind,
    req: RequestBuilder,
  ) -> RemoteResult<Option<T>> {
    match self.fetch(op, entity, req).await {
      Ok(value) => Ok(Some(value)),
      Err(err) if err.is_not_found() => Ok(None),
      Err(err) => Err(err),
    }
  }

  async fn send_empty(
    &self,
    op: &'static str,
    entity: EntityKind,
    req: RequestBuilder,
  ) -> RemoteResult<()> {
    self.execute(op, entity, req).await.map(|_| ())
  }
}

fn transport_error(op: &'static str, entity: EntityKind, err: reqwest::Error) -> RemoteStoreError {
  let failure = if err.is_timeout() {
    RemoteFailure::Timeout
  } else if err.is_connect() || err.is_request() {
    RemoteFailure::Unavailable(err.to_string())
  } else {
    RemoteFailure::Backend(Box::new(err))
  };
  RemoteStoreError::new(op, entity, failure)
}

async fn status_error(op: &'static str, entity: EntityKind, resp: Response) -> RemoteStoreError {
  let status = resp.status();
  let message = match resp.json::<ErrorBody>().await {
    Ok(body) => body.error,
    Err(_) => status.to_string(),
  };
  let failure = match status {
    StatusCode::NOT_FOUND => RemoteFailure::NotFound(message),
    StatusCode::CONFLICT => RemoteFailure::Conflict(message),
    StatusCode::BAD_REQUEST
    | StatusCode::UNAUTHORIZED
    | StatusCode::FORBIDDEN
    | StatusCode::UNPROCESSABLE_ENTITY => RemoteFailure::Rejected(message),
    StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => RemoteFailure::Timeout,
    s if s.is_server_error() => RemoteFailure::Unavailable(format!("{status}: {message}")),
    _ => RemoteFailure::Rejected(format!("{status}: {message}")),
  };
  RemoteStoreError::new(op, entity, failure)
}

impl RemoteStore for HttpRemoteStore {
  // ── Pins ────────────────────────────────────────────────────────────────

  async fn create_pin(&self, input: NewPin) -> RemoteResult<Pin> {
    let req = self.client.post(self.api(&["pins"])).json(&input);
    self.fetch("create_pin", EntityKind::Pins, req).await
  }

  async fn list_pins(&self) -> RemoteResult<Vec<Pin>> {
    let req = self.client.get(self.api(&["pins"]));
    self.fetch("list_pins", EntityKind::Pins, req).await
  }

  async fn get_pin<'a>(&'a self, id: &'a str) -> RemoteResult<Option<Pin>> {
    let req = self.client.get(self.api(&["pins", id]));
    self.fetch_optional("get_pin", EntityKind::Pins, req).await
  }

  async fn update_pin<'a>(&'a self, id: &'a str, patch: PinPatch) -> RemoteResult<Pin> {
    let req = self.client.patch(self.api(&["pins", id])).json(&patch);
    self.fetch("update_pin", EntityKind::Pins, req).await
  }

  async fn delete_pin<'a>(&'a self, id: &'a str) -> RemoteResult<()> {
    let req = self.client.delete(self.api(&["pins", id]));
    self.send_empty("delete_pin", EntityKind::Pins, req).await
  }

  async fn upsert_pin(&self, pin: Pin) -> RemoteResult<Pin> {
    let req = self.client.put(self.api(&["pins", &pin.id])).json(&pin);
    self.fetch("upsert_pin", EntityKind::Pins, req).await
  }

  // ── Territories ─────────────────────────────────────────────────────────

  async fn create_territory(&self, input: NewTerritory) -> RemoteResult<Territory> {
    let req = self.client.post(self.api(&["territories"])).json(&input);
    self.fetch("create_territory", EntityKind::Territories, req).await
  }

  async fn list_territories(&self) -> RemoteResult<Vec<Territory>> {
    let req = self.client.get(self.api(&["territories"]));
    self.fetch("list_territories", EntityKind::Territories, req).await
  }

  async fn get_territory<'a>(&'a self, id: &'a str) -> RemoteResult<Option<Territory>> {
    let req = self.client.get(self.api(&["territories", id]));
    self.fetch_optional("get_territory", EntityKind::Territories, req).await
  }

  async fn update_territory<'a>(
    &'a self,
    id: &'a str,
    patch: TerritoryPatch,
  ) -> RemoteResult<Territory> {
    let req = self.client.patch(self.api(&["territories", id])).json(&patch);
    self.fetch("update_territory", EntityKind::Territories, req).await
  }

  async fn delete_territory<'a>(&'a self, id: &'a str) -> RemoteResult<()> {
    let req = self.client.delete(self.api(&["territories", id]));
    self.send_empty("delete_territory", EntityKind::Territories, req).await
  }

  async fn upsert_territory(&self, territory: Territory) -> RemoteResult<Territory> {
    let req = self
      .client
      .put(self.api(&["territories", &territory.id]))
      .json(&territory);
    self.fetch("upsert_territory", EntityKind::Territories, req).await
  }

  // ── Follow-ups ──────────────────────────────────────────────────────────

  async fn create_follow_up(&self, input: NewFollowUp) -> RemoteResult<FollowUp> {
    let req = self.client.post(self.api(&["follow-ups"])).json(&input);
    self.fetch("create_follow_up", EntityKind::FollowUps, req).await
  }

  async fn list_follow_ups(&self) -> RemoteResult<Vec<FollowUp>> {
    let req = self.client.get(self.api(&["follow-ups"]));
    self.fetch("list_follow_ups", EntityKind::FollowUps, req).await
  }

  async fn list_follow_ups_by_pin<'a>(
    &'a self,
    pin_id: &'a str,
  ) -> RemoteResult<Vec<FollowUp>> {
    let req = self
      .client
      .get(self.api(&["follow-ups"]))
      .query(&[("pin_id", pin_id)]);
    self.fetch("list_follow_ups_by_pin", EntityKind::FollowUps, req).await
  }

  async fn list_follow_ups_between<'a>(
    &'a self,
    start: &'a str,
    end: &'a str,
  ) -> RemoteResult<Vec<FollowUp>> {
    let req = self
      .client
      .get(self.api(&["follow-ups"]))
      .query(&[("from", start), ("to", end)]);
    self.fetch("list_follow_ups_between", EntityKind::FollowUps, req).await
  }

  async fn get_follow_up<'a>(&'a self, id: &'a str) -> RemoteResult<Option<FollowUp>> {
    let req = self.client.get(self.api(&["follow-ups", id]));
    self.fetch_optional("get_follow_up", EntityKind::FollowUps, req).await
  }

  async fn update_follow_up<'a>(
    &'a self,
    id: &'a str,
    patch: FollowUpPatch,
  ) -> RemoteResult<FollowUp> {
    let req = self.client.patch(self.api(&["follow-ups", id])).json(&patch);
    self.fetch("update_follow_up", EntityKind::FollowUps, req).await
  }

  async fn delete_follow_up<'a>(&'a self, id: &'a str) -> RemoteResult<()> {
    let req = self.client.delete(self.api(&["follow-ups", id]));
    self.send_empty("delete_follow_up", EntityKind::FollowUps, req).await
  }

  async fn upsert_follow_up(&self, follow_up: FollowUp) -> RemoteResult<FollowUp> {
    let req = self
      .client
      .put(self.api(&["follow-ups", &follow_up.id]))
      .json(&follow_up);
    self.fetch("upsert_follow_up", EntityKind::FollowUps, req).await
  }

  // ── Customers ───────────────────────────────────────────────────────────

  async fn create_customer(&self, input: NewCustomer) -> RemoteResult<Customer> {
    let req = self.client.post(self.api(&["customers"])).json(&input);
    self.fetch("create_customer", EntityKind::Customers, req).await
  }

  async fn list_customers(&self) -> RemoteResult<Vec<Customer>> {
    let req = self.client.get(self.api(&["customers"]));
    self.fetch("list_customers", EntityKind::Customers, req).await
  }

  async fn get_customer<'a>(&'a self, id: &'a str) -> RemoteResult<Option<Customer>> {
    let req = self.client.get(self.api(&["customers", id]));
    self.fetch_optional("get_customer", EntityKind::Customers, req).await
  }

  async fn get_customer_by_pin_id<'a>(
    &'a self,
    pin_id: &'a str,
  ) -> RemoteResult<Option<Customer>> {
    let req = self.client.get(self.api(&["customers", "by-pin", pin_id]));
    self.fetch_optional("get_customer_by_pin_id", EntityKind::Customers, req).await
  }

  async fn update_customer<'a>(
    &'a self,
    id: &'a str,
    patch: CustomerPatch,
  ) -> RemoteResult<Customer> {
    let req = self.client.patch(self.api(&["customers", id])).json(&patch);
    self.fetch("update_customer", EntityKind::Customers, req).await
  }

  async fn delete_customer<'a>(&'a self, id: &'a str) -> RemoteResult<()> {
    let req = self.client.delete(self.api(&["customers", id]));
    self.send_empty("delete_customer", EntityKind::Customers, req).await
  }

  async fn delete_customer_by_pin_id<'a>(&'a self, pin_id: &'a str) -> RemoteResult<()> {
    let req = self.client.delete(self.api(&["customers", "by-pin", pin_id]));
    self.send_empty("delete_customer_by_pin_id", EntityKind::Customers, req).await
  }

  async fn upsert_customer(&self, customer: Customer) -> RemoteResult<Customer> {
    let req = self
      .client
      .put(self.api(&["customers", &customer.id]))
      .json(&customer);
    self.fetch("upsert_customer", EntityKind::Customers, req).await
  }

  async fn upsert_customer_by_pin_id(&self, customer: Customer) -> RemoteResult<Customer> {
    let req = self
      .client
      .put(self.api(&["customers", "by-pin", &customer.pin_id]))
      .json(&customer);
    self.fetch("upsert_customer_by_pin_id", EntityKind::Customers, req).await
  }
}
