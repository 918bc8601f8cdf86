//! The `LocalStore` and `RemoteStore` traits.
//!
//! [`LocalStore`] is the offline cache on the device: every user action lands
//! there first, flagged `offline` until the backend confirms it.
//! [`RemoteStore`] is the system of record. Higher layers (the sync client,
//! the HTTP API) depend on these abstractions, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
  error::RemoteStoreError,
  model::{
    Customer, CustomerPatch, EntityKind, FollowUp, FollowUpPatch, NewCustomer,
    NewFollowUp, NewPin, NewTerritory, Pin, PinPatch, Territory, TerritoryPatch,
  },
};

// ─── Entities ────────────────────────────────────────────────────────────────

/// A record type that can be cached locally.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
  const KIND: EntityKind;

  /// The identity key within [`Self::KIND`]. Customers are keyed by their pin.
  fn key(&self) -> &str;
}

impl Entity for Pin {
  const KIND: EntityKind = EntityKind::Pins;

  fn key(&self) -> &str { &self.id }
}

impl Entity for Territory {
  const KIND: EntityKind = EntityKind::Territories;

  fn key(&self) -> &str { &self.id }
}

impl Entity for FollowUp {
  const KIND: EntityKind = EntityKind::FollowUps;

  fn key(&self) -> &str { &self.id }
}

impl Entity for Customer {
  const KIND: EntityKind = EntityKind::Customers;

  fn key(&self) -> &str { &self.pin_id }
}

/// A cached entity together with its sync bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalRecord<E> {
  pub value:    E,
  /// `true` while the record has not been confirmed by the remote store.
  pub offline:  bool,
  /// Bumped on every `put` of this key; lets the sync pass detect writes
  /// that raced with a push.
  pub revision: i64,
}

// ─── Local store ─────────────────────────────────────────────────────────────

/// Abstraction over the device-local offline cache.
///
/// Every operation initialises the backing containers on first use, so
/// calling [`LocalStore::init`] up front is optional. The store never decides
/// connectivity itself; callers pass the `offline` flag on each write.
pub trait LocalStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Create the per-kind containers if they are missing. Idempotent.
  fn init(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Insert or replace `entity` under its [`Entity::key`], recording the
  /// caller's `offline` flag. Returns the record's new revision.
  fn put<'a, E: Entity>(
    &'a self,
    entity: &'a E,
    offline: bool,
  ) -> impl Future<Output = Result<i64, Self::Error>> + Send + 'a;

  /// Point lookup by key.
  fn get<'a, E: Entity>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<LocalRecord<E>>, Self::Error>> + Send + 'a;

  /// Every cached record of type `E`, in no particular order.
  fn get_all<E: Entity>(
    &self,
  ) -> impl Future<Output = Result<Vec<LocalRecord<E>>, Self::Error>> + Send + '_;

  /// Only the records still flagged `offline`.
  fn get_dirty<E: Entity>(
    &self,
  ) -> impl Future<Output = Result<Vec<LocalRecord<E>>, Self::Error>> + Send + '_;

  /// Store `entity` as synced unless a dirty copy of the same key exists.
  /// The check and the write are one atomic step. Returns whether the
  /// record was written.
  fn put_if_clean<'a, E: Entity>(
    &'a self,
    entity: &'a E,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Delete every clean record of `kind` whose key is not in `keep` and
  /// which was last stored before `stored_before`. Dirty records are never
  /// touched. Returns how many were removed.
  fn prune_clean<'a>(
    &'a self,
    kind: EntityKind,
    keep: &'a [String],
    stored_before: DateTime<Utc>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + 'a;

  /// Remove a record. Returns whether it existed.
  fn delete<'a, E: Entity>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Clear the `offline` flag on each listed key. Unknown keys are ignored.
  fn clear_dirty_flag<'a>(
    &'a self,
    kind: EntityKind,
    keys: &'a [String],
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Clear the `offline` flag on each `(key, revision)` pair whose stored
  /// revision is unchanged. Returns how many flags were cleared.
  fn mark_synced<'a>(
    &'a self,
    kind: EntityKind,
    synced: &'a [(String, i64)],
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + 'a;

  /// Wipe every container, settings included.
  fn clear_all(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get_setting<'a, T: DeserializeOwned + Send + 'static>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<T>, Self::Error>> + Send + 'a;

  fn save_setting<'a, T: Serialize + Sync>(
    &'a self,
    key: &'a str,
    value: &'a T,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn delete_setting<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

// ─── Remote store ────────────────────────────────────────────────────────────

pub type RemoteResult<T> = Result<T, RemoteStoreError>;

/// Typed CRUD + upsert contract against the durable backend of record.
///
/// Each write is atomic for the single entity it touches. Timestamps are
/// assigned by the store: `updated_at` on every write, `created_at` when a row
/// is first inserted.
pub trait RemoteStore: Send + Sync {
  // ── Pins ──────────────────────────────────────────────────────────────

  fn create_pin(&self, input: NewPin)
  -> impl Future<Output = RemoteResult<Pin>> + Send + '_;

  /// All pins, newest first.
  fn list_pins(&self) -> impl Future<Output = RemoteResult<Vec<Pin>>> + Send + '_;

  fn get_pin<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = RemoteResult<Option<Pin>>> + Send + 'a;

  fn update_pin<'a>(
    &'a self,
    id: &'a str,
    patch: PinPatch,
  ) -> impl Future<Output = RemoteResult<Pin>> + Send + 'a;

  fn delete_pin<'a>(&'a self, id: &'a str)
  -> impl Future<Output = RemoteResult<()>> + Send + 'a;

  fn upsert_pin(&self, pin: Pin) -> impl Future<Output = RemoteResult<Pin>> + Send + '_;

  // ── Territories ───────────────────────────────────────────────────────

  fn create_territory(
    &self,
    input: NewTerritory,
  ) -> impl Future<Output = RemoteResult<Territory>> + Send + '_;

  /// All territories, newest first.
  fn list_territories(
    &self,
  ) -> impl Future<Output = RemoteResult<Vec<Territory>>> + Send + '_;

  fn get_territory<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = RemoteResult<Option<Territory>>> + Send + 'a;

  fn update_territory<'a>(
    &'a self,
    id: &'a str,
    patch: TerritoryPatch,
  ) -> impl Future<Output = RemoteResult<Territory>> + Send + 'a;

  fn delete_territory<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = RemoteResult<()>> + Send + 'a;

  fn upsert_territory(
    &self,
    territory: Territory,
  ) -> impl Future<Output = RemoteResult<Territory>> + Send + '_;

  // ── Follow-ups ────────────────────────────────────────────────────────

  fn create_follow_up(
    &self,
    input: NewFollowUp,
  ) -> impl Future<Output = RemoteResult<FollowUp>> + Send + '_;

  /// All follow-ups, soonest first.
  fn list_follow_ups(
    &self,
  ) -> impl Future<Output = RemoteResult<Vec<FollowUp>>> + Send + '_;

  fn list_follow_ups_by_pin<'a>(
    &'a self,
    pin_id: &'a str,
  ) -> impl Future<Output = RemoteResult<Vec<FollowUp>>> + Send + 'a;

  /// Follow-ups dated within `start..=end` (both `YYYY-MM-DD`).
  fn list_follow_ups_between<'a>(
    &'a self,
    start: &'a str,
    end: &'a str,
  ) -> impl Future<Output = RemoteResult<Vec<FollowUp>>> + Send + 'a;

  fn get_follow_up<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = RemoteResult<Option<FollowUp>>> + Send + 'a;

  fn update_follow_up<'a>(
    &'a self,
    id: &'a str,
    patch: FollowUpPatch,
  ) -> impl Future<Output = RemoteResult<FollowUp>> + Send + 'a;

  fn delete_follow_up<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = RemoteResult<()>> + Send + 'a;

  fn upsert_follow_up(
    &self,
    follow_up: FollowUp,
  ) -> impl Future<Output = RemoteResult<FollowUp>> + Send + '_;

  // ── Customers ─────────────────────────────────────────────────────────

  fn create_customer(
    &self,
    input: NewCustomer,
  ) -> impl Future<Output = RemoteResult<Customer>> + Send + '_;

  /// All customers, newest first.
  fn list_customers(
    &self,
  ) -> impl Future<Output = RemoteResult<Vec<Customer>>> + Send + '_;

  fn get_customer<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = RemoteResult<Option<Customer>>> + Send + 'a;

  fn get_customer_by_pin_id<'a>(
    &'a self,
    pin_id: &'a str,
  ) -> impl Future<Output = RemoteResult<Option<Customer>>> + Send + 'a;

  fn update_customer<'a>(
    &'a self,
    id: &'a str,
    patch: CustomerPatch,
  ) -> impl Future<Output = RemoteResult<Customer>> + Send + 'a;

  fn delete_customer<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = RemoteResult<()>> + Send + 'a;

  fn delete_customer_by_pin_id<'a>(
    &'a self,
    pin_id: &'a str,
  ) -> impl Future<Output = RemoteResult<()>> + Send + 'a;

  /// Create or update keyed by customer `id`.
  fn upsert_customer(
    &self,
    customer: Customer,
  ) -> impl Future<Output = RemoteResult<Customer>> + Send + '_;

  /// Create or update keyed by `pin_id`.
  ///
  /// If the referenced pin does not exist yet, a placeholder pin (position
  /// `{0, 0}`, status `new`, the customer's address) is written first so the
  /// customer never points at nothing. This papers over customers being
  /// saved before their pin reached the backend; the placeholder position is
  /// not meaningful.
  fn upsert_customer_by_pin_id(
    &self,
    customer: Customer,
  ) -> impl Future<Output = RemoteResult<Customer>> + Send + '_;
}
