//! Test doubles shared by the coordinator and tracker tests.

use std::{
  collections::HashSet,
  sync::{
    Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  },
};

use canvass_core::{
  RemoteFailure, RemoteStoreError,
  model::{
    Coordinate, Customer, CustomerPatch, EntityKind, FollowUp, FollowUpPatch, NewCustomer,
    NewFollowUp, NewPin, NewTerritory, Pin, PinPatch, Territory, TerritoryPatch,
  },
  store::{RemoteResult, RemoteStore},
};
use canvass_store_sqlite::SqliteRecordStore;

/// An axis-aligned square ring with its south-west corner at `(lat, lng)`.
pub fn square(lat: f64, lng: f64, side: f64) -> Vec<Coordinate> {
  vec![
    Coordinate::new(lat, lng),
    Coordinate::new(lat, lng + side),
    Coordinate::new(lat + side, lng + side),
    Coordinate::new(lat + side, lng),
  ]
}

/// A [`SqliteRecordStore`] that can be switched off, told to reject specific
/// keys, and counts the writes that reach it.
pub struct FlakyRemote {
  pub inner: SqliteRecordStore,
  down:      AtomicBool,
  rejected:  Mutex<HashSet<String>>,
  writes:    AtomicUsize,
}

impl FlakyRemote {
  pub async fn new() -> Self {
    Self {
      inner:    SqliteRecordStore::open_in_memory().await.unwrap(),
      down:     AtomicBool::new(false),
      rejected: Mutex::new(HashSet::new()),
      writes:   AtomicUsize::new(0),
    }
  }

  pub fn set_down(&self, down: bool) { self.down.store(down, Ordering::SeqCst); }

  pub fn reject(&self, key: &str) { self.rejected.lock().unwrap().insert(key.to_owned()); }

  pub fn writes(&self) -> usize { self.writes.load(Ordering::SeqCst) }

  fn check(&self, op: &'static str, entity: EntityKind, key: &str) -> RemoteResult<()> {
    if self.down.load(Ordering::SeqCst) {
      return Err(RemoteStoreError::new(
        op,
        entity,
        RemoteFailure::Unavailable("switched off".into()),
      ));
    }
    if self.rejected.lock().unwrap().contains(key) {
      return Err(RemoteStoreError::new(op, entity, RemoteFailure::Rejected(key.into())));
    }
    Ok(())
  }

  fn write(&self, op: &'static str, entity: EntityKind, key: &str) -> RemoteResult<()> {
    self.check(op, entity, key)?;
    self.writes.fetch_add(1, Ordering::SeqCst);
    Ok(())
  }
}

impl RemoteStore for FlakyRemote {
  async fn create_pin(&self, input: NewPin) -> RemoteResult<Pin> {
    self.write("create_pin", EntityKind::Pins, "")?;
    self.inner.create_pin(input).await
  }

  async fn list_pins(&self) -> RemoteResult<Vec<Pin>> {
    self.check("list_pins", EntityKind::Pins, "")?;
    self.inner.list_pins().await
  }

  async fn get_pin<'a>(&'a self, id: &'a str) -> RemoteResult<Option<Pin>> {
    self.check("get_pin", EntityKind::Pins, id)?;
    self.inner.get_pin(id).await
  }

  async fn update_pin<'a>(&'a self, id: &'a str, patch: PinPatch) -> RemoteResult<Pin> {
    self.write("update_pin", EntityKind::Pins, id)?;
    self.inner.update_pin(id, patch).await
  }

  async fn delete_pin<'a>(&'a self, id: &'a str) -> RemoteResult<()> {
    self.write("delete_pin", EntityKind::Pins, id)?;
    self.inner.delete_pin(id).await
  }

  async fn upsert_pin(&self, pin: Pin) -> RemoteResult<Pin> {
    self.write("upsert_pin", EntityKind::Pins, &pin.id)?;
    self.inner.upsert_pin(pin).await
  }

  async fn create_territory(&self, input: NewTerritory) -> RemoteResult<Territory> {
    self.write("create_territory", EntityKind::Territories, "")?;
    self.inner.create_territory(input).await
  }

  async fn list_territories(&self) -> RemoteResult<Vec<Territory>> {
    self.check("list_territories", EntityKind::Territories, "")?;
    self.inner.list_territories().await
  }

  async fn get_territory<'a>(&'a self, id: &'a str) -> RemoteResult<Option<Territory>> {
    self.check("get_territory", EntityKind::Territories, id)?;
    self.inner.get_territory(id).await
  }

  async fn update_territory<'a>(
    &'a self,
    id: &'a str,
    patch: TerritoryPatch,
  ) -> RemoteResult<Territory> {
    self.write("update_territory", EntityKind::Territories, id)?;
    self.inner.update_territory(id, patch).await
  }

  async fn delete_territory<'a>(&'a self, id: &'a str) -> RemoteResult<()> {
    self.write("delete_territory", EntityKind::Territories, id)?;
    self.inner.delete_territory(id).await
  }

  async fn upsert_territory(&self, territory: Territory) -> RemoteResult<Territory> {
    self.write("upsert_territory", EntityKind::Territories, &territory.id)?;
    self.inner.upsert_territory(territory).await
  }

  async fn create_follow_up(&self, input: NewFollowUp) -> RemoteResult<FollowUp> {
    self.write("create_follow_up", EntityKind::FollowUps, "")?;
    self.inner.create_follow_up(input).await
  }

  async fn list_follow_ups(&self) -> RemoteResult<Vec<FollowUp>> {
    self.check("list_follow_ups", EntityKind::FollowUps, "")?;
    self.inner.list_follow_ups().await
  }

  async fn list_follow_ups_by_pin<'a>(&'a self, pin_id: &'a str) -> RemoteResult<Vec<FollowUp>> {
    self.check("list_follow_ups_by_pin", EntityKind::FollowUps, pin_id)?;
    self.inner.list_follow_ups_by_pin(pin_id).await
  }

  async fn list_follow_ups_between<'a>(
    &'a self,
    start: &'a str,
    end: &'a str,
  ) -> RemoteResult<Vec<FollowUp>> {
    self.check("list_follow_ups_between", EntityKind::FollowUps, "")?;
    self.inner.list_follow_ups_between(start, end).await
  }

  async fn get_follow_up<'a>(&'a self, id: &'a str) -> RemoteResult<Option<FollowUp>> {
    self.check("get_follow_up", EntityKind::FollowUps, id)?;
    self.inner.get_follow_up(id).await
  }

  async fn update_follow_up<'a>(
    &'a self,
    id: &'a str,
    patch: FollowUpPatch,
  ) -> RemoteResult<FollowUp> {
    self.write("update_follow_up", EntityKind::FollowUps, id)?;
    self.inner.update_follow_up(id, patch).await
  }

  async fn delete_follow_up<'a>(&'a self, id: &'a str) -> RemoteResult<()> {
    self.write("delete_follow_up", EntityKind::FollowUps, id)?;
    self.inner.delete_follow_up(id).await
  }

  async fn upsert_follow_up(&self, follow_up: FollowUp) -> RemoteResult<FollowUp> {
    self.write("upsert_follow_up", EntityKind::FollowUps, &follow_up.id)?;
    self.inner.upsert_follow_up(follow_up).await
  }

  async fn create_customer(&self, input: NewCustomer) -> RemoteResult<Customer> {
    self.write("create_customer", EntityKind::Customers, &input.pin_id)?;
    self.inner.create_customer(input).await
  }

  async fn list_customers(&self) -> RemoteResult<Vec<Customer>> {
    self.check("list_customers", EntityKind::Customers, "")?;
    self.inner.list_customers().await
  }

  async fn get_customer<'a>(&'a self, id: &'a str) -> RemoteResult<Option<Customer>> {
    self.check("get_customer", EntityKind::Customers, id)?;
    self.inner.get_customer(id).await
  }

  async fn get_customer_by_pin_id<'a>(
    &'a self,
    pin_id: &'a str,
  ) -> RemoteResult<Option<Customer>> {
    self.check("get_customer_by_pin_id", EntityKind::Customers, pin_id)?;
    self.inner.get_customer_by_pin_id(pin_id).await
  }

  async fn update_customer<'a>(
    &'a self,
    id: &'a str,
    patch: CustomerPatch,
  ) -> RemoteResult<Customer> {
    self.write("update_customer", EntityKind::Customers, id)?;
    self.inner.update_customer(id, patch).await
  }

  async fn delete_customer<'a>(&'a self, id: &'a str) -> RemoteResult<()> {
    self.write("delete_customer", EntityKind::Customers, id)?;
    self.inner.delete_customer(id).await
  }

  async fn delete_customer_by_pin_id<'a>(&'a self, pin_id: &'a str) -> RemoteResult<()> {
    self.write("delete_customer_by_pin_id", EntityKind::Customers, pin_id)?;
    self.inner.delete_customer_by_pin_id(pin_id).await
  }

  async fn upsert_customer(&self, customer: Customer) -> RemoteResult<Customer> {
    self.write("upsert_customer", EntityKind::Customers, &customer.pin_id)?;
    self.inner.upsert_customer(customer).await
  }

  async fn upsert_customer_by_pin_id(&self, customer: Customer) -> RemoteResult<Customer> {
    self.write("upsert_customer_by_pin_id", EntityKind::Customers, &customer.pin_id)?;
    self.inner.upsert_customer_by_pin_id(customer).await
  }
}
