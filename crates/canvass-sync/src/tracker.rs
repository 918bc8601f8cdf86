//! The optimistic write path used by field reps.
//!
//! Every action is validated, lands in the local cache flagged dirty, and,
//! when the connectivity signal says online, is pushed to the backend right
//! away. A successful push clears the flag. A failed one is logged and left
//! for the [`crate::SyncCoordinator`] to retry; the user action itself still
//! succeeds.

use std::{future::Future, sync::Arc, time::Duration};

use canvass_core::{
  RemoteFailure, RemoteStoreError,
  geometry::DEFAULT_MIN_AREA_M2,
  matcher::into_containing,
  model::{
    Coordinate, Customer, EntityKind, FollowUp, FollowUpStatus, NewCustomer, NewFollowUp,
    NewPin, NewTerritory, Pin, PinPatch, PinStatus, Territory, TerritoryPatch,
  },
  store::{Entity, LocalStore, RemoteResult, RemoteStore},
  validate::{
    validate_coordinate, validate_customer, validate_follow_up, validate_pin,
    validate_territory,
  },
};
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
  coordinator::{KindCounts, PENDING_TERRITORY_DELETES},
  error::{Result, SyncError},
};

/// Setting key holding the ids of territories shown on the map.
pub const VISIBLE_TERRITORIES: &str = "visible_territories";

/// A saved record and whether the backend has confirmed it.
#[derive(Debug, Clone)]
pub struct Saved<T> {
  pub value:  T,
  pub synced: bool,
}

/// Result of placing or moving a pin.
#[derive(Debug, Clone)]
pub struct PlacedPin {
  pub pin:         Pin,
  pub synced:      bool,
  /// Cached territories whose ring contains the pin, in cache order.
  pub territories: Vec<Territory>,
}

pub struct FieldTracker<L, R> {
  local:        Arc<L>,
  remote:       Arc<R>,
  online:       watch::Receiver<bool>,
  min_area_m2:  f64,
  call_timeout: Duration,
}

impl<L, R> FieldTracker<L, R>
where
  L: LocalStore,
  R: RemoteStore,
{
  pub fn new(local: Arc<L>, remote: Arc<R>, online: watch::Receiver<bool>) -> Self {
    Self {
      local,
      remote,
      online,
      min_area_m2: DEFAULT_MIN_AREA_M2,
      call_timeout: Duration::from_secs(5),
    }
  }

  pub fn with_min_area(mut self, min_area_m2: f64) -> Self {
    self.min_area_m2 = min_area_m2;
    self
  }

  pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
    self.call_timeout = timeout;
    self
  }

  pub fn local(&self) -> &Arc<L> { &self.local }

  pub fn is_online(&self) -> bool { *self.online.borrow() }

  // ── Pins ────────────────────────────────────────────────────────────────

  /// Place a new pin and report the territories it falls in.
  pub async fn drop_pin(&self, input: NewPin) -> Result<PlacedPin> {
    let pin = input.into_pin(Utc::now());
    validate_pin(&pin)?;
    let synced = self.save(&pin, "upsert_pin", |p| self.remote.upsert_pin(p)).await?;
    let territories = self.territories_at(pin.coordinate()).await?;
    Ok(PlacedPin { pin, synced, territories })
  }

  pub async fn move_pin(&self, id: &str, to: Coordinate) -> Result<PlacedPin> {
    validate_coordinate(to)?;
    let patch = PinPatch { lat: Some(to.lat), lng: Some(to.lng), ..PinPatch::default() };
    let saved = self.patch_pin(id, patch).await?;
    let territories = self.territories_at(to).await?;
    Ok(PlacedPin { pin: saved.value, synced: saved.synced, territories })
  }

  pub async fn set_pin_status(&self, id: &str, status: PinStatus) -> Result<Saved<Pin>> {
    self.patch_pin(id, PinPatch::status(status)).await
  }

  async fn patch_pin(&self, id: &str, patch: PinPatch) -> Result<Saved<Pin>> {
    let mut pin = self.cached::<Pin>(id, "pin").await?;
    patch.apply(&mut pin, Utc::now());
    validate_pin(&pin)?;
    let synced = self.save(&pin, "upsert_pin", |p| self.remote.upsert_pin(p)).await?;
    Ok(Saved { value: pin, synced })
  }

  // ── Follow-ups ──────────────────────────────────────────────────────────

  /// The referenced pin need not be known to the backend yet; the sync pass
  /// backfills it from the cache.
  pub async fn schedule_follow_up(&self, input: NewFollowUp) -> Result<Saved<FollowUp>> {
    let follow_up = input.into_follow_up(Utc::now());
    validate_follow_up(&follow_up)?;
    let synced = self
      .save(&follow_up, "upsert_follow_up", |f| self.remote.upsert_follow_up(f))
      .await?;
    Ok(Saved { value: follow_up, synced })
  }

  pub async fn set_follow_up_status(
    &self,
    id: &str,
    status: FollowUpStatus,
  ) -> Result<Saved<FollowUp>> {
    let mut follow_up = self.cached::<FollowUp>(id, "follow-up").await?;
    follow_up.status = status;
    follow_up.updated_at = Utc::now();
    let synced = self
      .save(&follow_up, "upsert_follow_up", |f| self.remote.upsert_follow_up(f))
      .await?;
    Ok(Saved { value: follow_up, synced })
  }

  // ── Customers ───────────────────────────────────────────────────────────

  /// Record a customer for a pin and mark the pin onboarded.
  ///
  /// Onboarding the same pin twice updates the existing customer in place.
  pub async fn onboard_customer(&self, input: NewCustomer) -> Result<Saved<Customer>> {
    let now = Utc::now();
    let mut customer = input.into_customer(now);
    let existing = self
      .local
      .get::<Customer>(&customer.pin_id)
      .await
      .map_err(SyncError::local)?;
    if let Some(existing) = existing {
      customer.id = existing.value.id;
      customer.created_at = existing.value.created_at;
    }
    validate_customer(&customer)?;

    let synced = self
      .save(&customer, "upsert_customer_by_pin_id", |c| {
        self.remote.upsert_customer_by_pin_id(c)
      })
      .await?;

    match self.patch_pin(&customer.pin_id, PinPatch::status(PinStatus::Onboarded)).await {
      Ok(_) | Err(SyncError::Missing { .. }) => {}
      Err(err) => return Err(err),
    }
    Ok(Saved { value: customer, synced })
  }

  // ── Territories ─────────────────────────────────────────────────────────

  pub async fn save_territory(&self, input: NewTerritory) -> Result<Saved<Territory>> {
    let territory = input.into_territory(Utc::now());
    self.store_territory(territory).await
  }

  pub async fn rename_territory(
    &self,
    id: &str,
    name: String,
    color: Option<String>,
  ) -> Result<Saved<Territory>> {
    let mut territory = self.cached::<Territory>(id, "territory").await?;
    let patch = TerritoryPatch { name: Some(name), color, coordinates: None };
    patch.apply(&mut territory, Utc::now());
    self.store_territory(territory).await
  }

  async fn store_territory(&self, territory: Territory) -> Result<Saved<Territory>> {
    validate_territory(&territory, self.min_area_m2)?;
    let synced = self
      .save(&territory, "upsert_territory", |t| self.remote.upsert_territory(t))
      .await?;
    Ok(Saved { value: territory, synced })
  }

  /// Remove a territory from the cache, the visible set and the backend.
  ///
  /// When the backend cannot be reached the deletion is queued for the next
  /// sync pass. Returns whether the territory was cached.
  pub async fn delete_territory(&self, id: &str) -> Result<bool> {
    let existed = self.local.delete::<Territory>(id).await.map_err(SyncError::local)?;
    self.set_territory_visible(id, false).await?;

    if !self.is_online() {
      return self.queue_territory_delete(id).await.map(|()| existed);
    }
    let delete = self.remote.delete_territory(id);
    match self.bounded("delete_territory", EntityKind::Territories, delete).await {
      Ok(()) => {}
      Err(err) if err.is_not_found() => debug!(id, "territory was never synced"),
      Err(err) => {
        warn!(id, error = %err, "remote territory delete failed; queued");
        self.queue_territory_delete(id).await?;
      }
    }
    Ok(existed)
  }

  async fn queue_territory_delete(&self, id: &str) -> Result<()> {
    let mut queued: Vec<String> = self.setting(PENDING_TERRITORY_DELETES).await?;
    if !queued.iter().any(|q| q == id) {
      queued.push(id.to_owned());
    }
    self
      .local
      .save_setting(PENDING_TERRITORY_DELETES, &queued)
      .await
      .map_err(SyncError::local)
  }

  /// Cached territories containing `point`.
  pub async fn territories_at(&self, point: Coordinate) -> Result<Vec<Territory>> {
    validate_coordinate(point)?;
    let territories = self
      .local
      .get_all::<Territory>()
      .await
      .map_err(SyncError::local)?
      .into_iter()
      .map(|r| r.value)
      .collect();
    Ok(into_containing(point, territories))
  }

  pub async fn set_territory_visible(&self, id: &str, visible: bool) -> Result<()> {
    let mut ids: Vec<String> = self.setting(VISIBLE_TERRITORIES).await?;
    let present = ids.iter().any(|v| v == id);
    match (visible, present) {
      (true, false) => ids.push(id.to_owned()),
      (false, true) => ids.retain(|v| v != id),
      _ => return Ok(()),
    }
    self
      .local
      .save_setting(VISIBLE_TERRITORIES, &ids)
      .await
      .map_err(SyncError::local)
  }

  pub async fn visible_territories(&self) -> Result<Vec<String>> {
    self.setting(VISIBLE_TERRITORIES).await
  }

  // ── Hydration ───────────────────────────────────────────────────────────

  /// Mirror the backend into the cache.
  ///
  /// Records with unsynced local edits are left alone, territories whose
  /// deletion is still queued are not brought back, and clean records the
  /// backend no longer has are dropped. Does nothing while offline.
  pub async fn hydrate(&self) -> Result<KindCounts> {
    let mut counts = KindCounts::default();
    if !self.is_online() {
      return Ok(counts);
    }

    let started = Utc::now();
    let remote = &*self.remote;
    let deleted: Vec<String> = self.setting(PENDING_TERRITORY_DELETES).await?;

    let pins = self.bounded("list_pins", EntityKind::Pins, remote.list_pins());
    counts.pins = self.hydrate_kind(pins, &[], started).await?;
    let territories =
      self.bounded("list_territories", EntityKind::Territories, remote.list_territories());
    counts.territories = self.hydrate_kind(territories, &deleted, started).await?;
    let follow_ups =
      self.bounded("list_follow_ups", EntityKind::FollowUps, remote.list_follow_ups());
    counts.follow_ups = self.hydrate_kind(follow_ups, &[], started).await?;
    let customers = self.bounded("list_customers", EntityKind::Customers, remote.list_customers());
    counts.customers = self.hydrate_kind(customers, &[], started).await?;

    info!(
      pins = counts.pins,
      territories = counts.territories,
      follow_ups = counts.follow_ups,
      customers = counts.customers,
      "hydrated cache"
    );
    Ok(counts)
  }

  /// Write the fetched records of one kind, skipping `excluded` keys, then
  /// drop clean records stored before `started` that the backend did not
  /// list. Returns how many records were written.
  async fn hydrate_kind<E: Entity>(
    &self,
    fetch: impl Future<Output = RemoteResult<Vec<E>>>,
    excluded: &[String],
    started: DateTime<Utc>,
  ) -> Result<usize> {
    let entities = fetch.await?;
    let mut listed = Vec::with_capacity(entities.len());
    let mut written = 0;
    for entity in entities {
      listed.push(entity.key().to_owned());
      if excluded.iter().any(|key| key == entity.key()) {
        debug!(entity = %E::KIND, key = entity.key(), "deletion queued; not restoring");
        continue;
      }
      if self.local.put_if_clean(&entity).await.map_err(SyncError::local)? {
        written += 1;
      }
    }

    let pruned = self
      .local
      .prune_clean(E::KIND, &listed, started)
      .await
      .map_err(SyncError::local)?;
    if pruned > 0 {
      debug!(entity = %E::KIND, pruned, "dropped records gone from the backend");
    }
    Ok(written)
  }

  // ── Internals ───────────────────────────────────────────────────────────

  async fn cached<E: Entity>(&self, key: &str, kind: &'static str) -> Result<E> {
    self
      .local
      .get::<E>(key)
      .await
      .map_err(SyncError::local)?
      .map(|r| r.value)
      .ok_or_else(|| SyncError::Missing { kind, key: key.to_owned() })
  }

  async fn setting(&self, key: &str) -> Result<Vec<String>> {
    Ok(
      self
        .local
        .get_setting::<Vec<String>>(key)
        .await
        .map_err(SyncError::local)?
        .unwrap_or_default(),
    )
  }

  async fn bounded<T>(
    &self,
    op: &'static str,
    kind: EntityKind,
    call: impl Future<Output = RemoteResult<T>>,
  ) -> RemoteResult<T> {
    match tokio::time::timeout(self.call_timeout, call).await {
      Ok(result) => result,
      Err(_) => Err(RemoteStoreError::new(op, kind, RemoteFailure::Timeout)),
    }
  }

  /// Write `entity` dirty, then push it if online. Returns whether the
  /// backend confirmed it.
  async fn save<E, F, Fut>(&self, entity: &E, op: &'static str, push: F) -> Result<bool>
  where
    E: Entity,
    F: FnOnce(E) -> Fut,
    Fut: Future<Output = RemoteResult<E>>,
  {
    let revision = self.local.put(entity, true).await.map_err(SyncError::local)?;
    if !self.is_online() {
      debug!(entity = %E::KIND, key = entity.key(), "offline; queued for sync");
      return Ok(false);
    }

    match self.bounded(op, E::KIND, push(entity.clone())).await {
      Ok(_) => {
        let synced = [(entity.key().to_owned(), revision)];
        self
          .local
          .mark_synced(E::KIND, &synced)
          .await
          .map_err(SyncError::local)?;
        Ok(true)
      }
      Err(err) => {
        warn!(
          entity = %E::KIND,
          key = entity.key(),
          error = %err,
          "remote write failed; kept offline"
        );
        Ok(false)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use canvass_store_sqlite::SqliteLocalStore;

  use super::*;
  use crate::{
    coordinator::{SyncConfig, SyncCoordinator},
    testing::{FlakyRemote, square},
  };

  struct Harness {
    local:   Arc<SqliteLocalStore>,
    remote:  Arc<FlakyRemote>,
    online:  watch::Sender<bool>,
    tracker: FieldTracker<SqliteLocalStore, FlakyRemote>,
  }

  async fn harness(online: bool) -> Harness {
    let local = Arc::new(SqliteLocalStore::open_in_memory().await.unwrap());
    let remote = Arc::new(FlakyRemote::new().await);
    let (tx, rx) = watch::channel(online);
    let tracker = FieldTracker::new(local.clone(), remote.clone(), rx);
    Harness { local, remote, online: tx, tracker }
  }

  fn new_pin(lat: f64, lng: f64) -> NewPin { NewPin::at(Coordinate::new(lat, lng), "12 High St") }

  fn territory(name: &str, lat: f64, lng: f64) -> NewTerritory {
    NewTerritory {
      name: name.into(),
      color: "#3366ff".into(),
      coordinates: square(lat, lng, 0.01),
      ..NewTerritory::default()
    }
  }

  #[tokio::test]
  async fn online_drop_is_pushed_and_clean() {
    let h = harness(true).await;

    let placed = h.tracker.drop_pin(new_pin(40.0, -74.0)).await.unwrap();

    assert!(placed.synced);
    assert!(h.remote.inner.get_pin(&placed.pin.id).await.unwrap().is_some());
    let cached = h.local.get::<Pin>(&placed.pin.id).await.unwrap().unwrap();
    assert!(!cached.offline);
  }

  #[tokio::test]
  async fn offline_drop_stays_dirty_until_synced() {
    let h = harness(false).await;

    let placed = h.tracker.drop_pin(new_pin(40.0, -74.0)).await.unwrap();
    assert!(!placed.synced);
    assert_eq!(h.remote.writes(), 0);
    assert_eq!(h.local.get_dirty::<Pin>().await.unwrap().len(), 1);

    h.online.send(true).unwrap();
    let coordinator =
      SyncCoordinator::new(h.local.clone(), h.remote.clone(), SyncConfig::default());
    let report = coordinator.sync_offline_data().await.unwrap();
    assert_eq!(report.pushed.pins, 1);
    assert!(h.local.get_dirty::<Pin>().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn failed_push_degrades_to_offline() {
    let h = harness(true).await;
    h.remote.set_down(true);

    let placed = h.tracker.drop_pin(new_pin(40.0, -74.0)).await.unwrap();

    assert!(!placed.synced);
    assert!(h.local.get::<Pin>(&placed.pin.id).await.unwrap().unwrap().offline);
  }

  #[tokio::test]
  async fn invalid_input_is_rejected_before_any_write() {
    let h = harness(true).await;

    let err = h.tracker.drop_pin(new_pin(95.0, 0.0)).await.unwrap_err();
    assert!(matches!(err, SyncError::Validation(_)));

    let err = h
      .tracker
      .save_territory(NewTerritory {
        name: "Line".into(),
        coordinates: vec![Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 1.0)],
        ..NewTerritory::default()
      })
      .await
      .unwrap_err();
    assert!(matches!(err, SyncError::Validation(_)));

    assert!(h.local.get_all::<Pin>().await.unwrap().is_empty());
    assert!(h.local.get_all::<Territory>().await.unwrap().is_empty());
    assert_eq!(h.remote.writes(), 0);
  }

  #[tokio::test]
  async fn pins_are_tagged_with_overlapping_territories() {
    let h = harness(false).await;
    let a = h.tracker.save_territory(territory("A", 40.0, -74.0)).await.unwrap().value;
    let b = h.tracker.save_territory(territory("B", 40.005, -73.995)).await.unwrap().value;
    h.tracker.save_territory(territory("Far", 10.0, 10.0)).await.unwrap();

    let placed = h.tracker.drop_pin(new_pin(40.007, -73.993)).await.unwrap();
    let mut names: Vec<_> = placed.territories.iter().map(|t| t.name.clone()).collect();
    names.sort();
    assert_eq!(names, ["A", "B"]);

    let to = Coordinate::new(40.001, -73.999);
    let moved = h.tracker.move_pin(&placed.pin.id, to).await.unwrap();
    assert_eq!(moved.territories.len(), 1);
    assert_eq!(moved.territories[0].id, a.id);
    assert_eq!(moved.pin.lat, 40.001);
    assert_ne!(a.id, b.id);
  }

  #[tokio::test]
  async fn status_changes_need_a_cached_record() {
    let h = harness(true).await;
    let err = h.tracker.set_pin_status("nope", PinStatus::NotHome).await.unwrap_err();
    assert!(matches!(err, SyncError::Missing { .. }));

    let pin = h.tracker.drop_pin(new_pin(1.0, 1.0)).await.unwrap().pin;
    let saved = h.tracker.set_pin_status(&pin.id, PinStatus::NotHome).await.unwrap();
    assert!(saved.synced);
    let remote = h.remote.inner.get_pin(&pin.id).await.unwrap().unwrap();
    assert_eq!(remote.status, PinStatus::NotHome);
  }

  #[tokio::test]
  async fn follow_up_lifecycle() {
    let h = harness(true).await;
    let pin = h.tracker.drop_pin(new_pin(1.0, 1.0)).await.unwrap().pin;

    let f = h
      .tracker
      .schedule_follow_up(NewFollowUp {
        pin_id: pin.id.clone(),
        address: pin.address.clone(),
        date: "2026-11-02".into(),
        time: "09:15".into(),
        ..NewFollowUp::default()
      })
      .await
      .unwrap();
    assert!(f.synced);
    assert_eq!(f.value.status, FollowUpStatus::Scheduled);

    let done = h
      .tracker
      .set_follow_up_status(&f.value.id, FollowUpStatus::Completed)
      .await
      .unwrap();
    assert_eq!(done.value.status, FollowUpStatus::Completed);
    let remote = h.remote.inner.get_follow_up(&f.value.id).await.unwrap().unwrap();
    assert_eq!(remote.status, FollowUpStatus::Completed);
  }

  #[tokio::test]
  async fn onboarding_marks_pin_and_reuses_customer() {
    let h = harness(true).await;
    let pin = h.tracker.drop_pin(new_pin(1.0, 1.0)).await.unwrap().pin;
    let input = NewCustomer {
      pin_id: pin.id.clone(),
      first_name: "Ari".into(),
      email: Some("ari@example.com".into()),
      address: pin.address.clone(),
      ..NewCustomer::default()
    };

    let first = h.tracker.onboard_customer(input.clone()).await.unwrap();
    assert!(first.synced);
    let cached_pin = h.local.get::<Pin>(&pin.id).await.unwrap().unwrap();
    assert_eq!(cached_pin.value.status, PinStatus::Onboarded);

    let second = h
      .tracker
      .onboard_customer(NewCustomer { first_name: "Arianna".into(), ..input })
      .await
      .unwrap();
    assert_eq!(second.value.id, first.value.id);
    let remote = h.remote.inner.get_customer_by_pin_id(&pin.id).await.unwrap().unwrap();
    assert_eq!(remote.first_name, "Arianna");
    assert_eq!(remote.id, first.value.id);
  }

  #[tokio::test]
  async fn bad_email_is_a_validation_error() {
    let h = harness(true).await;
    let err = h
      .tracker
      .onboard_customer(NewCustomer {
        pin_id: "p1".into(),
        first_name: "Ari".into(),
        email: Some("not-an-email".into()),
        address: "1 A St".into(),
        ..NewCustomer::default()
      })
      .await
      .unwrap_err();
    assert!(matches!(err, SyncError::Validation(_)));
  }

  #[tokio::test]
  async fn territory_visibility_and_rename() {
    let h = harness(true).await;
    let t = h.tracker.save_territory(territory("West", 40.0, -74.0)).await.unwrap().value;

    h.tracker.set_territory_visible(&t.id, true).await.unwrap();
    h.tracker.set_territory_visible(&t.id, true).await.unwrap();
    assert_eq!(h.tracker.visible_territories().await.unwrap(), vec![t.id.clone()]);

    let renamed = h.tracker.rename_territory(&t.id, "West End".into(), None).await.unwrap();
    assert_eq!(renamed.value.name, "West End");
    assert_eq!(renamed.value.color, "#3366ff");
    let remote = h.remote.inner.get_territory(&t.id).await.unwrap().unwrap();
    assert_eq!(remote.name, "West End");
  }

  #[tokio::test]
  async fn online_territory_delete_clears_everywhere() {
    let h = harness(true).await;
    let t = h.tracker.save_territory(territory("Gone", 40.0, -74.0)).await.unwrap().value;
    h.tracker.set_territory_visible(&t.id, true).await.unwrap();

    assert!(h.tracker.delete_territory(&t.id).await.unwrap());

    assert!(h.local.get::<Territory>(&t.id).await.unwrap().is_none());
    assert!(h.remote.inner.get_territory(&t.id).await.unwrap().is_none());
    assert!(h.tracker.visible_territories().await.unwrap().is_empty());
    let queued: Option<Vec<String>> =
      h.local.get_setting(PENDING_TERRITORY_DELETES).await.unwrap();
    assert!(queued.is_none());
  }

  #[tokio::test]
  async fn offline_territory_delete_is_queued_for_sync() {
    let h = harness(true).await;
    let t = h.tracker.save_territory(territory("Later", 40.0, -74.0)).await.unwrap().value;

    h.online.send(false).unwrap();
    h.tracker.delete_territory(&t.id).await.unwrap();
    h.tracker.delete_territory(&t.id).await.unwrap();
    let queued: Vec<String> =
      h.local.get_setting(PENDING_TERRITORY_DELETES).await.unwrap().unwrap();
    assert_eq!(queued, vec![t.id.clone()]);
    assert!(h.remote.inner.get_territory(&t.id).await.unwrap().is_some());

    h.online.send(true).unwrap();
    let coordinator =
      SyncCoordinator::new(h.local.clone(), h.remote.clone(), SyncConfig::default());
    let report = coordinator.sync_offline_data().await.unwrap();
    assert_eq!(report.deleted_territories, 1);
    assert!(h.remote.inner.get_territory(&t.id).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn hydrate_keeps_dirty_local_edits() {
    let h = harness(true).await;
    let remote_pin = h.remote.inner.create_pin(new_pin(5.0, 5.0)).await.unwrap();
    let other = h.remote.inner.create_pin(new_pin(6.0, 6.0)).await.unwrap();

    // A local edit that has not reached the backend yet.
    let mut edited = remote_pin.clone();
    edited.status = PinStatus::NotInterested;
    h.local.put(&edited, true).await.unwrap();

    let counts = h.tracker.hydrate().await.unwrap();
    assert_eq!(counts.pins, 1);

    let kept = h.local.get::<Pin>(&remote_pin.id).await.unwrap().unwrap();
    assert!(kept.offline);
    assert_eq!(kept.value.status, PinStatus::NotInterested);
    let fetched = h.local.get::<Pin>(&other.id).await.unwrap().unwrap();
    assert!(!fetched.offline);
  }

  #[tokio::test]
  async fn hydrate_does_not_restore_a_queued_territory_delete() {
    let h = harness(true).await;
    let t = h.tracker.save_territory(territory("Doomed", 40.0, -74.0)).await.unwrap().value;

    h.online.send(false).unwrap();
    h.tracker.delete_territory(&t.id).await.unwrap();
    h.online.send(true).unwrap();

    let counts = h.tracker.hydrate().await.unwrap();
    assert_eq!(counts.territories, 0);
    assert!(h.local.get::<Territory>(&t.id).await.unwrap().is_none());
    assert!(h.tracker.territories_at(Coordinate::new(40.005, -73.995)).await.unwrap().is_empty());

    let coordinator =
      SyncCoordinator::new(h.local.clone(), h.remote.clone(), SyncConfig::default());
    let report = coordinator.sync_offline_data().await.unwrap();
    assert_eq!(report.deleted_territories, 1);
    assert!(h.remote.inner.get_territory(&t.id).await.unwrap().is_none());
    assert!(h.local.get::<Territory>(&t.id).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn hydrate_drops_clean_records_removed_remotely() {
    let h = harness(true).await;
    let kept = h.tracker.drop_pin(new_pin(1.0, 1.0)).await.unwrap().pin;
    let removed = h.tracker.drop_pin(new_pin(2.0, 2.0)).await.unwrap().pin;
    h.remote.inner.delete_pin(&removed.id).await.unwrap();

    // Never reached the backend, so it must survive.
    h.online.send(false).unwrap();
    let pending = h.tracker.drop_pin(new_pin(3.0, 3.0)).await.unwrap().pin;
    h.online.send(true).unwrap();

    let counts = h.tracker.hydrate().await.unwrap();
    assert_eq!(counts.pins, 1);
    assert!(h.local.get::<Pin>(&kept.id).await.unwrap().is_some());
    assert!(h.local.get::<Pin>(&removed.id).await.unwrap().is_none());
    let pending = h.local.get::<Pin>(&pending.id).await.unwrap().unwrap();
    assert!(pending.offline);
  }

  #[tokio::test]
  async fn hydrate_is_skipped_offline() {
    let h = harness(false).await;
    h.remote.inner.create_pin(new_pin(5.0, 5.0)).await.unwrap();
    assert_eq!(h.tracker.hydrate().await.unwrap().total(), 0);
    assert!(h.local.get_all::<Pin>().await.unwrap().is_empty());
  }
}
