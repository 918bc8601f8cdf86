//! Offline → online reconciliation.
//!
//! [`SyncCoordinator::sync_offline_data`] reads every dirty record from the
//! local cache, upserts it remotely and clears the dirty flag for what the
//! backend accepted. Passes are serialized: a trigger that arrives while a
//! pass is running waits for it, then finds nothing left to do.
//!
//! Pins go out first so follow-ups and customers land on rows that exist.
//! Territories, follow-ups and customers are then pushed concurrently.
//! A record that fails stays dirty and is retried by the next pass.

use std::{collections::HashSet, future::Future, sync::Arc, time::Duration};

use canvass_core::{
  RemoteFailure, RemoteStoreError,
  model::{Customer, EntityKind, FollowUp, Pin, Territory},
  store::{Entity, LocalRecord, LocalStore, RemoteResult, RemoteStore},
};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::{Mutex, broadcast, watch};
use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};

/// Setting key holding the ids of territories deleted while offline.
pub const PENDING_TERRITORY_DELETES: &str = "pending_territory_deletes";

// ─── Configuration ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SyncConfig {
  /// Upper bound on each individual remote call.
  pub call_timeout: Duration,
  pub backoff_base: Duration,
  pub backoff_max:  Duration,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      call_timeout: Duration::from_secs(5),
      backoff_base: Duration::from_secs(2),
      backoff_max:  Duration::from_secs(300),
    }
  }
}

impl SyncConfig {
  /// Delay before retry `attempt` (1-based): `base * 2^(attempt - 1)`, capped
  /// at `backoff_max`.
  pub fn backoff(&self, attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(20);
    self.backoff_base.saturating_mul(1 << exp).min(self.backoff_max)
  }
}

// ─── Reports ──────────────────────────────────────────────────────────────────

/// Record counts per entity kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KindCounts {
  pub pins:        usize,
  pub territories: usize,
  pub follow_ups:  usize,
  pub customers:   usize,
}

impl KindCounts {
  pub fn total(&self) -> usize {
    self.pins + self.territories + self.follow_ups + self.customers
  }

  pub fn get(&self, kind: EntityKind) -> usize {
    match kind {
      EntityKind::Pins => self.pins,
      EntityKind::Territories => self.territories,
      EntityKind::FollowUps => self.follow_ups,
      EntityKind::Customers => self.customers,
    }
  }

  fn add(&mut self, kind: EntityKind, n: usize) {
    match kind {
      EntityKind::Pins => self.pins += n,
      EntityKind::Territories => self.territories += n,
      EntityKind::FollowUps => self.follow_ups += n,
      EntityKind::Customers => self.customers += n,
    }
  }
}

/// A record the backend did not accept during a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncFailure {
  pub entity:    EntityKind,
  /// Local key: the record id, or the pin id for customers.
  pub key:       String,
  pub message:   String,
  /// Whether a later pass could succeed without the record changing.
  pub transient: bool,
}

impl SyncFailure {
  fn new(entity: EntityKind, key: impl Into<String>, err: &RemoteStoreError) -> Self {
    Self {
      entity,
      key: key.into(),
      message: err.to_string(),
      transient: err.is_transient(),
    }
  }
}

/// Outcome of one [`SyncCoordinator::sync_offline_data`] pass.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
  pub started_at:          DateTime<Utc>,
  pub finished_at:         DateTime<Utc>,
  /// Dirty records found when the pass began.
  pub pending:             KindCounts,
  /// Records the backend accepted.
  pub pushed:              KindCounts,
  /// Pushed records that were edited locally mid-pass and so stay dirty.
  pub superseded:          usize,
  pub deleted_territories: usize,
  pub failures:            Vec<SyncFailure>,
}

impl SyncReport {
  fn new(started_at: DateTime<Utc>, pending: KindCounts) -> Self {
    Self {
      started_at,
      finished_at: started_at,
      pending,
      pushed: KindCounts::default(),
      superseded: 0,
      deleted_territories: 0,
      failures: Vec::new(),
    }
  }

  pub fn is_clean(&self) -> bool { self.failures.is_empty() }

  /// At least one failure might clear up on its own.
  pub fn should_retry(&self) -> bool { self.failures.iter().any(|f| f.transient) }
}

/// Progress notifications for UI collaborators.
#[derive(Debug, Clone)]
pub enum SyncEvent {
  /// Sent before any remote write, with the number of dirty records per kind.
  Started { counts: KindCounts },
  Finished(SyncReport),
}

struct Outcome {
  kind:     EntityKind,
  acked:    Vec<(String, i64)>,
  failures: Vec<SyncFailure>,
}

// ─── Coordinator ──────────────────────────────────────────────────────────────

pub struct SyncCoordinator<L, R> {
  local:  Arc<L>,
  remote: Arc<R>,
  config: SyncConfig,
  gate:   Mutex<()>,
  events: broadcast::Sender<SyncEvent>,
}

impl<L, R> SyncCoordinator<L, R>
where
  L: LocalStore,
  R: RemoteStore,
{
  pub fn new(local: Arc<L>, remote: Arc<R>, config: SyncConfig) -> Self {
    let (events, _) = broadcast::channel(16);
    Self { local, remote, config, gate: Mutex::new(()), events }
  }

  pub fn local(&self) -> &Arc<L> { &self.local }

  pub fn remote(&self) -> &Arc<R> { &self.remote }

  pub fn config(&self) -> &SyncConfig { &self.config }

  pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> { self.events.subscribe() }

  /// `true` while a pass holds the gate.
  pub fn is_syncing(&self) -> bool { self.gate.try_lock().is_err() }

  /// Push every dirty record and clear the flags the backend confirmed.
  ///
  /// Remote failures are collected into the report rather than returned;
  /// only a failing local cache aborts the pass.
  pub async fn sync_offline_data(&self) -> Result<SyncReport> {
    let _pass = self.gate.lock().await;
    let started_at = Utc::now();

    let pins = self.dirty::<Pin>().await?;
    let territories = self.dirty::<Territory>().await?;
    let follow_ups = self.dirty::<FollowUp>().await?;
    let customers = self.dirty::<Customer>().await?;
    let deletes: Vec<String> = self
      .local
      .get_setting(PENDING_TERRITORY_DELETES)
      .await
      .map_err(SyncError::local)?
      .unwrap_or_default();

    let counts = KindCounts {
      pins:        pins.len(),
      territories: territories.len(),
      follow_ups:  follow_ups.len(),
      customers:   customers.len(),
    };
    let mut report = SyncReport::new(started_at, counts);
    if counts.total() == 0 && deletes.is_empty() {
      debug!("nothing to sync");
      report.finished_at = Utc::now();
      return Ok(report);
    }

    info!(
      pins = counts.pins,
      territories = counts.territories,
      follow_ups = counts.follow_ups,
      customers = counts.customers,
      deletes = deletes.len(),
      "sync pass starting"
    );
    let _ = self.events.send(SyncEvent::Started { counts });

    let remote = &*self.remote;
    let pin_outcome = self.push("upsert_pin", pins, |pin| remote.upsert_pin(pin)).await;

    let pushed_pins: HashSet<&str> =
      pin_outcome.acked.iter().map(|(key, _)| key.as_str()).collect();
    self.backfill_pins(&follow_ups, &pushed_pins).await;

    let (territory_outcome, follow_up_outcome, customer_outcome) = futures::join!(
      self.push("upsert_territory", territories, |t| remote.upsert_territory(t)),
      self.push("upsert_follow_up", follow_ups, |f| remote.upsert_follow_up(f)),
      self.push("upsert_customer_by_pin_id", customers, |c| {
        remote.upsert_customer_by_pin_id(c)
      }),
    );

    for outcome in [pin_outcome, territory_outcome, follow_up_outcome, customer_outcome] {
      self.settle(outcome, &mut report).await?;
    }
    self.replay_territory_deletes(deletes, &mut report).await?;

    report.finished_at = Utc::now();
    info!(
      pushed = report.pushed.total(),
      failed = report.failures.len(),
      superseded = report.superseded,
      deleted_territories = report.deleted_territories,
      "sync pass finished"
    );
    let _ = self.events.send(SyncEvent::Finished(report.clone()));
    Ok(report)
  }

  /// Drive the Offline/Online state machine from a connectivity signal.
  ///
  /// Every transition to online starts a pass. A pass that leaves transient
  /// failures behind is retried with exponential backoff until it comes back
  /// clean or the signal drops to offline. Returns once the sender is gone.
  pub async fn run(&self, mut online: watch::Receiver<bool>) {
    let mut attempt: u32 = 0;
    loop {
      if !*online.borrow_and_update() {
        attempt = 0;
        debug!("offline; waiting for connectivity");
        if online.changed().await.is_err() {
          return;
        }
        continue;
      }

      let retry = match self.sync_offline_data().await {
        Ok(report) => report.should_retry(),
        Err(err) => {
          warn!(error = %err, "sync pass aborted");
          true
        }
      };

      if retry {
        attempt = attempt.saturating_add(1);
        let delay = self.config.backoff(attempt);
        info!(attempt, delay_ms = delay.as_millis() as u64, "sync incomplete; backing off");
        tokio::select! {
          _ = tokio::time::sleep(delay) => {}
          changed = online.changed() => {
            if changed.is_err() {
              return;
            }
          }
        }
      } else {
        attempt = 0;
        if online.changed().await.is_err() {
          return;
        }
      }
    }
  }

  // ── Internals ───────────────────────────────────────────────────────────

  async fn dirty<E: Entity>(&self) -> Result<Vec<LocalRecord<E>>> {
    self.local.get_dirty::<E>().await.map_err(SyncError::local)
  }

  async fn bounded<T>(
    &self,
    op: &'static str,
    kind: EntityKind,
    call: impl Future<Output = RemoteResult<T>>,
  ) -> RemoteResult<T> {
    match tokio::time::timeout(self.config.call_timeout, call).await {
      Ok(result) => result,
      Err(_) => Err(RemoteStoreError::new(op, kind, RemoteFailure::Timeout)),
    }
  }

  async fn push<E, F, Fut>(
    &self,
    op: &'static str,
    records: Vec<LocalRecord<E>>,
    upsert: F,
  ) -> Outcome
  where
    E: Entity,
    F: Fn(E) -> Fut,
    Fut: Future<Output = RemoteResult<E>>,
  {
    let calls = records.into_iter().map(|record| {
      let key = record.value.key().to_owned();
      let revision = record.revision;
      let call = self.bounded(op, E::KIND, upsert(record.value));
      async move { (key, revision, call.await) }
    });

    let mut outcome = Outcome { kind: E::KIND, acked: Vec::new(), failures: Vec::new() };
    for (key, revision, result) in join_all(calls).await {
      match result {
        Ok(_) => outcome.acked.push((key, revision)),
        Err(err) => {
          warn!(entity = %E::KIND, key = %key, error = %err, "push failed; record stays dirty");
          outcome.failures.push(SyncFailure::new(E::KIND, key, &err));
        }
      }
    }
    outcome
  }

  /// Follow-ups may point at pins the backend has never seen. Push the cached
  /// copy of any such pin before the follow-ups go out.
  async fn backfill_pins(&self, follow_ups: &[LocalRecord<FollowUp>], pushed: &HashSet<&str>) {
    let mut seen = HashSet::new();
    for record in follow_ups {
      let pin_id = record.value.pin_id.as_str();
      if pushed.contains(pin_id) || !seen.insert(pin_id) {
        continue;
      }

      match self.bounded("get_pin", EntityKind::Pins, self.remote.get_pin(pin_id)).await {
        Ok(Some(_)) => {}
        Ok(None) => match self.local.get::<Pin>(pin_id).await {
          Ok(Some(cached)) => {
            let upsert = self.remote.upsert_pin(cached.value);
            match self.bounded("upsert_pin", EntityKind::Pins, upsert).await {
              Ok(_) => info!(pin_id, "backfilled pin for follow-up"),
              Err(err) => warn!(pin_id, error = %err, "could not backfill pin"),
            }
          }
          Ok(None) => debug!(pin_id, "follow-up references a pin unknown locally"),
          Err(err) => warn!(pin_id, error = %err, "reading cached pin failed"),
        },
        Err(err) => warn!(pin_id, error = %err, "could not check remote pin"),
      }
    }
  }

  async fn settle(&self, outcome: Outcome, report: &mut SyncReport) -> Result<()> {
    let cleared = if outcome.acked.is_empty() {
      0
    } else {
      self
        .local
        .mark_synced(outcome.kind, &outcome.acked)
        .await
        .map_err(SyncError::local)?
    };
    report.pushed.add(outcome.kind, outcome.acked.len());
    report.superseded += outcome.acked.len().saturating_sub(cleared);
    report.failures.extend(outcome.failures);
    Ok(())
  }

  async fn replay_territory_deletes(
    &self,
    ids: Vec<String>,
    report: &mut SyncReport,
  ) -> Result<()> {
    if ids.is_empty() {
      return Ok(());
    }

    let mut done = HashSet::new();
    for id in ids {
      let delete = self.remote.delete_territory(&id);
      match self.bounded("delete_territory", EntityKind::Territories, delete).await {
        Ok(()) => {}
        Err(err) if err.is_not_found() => debug!(id = %id, "territory already gone remotely"),
        Err(err) => {
          warn!(id = %id, error = %err, "territory delete failed; keeping it queued");
          report.failures.push(SyncFailure::new(EntityKind::Territories, id, &err));
          continue;
        }
      }
      report.deleted_territories += 1;
      done.insert(id);
    }

    // Re-read so deletes queued while this pass ran are kept.
    let queued: Vec<String> = self
      .local
      .get_setting(PENDING_TERRITORY_DELETES)
      .await
      .map_err(SyncError::local)?
      .unwrap_or_default();
    let remaining: Vec<String> = queued.into_iter().filter(|id| !done.contains(id)).collect();
    let saved = if remaining.is_empty() {
      self.local.delete_setting(PENDING_TERRITORY_DELETES).await
    } else {
      self.local.save_setting(PENDING_TERRITORY_DELETES, &remaining).await
    };
    saved.map_err(SyncError::local)
  }
}
