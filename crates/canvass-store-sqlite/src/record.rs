//! [`SqliteRecordStore`]: the SQLite implementation of [`RemoteStore`].

use std::path::Path;

use canvass_core::{
  RemoteStoreError,
  model::{
    Customer, CustomerPatch, EntityKind, FollowUp, FollowUpPatch, NewCustomer,
    NewFollowUp, NewPin, NewTerritory, Pin, PinPatch, Territory, TerritoryPatch,
  },
  store::{RemoteResult, RemoteStore},
};
use rusqlite::{OptionalExtension as _, params_from_iter, types::Value};
use tracing::{debug, warn};

use crate::{
  Result, StorageError,
  encode::{RawCustomer, RawFollowUp, RawPin, RawRow, RawTerritory, now, stored},
  schema::RECORD_SCHEMA,
};

fn other(err: StorageError) -> tokio_rusqlite::Error {
  tokio_rusqlite::Error::Other(Box::new(err))
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// The canvass system of record, backed by a single SQLite file.
///
/// Cloning shares the underlying connection.
#[derive(Clone)]
pub struct SqliteRecordStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteRecordStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(RECORD_SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Generic row access ────────────────────────────────────────────────────

  async fn select<R: RawRow>(&self, filter: &str, params: Vec<Value>) -> Result<Vec<R::Entity>> {
    let sql = R::select_sql(filter);

    let raws: Vec<R> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params_from_iter(params), R::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(R::into_entity).collect()
  }

  async fn select_one<R: RawRow>(&self, column: &str, value: &str) -> Result<Option<R::Entity>> {
    let mut rows = self
      .select::<R>(&format!("WHERE {column} = ?1"), vec![value.to_owned().into()])
      .await?;
    Ok(rows.pop())
  }

  async fn insert<R: RawRow>(&self, entity: &R::Entity) -> Result<()> {
    let sql    = R::insert_sql();
    let params = R::from_entity(entity)?.into_params();

    self
      .conn
      .call(move |conn| {
        conn.execute(&sql, params_from_iter(params))?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Write `entity` keyed by `id`, keeping the stored `created_at` when the
  /// row already exists, and return the row as persisted.
  async fn upsert<R: RawRow>(&self, entity: &R::Entity) -> Result<R::Entity> {
    let sql    = R::upsert_sql("id", &[]);
    let raw    = R::from_entity(entity)?;
    let params = raw.into_params();
    let select = R::select_sql("WHERE id = ?1");

    let raw: R = self
      .conn
      .call(move |conn| {
        let id = params[0].clone();
        let tx = conn.transaction()?;
        tx.execute(&sql, params_from_iter(params))?;
        let row = tx.query_row(&select, rusqlite::params![id], R::from_row)?;
        tx.commit()?;
        Ok(row)
      })
      .await?;

    raw.into_entity()
  }

  /// Load, patch and rewrite a row in one transaction. `None` when `id` does
  /// not exist.
  async fn update<R, F>(&self, id: &str, patch: F) -> Result<Option<R::Entity>>
  where
    R: RawRow,
    F: FnOnce(&mut R::Entity) + Send + 'static,
  {
    let select = R::select_sql("WHERE id = ?1");
    let write  = R::upsert_sql("id", &[]);
    let id     = id.to_owned();

    let updated = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let Some(raw) = tx.query_row(&select, rusqlite::params![id], R::from_row).optional()? else {
          return Ok(None);
        };
        let mut entity = raw.into_entity().map_err(other)?;
        patch(&mut entity);
        let params = R::from_entity(&entity).map_err(other)?.into_params();
        tx.execute(&write, params_from_iter(params))?;
        tx.commit()?;
        Ok(Some(entity))
      })
      .await?;

    Ok(updated)
  }

  /// Delete rows matching `column = value`. Returns the number removed.
  async fn delete_where<R: RawRow>(&self, column: &str, value: &str) -> Result<usize> {
    let sql   = format!("DELETE FROM {} WHERE {column} = ?1", R::TABLE);
    let value = value.to_owned();

    let removed = self
      .conn
      .call(move |conn| Ok(conn.execute(&sql, rusqlite::params![value])?))
      .await?;
    Ok(removed)
  }

  async fn write_customer_by_pin(&self, customer: Customer) -> Result<(Customer, bool)> {
    let placeholder = RawPin::from_entity(&Pin::placeholder(
      customer.pin_id.clone(),
      customer.address.clone(),
      customer.updated_at,
    ))?
    .into_params();
    let pin_id      = customer.pin_id.clone();
    let params      = RawCustomer::from_entity(&customer)?.into_params();
    let upsert      = RawCustomer::upsert_sql("pin_id", &["id"]);
    let insert_pin  = RawPin::insert_sql();
    let select      = RawCustomer::select_sql("WHERE pin_id = ?1");

    let (raw, created_pin): (RawCustomer, bool) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let pin_exists = tx
          .query_row(
            "SELECT 1 FROM pins WHERE id = ?1",
            rusqlite::params![pin_id],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if !pin_exists {
          tx.execute(&insert_pin, params_from_iter(placeholder))?;
        }
        tx.execute(&upsert, params_from_iter(params))?;
        let row = tx.query_row(&select, rusqlite::params![pin_id], RawCustomer::from_row)?;
        tx.commit()?;
        Ok((row, !pin_exists))
      })
      .await?;

    Ok((raw.into_entity()?, created_pin))
  }
}

fn found<T>(
  value: Option<T>,
  op: &'static str,
  entity: EntityKind,
  id: &str,
) -> RemoteResult<T> {
  value.ok_or_else(|| RemoteStoreError::not_found(op, entity, id))
}

fn removed(
  count: usize,
  op: &'static str,
  entity: EntityKind,
  id: &str,
) -> RemoteResult<()> {
  if count == 0 {
    Err(RemoteStoreError::not_found(op, entity, id))
  } else {
    Ok(())
  }
}

// ─── RemoteStore impl ────────────────────────────────────────────────────────

impl RemoteStore for SqliteRecordStore {
  // ── Pins ──────────────────────────────────────────────────────────────────

  async fn create_pin(&self, input: NewPin) -> RemoteResult<Pin> {
    let pin = input.into_pin(now());
    self
      .insert::<RawPin>(&pin)
      .await
      .map_err(|e| e.into_remote("create", EntityKind::Pins))?;
    debug!(id = %pin.id, "created pin");
    Ok(pin)
  }

  async fn list_pins(&self) -> RemoteResult<Vec<Pin>> {
    self
      .select::<RawPin>("", vec![])
      .await
      .map_err(|e| e.into_remote("list", EntityKind::Pins))
  }

  async fn get_pin<'a>(&'a self, id: &'a str) -> RemoteResult<Option<Pin>> {
    self
      .select_one::<RawPin>("id", id)
      .await
      .map_err(|e| e.into_remote("get", EntityKind::Pins))
  }

  async fn update_pin<'a>(&'a self, id: &'a str, patch: PinPatch) -> RemoteResult<Pin> {
    let at = now();
    let pin = self
      .update::<RawPin, _>(id, move |pin| patch.apply(pin, at))
      .await
      .map_err(|e| e.into_remote("update", EntityKind::Pins))?;
    found(pin, "update", EntityKind::Pins, id)
  }

  async fn delete_pin<'a>(&'a self, id: &'a str) -> RemoteResult<()> {
    let count = self
      .delete_where::<RawPin>("id", id)
      .await
      .map_err(|e| e.into_remote("delete", EntityKind::Pins))?;
    removed(count, "delete", EntityKind::Pins, id)
  }

  async fn upsert_pin(&self, mut pin: Pin) -> RemoteResult<Pin> {
    pin.created_at = stored(pin.created_at);
    pin.updated_at = now();
    self
      .upsert::<RawPin>(&pin)
      .await
      .map_err(|e| e.into_remote("upsert", EntityKind::Pins))
  }

  // ── Territories ───────────────────────────────────────────────────────────

  async fn create_territory(&self, input: NewTerritory) -> RemoteResult<Territory> {
    let territory = input.into_territory(now());
    self
      .insert::<RawTerritory>(&territory)
      .await
      .map_err(|e| e.into_remote("create", EntityKind::Territories))?;
    debug!(id = %territory.id, "created territory");
    Ok(territory)
  }

  async fn list_territories(&self) -> RemoteResult<Vec<Territory>> {
    self
      .select::<RawTerritory>("", vec![])
      .await
      .map_err(|e| e.into_remote("list", EntityKind::Territories))
  }

  async fn get_territory<'a>(&'a self, id: &'a str) -> RemoteResult<Option<Territory>> {
    self
      .select_one::<RawTerritory>("id", id)
      .await
      .map_err(|e| e.into_remote("get", EntityKind::Territories))
  }

  async fn update_territory<'a>(
    &'a self,
    id: &'a str,
    patch: TerritoryPatch,
  ) -> RemoteResult<Territory> {
    let at = now();
    let territory = self
      .update::<RawTerritory, _>(id, move |t| patch.apply(t, at))
      .await
      .map_err(|e| e.into_remote("update", EntityKind::Territories))?;
    found(territory, "update", EntityKind::Territories, id)
  }

  async fn delete_territory<'a>(&'a self, id: &'a str) -> RemoteResult<()> {
    let count = self
      .delete_where::<RawTerritory>("id", id)
      .await
      .map_err(|e| e.into_remote("delete", EntityKind::Territories))?;
    removed(count, "delete", EntityKind::Territories, id)
  }

  async fn upsert_territory(&self, mut territory: Territory) -> RemoteResult<Territory> {
    territory.created_at = stored(territory.created_at);
    territory.updated_at = now();
    self
      .upsert::<RawTerritory>(&territory)
      .await
      .map_err(|e| e.into_remote("upsert", EntityKind::Territories))
  }

  // ── Follow-ups ────────────────────────────────────────────────────────────

  async fn create_follow_up(&self, input: NewFollowUp) -> RemoteResult<FollowUp> {
    let follow_up = input.into_follow_up(now());
    self
      .insert::<RawFollowUp>(&follow_up)
      .await
      .map_err(|e| e.into_remote("create", EntityKind::FollowUps))?;
    debug!(id = %follow_up.id, pin_id = %follow_up.pin_id, "created follow-up");
    Ok(follow_up)
  }

  async fn list_follow_ups(&self) -> RemoteResult<Vec<FollowUp>> {
    self
      .select::<RawFollowUp>("", vec![])
      .await
      .map_err(|e| e.into_remote("list", EntityKind::FollowUps))
  }

  async fn list_follow_ups_by_pin<'a>(&'a self, pin_id: &'a str) -> RemoteResult<Vec<FollowUp>> {
    self
      .select::<RawFollowUp>("WHERE pin_id = ?1", vec![pin_id.to_owned().into()])
      .await
      .map_err(|e| e.into_remote("list", EntityKind::FollowUps))
  }

  async fn list_follow_ups_between<'a>(
    &'a self,
    start: &'a str,
    end: &'a str,
  ) -> RemoteResult<Vec<FollowUp>> {
    self
      .select::<RawFollowUp>(
        "WHERE date BETWEEN ?1 AND ?2",
        vec![start.to_owned().into(), end.to_owned().into()],
      )
      .await
      .map_err(|e| e.into_remote("list", EntityKind::FollowUps))
  }

  async fn get_follow_up<'a>(&'a self, id: &'a str) -> RemoteResult<Option<FollowUp>> {
    self
      .select_one::<RawFollowUp>("id", id)
      .await
      .map_err(|e| e.into_remote("get", EntityKind::FollowUps))
  }

  async fn update_follow_up<'a>(
    &'a self,
    id: &'a str,
    patch: FollowUpPatch,
  ) -> RemoteResult<FollowUp> {
    let at = now();
    let follow_up = self
      .update::<RawFollowUp, _>(id, move |f| patch.apply(f, at))
      .await
      .map_err(|e| e.into_remote("update", EntityKind::FollowUps))?;
    found(follow_up, "update", EntityKind::FollowUps, id)
  }

  async fn delete_follow_up<'a>(&'a self, id: &'a str) -> RemoteResult<()> {
    let count = self
      .delete_where::<RawFollowUp>("id", id)
      .await
      .map_err(|e| e.into_remote("delete", EntityKind::FollowUps))?;
    removed(count, "delete", EntityKind::FollowUps, id)
  }

  async fn upsert_follow_up(&self, mut follow_up: FollowUp) -> RemoteResult<FollowUp> {
    follow_up.created_at = stored(follow_up.created_at);
    follow_up.updated_at = now();
    self
      .upsert::<RawFollowUp>(&follow_up)
      .await
      .map_err(|e| e.into_remote("upsert", EntityKind::FollowUps))
  }

  // ── Customers ─────────────────────────────────────────────────────────────

  async fn create_customer(&self, input: NewCustomer) -> RemoteResult<Customer> {
    let customer = input.into_customer(now());
    self
      .insert::<RawCustomer>(&customer)
      .await
      .map_err(|e| e.into_remote("create", EntityKind::Customers))?;
    debug!(id = %customer.id, pin_id = %customer.pin_id, "created customer");
    Ok(customer)
  }

  async fn list_customers(&self) -> RemoteResult<Vec<Customer>> {
    self
      .select::<RawCustomer>("", vec![])
      .await
      .map_err(|e| e.into_remote("list", EntityKind::Customers))
  }

  async fn get_customer<'a>(&'a self, id: &'a str) -> RemoteResult<Option<Customer>> {
    self
      .select_one::<RawCustomer>("id", id)
      .await
      .map_err(|e| e.into_remote("get", EntityKind::Customers))
  }

  async fn get_customer_by_pin_id<'a>(
    &'a self,
    pin_id: &'a str,
  ) -> RemoteResult<Option<Customer>> {
    self
      .select_one::<RawCustomer>("pin_id", pin_id)
      .await
      .map_err(|e| e.into_remote("get", EntityKind::Customers))
  }

  async fn update_customer<'a>(
    &'a self,
    id: &'a str,
    patch: CustomerPatch,
  ) -> RemoteResult<Customer> {
    let at = now();
    let customer = self
      .update::<RawCustomer, _>(id, move |c| patch.apply(c, at))
      .await
      .map_err(|e| e.into_remote("update", EntityKind::Customers))?;
    found(customer, "update", EntityKind::Customers, id)
  }

  async fn delete_customer<'a>(&'a self, id: &'a str) -> RemoteResult<()> {
    let count = self
      .delete_where::<RawCustomer>("id", id)
      .await
      .map_err(|e| e.into_remote("delete", EntityKind::Customers))?;
    removed(count, "delete", EntityKind::Customers, id)
  }

  async fn delete_customer_by_pin_id<'a>(&'a self, pin_id: &'a str) -> RemoteResult<()> {
    let count = self
      .delete_where::<RawCustomer>("pin_id", pin_id)
      .await
      .map_err(|e| e.into_remote("delete", EntityKind::Customers))?;
    removed(count, "delete", EntityKind::Customers, pin_id)
  }

  async fn upsert_customer(&self, mut customer: Customer) -> RemoteResult<Customer> {
    customer.created_at = stored(customer.created_at);
    customer.updated_at = now();
    self
      .upsert::<RawCustomer>(&customer)
      .await
      .map_err(|e| e.into_remote("upsert", EntityKind::Customers))
  }

  async fn upsert_customer_by_pin_id(&self, mut customer: Customer) -> RemoteResult<Customer> {
    customer.created_at = stored(customer.created_at);
    customer.updated_at = now();
    let (customer, created_pin) = self
      .write_customer_by_pin(customer)
      .await
      .map_err(|e| e.into_remote("upsert", EntityKind::Customers))?;
    if created_pin {
      warn!(pin_id = %customer.pin_id, "wrote placeholder pin for customer");
    }
    Ok(customer)
  }
}
