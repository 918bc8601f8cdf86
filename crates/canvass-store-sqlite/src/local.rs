//! [`SqliteLocalStore`]: the on-device offline cache.

use std::{path::Path, sync::Arc};

use canvass_core::{
  model::EntityKind,
  store::{Entity, LocalRecord, LocalStore},
};
use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use serde::{Serialize, de::DeserializeOwned};
use strum::IntoEnumIterator as _;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::{
  Result,
  encode::{RawLocal, encode_dt, now},
  schema::LOCAL_SCHEMA,
};

/// An offline cache backed by a single SQLite file.
///
/// The containers are created lazily by whichever call touches the store
/// first. Cloning is cheap; clones share the connection and the init state.
#[derive(Clone)]
pub struct SqliteLocalStore {
  conn:  tokio_rusqlite::Connection,
  ready: Arc<OnceCell<()>>,
}

impl SqliteLocalStore {
  /// Open (or create) a cache at `path`. No schema work happens until the
  /// first operation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Ok(Self { conn, ready: Arc::new(OnceCell::new()) })
  }

  /// Open an in-memory cache, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Ok(Self { conn, ready: Arc::new(OnceCell::new()) })
  }

  async fn ensure_init(&self) -> Result<()> {
    self
      .ready
      .get_or_try_init(|| async {
        self
          .conn
          .call(|conn| {
            conn.execute_batch(LOCAL_SCHEMA)?;
            Ok(())
          })
          .await?;
        debug!("offline cache initialised");
        Ok::<_, crate::StorageError>(())
      })
      .await?;
    Ok(())
  }

  async fn select<E: Entity>(&self, dirty_only: bool) -> Result<Vec<LocalRecord<E>>> {
    self.ensure_init().await?;
    let table = E::KIND.table();
    let sql = if dirty_only {
      format!(
        "SELECT body, offline, revision FROM {table} WHERE offline = 1 ORDER BY stored_at"
      )
    } else {
      format!("SELECT body, offline, revision FROM {table} ORDER BY stored_at")
    };

    let raws: Vec<RawLocal> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], RawLocal::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawLocal::into_record).collect()
  }
}

// ─── LocalStore impl ─────────────────────────────────────────────────────────

impl LocalStore for SqliteLocalStore {
  type Error = crate::StorageError;

  async fn init(&self) -> Result<()> { self.ensure_init().await }

  async fn put<'a, E: Entity>(&'a self, entity: &'a E, offline: bool) -> Result<i64> {
    self.ensure_init().await?;
    let table     = E::KIND.table();
    let key       = entity.key().to_owned();
    let body      = serde_json::to_string(entity)?;
    let stored_at = encode_dt(now());

    let sql = format!(
      "INSERT INTO {table} (key, body, offline, revision, stored_at)
       VALUES (?1, ?2, ?3, 1, ?4)
       ON CONFLICT(key) DO UPDATE SET
         body      = excluded.body,
         offline   = excluded.offline,
         revision  = {table}.revision + 1,
         stored_at = excluded.stored_at
       RETURNING revision"
    );

    let log_key = key.clone();
    let revision = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          &sql,
          rusqlite::params![key, body, offline, stored_at],
          |row| row.get::<_, i64>(0),
        )?)
      })
      .await?;

    debug!(kind = %E::KIND, key = %log_key, offline, revision, "cached record");
    Ok(revision)
  }

  async fn get<'a, E: Entity>(&'a self, key: &'a str) -> Result<Option<LocalRecord<E>>> {
    self.ensure_init().await?;
    let sql = format!(
      "SELECT body, offline, revision FROM {} WHERE key = ?1",
      E::KIND.table()
    );
    let key = key.to_owned();

    let raw: Option<RawLocal> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![key], RawLocal::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawLocal::into_record).transpose()
  }

  async fn get_all<E: Entity>(&self) -> Result<Vec<LocalRecord<E>>> {
    self.select(false).await
  }

  async fn get_dirty<E: Entity>(&self) -> Result<Vec<LocalRecord<E>>> {
    self.select(true).await
  }

  async fn put_if_clean<'a, E: Entity>(&'a self, entity: &'a E) -> Result<bool> {
    self.ensure_init().await?;
    let table     = E::KIND.table();
    let key       = entity.key().to_owned();
    let body      = serde_json::to_string(entity)?;
    let stored_at = encode_dt(now());

    // The conflict branch only fires for clean rows, so a dirty row and its
    // revision are left exactly as they were.
    let sql = format!(
      "INSERT INTO {table} (key, body, offline, revision, stored_at)
       VALUES (?1, ?2, 0, 1, ?3)
       ON CONFLICT(key) DO UPDATE SET
         body      = excluded.body,
         revision  = {table}.revision + 1,
         stored_at = excluded.stored_at
       WHERE {table}.offline = 0"
    );

    let log_key = key.clone();
    let written = self
      .conn
      .call(move |conn| Ok(conn.execute(&sql, rusqlite::params![key, body, stored_at])?))
      .await?;

    if written == 0 {
      debug!(kind = %E::KIND, key = %log_key, "kept dirty record");
    }
    Ok(written > 0)
  }

  async fn prune_clean<'a>(
    &'a self,
    kind: EntityKind,
    keep: &'a [String],
    stored_before: DateTime<Utc>,
  ) -> Result<usize> {
    self.ensure_init().await?;
    let sql = format!(
      "DELETE FROM {} WHERE offline = 0 AND stored_at < ?2
         AND key NOT IN (SELECT value FROM json_each(?1))",
      kind.table()
    );
    let keep   = serde_json::to_string(keep)?;
    let cutoff = encode_dt(stored_before);

    let removed = self
      .conn
      .call(move |conn| Ok(conn.execute(&sql, rusqlite::params![keep, cutoff])?))
      .await?;

    debug!(%kind, removed, "pruned records missing remotely");
    Ok(removed)
  }

  async fn delete<'a, E: Entity>(&'a self, key: &'a str) -> Result<bool> {
    self.ensure_init().await?;
    let sql = format!("DELETE FROM {} WHERE key = ?1", E::KIND.table());
    let key = key.to_owned();

    let removed = self
      .conn
      .call(move |conn| Ok(conn.execute(&sql, rusqlite::params![key])?))
      .await?;
    Ok(removed > 0)
  }

  async fn clear_dirty_flag<'a>(&'a self, kind: EntityKind, keys: &'a [String]) -> Result<()> {
    self.ensure_init().await?;
    let sql  = format!("UPDATE {} SET offline = 0 WHERE key = ?1", kind.table());
    let keys = keys.to_vec();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(&sql)?;
          for key in &keys {
            stmt.execute(rusqlite::params![key])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn mark_synced<'a>(
    &'a self,
    kind: EntityKind,
    synced: &'a [(String, i64)],
  ) -> Result<usize> {
    self.ensure_init().await?;
    let sql = format!(
      "UPDATE {} SET offline = 0 WHERE key = ?1 AND revision = ?2 AND offline = 1",
      kind.table()
    );
    let synced = synced.to_vec();

    let cleared = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut cleared = 0;
        {
          let mut stmt = tx.prepare(&sql)?;
          for (key, revision) in &synced {
            cleared += stmt.execute(rusqlite::params![key, revision])?;
          }
        }
        tx.commit()?;
        Ok(cleared)
      })
      .await?;

    debug!(%kind, cleared, "cleared dirty flags");
    Ok(cleared)
  }

  async fn clear_all(&self) -> Result<()> {
    self.ensure_init().await?;
    self
      .conn
      .call(|conn| {
        let tx = conn.transaction()?;
        for kind in EntityKind::iter() {
          tx.execute(&format!("DELETE FROM {}", kind.table()), [])?;
        }
        tx.execute("DELETE FROM settings", [])?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    debug!("offline cache cleared");
    Ok(())
  }

  async fn get_setting<'a, T: DeserializeOwned + Send + 'static>(
    &'a self,
    key: &'a str,
  ) -> Result<Option<T>> {
    self.ensure_init().await?;
    let key = key.to_owned();

    let value: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT value FROM settings WHERE key = ?1",
              rusqlite::params![key],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    Ok(value.map(|v| serde_json::from_str(&v)).transpose()?)
  }

  async fn save_setting<'a, T: Serialize + Sync>(
    &'a self,
    key: &'a str,
    value: &'a T,
  ) -> Result<()> {
    self.ensure_init().await?;
    let key   = key.to_owned();
    let value = serde_json::to_string(value)?;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO settings (key, value) VALUES (?1, ?2)
           ON CONFLICT(key) DO UPDATE SET value = excluded.value",
          rusqlite::params![key, value],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn delete_setting<'a>(&'a self, key: &'a str) -> Result<()> {
    self.ensure_init().await?;
    let key = key.to_owned();

    self
      .conn
      .call(move |conn| {
        conn.execute("DELETE FROM settings WHERE key = ?1", rusqlite::params![key])?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
