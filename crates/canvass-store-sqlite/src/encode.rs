//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with a fixed microsecond
//! fraction and a `Z` suffix, so lexical order is chronological order.
//! Structured fields (territory rings, socials) are stored as compact JSON.

use canvass_core::{
  model::{
    Coordinate, Customer, FollowUp, FollowUpStatus, Pin, PinStatus, Socials,
    Territory,
  },
  store::{Entity, LocalRecord},
};
use chrono::{DateTime, SecondsFormat, SubsecRound as _, Utc};
use rusqlite::types::Value;

use crate::{Result, StorageError};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| StorageError::DateParse(e.to_string()))
}

/// The current time at the precision the stores persist.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

/// Clamp an incoming timestamp to the persisted precision.
pub fn stored(dt: DateTime<Utc>) -> DateTime<Utc> { dt.trunc_subsecs(6) }

// ─── JSON columns ────────────────────────────────────────────────────────────

pub fn encode_coordinates(ring: &[Coordinate]) -> Result<String> {
  Ok(serde_json::to_string(ring)?)
}

pub fn decode_coordinates(s: &str) -> Result<Vec<Coordinate>> {
  Ok(serde_json::from_str(s)?)
}

pub fn encode_socials(socials: &Socials) -> Result<String> {
  Ok(serde_json::to_string(socials)?)
}

pub fn decode_socials(s: &str) -> Result<Socials> { Ok(serde_json::from_str(s)?) }

// ─── Local cache rows ────────────────────────────────────────────────────────

/// Raw columns of an offline-cache container row.
pub struct RawLocal {
  pub body:     String,
  pub offline:  bool,
  pub revision: i64,
}

impl RawLocal {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      body:     row.get(0)?,
      offline:  row.get(1)?,
      revision: row.get(2)?,
    })
  }

  pub fn into_record<E: Entity>(self) -> Result<LocalRecord<E>> {
    Ok(LocalRecord {
      value:    serde_json::from_str(&self.body)?,
      offline:  self.offline,
      revision: self.revision,
    })
  }
}

// ─── Record store rows ───────────────────────────────────────────────────────

/// A typed table row in the record store, read and written as raw column
/// values in [`RawRow::COLUMNS`] order. The first column is always `id`.
pub trait RawRow: Sized + Send + 'static {
  type Entity: Send + 'static;

  const TABLE: &'static str;
  const COLUMNS: &'static [&'static str];
  /// `ORDER BY` clause used for listings.
  const ORDER: &'static str;

  fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self>;
  fn from_entity(entity: &Self::Entity) -> Result<Self>;
  fn into_entity(self) -> Result<Self::Entity>;
  fn into_params(self) -> Vec<Value>;

  fn select_sql(filter: &str) -> String {
    format!(
      "SELECT {} FROM {} {filter} ORDER BY {}",
      Self::COLUMNS.join(", "),
      Self::TABLE,
      Self::ORDER
    )
  }

  fn insert_sql() -> String {
    let placeholders = (1..=Self::COLUMNS.len())
      .map(|i| format!("?{i}"))
      .collect::<Vec<_>>()
      .join(", ");
    format!(
      "INSERT INTO {} ({}) VALUES ({placeholders})",
      Self::TABLE,
      Self::COLUMNS.join(", ")
    )
  }

  /// Insert, or on a clash of the `conflict` column overwrite every column
  /// except `created_at`, the conflict column itself, and `keep`.
  fn upsert_sql(conflict: &str, keep: &[&str]) -> String {
    let assignments = Self::COLUMNS
      .iter()
      .filter(|c| **c != "created_at" && **c != conflict && !keep.contains(*c))
      .map(|c| format!("{c} = excluded.{c}"))
      .collect::<Vec<_>>()
      .join(", ");
    format!("{} ON CONFLICT({conflict}) DO UPDATE SET {assignments}", Self::insert_sql())
  }
}

/// Raw column values of a `pins` row.
pub struct RawPin {
  pub id:            String,
  pub lat:           f64,
  pub lng:           f64,
  pub address:       String,
  pub place_id:      Option<String>,
  pub property_name: Option<String>,
  pub status:        String,
  pub created_at:    String,
  pub updated_at:    String,
}

impl RawRow for RawPin {
  type Entity = Pin;

  const TABLE: &'static str = "pins";
  const COLUMNS: &'static [&'static str] = &[
    "id",
    "lat",
    "lng",
    "address",
    "place_id",
    "property_name",
    "status",
    "created_at",
    "updated_at",
  ];
  const ORDER: &'static str = "created_at DESC, rowid DESC";

  fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:            row.get(0)?,
      lat:           row.get(1)?,
      lng:           row.get(2)?,
      address:       row.get(3)?,
      place_id:      row.get(4)?,
      property_name: row.get(5)?,
      status:        row.get(6)?,
      created_at:    row.get(7)?,
      updated_at:    row.get(8)?,
    })
  }

  fn from_entity(pin: &Pin) -> Result<Self> {
    Ok(Self {
      id:            pin.id.clone(),
      lat:           pin.lat,
      lng:           pin.lng,
      address:       pin.address.clone(),
      place_id:      pin.place_id.clone(),
      property_name: pin.property_name.clone(),
      status:        pin.status.to_string(),
      created_at:    encode_dt(pin.created_at),
      updated_at:    encode_dt(pin.updated_at),
    })
  }

  fn into_entity(self) -> Result<Pin> {
    Ok(Pin {
      id:            self.id,
      lat:           self.lat,
      lng:           self.lng,
      address:       self.address,
      place_id:      self.place_id,
      property_name: self.property_name,
      status:        PinStatus::parse(&self.status)?,
      created_at:    decode_dt(&self.created_at)?,
      updated_at:    decode_dt(&self.updated_at)?,
    })
  }

  fn into_params(self) -> Vec<Value> {
    vec![
      self.id.into(),
      self.lat.into(),
      self.lng.into(),
      self.address.into(),
      self.place_id.into(),
      self.property_name.into(),
      self.status.into(),
      self.created_at.into(),
      self.updated_at.into(),
    ]
  }
}

/// Raw column values of a `territories` row.
pub struct RawTerritory {
  pub id:          String,
  pub name:        String,
  pub color:       String,
  pub coordinates: String,
  pub created_at:  String,
  pub updated_at:  String,
}

impl RawRow for RawTerritory {
  type Entity = Territory;

  const TABLE: &'static str = "territories";
  const COLUMNS: &'static [&'static str] =
    &["id", "name", "color", "coordinates", "created_at", "updated_at"];
  const ORDER: &'static str = "created_at DESC, rowid DESC";

  fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:          row.get(0)?,
      name:        row.get(1)?,
      color:       row.get(2)?,
      coordinates: row.get(3)?,
      created_at:  row.get(4)?,
      updated_at:  row.get(5)?,
    })
  }

  fn from_entity(territory: &Territory) -> Result<Self> {
    Ok(Self {
      id:          territory.id.clone(),
      name:        territory.name.clone(),
      color:       territory.color.clone(),
      coordinates: encode_coordinates(&territory.coordinates)?,
      created_at:  encode_dt(territory.created_at),
      updated_at:  encode_dt(territory.updated_at),
    })
  }

  fn into_entity(self) -> Result<Territory> {
    Ok(Territory {
      id:          self.id,
      name:        self.name,
      color:       self.color,
      coordinates: decode_coordinates(&self.coordinates)?,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }

  fn into_params(self) -> Vec<Value> {
    vec![
      self.id.into(),
      self.name.into(),
      self.color.into(),
      self.coordinates.into(),
      self.created_at.into(),
      self.updated_at.into(),
    ]
  }
}

/// Raw column values of a `follow_ups` row.
pub struct RawFollowUp {
  pub id:            String,
  pub pin_id:        String,
  pub address:       String,
  pub property_name: Option<String>,
  pub date:          String,
  pub time:          String,
  pub notes:         Option<String>,
  pub status:        String,
  pub created_at:    String,
  pub updated_at:    String,
}

impl RawRow for RawFollowUp {
  type Entity = FollowUp;

  const TABLE: &'static str = "follow_ups";
  const COLUMNS: &'static [&'static str] = &[
    "id",
    "pin_id",
    "address",
    "property_name",
    "date",
    "time",
    "notes",
    "status",
    "created_at",
    "updated_at",
  ];
  const ORDER: &'static str = "date ASC, time ASC, created_at ASC";

  fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:            row.get(0)?,
      pin_id:        row.get(1)?,
      address:       row.get(2)?,
      property_name: row.get(3)?,
      date:          row.get(4)?,
      time:          row.get(5)?,
      notes:         row.get(6)?,
      status:        row.get(7)?,
      created_at:    row.get(8)?,
      updated_at:    row.get(9)?,
    })
  }

  fn from_entity(follow_up: &FollowUp) -> Result<Self> {
    Ok(Self {
      id:            follow_up.id.clone(),
      pin_id:        follow_up.pin_id.clone(),
      address:       follow_up.address.clone(),
      property_name: follow_up.property_name.clone(),
      date:          follow_up.date.clone(),
      time:          follow_up.time.clone(),
      notes:         follow_up.notes.clone(),
      status:        follow_up.status.to_string(),
      created_at:    encode_dt(follow_up.created_at),
      updated_at:    encode_dt(follow_up.updated_at),
    })
  }

  fn into_entity(self) -> Result<FollowUp> {
    Ok(FollowUp {
      id:            self.id,
      pin_id:        self.pin_id,
      address:       self.address,
      property_name: self.property_name,
      date:          self.date,
      time:          self.time,
      notes:         self.notes,
      status:        FollowUpStatus::parse(&self.status)?,
      created_at:    decode_dt(&self.created_at)?,
      updated_at:    decode_dt(&self.updated_at)?,
    })
  }

  fn into_params(self) -> Vec<Value> {
    vec![
      self.id.into(),
      self.pin_id.into(),
      self.address.into(),
      self.property_name.into(),
      self.date.into(),
      self.time.into(),
      self.notes.into(),
      self.status.into(),
      self.created_at.into(),
      self.updated_at.into(),
    ]
  }
}

/// Raw column values of a `customers` row.
pub struct RawCustomer {
  pub id:          String,
  pub pin_id:      String,
  pub first_name:  String,
  pub phone:       Option<String>,
  pub email:       Option<String>,
  pub owns_crypto: bool,
  pub socials:     String,
  pub notes:       Option<String>,
  pub address:     String,
  pub created_at:  String,
  pub updated_at:  String,
}

impl RawRow for RawCustomer {
  type Entity = Customer;

  const TABLE: &'static str = "customers";
  const COLUMNS: &'static [&'static str] = &[
    "id",
    "pin_id",
    "first_name",
    "phone",
    "email",
    "owns_crypto",
    "socials",
    "notes",
    "address",
    "created_at",
    "updated_at",
  ];
  const ORDER: &'static str = "created_at DESC, rowid DESC";

  fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:          row.get(0)?,
      pin_id:      row.get(1)?,
      first_name:  row.get(2)?,
      phone:       row.get(3)?,
      email:       row.get(4)?,
      owns_crypto: row.get(5)?,
      socials:     row.get(6)?,
      notes:       row.get(7)?,
      address:     row.get(8)?,
      created_at:  row.get(9)?,
      updated_at:  row.get(10)?,
    })
  }

  fn from_entity(customer: &Customer) -> Result<Self> {
    Ok(Self {
      id:          customer.id.clone(),
      pin_id:      customer.pin_id.clone(),
      first_name:  customer.first_name.clone(),
      phone:       customer.phone.clone(),
      email:       customer.email.clone(),
      owns_crypto: customer.owns_crypto,
      socials:     encode_socials(&customer.socials)?,
      notes:       customer.notes.clone(),
      address:     customer.address.clone(),
      created_at:  encode_dt(customer.created_at),
      updated_at:  encode_dt(customer.updated_at),
    })
  }

  fn into_entity(self) -> Result<Customer> {
    Ok(Customer {
      id:          self.id,
      pin_id:      self.pin_id,
      first_name:  self.first_name,
      phone:       self.phone,
      email:       self.email,
      owns_crypto: self.owns_crypto,
      socials:     decode_socials(&self.socials)?,
      notes:       self.notes,
      address:     self.address,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }

  fn into_params(self) -> Vec<Value> {
    vec![
      self.id.into(),
      self.pin_id.into(),
      self.first_name.into(),
      self.phone.into(),
      self.email.into(),
      self.owns_crypto.into(),
      self.socials.into(),
      self.notes.into(),
      self.address.into(),
      self.created_at.into(),
      self.updated_at.into(),
    ]
  }
}
