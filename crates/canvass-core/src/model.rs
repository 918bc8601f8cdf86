//! Domain records for the canvass field tracker.
//!
//! A [`Pin`] is one door that was visited. [`Territory`] polygons group pins by
//! area, a [`FollowUp`] schedules a return visit, and a [`Customer`] records a
//! successful onboarding. Every record carries an opaque, caller-generated
//! string `id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;

use crate::error::ValidationError;

/// Generate a fresh opaque record id.
pub fn new_id() -> String { Uuid::new_v4().to_string() }

// ─── Entity kinds ────────────────────────────────────────────────────────────

/// The record types held by the stores; doubles as the table name.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
  EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
  Pins,
  FollowUps,
  Customers,
  Territories,
}

impl EntityKind {
  /// Storage container name; identical to the string form.
  pub const fn table(self) -> &'static str {
    match self {
      EntityKind::Pins => "pins",
      EntityKind::FollowUps => "follow_ups",
      EntityKind::Customers => "customers",
      EntityKind::Territories => "territories",
    }
  }
}

// ─── Coordinates ─────────────────────────────────────────────────────────────

/// A WGS-84 position. `lat` is treated as the y axis and `lng` as the x axis
/// by all geometry in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
  pub lat: f64,
  pub lng: f64,
}

impl Coordinate {
  pub const fn new(lat: f64, lng: f64) -> Self { Self { lat, lng } }

  pub fn is_in_range(&self) -> bool {
    self.lat.is_finite()
      && self.lng.is_finite()
      && (-90.0..=90.0).contains(&self.lat)
      && (-180.0..=180.0).contains(&self.lng)
  }
}

// ─── Statuses ────────────────────────────────────────────────────────────────

/// Outcome of the most recent visit to a door.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
  EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum PinStatus {
  #[default]
  New,
  NotHome,
  NotInterested,
  FollowUp,
  Onboarded,
}

impl PinStatus {
  pub fn parse(s: &str) -> Result<Self, ValidationError> {
    s.parse().map_err(|_| ValidationError::UnknownVariant {
      field: "pin status",
      value: s.to_owned(),
    })
  }
}

/// Lifecycle of a scheduled return visit. `pending` is accepted as an alias
/// for `scheduled`.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
  EnumIter,
)]
#[serde(rename_all = "lowercase")]
pub enum FollowUpStatus {
  #[default]
  #[serde(alias = "pending")]
  #[strum(to_string = "scheduled", serialize = "pending")]
  Scheduled,
  #[strum(to_string = "completed")]
  Completed,
  #[strum(to_string = "cancelled")]
  Cancelled,
}

impl FollowUpStatus {
  pub fn parse(s: &str) -> Result<Self, ValidationError> {
    s.parse().map_err(|_| ValidationError::UnknownVariant {
      field: "follow-up status",
      value: s.to_owned(),
    })
  }
}

// ─── Pin ─────────────────────────────────────────────────────────────────────

/// A geocoded door.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pin {
  pub id:            String,
  pub lat:           f64,
  pub lng:           f64,
  pub address:       String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub place_id:      Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub property_name: Option<String>,
  #[serde(default)]
  pub status:        PinStatus,
  pub created_at:    DateTime<Utc>,
  pub updated_at:    DateTime<Utc>,
}

impl Pin {
  pub fn coordinate(&self) -> Coordinate { Coordinate::new(self.lat, self.lng) }

  /// The stand-in written when a customer or follow-up references a pin the
  /// backend has never seen. Its `{0, 0}` position carries no meaning.
  pub fn placeholder(id: impl Into<String>, address: impl Into<String>, now: DateTime<Utc>) -> Self {
    Self {
      id:            id.into(),
      lat:           0.0,
      lng:           0.0,
      address:       address.into(),
      place_id:      None,
      property_name: None,
      status:        PinStatus::New,
      created_at:    now,
      updated_at:    now,
    }
  }
}

/// Input to [`crate::store::RemoteStore::create_pin`]. A missing `id` is
/// generated by the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewPin {
  #[serde(default)]
  pub id:            Option<String>,
  pub lat:           f64,
  pub lng:           f64,
  pub address:       String,
  #[serde(default)]
  pub place_id:      Option<String>,
  #[serde(default)]
  pub property_name: Option<String>,
  #[serde(default)]
  pub status:        Option<PinStatus>,
}

impl NewPin {
  pub fn at(position: Coordinate, address: impl Into<String>) -> Self {
    Self {
      lat: position.lat,
      lng: position.lng,
      address: address.into(),
      ..Self::default()
    }
  }

  pub fn into_pin(self, now: DateTime<Utc>) -> Pin {
    Pin {
      id:            self.id.unwrap_or_else(new_id),
      lat:           self.lat,
      lng:           self.lng,
      address:       self.address,
      place_id:      self.place_id,
      property_name: self.property_name,
      status:        self.status.unwrap_or_default(),
      created_at:    now,
      updated_at:    now,
    }
  }
}

/// Partial update for a pin; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PinPatch {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub lat:           Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub lng:           Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub address:       Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub place_id:      Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub property_name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub status:        Option<PinStatus>,
}

impl PinPatch {
  pub fn status(status: PinStatus) -> Self {
    Self { status: Some(status), ..Self::default() }
  }

  pub fn apply(self, pin: &mut Pin, now: DateTime<Utc>) {
    if let Some(lat) = self.lat {
      pin.lat = lat;
    }
    if let Some(lng) = self.lng {
      pin.lng = lng;
    }
    if let Some(address) = self.address {
      pin.address = address;
    }
    if self.place_id.is_some() {
      pin.place_id = self.place_id;
    }
    if self.property_name.is_some() {
      pin.property_name = self.property_name;
    }
    if let Some(status) = self.status {
      pin.status = status;
    }
    pin.updated_at = now;
  }
}

// ─── Territory ───────────────────────────────────────────────────────────────

/// A user-drawn sales area. `coordinates` is an open ring; closure back to the
/// first vertex is implied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Territory {
  pub id:          String,
  pub name:        String,
  /// Display colour, opaque to this crate.
  pub color:       String,
  pub coordinates: Vec<Coordinate>,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTerritory {
  #[serde(default)]
  pub id:          Option<String>,
  pub name:        String,
  pub color:       String,
  pub coordinates: Vec<Coordinate>,
}

impl NewTerritory {
  pub fn into_territory(self, now: DateTime<Utc>) -> Territory {
    Territory {
      id:          self.id.unwrap_or_else(new_id),
      name:        self.name,
      color:       self.color,
      coordinates: self.coordinates,
      created_at:  now,
      updated_at:  now,
    }
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TerritoryPatch {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name:        Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub color:       Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub coordinates: Option<Vec<Coordinate>>,
}

impl TerritoryPatch {
  pub fn apply(self, territory: &mut Territory, now: DateTime<Utc>) {
    if let Some(name) = self.name {
      territory.name = name;
    }
    if let Some(color) = self.color {
      territory.color = color;
    }
    if let Some(coordinates) = self.coordinates {
      territory.coordinates = coordinates;
    }
    territory.updated_at = now;
  }
}

// ─── Customer ────────────────────────────────────────────────────────────────

/// Social handles collected during onboarding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Socials {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub twitter:  Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub telegram: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reddit:   Option<String>,
}

impl Socials {
  pub fn is_empty(&self) -> bool {
    self.twitter.is_none() && self.telegram.is_none() && self.reddit.is_none()
  }
}

/// An onboarded household. At most one customer exists per pin; `pin_id` is
/// the natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
  pub id:          String,
  pub pin_id:      String,
  pub first_name:  String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub phone:       Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub email:       Option<String>,
  #[serde(default)]
  pub owns_crypto: bool,
  #[serde(default, skip_serializing_if = "Socials::is_empty")]
  pub socials:     Socials,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub notes:       Option<String>,
  pub address:     String,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCustomer {
  #[serde(default)]
  pub id:          Option<String>,
  pub pin_id:      String,
  pub first_name:  String,
  #[serde(default)]
  pub phone:       Option<String>,
  #[serde(default)]
  pub email:       Option<String>,
  #[serde(default)]
  pub owns_crypto: bool,
  #[serde(default)]
  pub socials:     Socials,
  #[serde(default)]
  pub notes:       Option<String>,
  pub address:     String,
}

impl NewCustomer {
  pub fn into_customer(self, now: DateTime<Utc>) -> Customer {
    Customer {
      id:          self.id.unwrap_or_else(new_id),
      pin_id:      self.pin_id,
      first_name:  self.first_name,
      phone:       self.phone,
      email:       self.email,
      owns_crypto: self.owns_crypto,
      socials:     self.socials,
      notes:       self.notes,
      address:     self.address,
      created_at:  now,
      updated_at:  now,
    }
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerPatch {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub first_name:  Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub phone:       Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub email:       Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub owns_crypto: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub socials:     Option<Socials>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub notes:       Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub address:     Option<String>,
}

impl CustomerPatch {
  pub fn apply(self, customer: &mut Customer, now: DateTime<Utc>) {
    if let Some(first_name) = self.first_name {
      customer.first_name = first_name;
    }
    if self.phone.is_some() {
      customer.phone = self.phone;
    }
    if self.email.is_some() {
      customer.email = self.email;
    }
    if let Some(owns_crypto) = self.owns_crypto {
      customer.owns_crypto = owns_crypto;
    }
    if let Some(socials) = self.socials {
      customer.socials = socials;
    }
    if self.notes.is_some() {
      customer.notes = self.notes;
    }
    if let Some(address) = self.address {
      customer.address = address;
    }
    customer.updated_at = now;
  }
}

// ─── Follow-up ───────────────────────────────────────────────────────────────

/// A scheduled return visit. Several follow-ups may share one `pin_id`, and
/// the referenced pin need not exist remotely when the follow-up is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUp {
  pub id:            String,
  pub pin_id:        String,
  pub address:       String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub property_name: Option<String>,
  /// ISO calendar date, `YYYY-MM-DD`.
  pub date:          String,
  /// 24-hour wall-clock time, `HH:MM`.
  pub time:          String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub notes:         Option<String>,
  #[serde(default)]
  pub status:        FollowUpStatus,
  pub created_at:    DateTime<Utc>,
  pub updated_at:    DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewFollowUp {
  #[serde(default)]
  pub id:            Option<String>,
  pub pin_id:        String,
  pub address:       String,
  #[serde(default)]
  pub property_name: Option<String>,
  pub date:          String,
  pub time:          String,
  #[serde(default)]
  pub notes:         Option<String>,
  #[serde(default)]
  pub status:        Option<FollowUpStatus>,
}

impl NewFollowUp {
  pub fn into_follow_up(self, now: DateTime<Utc>) -> FollowUp {
    FollowUp {
      id:            self.id.unwrap_or_else(new_id),
      pin_id:        self.pin_id,
      address:       self.address,
      property_name: self.property_name,
      date:          self.date,
      time:          self.time,
      notes:         self.notes,
      status:        self.status.unwrap_or_default(),
      created_at:    now,
      updated_at:    now,
    }
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FollowUpPatch {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub pin_id:        Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub address:       Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub property_name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub date:          Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub time:          Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub notes:         Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub status:        Option<FollowUpStatus>,
}

impl FollowUpPatch {
  pub fn status(status: FollowUpStatus) -> Self {
    Self { status: Some(status), ..Self::default() }
  }

  pub fn apply(self, follow_up: &mut FollowUp, now: DateTime<Utc>) {
    if let Some(pin_id) = self.pin_id {
      follow_up.pin_id = pin_id;
    }
    if let Some(address) = self.address {
      follow_up.address = address;
    }
    if self.property_name.is_some() {
      follow_up.property_name = self.property_name;
    }
    if let Some(date) = self.date {
      follow_up.date = date;
    }
    if let Some(time) = self.time {
      follow_up.time = time;
    }
    if self.notes.is_some() {
      follow_up.notes = self.notes;
    }
    if let Some(status) = self.status {
      follow_up.status = status;
    }
    follow_up.updated_at = now;
  }
}
