//! Structural checks applied before any entity is written.

use chrono::{NaiveDate, NaiveTime};

use crate::{
  error::ValidationError,
  geometry::validate_polygon,
  model::{Coordinate, Customer, FollowUp, Pin, Territory},
};

pub fn validate_coordinate(c: Coordinate) -> Result<(), ValidationError> {
  if c.is_in_range() {
    Ok(())
  } else {
    Err(ValidationError::CoordinateOutOfRange { lat: c.lat, lng: c.lng })
  }
}

pub fn validate_pin(pin: &Pin) -> Result<(), ValidationError> {
  non_empty("id", &pin.id)?;
  non_empty("address", &pin.address)?;
  validate_coordinate(pin.coordinate())
}

pub fn validate_territory(
  territory: &Territory,
  min_area_m2: f64,
) -> Result<(), ValidationError> {
  non_empty("id", &territory.id)?;
  non_empty("name", &territory.name)?;
  territory
    .coordinates
    .iter()
    .try_for_each(|c| validate_coordinate(*c))?;
  validate_polygon(&territory.coordinates, min_area_m2)
}

pub fn validate_customer(customer: &Customer) -> Result<(), ValidationError> {
  non_empty("id", &customer.id)?;
  non_empty("pin id", &customer.pin_id)?;
  non_empty("first name", &customer.first_name)?;
  if let Some(phone) = customer.phone.as_deref().filter(|p| !p.is_empty()) {
    validate_phone(phone)?;
  }
  if let Some(email) = customer.email.as_deref().filter(|e| !e.is_empty()) {
    validate_email(email)?;
  }
  Ok(())
}

pub fn validate_follow_up(follow_up: &FollowUp) -> Result<(), ValidationError> {
  non_empty("id", &follow_up.id)?;
  non_empty("pin id", &follow_up.pin_id)?;
  non_empty("address", &follow_up.address)?;
  validate_date(&follow_up.date)?;
  validate_time(&follow_up.time)
}

/// `YYYY-MM-DD`.
pub fn validate_date(date: &str) -> Result<(), ValidationError> {
  NaiveDate::parse_from_str(date, "%Y-%m-%d")
    .map(drop)
    .map_err(|_| ValidationError::InvalidDate(date.to_owned()))
}

/// 24-hour `HH:MM`.
pub fn validate_time(time: &str) -> Result<(), ValidationError> {
  if time.len() != 5 {
    return Err(ValidationError::InvalidTime(time.to_owned()));
  }
  NaiveTime::parse_from_str(time, "%H:%M")
    .map(drop)
    .map_err(|_| ValidationError::InvalidTime(time.to_owned()))
}

/// At least ten characters of digits, spaces, dashes and parentheses, with an
/// optional leading `+`. Whitespace is ignored when counting.
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
  let compact: String = phone.chars().filter(|c| !c.is_whitespace()).collect();
  let body = compact.strip_prefix('+').unwrap_or(&compact);
  let ok = body.chars().count() >= 10
    && body
      .chars()
      .all(|c| c.is_ascii_digit() || matches!(c, '-' | '(' | ')'));
  if ok {
    Ok(())
  } else {
    Err(ValidationError::InvalidPhone(phone.to_owned()))
  }
}

/// `local@domain.tld`, no whitespace, exactly one `@`.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
  let invalid = || ValidationError::InvalidEmail(email.to_owned());

  if email.chars().any(char::is_whitespace) {
    return Err(invalid());
  }
  let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
  if local.is_empty() || domain.contains('@') {
    return Err(invalid());
  }
  let has_inner_dot = domain
    .char_indices()
    .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len());
  if has_inner_dot { Ok(()) } else { Err(invalid()) }
}

fn non_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
  if value.trim().is_empty() {
    Err(ValidationError::Empty(field))
  } else {
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;
  use crate::{
    geometry::DEFAULT_MIN_AREA_M2,
    model::{NewCustomer, NewFollowUp, NewPin, NewTerritory},
  };

  #[test]
  fn pin_needs_address_and_valid_position() {
    let now = Utc::now();
    let ok = NewPin::at(Coordinate::new(40.0, -74.0), "12 Elm St").into_pin(now);
    assert_eq!(validate_pin(&ok), Ok(()));

    let blank = NewPin::at(Coordinate::new(40.0, -74.0), "  ").into_pin(now);
    assert_eq!(validate_pin(&blank), Err(ValidationError::Empty("address")));

    let off_world = NewPin::at(Coordinate::new(91.0, 0.0), "x").into_pin(now);
    assert!(matches!(
      validate_pin(&off_world),
      Err(ValidationError::CoordinateOutOfRange { .. })
    ));
  }

  #[test]
  fn territory_checks_name_and_ring() {
    let d = 0.0005;
    let good = NewTerritory {
      id:          None,
      name:        "Downtown".into(),
      color:       "red".into(),
      coordinates: vec![
        Coordinate::new(0.0, 0.0),
        Coordinate::new(0.0, d),
        Coordinate::new(d, d),
      ],
    }
    .into_territory(Utc::now());
    assert_eq!(validate_territory(&good, DEFAULT_MIN_AREA_M2), Ok(()));

    let mut unnamed = good.clone();
    unnamed.name = String::new();
    assert_eq!(
      validate_territory(&unnamed, DEFAULT_MIN_AREA_M2),
      Err(ValidationError::Empty("name"))
    );

    let mut short = good;
    short.coordinates.truncate(2);
    assert_eq!(
      validate_territory(&short, DEFAULT_MIN_AREA_M2),
      Err(ValidationError::TooFewPoints(2))
    );
  }

  #[test]
  fn customer_contact_details() {
    let base = NewCustomer {
      pin_id: "pin-1".into(),
      first_name: "Ada".into(),
      address: "1 Loop Rd".into(),
      ..NewCustomer::default()
    }
    .into_customer(Utc::now());
    assert_eq!(validate_customer(&base), Ok(()));

    let mut c = base.clone();
    c.first_name = " ".into();
    assert_eq!(validate_customer(&c), Err(ValidationError::Empty("first name")));

    let mut c = base.clone();
    c.email = Some("ada@example.com".into());
    c.phone = Some("+1 (555) 123-4567".into());
    assert_eq!(validate_customer(&c), Ok(()));

    let mut c = base.clone();
    c.email = Some("ada@localhost".into());
    assert!(matches!(validate_customer(&c), Err(ValidationError::InvalidEmail(_))));

    let mut c = base;
    c.phone = Some("555-1234".into());
    assert!(matches!(validate_customer(&c), Err(ValidationError::InvalidPhone(_))));
  }

  #[test]
  fn email_shapes() {
    assert!(validate_email("a@b.co").is_ok());
    assert!(validate_email("a@b.c.d").is_ok());
    assert!(validate_email("@b.co").is_err());
    assert!(validate_email("a@.co").is_err());
    assert!(validate_email("a@b.").is_err());
    assert!(validate_email("a@@b.co").is_err());
    assert!(validate_email("a b@c.co").is_err());
  }

  #[test]
  fn follow_up_date_and_time() {
    let base = NewFollowUp {
      pin_id: "pin-1".into(),
      address: "1 Loop Rd".into(),
      date: "2025-03-09".into(),
      time: "14:30".into(),
      ..NewFollowUp::default()
    }
    .into_follow_up(Utc::now());
    assert_eq!(validate_follow_up(&base), Ok(()));

    let mut f = base.clone();
    f.date = "03/09/2025".into();
    assert!(matches!(validate_follow_up(&f), Err(ValidationError::InvalidDate(_))));

    let mut f = base.clone();
    f.time = "2:30pm".into();
    assert!(matches!(validate_follow_up(&f), Err(ValidationError::InvalidTime(_))));

    let mut f = base;
    f.time = "24:00".into();
    assert!(validate_follow_up(&f).is_err());
  }
}
