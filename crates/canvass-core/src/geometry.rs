//! Planar and spherical geometry over `{lat, lng}` rings.
//!
//! Every function treats `lng` as x and `lat` as y. Rings are open: the edge
//! from the last vertex back to the first is implied, and an explicitly closed
//! ring (last vertex equal to the first) gives the same results because the
//! extra edge has zero length.

use serde::{Deserialize, Serialize};

use crate::{error::ValidationError, model::Coordinate};

/// Mean Earth radius used by the geodesic area calculation, in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Smallest territory accepted by [`validate_polygon`] unless configured
/// otherwise, in square metres.
pub const DEFAULT_MIN_AREA_M2: f64 = 1.0;

/// Default tolerance for [`simplify_polygon`], in degrees.
pub const DEFAULT_SIMPLIFY_TOLERANCE: f64 = 0.0001;

/// Default cell size for [`snap_to_grid`], in degrees.
pub const DEFAULT_GRID_SIZE: f64 = 0.0001;

// ─── Containment ─────────────────────────────────────────────────────────────

/// Ray-casting containment test.
///
/// A horizontal ray is cast from `point` towards +x and every edge it crosses
/// toggles the result. Edges are half-open: an edge counts when exactly one of
/// its endpoints lies strictly above the point, and the crossing must lie
/// strictly to the right of it. Consequently points on a left or bottom edge
/// are inside and points on a right or top edge are outside, so a point on an
/// edge shared by two adjacent polygons belongs to exactly one of them.
///
/// Rings with fewer than three vertices contain nothing.
pub fn point_in_polygon(point: Coordinate, polygon: &[Coordinate]) -> bool {
  if polygon.len() < 3 {
    return false;
  }

  let (x, y) = (point.lng, point.lat);
  let mut inside = false;
  let mut j = polygon.len() - 1;

  for (i, vi) in polygon.iter().enumerate() {
    let vj = polygon[j];
    let (xi, yi) = (vi.lng, vi.lat);
    let (xj, yj) = (vj.lng, vj.lat);

    if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
      inside = !inside;
    }
    j = i;
  }

  inside
}

// ─── Area ────────────────────────────────────────────────────────────────────

/// Which area formula to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AreaMethod {
  /// Spherical excess on a sphere of radius [`EARTH_RADIUS_M`]; square metres.
  #[default]
  Geodesic,
  /// Shoelace formula over raw degrees; squared degrees. Only meaningful for
  /// comparing small polygons at similar latitudes.
  Planar,
}

/// Geodesic area of the ring in square metres. Returns 0 for fewer than three
/// vertices.
pub fn polygon_area(coordinates: &[Coordinate]) -> f64 {
  if coordinates.len() < 3 {
    return 0.0;
  }

  let n = coordinates.len();
  let mut total = 0.0;
  for i in 0..n {
    let p1 = coordinates[i];
    let p2 = coordinates[(i + 1) % n];
    total += (p2.lng - p1.lng).to_radians()
      * (2.0 + p1.lat.to_radians().sin() + p2.lat.to_radians().sin());
  }

  (total * EARTH_RADIUS_M * EARTH_RADIUS_M / 2.0).abs()
}

/// Shoelace area over raw lat/lng, in squared degrees. Returns 0 for fewer
/// than three vertices.
pub fn planar_area(coordinates: &[Coordinate]) -> f64 {
  if coordinates.len() < 3 {
    return 0.0;
  }

  let n = coordinates.len();
  let mut area = 0.0;
  for i in 0..n {
    let j = (i + 1) % n;
    area += coordinates[i].lat * coordinates[j].lng;
    area -= coordinates[j].lat * coordinates[i].lng;
  }

  area.abs() / 2.0
}

pub fn polygon_area_with(method: AreaMethod, coordinates: &[Coordinate]) -> f64 {
  match method {
    AreaMethod::Geodesic => polygon_area(coordinates),
    AreaMethod::Planar => planar_area(coordinates),
  }
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// Check that a ring describes a usable territory.
///
/// Rejects rings with fewer than three vertices, rings where two consecutive
/// vertices are identical, and rings whose geodesic area is below
/// `min_area_m2`.
pub fn validate_polygon(
  coordinates: &[Coordinate],
  min_area_m2: f64,
) -> Result<(), ValidationError> {
  if coordinates.len() < 3 {
    return Err(ValidationError::TooFewPoints(coordinates.len()));
  }

  if let Some(i) = coordinates.windows(2).position(|w| w[0] == w[1]) {
    return Err(ValidationError::RepeatedVertex(i + 1));
  }

  let area = polygon_area(coordinates);
  if area < min_area_m2 {
    return Err(ValidationError::AreaTooSmall { area, min: min_area_m2 });
  }

  Ok(())
}

// ─── Simplification ──────────────────────────────────────────────────────────

/// Drop vertices that sit within `tolerance` degrees of the previously kept
/// vertex.
///
/// Distance is Euclidean in raw degrees, not metres. Rings of three or fewer
/// vertices are returned unchanged; if simplification would leave fewer than
/// three vertices the first three input vertices are returned instead.
pub fn simplify_polygon(coordinates: &[Coordinate], tolerance: f64) -> Vec<Coordinate> {
  if coordinates.len() <= 3 {
    return coordinates.to_vec();
  }

  let mut simplified = vec![coordinates[0]];
  for &curr in &coordinates[1..] {
    let prev = simplified[simplified.len() - 1];
    let distance = (curr.lat - prev.lat).hypot(curr.lng - prev.lng);
    if distance > tolerance {
      simplified.push(curr);
    }
  }

  if simplified.len() < 3 {
    return coordinates[..3].to_vec();
  }
  simplified
}

/// Round a point to the nearest multiple of `grid_size` degrees.
pub fn snap_to_grid(point: Coordinate, grid_size: f64) -> Coordinate {
  Coordinate {
    lat: (point.lat / grid_size).round() * grid_size,
    lng: (point.lng / grid_size).round() * grid_size,
  }
}

// ─── Bounds ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
  pub north: f64,
  pub south: f64,
  pub east:  f64,
  pub west:  f64,
}

impl BoundingBox {
  pub fn contains(&self, point: Coordinate) -> bool {
    (self.south..=self.north).contains(&point.lat)
      && (self.west..=self.east).contains(&point.lng)
  }
}

/// Min/max extent of the vertices; all zeroes for an empty slice.
pub fn bounding_box(coordinates: &[Coordinate]) -> BoundingBox {
  let Some(first) = coordinates.first() else {
    return BoundingBox::default();
  };

  coordinates.iter().fold(
    BoundingBox {
      north: first.lat,
      south: first.lat,
      east:  first.lng,
      west:  first.lng,
    },
    |b, c| BoundingBox {
      north: b.north.max(c.lat),
      south: b.south.min(c.lat),
      east:  b.east.max(c.lng),
      west:  b.west.min(c.lng),
    },
  )
}
