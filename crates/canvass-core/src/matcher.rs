//! Territory matching: which drawn areas contain a point.

use crate::{
  geometry::{bounding_box, point_in_polygon},
  model::{Coordinate, Territory},
};

/// Every territory whose ring contains `point`, in input order.
///
/// Overlapping territories are all returned. Boundary points follow the
/// half-open convention of [`point_in_polygon`].
pub fn find_containing<'a, I>(point: Coordinate, territories: I) -> Vec<&'a Territory>
where
  I: IntoIterator<Item = &'a Territory>,
{
  territories
    .into_iter()
    .filter(|t| contains(t, point))
    .collect()
}

/// Owned variant of [`find_containing`] for callers that already hold the
/// territory list by value.
pub fn into_containing(point: Coordinate, territories: Vec<Territory>) -> Vec<Territory> {
  territories.into_iter().filter(|t| contains(t, point)).collect()
}

fn contains(territory: &Territory, point: Coordinate) -> bool {
  // Cheap reject before the full ray cast.
  bounding_box(&territory.coordinates).contains(point)
    && point_in_polygon(point, &territory.coordinates)
}
