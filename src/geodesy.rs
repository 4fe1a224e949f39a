// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Great-circle distance.

use crate::models::Coordinate;
use geo::{Distance, HaversineMeasure, Point};

/// Earth radius used for all distance gating, in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance between two coordinates, in meters.
///
/// Out-of-range inputs are not rejected; NaN in gives NaN out.
pub fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    HaversineMeasure::new(EARTH_RADIUS_M).distance(Point::from(a), Point::from(b))
}
