// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Race and checkpoint ("race location") models.

use super::coordinate::{Coordinate, RawPosition};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A race definition as returned by the CRM race-details endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Race {
    pub slug: String,
    pub name: String,
    /// Day the race runs (local calendar date)
    pub date: NaiveDate,
    #[serde(default)]
    pub start: Option<RawPosition>,
    #[serde(default)]
    pub finish: Option<RawPosition>,
    #[serde(default)]
    pub locations: Vec<RaceLocation>,
}

impl Race {
    /// Start line position, if the CRM sent a parseable one.
    pub fn start_coordinate(&self) -> Option<Coordinate> {
        self.start.as_ref().and_then(RawPosition::resolve)
    }

    /// Finish line position, if the CRM sent a parseable one.
    pub fn finish_coordinate(&self) -> Option<Coordinate> {
        self.finish.as_ref().and_then(RawPosition::resolve)
    }
}

/// Checkpoint as it arrives on the wire, before coordinate normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceLocation {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub points: u32,
    #[serde(flatten)]
    pub position: RawPosition,
}

/// A checkpoint with coordinates normalized to decimal degrees.
///
/// Each component is `None` when the CRM value could not be parsed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Checkpoint {
    pub code: String,
    pub name: String,
    pub description: String,
    pub points: u32,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Checkpoint {
    /// The full coordinate, or `None` if either component is unavailable.
    pub fn coordinate(&self) -> Option<Coordinate> {
        Some(Coordinate::new(self.latitude?, self.longitude?))
    }
}

impl From<&RaceLocation> for Checkpoint {
    fn from(loc: &RaceLocation) -> Self {
        Self {
            code: loc.code.clone(),
            name: loc.name.clone(),
            description: loc.description.clone(),
            points: loc.points,
            latitude: loc.position.latitude_degrees(),
            longitude: loc.position.longitude_degrees(),
        }
    }
}
