// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Geographic coordinates and the textual forms the CRM sends them in.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Plain decimal degrees, e.g. `-122.0841` or `45.1234`. The fraction is
/// required: bare integers are not a recognized notation.
static DECIMAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?\d+\.\d+$").expect("decimal pattern is valid"));

/// Degrees-minutes-seconds, e.g. `41°24'12.2"N`.
static DMS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^(\d+(?:\.\d+)?)\s*°\s*(\d+(?:\.\d+)?)\s*['′]\s*(\d+(?:\.\d+)?)\s*(?:"|″|'')\s*([NSEWnsew])?$"#,
    )
    .expect("DMS pattern is valid")
});

/// A latitude/longitude pair in decimal degrees.
///
/// Ranges are not enforced: whatever the CRM sends is passed through.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl From<Coordinate> for geo::Point<f64> {
    fn from(c: Coordinate) -> Self {
        geo::Point::new(c.longitude, c.latitude)
    }
}

impl From<geo::Point<f64>> for Coordinate {
    fn from(p: geo::Point<f64>) -> Self {
        Coordinate::new(p.y(), p.x())
    }
}

/// One coordinate component as delivered by the CRM: a JSON number, or a
/// string in either decimal or DMS notation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CoordinateValue {
    Number(f64),
    Text(String),
}

impl CoordinateValue {
    /// Normalize to decimal degrees. `None` when the text matches neither
    /// notation.
    pub fn to_degrees(&self) -> Option<f64> {
        match self {
            CoordinateValue::Number(v) => Some(*v),
            CoordinateValue::Text(s) => parse_degrees(s),
        }
    }
}

/// Parse a coordinate string as decimal degrees, falling back to DMS.
pub fn parse_degrees(input: &str) -> Option<f64> {
    let s = input.trim();
    if DECIMAL_RE.is_match(s) {
        return s.parse().ok();
    }
    parse_dms(s)
}

/// Parse `deg° min' sec" [NSEW]` into signed decimal degrees.
///
/// Southern and western hemispheres are negative.
pub fn parse_dms(input: &str) -> Option<f64> {
    let caps = DMS_RE.captures(input.trim())?;

    let degrees: f64 = caps[1].parse().ok()?;
    let minutes: f64 = caps[2].parse().ok()?;
    let seconds: f64 = caps[3].parse().ok()?;
    let value = degrees + minutes / 60.0 + seconds / 3600.0;

    match caps.get(4).map(|m| m.as_str().to_ascii_uppercase()) {
        Some(h) if h == "S" || h == "W" => Some(-value),
        _ => Some(value),
    }
}

/// Raw latitude/longitude pair as it appears on CRM records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPosition {
    #[serde(default)]
    pub latitude: Option<CoordinateValue>,
    #[serde(default)]
    pub longitude: Option<CoordinateValue>,
}

impl RawPosition {
    pub fn latitude_degrees(&self) -> Option<f64> {
        self.latitude.as_ref().and_then(CoordinateValue::to_degrees)
    }

    pub fn longitude_degrees(&self) -> Option<f64> {
        self.longitude.as_ref().and_then(CoordinateValue::to_degrees)
    }

    /// Both components normalized, or `None` if either is missing or
    /// unparseable.
    pub fn resolve(&self) -> Option<Coordinate> {
        Some(Coordinate::new(
            self.latitude_degrees()?,
            self.longitude_degrees()?,
        ))
    }
}
