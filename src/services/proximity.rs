// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Distance gating against live position.

use crate::geodesy::distance_meters;
use crate::models::{Coordinate, Race};
use crate::services::location::{LiveSession, LocationTracker};
use std::sync::Arc;
use tokio::sync::watch;

/// Radius around a checkpoint inside which it can be confirmed (meters).
pub const CHECKPOINT_RADIUS_M: f64 = 100.0;

/// Radius around the start and finish lines (meters).
pub const START_FINISH_RADIUS_M: f64 = 50.0;

/// Result of comparing the live position with a target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Proximity {
    /// The target has no usable coordinate.
    CoordinatesUnavailable,
    /// No position fix yet, or tracking is disabled.
    NoFix,
    Measured { distance_m: f64, within_range: bool },
}

impl Proximity {
    pub fn distance_m(&self) -> Option<f64> {
        match self {
            Proximity::Measured { distance_m, .. } => Some(*distance_m),
            _ => None,
        }
    }

    pub fn within_range(&self) -> bool {
        matches!(
            self,
            Proximity::Measured {
                within_range: true,
                ..
            }
        )
    }
}

/// Compare `position` with `target` against `threshold_m`.
///
/// A missing target wins over a missing fix so the caller can tell
/// "unknown location" apart from "too far away".
pub fn evaluate(
    position: Option<Coordinate>,
    target: Option<Coordinate>,
    threshold_m: f64,
) -> Proximity {
    let Some(target) = target else {
        return Proximity::CoordinatesUnavailable;
    };
    let Some(position) = position else {
        return Proximity::NoFix;
    };

    let distance_m = distance_meters(position, target);
    Proximity::Measured {
        distance_m,
        within_range: distance_m <= threshold_m,
    }
}

/// Read model deriving [`Proximity`] for one target from a shared tracker.
#[derive(Clone)]
pub struct ProximityGate {
    target: Option<Coordinate>,
    threshold_m: f64,
    live: watch::Receiver<LiveSession>,
}

impl ProximityGate {
    pub fn new(tracker: &LocationTracker, target: Option<Coordinate>, threshold_m: f64) -> Self {
        Self {
            target,
            threshold_m,
            live: tracker.subscribe(),
        }
    }

    pub fn target(&self) -> Option<Coordinate> {
        self.target
    }

    pub fn threshold_m(&self) -> f64 {
        self.threshold_m
    }

    /// Proximity for the latest published fix.
    pub fn current(&self) -> Proximity {
        evaluate(self.live.borrow().position, self.target, self.threshold_m)
    }

    /// Wait for the next fix and return the recomputed proximity.
    ///
    /// Returns `None` once the tracker is gone.
    pub async fn changed(&mut self) -> Option<Proximity> {
        self.live.changed().await.ok()?;
        let position = self.live.borrow_and_update().position;
        Some(evaluate(position, self.target, self.threshold_m))
    }
}

/// Start and finish gates for a race, sharing one tracker.
pub struct RaceGates {
    pub start: ProximityGate,
    pub finish: ProximityGate,
}

impl RaceGates {
    pub fn new(tracker: &Arc<LocationTracker>, race: &Race) -> Self {
        Self {
            start: ProximityGate::new(tracker, race.start_coordinate(), START_FINISH_RADIUS_M),
            finish: ProximityGate::new(tracker, race.finish_coordinate(), START_FINISH_RADIUS_M),
        }
    }
}
