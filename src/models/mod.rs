// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod coordinate;
pub mod race;
pub mod racer;

pub use coordinate::{Coordinate, CoordinateValue, RawPosition};
pub use race::{Checkpoint, Race, RaceLocation};
pub use racer::Racer;
