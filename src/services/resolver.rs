// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Checkpoint lookup by racer-entered code.

use crate::models::{Checkpoint, RaceLocation};

/// Find the checkpoint whose code equals `code` exactly (case-sensitive).
///
/// Codes are assumed unique within a race; on duplicates the first match
/// wins. Coordinates are normalized to decimal degrees, and components that
/// cannot be parsed come back as `None` rather than an error.
pub fn resolve_checkpoint(locations: &[RaceLocation], code: &str) -> Option<Checkpoint> {
    let found = locations.iter().find(|loc| loc.code == code)?;
    let checkpoint = Checkpoint::from(found);

    if checkpoint.coordinate().is_none() {
        tracing::warn!(
            code,
            latitude = ?found.position.latitude,
            longitude = ?found.position.longitude,
            "Checkpoint coordinates could not be normalized"
        );
    }

    Some(checkpoint)
}
