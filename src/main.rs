// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cookie Hunt field-test harness
//!
//! Replays a recorded GPS track for the stored racer, searches one
//! checkpoint code, and runs the confirmation flow against the configured
//! CRM as soon as the track brings the racer in range.
//!
//! Usage: `cookie-hunt <track.json> <checkpoint-code>` where the track is a
//! JSON array of `{ "latitude": .., "longitude": .. }` points, one per second.

use cookie_hunt::{
    config::Config,
    db::SessionStore,
    logging::init_logging,
    models::Coordinate,
    services::{
        session, Attempt, ConfirmationMachine, CrmClient, LocationTracker, Phase, RaceGates,
        ReplaySource,
    },
};
use std::sync::Arc;
use std::time::Duration;

/// Give up if the attempt has not settled by then.
const RUN_TIMEOUT: Duration = Duration::from_secs(15 * 60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let mut args = std::env::args().skip(1);
    let (Some(track_path), Some(code)) = (args.next(), args.next()) else {
        eprintln!("usage: cookie-hunt <track.json> <checkpoint-code>");
        std::process::exit(2);
    };

    let config = Config::from_env()?;
    tracing::info!(crm = %config.crm_base_url, "Starting field test");

    let store = SessionStore::open(&config.session_store_path).await?;
    let racer = session::require_racer(&store).await?;
    let crm = CrmClient::new(&config)?;
    let race = crm.get_race(&racer.race_slug).await?;
    tracing::info!(race = %race.slug, checkpoints = race.locations.len(), "Race loaded");

    let track: Vec<Coordinate> =
        serde_json::from_str(&tokio::fs::read_to_string(&track_path).await?)?;
    tracing::info!(path = %track_path, points = track.len(), "Replaying track");

    let tracker = LocationTracker::new(Arc::new(ReplaySource::new(track, Duration::from_secs(1))));
    let _tracking = tracker.start();
    let gates = RaceGates::new(&tracker, &race);

    let mut machine = ConfirmationMachine::new(
        Arc::new(crm),
        racer,
        race.locations.clone(),
        tracker.subscribe(),
    );
    machine.search(&code).await?;

    let attempt = match tokio::time::timeout(RUN_TIMEOUT, drive(&mut machine)).await {
        Ok(attempt) => attempt,
        Err(_) => {
            tracing::warn!("Timed out waiting for the attempt to settle");
            machine.snapshot()
        }
    };

    tracing::info!(
        code = %code,
        phase = ?attempt.phase,
        committed = ?attempt.committed,
        distance_m = ?attempt.distance_m,
        error = ?attempt.error,
        start = ?gates.start.current(),
        finish = ?gates.finish.current(),
        "Field test finished"
    );
    Ok(())
}

/// Start the countdown whenever the racer is in range and wait for a
/// terminal phase.
async fn drive(machine: &mut ConfirmationMachine) -> Attempt {
    let mut updates = machine.subscribe();
    loop {
        let attempt = updates.borrow_and_update().clone();
        match attempt.phase {
            Phase::Ready => {
                if let Err(e) = machine.start_countdown() {
                    tracing::warn!(error = %e, "Could not start countdown");
                }
            }
            Phase::CoordinatesUnavailable => return attempt,
            phase if phase.is_terminal() => return attempt,
            _ => {}
        }

        if updates.changed().await.is_err() {
            return machine.snapshot();
        }
    }
}
