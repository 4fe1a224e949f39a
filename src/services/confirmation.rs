// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Checkpoint confirmation flow.
//!
//! A racer searches a checkpoint code, walks within range, starts a
//! countdown, and when it expires the checkpoint is recorded as done with the
//! CRM. The CRM is the source of truth: a checkpoint it already reports as
//! done ends the attempt early, and an `EXISTS` answer to the record call is
//! an idempotent success rather than an error.
//!
//! Each search opens a new attempt with a fresh generation number. Every
//! write to the published [`Attempt`] is tagged with the generation it
//! belongs to and dropped if a newer search has started, so late responses
//! and abandoned countdowns can never touch the current attempt.

use crate::error::{AppError, Result};
use crate::models::{Checkpoint, RaceLocation, Racer};
use crate::services::crm::{CompletionOracle, DoneState, RecordOutcome};
use crate::services::location::LiveSession;
use crate::services::proximity::{evaluate, Proximity, CHECKPOINT_RADIUS_M};
use crate::services::resolver::resolve_checkpoint;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Seconds between the racer starting confirmation and the commit.
pub const COUNTDOWN_SECS: u32 = 10;

const TICK: Duration = Duration::from_secs(1);

/// Where an attempt currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Searching,
    /// Checkpoint resolved, done-state query in flight
    Found,
    WaitingForRange,
    Ready,
    /// Checkpoint has no usable coordinate; the countdown cannot start
    CoordinatesUnavailable,
    CountingDown,
    Committing,
    Done,
    AlreadyDone,
    Error,
}

impl Phase {
    /// Phases driven by live distance.
    fn tracks_range(self) -> bool {
        matches!(
            self,
            Phase::WaitingForRange | Phase::Ready | Phase::CoordinatesUnavailable
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Done | Phase::AlreadyDone | Phase::Error)
    }
}

/// Published state of the current confirmation attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    /// Bumped on every search; stale writers compare against it
    pub generation: u64,
    pub phase: Phase,
    pub checkpoint: Option<Checkpoint>,
    pub distance_m: Option<f64>,
    pub within_range: bool,
    /// Seconds left, `None` when no countdown is running
    pub countdown: Option<u32>,
    /// Done-state last reported by the CRM, `None` when unknown
    pub committed: Option<bool>,
    pub error: Option<String>,
}

impl Default for Attempt {
    fn default() -> Self {
        Self {
            generation: 0,
            phase: Phase::Idle,
            checkpoint: None,
            distance_m: None,
            within_range: false,
            countdown: None,
            committed: None,
            error: None,
        }
    }
}

impl Attempt {
    fn apply_proximity(&mut self, proximity: Proximity) {
        self.distance_m = proximity.distance_m();
        self.within_range = proximity.within_range();

        // Range only moves the phase while waiting on it. A running countdown
        // keeps going even if the racer walks out of range.
        if self.phase.tracks_range() {
            self.phase = match proximity {
                Proximity::CoordinatesUnavailable => Phase::CoordinatesUnavailable,
                Proximity::Measured {
                    within_range: true, ..
                } => Phase::Ready,
                _ => Phase::WaitingForRange,
            };
        }
    }

    fn target(&self) -> Option<crate::models::Coordinate> {
        self.checkpoint.as_ref().and_then(Checkpoint::coordinate)
    }
}

/// Apply `f` to the published attempt if it still belongs to `generation`.
fn update_if_current(
    state: &watch::Sender<Attempt>,
    generation: u64,
    f: impl FnOnce(&mut Attempt),
) -> bool {
    state.send_if_modified(|attempt| {
        if attempt.generation != generation {
            return false;
        }
        f(attempt);
        true
    })
}

struct Countdown {
    cancel: CancellationToken,
}

/// Drives confirmation attempts for one racer in one race.
pub struct ConfirmationMachine {
    oracle: Arc<dyn CompletionOracle>,
    racer: Racer,
    locations: Vec<RaceLocation>,
    live: watch::Receiver<LiveSession>,
    state: watch::Sender<Attempt>,
    countdown: Option<Countdown>,
    _range_task: DropGuard,
}

impl ConfirmationMachine {
    /// Create a machine reading positions from `live`.
    ///
    /// Spawns a task that re-evaluates range on every fix, so this must be
    /// called inside a Tokio runtime.
    pub fn new(
        oracle: Arc<dyn CompletionOracle>,
        racer: Racer,
        locations: Vec<RaceLocation>,
        live: watch::Receiver<LiveSession>,
    ) -> Self {
        let (state, _) = watch::channel(Attempt::default());
        let cancel = CancellationToken::new();

        tokio::spawn(track_range(live.clone(), state.clone(), cancel.clone()));

        Self {
            oracle,
            racer,
            locations,
            live,
            state,
            countdown: None,
            _range_task: cancel.drop_guard(),
        }
    }

    /// Current attempt.
    pub fn snapshot(&self) -> Attempt {
        self.state.borrow().clone()
    }

    /// Observe every change to the attempt.
    pub fn subscribe(&self) -> watch::Receiver<Attempt> {
        self.state.subscribe()
    }

    /// Look up `code` and open a new attempt for it.
    ///
    /// Abandons whatever attempt was in progress: a pending countdown is
    /// cancelled before anything else happens. On a miss the machine returns
    /// to idle without contacting the CRM. Otherwise the CRM is asked whether
    /// the checkpoint is already done; if that query fails the attempt
    /// proceeds as not done, since the record call still has the final say.
    pub async fn search(&mut self, code: &str) -> Result<Attempt> {
        self.stop_countdown();

        let generation = self.state.borrow().generation + 1;
        self.state.send_replace(Attempt {
            generation,
            phase: Phase::Searching,
            ..Attempt::default()
        });

        let Some(checkpoint) = resolve_checkpoint(&self.locations, code) else {
            tracing::info!(code, "Checkpoint not found");
            update_if_current(&self.state, generation, |a| {
                a.phase = Phase::Idle;
                a.error = Some(format!("checkpoint {} not found", code));
            });
            return Err(AppError::CheckpointNotFound(code.to_string()));
        };

        let checkpoint_code = checkpoint.code.clone();
        tracing::info!(code = %checkpoint_code, name = %checkpoint.name, "Checkpoint found");
        update_if_current(&self.state, generation, |a| {
            a.phase = Phase::Found;
            a.checkpoint = Some(checkpoint);
            let proximity = self.proximity(a.target());
            a.apply_proximity(proximity);
        });

        let done = match self
            .oracle
            .is_location_done(&self.racer, &checkpoint_code)
            .await
        {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(code = %checkpoint_code, error = %e, "Done-state query failed, treating as not done");
                DoneState::Unknown
            }
        };

        update_if_current(&self.state, generation, |a| {
            if let DoneState::Known(done) = done {
                a.committed = Some(done);
            }
            if done.is_done() {
                a.phase = Phase::AlreadyDone;
            } else {
                a.phase = Phase::WaitingForRange;
                let proximity = self.proximity(a.target());
                a.apply_proximity(proximity);
            }
        });

        let attempt = self.snapshot();
        tracing::info!(code = %checkpoint_code, phase = ?attempt.phase, "Checkpoint ready for confirmation");
        Ok(attempt)
    }

    /// Start the countdown for the current checkpoint.
    ///
    /// Only valid when the racer is in range. The checkpoint code and racer
    /// are captured now, so the eventual commit cannot land on a checkpoint
    /// selected later.
    pub fn start_countdown(&mut self) -> Result<()> {
        let attempt = self.snapshot();
        let checkpoint = match (attempt.phase, attempt.checkpoint) {
            (Phase::Ready, Some(checkpoint)) => checkpoint,
            (Phase::CoordinatesUnavailable, Some(checkpoint)) => {
                return Err(AppError::CoordinatesUnavailable(checkpoint.code));
            }
            (phase, _) => {
                return Err(AppError::InvalidTransition(format!(
                    "cannot start countdown while {:?}",
                    phase
                )));
            }
        };

        let generation = attempt.generation;
        update_if_current(&self.state, generation, |a| {
            a.phase = Phase::CountingDown;
            a.countdown = Some(COUNTDOWN_SECS);
        });

        let cancel = CancellationToken::new();
        let job = CommitJob {
            oracle: self.oracle.clone(),
            racer: self.racer.clone(),
            code: checkpoint.code,
            generation,
            state: self.state.clone(),
            cancel: cancel.clone(),
        };
        tracing::info!(code = %job.code, seconds = COUNTDOWN_SECS, "Countdown started");
        tokio::spawn(job.run());

        self.countdown = Some(Countdown { cancel });
        Ok(())
    }

    /// Abandon the current attempt and return to idle.
    pub fn cancel(&mut self) {
        self.stop_countdown();
        let generation = self.state.borrow().generation + 1;
        self.state.send_replace(Attempt {
            generation,
            ..Attempt::default()
        });
    }

    fn stop_countdown(&mut self) {
        if let Some(countdown) = self.countdown.take() {
            if !countdown.cancel.is_cancelled() {
                tracing::debug!("Cancelling pending countdown");
            }
            countdown.cancel.cancel();
        }
    }

    fn proximity(&self, target: Option<crate::models::Coordinate>) -> Proximity {
        evaluate(self.live.borrow().position, target, CHECKPOINT_RADIUS_M)
    }
}

impl Drop for ConfirmationMachine {
    fn drop(&mut self) {
        self.stop_countdown();
    }
}

/// Re-evaluate range for the current attempt on every position fix.
async fn track_range(
    mut live: watch::Receiver<LiveSession>,
    state: watch::Sender<Attempt>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = live.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }

        let position = live.borrow_and_update().position;
        state.send_if_modified(|attempt| {
            if attempt.checkpoint.is_none() {
                return false;
            }
            let before = (attempt.phase, attempt.distance_m, attempt.within_range);
            let proximity = evaluate(position, attempt.target(), CHECKPOINT_RADIUS_M);
            attempt.apply_proximity(proximity);
            let after = (attempt.phase, attempt.distance_m, attempt.within_range);
            if before.0 != after.0 {
                tracing::debug!(from = ?before.0, to = ?after.0, distance_m = ?after.1, "Range phase changed");
            }
            before != after
        });
    }
}

/// Countdown and commit for one attempt, bound to the checkpoint code that
/// was current when the racer pressed start.
struct CommitJob {
    oracle: Arc<dyn CompletionOracle>,
    racer: Racer,
    code: String,
    generation: u64,
    state: watch::Sender<Attempt>,
    cancel: CancellationToken,
}

impl CommitJob {
    async fn run(self) {
        let mut remaining = COUNTDOWN_SECS;
        while remaining > 0 {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::debug!(code = %self.code, remaining, "Countdown cancelled");
                    return;
                }
                _ = tokio::time::sleep(TICK) => {}
            }

            remaining -= 1;
            if !self.update(|a| a.countdown = Some(remaining)) {
                return;
            }
        }

        if self.cancel.is_cancelled() || !self.update(|a| a.phase = Phase::Committing) {
            return;
        }

        let timestamp_ms = chrono::Utc::now().timestamp_millis();
        tracing::info!(code = %self.code, timestamp_ms, "Recording checkpoint");

        // The request is not aborted if the attempt is abandoned from here
        // on; its result is simply discarded by the generation check.
        let outcome = self
            .oracle
            .record_location_time(&self.racer, &self.code, timestamp_ms)
            .await;

        match outcome {
            Ok(RecordOutcome::Recorded) => {
                let committed = if self.cancel.is_cancelled() {
                    None
                } else {
                    match self.oracle.is_location_done(&self.racer, &self.code).await {
                        Ok(DoneState::Known(done)) => Some(done),
                        Ok(DoneState::Unknown) => None,
                        Err(e) => {
                            tracing::warn!(code = %self.code, error = %e, "Done-state read-back failed");
                            None
                        }
                    }
                };
                tracing::info!(code = %self.code, ?committed, "Checkpoint recorded");
                self.update(|a| {
                    a.phase = Phase::Done;
                    a.countdown = None;
                    a.committed = committed;
                });
            }
            Ok(RecordOutcome::AlreadyRecorded) => {
                tracing::info!(code = %self.code, "Checkpoint was already recorded");
                self.update(|a| {
                    a.phase = Phase::AlreadyDone;
                    a.countdown = None;
                    a.committed = Some(true);
                });
            }
            Err(e) => {
                tracing::warn!(code = %self.code, error = %e, "Recording checkpoint failed");
                self.update(|a| {
                    a.phase = Phase::Error;
                    a.countdown = None;
                    a.error = Some(e.to_string());
                });
            }
        }
    }

    fn update(&self, f: impl FnOnce(&mut Attempt)) -> bool {
        update_if_current(&self.state, self.generation, f)
    }
}
