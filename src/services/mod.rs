// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod confirmation;
pub mod crm;
pub mod location;
pub mod proximity;
pub mod resolver;
pub mod session;

pub use confirmation::{Attempt, ConfirmationMachine, Phase, COUNTDOWN_SECS};
pub use crm::{CompletionOracle, CrmClient, DoneState, RecordOutcome};
pub use location::{
    ChannelSource, LiveSession, LocationError, LocationSource, LocationTracker, PositionFeed,
    ReplaySource, TrackingGuard, WatchOptions,
};
pub use proximity::{
    Proximity, ProximityGate, RaceGates, CHECKPOINT_RADIUS_M, START_FINISH_RADIUS_M,
};
pub use resolver::resolve_checkpoint;
