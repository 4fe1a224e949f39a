// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cookie Hunt: client core for GPS checkpoint races
//!
//! Racers walk to geographic checkpoints ("cookies") and confirm each one
//! by staying within range through a short countdown, after which the
//! visit is recorded with the race CRM.

pub mod config;
pub mod db;
pub mod error;
pub mod geodesy;
pub mod logging;
pub mod models;
pub mod services;
