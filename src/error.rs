// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types.
//!
//! Nothing here is fatal to the process. Every failure from a remote call or
//! the location provider is caught where it happens and turned into one of
//! these variants, which the confirmation flow then stores as plain state.

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Location permission denied: {0}")]
    PermissionDenied(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Checkpoint not found: {0}")]
    CheckpointNotFound(String),

    #[error("Coordinates unavailable for checkpoint {0}")]
    CoordinatesUnavailable(String),

    #[error("No racer is logged in")]
    NotLoggedIn,

    #[error("No racer registered for {0}")]
    UnknownRacer(String),

    #[error("No race scheduled today for {0}")]
    NoRaceToday(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Session store error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Whether the failure is worth retrying by re-searching the checkpoint.
    ///
    /// Malformed CRM responses are grouped with network failures: the user
    /// cannot fix either by changing their input.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Network(_) | AppError::MalformedResponse(_))
    }
}

/// Result type alias used across the crate.
pub type Result<T> = std::result::Result<T, AppError>;
