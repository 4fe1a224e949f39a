// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Live location tracking.
//!
//! One [`LocationTracker`] owns the platform subscription and publishes the
//! latest fix on a watch channel, so any number of proximity gates can read
//! it without opening another OS-level listener. The subscription is
//! reference-counted: the first [`TrackingGuard`] starts it and dropping the
//! last one tears it down.

use crate::error::AppError;
use crate::models::Coordinate;
use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

/// How often the platform should deliver fixes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatchOptions {
    /// Deliver at least this often
    pub interval: Duration,
    /// ...or whenever the device moves this far (meters)
    pub distance_m: f64,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            distance_m: 1.0,
        }
    }
}

/// Errors from the platform location provider.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LocationError {
    #[error("Permission to access location was denied")]
    PermissionDenied,

    #[error("Location unavailable: {0}")]
    Unavailable(String),
}

impl From<LocationError> for AppError {
    fn from(err: LocationError) -> Self {
        let message = err.to_string();
        match err {
            LocationError::PermissionDenied => AppError::PermissionDenied(message),
            LocationError::Unavailable(_) => AppError::Internal(anyhow::anyhow!(message)),
        }
    }
}

/// Platform location provider.
#[async_trait]
pub trait LocationSource: Send + Sync + 'static {
    /// Ask for foreground location permission.
    async fn request_permission(&self) -> Result<(), LocationError>;

    /// Open a position subscription. Dropping the stream releases it.
    fn watch_position(
        &self,
        options: WatchOptions,
    ) -> Result<BoxStream<'static, Coordinate>, LocationError>;
}

/// Snapshot of live tracking state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveSession {
    /// Latest fix, `None` until the first one arrives
    pub position: Option<Coordinate>,
    /// Permission granted and subscription running
    pub enabled: bool,
    /// Why tracking is disabled, if it failed
    pub error: Option<String>,
}

struct Subscription {
    users: usize,
    cancel: Option<CancellationToken>,
}

/// Shared owner of the platform location subscription.
pub struct LocationTracker {
    source: Arc<dyn LocationSource>,
    options: WatchOptions,
    state: watch::Sender<LiveSession>,
    subscription: Mutex<Subscription>,
}

impl LocationTracker {
    pub fn new(source: Arc<dyn LocationSource>) -> Arc<Self> {
        Self::with_options(source, WatchOptions::default())
    }

    pub fn with_options(source: Arc<dyn LocationSource>, options: WatchOptions) -> Arc<Self> {
        let (state, _) = watch::channel(LiveSession::default());
        Arc::new(Self {
            source,
            options,
            state,
            subscription: Mutex::new(Subscription {
                users: 0,
                cancel: None,
            }),
        })
    }

    /// Register a user of the tracker, starting the subscription if this is
    /// the first one. Must be called inside a Tokio runtime.
    pub fn start(self: &Arc<Self>) -> TrackingGuard {
        let mut sub = self.lock_subscription();
        sub.users += 1;

        if sub.cancel.is_none() {
            let cancel = CancellationToken::new();
            sub.cancel = Some(cancel.clone());
            tracing::info!("Starting location tracking");
            tokio::spawn(run_subscription(
                self.source.clone(),
                self.options,
                self.state.clone(),
                cancel,
            ));
        }

        TrackingGuard {
            tracker: self.clone(),
        }
    }

    /// Receiver that observes every published fix.
    pub fn subscribe(&self) -> watch::Receiver<LiveSession> {
        self.state.subscribe()
    }

    pub fn current(&self) -> LiveSession {
        self.state.borrow().clone()
    }

    pub fn position(&self) -> Option<Coordinate> {
        self.state.borrow().position
    }

    /// Number of live guards.
    pub fn users(&self) -> usize {
        self.lock_subscription().users
    }

    fn stop_one(&self) {
        let mut sub = self.lock_subscription();
        sub.users = sub.users.saturating_sub(1);
        if sub.users > 0 {
            return;
        }
        if let Some(cancel) = sub.cancel.take() {
            tracing::info!("Stopping location tracking");
            cancel.cancel();
            self.state.send_replace(LiveSession::default());
        }
    }

    fn lock_subscription(&self) -> std::sync::MutexGuard<'_, Subscription> {
        // Plain counters inside; a poisoned lock still holds valid data.
        self.subscription
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Keeps the tracker running while alive.
pub struct TrackingGuard {
    tracker: Arc<LocationTracker>,
}

impl Drop for TrackingGuard {
    fn drop(&mut self) {
        self.tracker.stop_one();
    }
}

async fn run_subscription(
    source: Arc<dyn LocationSource>,
    options: WatchOptions,
    state: watch::Sender<LiveSession>,
    cancel: CancellationToken,
) {
    let disable = |err: LocationError| {
        tracing::warn!(error = %err, "Location tracking disabled");
        publish(&state, &cancel, |s| {
            s.enabled = false;
            s.error = Some(err.to_string());
        });
    };

    let permission = tokio::select! {
        _ = cancel.cancelled() => return,
        result = source.request_permission() => result,
    };
    if let Err(err) = permission {
        disable(err);
        return;
    }

    let mut positions = match source.watch_position(options) {
        Ok(stream) => stream,
        Err(err) => {
            disable(err);
            return;
        }
    };

    let enabled = publish(&state, &cancel, |s| {
        s.enabled = true;
        s.error = None;
    });
    if !enabled {
        return;
    }

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = positions.next() => next,
        };

        match next {
            Some(position) => {
                tracing::trace!(
                    latitude = position.latitude,
                    longitude = position.longitude,
                    "Location fix"
                );
                if !publish(&state, &cancel, |s| s.position = Some(position)) {
                    break;
                }
            }
            None => {
                tracing::debug!("Location stream ended");
                break;
            }
        }
    }
}

/// Apply `f` unless the subscription was cancelled.
///
/// The check runs under the channel's write lock, and `stop_one` cancels
/// before it resets the session, so a cancelled task can never write over
/// the reset.
fn publish(
    state: &watch::Sender<LiveSession>,
    cancel: &CancellationToken,
    f: impl FnOnce(&mut LiveSession),
) -> bool {
    state.send_if_modified(|s| {
        if cancel.is_cancelled() {
            return false;
        }
        f(s);
        true
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Sources
// ─────────────────────────────────────────────────────────────────────────────

/// Source fed by the embedding platform through a [`PositionFeed`].
///
/// The platform applies its own [`WatchOptions`]; this source forwards
/// whatever it is given.
pub struct ChannelSource {
    positions: broadcast::Sender<Coordinate>,
    permission: watch::Receiver<bool>,
}

/// Platform-side handle for a [`ChannelSource`].
#[derive(Clone)]
pub struct PositionFeed {
    positions: broadcast::Sender<Coordinate>,
    permission: Arc<watch::Sender<bool>>,
}

impl ChannelSource {
    pub fn new() -> (Self, PositionFeed) {
        let (positions, _) = broadcast::channel(64);
        let (permission_tx, permission) = watch::channel(true);
        (
            Self {
                positions: positions.clone(),
                permission,
            },
            PositionFeed {
                positions,
                permission: Arc::new(permission_tx),
            },
        )
    }
}

impl PositionFeed {
    /// Deliver a fix. Dropped when nobody is subscribed.
    pub fn push(&self, position: Coordinate) {
        let _ = self.positions.send(position);
    }

    /// Record the user's answer to the permission prompt.
    pub fn set_permission(&self, granted: bool) {
        self.permission.send_replace(granted);
    }
}

#[async_trait]
impl LocationSource for ChannelSource {
    async fn request_permission(&self) -> Result<(), LocationError> {
        if *self.permission.borrow() {
            Ok(())
        } else {
            Err(LocationError::PermissionDenied)
        }
    }

    fn watch_position(
        &self,
        _options: WatchOptions,
    ) -> Result<BoxStream<'static, Coordinate>, LocationError> {
        let rx = self.positions.subscribe();
        Ok(stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(position) => return Some((position, rx)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Location consumer lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .boxed())
    }
}

/// Replays a recorded track, one point per `interval`.
pub struct ReplaySource {
    track: Vec<Coordinate>,
    interval: Duration,
}

impl ReplaySource {
    pub fn new(track: Vec<Coordinate>, interval: Duration) -> Self {
        Self { track, interval }
    }
}

#[async_trait]
impl LocationSource for ReplaySource {
    async fn request_permission(&self) -> Result<(), LocationError> {
        Ok(())
    }

    fn watch_position(
        &self,
        _options: WatchOptions,
    ) -> Result<BoxStream<'static, Coordinate>, LocationError> {
        if self.track.is_empty() {
            return Err(LocationError::Unavailable("empty track".to_string()));
        }
        let interval = self.interval;
        Ok(stream::iter(self.track.clone())
            .then(move |position| async move {
                tokio::time::sleep(interval).await;
                position
            })
            .boxed())
    }
}
