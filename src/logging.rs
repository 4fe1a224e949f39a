// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Structured logging setup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a JSON `tracing` subscriber.
///
/// `RUST_LOG` is honored on top of `cookie_hunt=debug,info`. Calling this
/// again after a subscriber is installed does nothing.
pub fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = EnvFilter::from_default_env()
        .add_directive("cookie_hunt=debug".parse().expect("static directive"))
        .add_directive("info".parse().expect("static directive"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .try_init();
}
