//! Tracing subscriber setup for binaries and test harnesses embedding the
//! engine.
//!
//! The engine itself only emits `tracing` events; installing a subscriber
//! is left to the host. [`init_logging`] is the stock setup: an
//! `EnvFilter` read from `RUST_LOG` (falling back to the given directive)
//! feeding the fmt layer.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::error::SyncError;

/// Install the global tracing subscriber.
///
/// `default_directive` applies when `RUST_LOG` is unset or invalid, e.g.
/// `"info"` or `"taskboard_sync=debug"`.
///
/// # Errors
///
/// Returns [`SyncError::Configuration`] if a global subscriber is already
/// installed.
pub fn init_logging(default_directive: &str) -> Result<(), SyncError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| SyncError::Configuration(format!("failed to install subscriber: {e}")))
}
