//! Subscriber setup for the `tracing` events the engine emits.
//!
//! The engine itself only emits events; installing a subscriber is left to
//! the embedding process. These helpers cover the common cases.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::SubscriberBuilder;

use crate::ApplyError;

/// Level used when neither `RUST_LOG` nor an explicit level is given.
pub const DEFAULT_LEVEL: &str = "info";

/// Filter directive scoping `level` to this crate.
#[must_use]
pub fn filter_spec(level: &str) -> String {
    format!("applyrule={level}")
}

fn env_filter(level: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_spec(level.unwrap_or(DEFAULT_LEVEL))))
}

/// Install a global `fmt` subscriber. `RUST_LOG` takes precedence over
/// `level`.
///
/// # Errors
///
/// Returns [`ApplyError::Logging`] if a global subscriber is already set.
pub fn init(level: Option<&str>) -> Result<(), ApplyError> {
    SubscriberBuilder::default()
        .with_env_filter(env_filter(level))
        .with_target(true)
        .try_init()
        .map_err(|err| ApplyError::Logging(err.to_string()))
}

/// Install a subscriber that writes through the test harness's capture.
/// Safe to call from every test; only the first call takes effect.
pub fn init_for_tests() {
    let _ = SubscriberBuilder::default()
        .with_env_filter(env_filter(Some("debug")))
        .with_test_writer()
        .try_init();
}
