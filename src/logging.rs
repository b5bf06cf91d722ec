//! Logging setup.
//!
//! Installs a `tracing-subscriber` fmt layer writing to stderr, so stdout
//! stays reserved for the session report. `RUST_LOG` directives are applied
//! on top of the configured level.

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{ClientError, Result};

/// Parse a level name (`trace`, `debug`, `info`, `warn`, `error`).
pub fn parse_level(level: &str) -> Result<Level> {
    Level::from_str(level)
        .map_err(|_| ClientError::Config(format!("unknown log level {:?}", level)))
}

/// Install the global subscriber.
///
/// Fails if the level is unknown or a subscriber is already installed.
pub fn init(level: &str) -> Result<()> {
    let level = parse_level(level)?;
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()
        .map_err(|e| ClientError::Config(format!("failed to install logger: {}", e)))
}
