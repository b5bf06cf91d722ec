//! Client configuration from flags and environment.
//!
//! Every option can be given as a flag or through its `CLI_*` environment
//! variable; flags win.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::error::{ClientError, Result};
use crate::logging::parse_level;
use crate::session::{QueryPolicy, SessionConfig};

/// Agency client configuration.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "agency-client",
    version,
    about = "Send agency bets to the lottery server in batches"
)]
pub struct ClientConfig {
    /// Agency identifier.
    #[arg(long, env = "CLI_ID")]
    pub id: String,

    /// Server address (`host:port`).
    #[arg(long, env = "CLI_SERVER_ADDRESS", default_value = "server:12345")]
    pub server_address: String,

    /// Time budget for sending batches, in milliseconds.
    #[arg(long, env = "CLI_LOOP_LAPSE_MS", default_value_t = 60_000)]
    pub loop_lapse_ms: u64,

    /// Pause between batches, in milliseconds.
    #[arg(long, env = "CLI_LOOP_PERIOD_MS", default_value_t = 100)]
    pub loop_period_ms: u64,

    /// Records per batch.
    #[arg(long, env = "CLI_BATCH_SIZE", default_value_t = 8)]
    pub batch_size: usize,

    /// Bets file. Defaults to `agency-{id}.csv`.
    #[arg(long, env = "CLI_DATA_FILE")]
    pub data_file: Option<PathBuf>,

    /// Maximum replies read while waiting for the winner list.
    #[arg(long, env = "CLI_QUERY_MAX_ATTEMPTS", default_value_t = 50)]
    pub query_max_attempts: u32,

    /// First wait between winner polls, in milliseconds.
    #[arg(long, env = "CLI_QUERY_BACKOFF_MS", default_value_t = 100)]
    pub query_backoff_ms: u64,

    /// Longest wait between winner polls, in milliseconds.
    #[arg(long, env = "CLI_QUERY_BACKOFF_MAX_MS", default_value_t = 2_000)]
    pub query_backoff_max_ms: u64,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "CLI_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Print the final report as one JSON line.
    #[arg(long, env = "CLI_JSON_REPORT")]
    pub json_report: bool,
}

impl ClientConfig {
    /// Reject values the session cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(ClientError::Config("client id must not be empty".into()));
        }
        if self.id.contains(['|', '\n']) {
            return Err(ClientError::Config(format!(
                "client id {:?} contains a protocol delimiter",
                self.id
            )));
        }
        if self.batch_size == 0 {
            return Err(ClientError::Config("batch size must be at least 1".into()));
        }
        if self.query_max_attempts == 0 {
            return Err(ClientError::Config(
                "query max attempts must be at least 1".into(),
            ));
        }
        parse_level(&self.log_level)?;
        Ok(())
    }

    /// Path of the bets file.
    pub fn data_path(&self) -> PathBuf {
        self.data_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("agency-{}.csv", self.id)))
    }

    /// Settings for the session.
    pub fn session(&self) -> SessionConfig {
        SessionConfig::new(self.id.clone())
            .batch_size(self.batch_size)
            .loop_lapse(Duration::from_millis(self.loop_lapse_ms))
            .loop_period(Duration::from_millis(self.loop_period_ms))
            .query_policy(QueryPolicy {
                max_attempts: self.query_max_attempts,
                backoff: Duration::from_millis(self.query_backoff_ms),
                max_backoff: Duration::from_millis(self.query_backoff_max_ms),
            })
    }
}
