//! Batch session - sends records in batches and reconciles acknowledgements.
//!
//! The [`Session`] drives the whole exchange with the server:
//! 1. Open a fresh connection per batch and send up to `batch_size` records
//! 2. Read exactly one reply per batch and add its count to the acked total
//! 3. On end of input, send the finalize frame and read its reply
//! 4. Open one more connection, send the winner query and poll for the list
//!
//! # Example
//!
//! ```ignore
//! use agency_client::record::RecordSource;
//! use agency_client::session::{Session, SessionConfig};
//! use agency_client::transport::TcpConnector;
//! use tokio_util::sync::CancellationToken;
//!
//! let config = SessionConfig::new("1").batch_size(8);
//! let source = RecordSource::open("agency-1.csv", "1").await?;
//! let report = Session::new(config, TcpConnector::new("server:12345"), source)
//!     .run(CancellationToken::new())
//!     .await?;
//! println!("ACK: {} TOTAL SENT: {}", report.acked, report.total_sent);
//! ```

mod counters;
mod machine;

use std::time::Duration;

use serde::Serialize;

pub use counters::{Reconciled, SessionCounters};
pub use machine::Session;

/// Default number of records per batch.
pub const DEFAULT_BATCH_SIZE: usize = 8;

/// Default wall-clock budget for sending.
pub const DEFAULT_LOOP_LAPSE: Duration = Duration::from_secs(60);

/// Default pause between batches.
pub const DEFAULT_LOOP_PERIOD: Duration = Duration::from_millis(100);

/// Default number of reads while polling for winners.
pub const DEFAULT_QUERY_MAX_ATTEMPTS: u32 = 50;

/// Default first backoff step while polling for winners.
pub const DEFAULT_QUERY_BACKOFF: Duration = Duration::from_millis(100);

/// Default backoff cap while polling for winners.
pub const DEFAULT_QUERY_MAX_BACKOFF: Duration = Duration::from_secs(2);

/// How the winner poll retries when the list is not ready yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryPolicy {
    /// Maximum number of replies read before giving up.
    pub max_attempts: u32,
    /// Wait after the first empty reply; doubles on every further one.
    pub backoff: Duration,
    /// Upper bound for a single wait.
    pub max_backoff: Duration,
}

impl QueryPolicy {
    /// Wait before the read following empty reply number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(16);
        self.backoff.saturating_mul(factor).min(self.max_backoff)
    }
}

impl Default for QueryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_QUERY_MAX_ATTEMPTS,
            backoff: DEFAULT_QUERY_BACKOFF,
            max_backoff: DEFAULT_QUERY_MAX_BACKOFF,
        }
    }
}

/// Settings consumed by the session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Agency identifier, sent in every frame.
    pub client_id: String,
    /// Records per batch.
    pub batch_size: usize,
    /// Wall-clock budget; no new batch starts once it has elapsed.
    pub loop_lapse: Duration,
    /// Pause between batches.
    pub loop_period: Duration,
    /// Winner poll settings.
    pub query: QueryPolicy,
}

impl SessionConfig {
    /// Create a configuration with defaults for everything but the id.
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            loop_lapse: DEFAULT_LOOP_LAPSE,
            loop_period: DEFAULT_LOOP_PERIOD,
            query: QueryPolicy::default(),
        }
    }

    /// Set the number of records per batch.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the wall-clock budget for sending.
    pub fn loop_lapse(mut self, lapse: Duration) -> Self {
        self.loop_lapse = lapse;
        self
    }

    /// Set the pause between batches.
    pub fn loop_period(mut self, period: Duration) -> Self {
        self.loop_period = period;
        self
    }

    /// Set the winner poll policy.
    pub fn query_policy(mut self, policy: QueryPolicy) -> Self {
        self.query = policy;
        self
    }
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// All records sent, finalize acknowledged, winners received.
    Completed,
    /// The server answered `err`.
    Rejected { detail: String },
    /// Cancellation was requested between batches.
    Cancelled,
    /// The sending budget ran out before the input did.
    TimedOut,
    /// A send or receive failed on an open connection.
    TransportFailed { error: String },
    /// The winner list never became available.
    QueryExhausted { attempts: u32 },
}

impl Outcome {
    /// Short name, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Completed => "completed",
            Outcome::Rejected { .. } => "rejected",
            Outcome::Cancelled => "cancelled",
            Outcome::TimedOut => "timed_out",
            Outcome::TransportFailed { .. } => "transport_failed",
            Outcome::QueryExhausted { .. } => "query_exhausted",
        }
    }
}
