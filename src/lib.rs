//! # agency-client
//!
//! Batching client that streams an agency's bets to the lottery server.
//!
//! Records are read from the agency CSV file, framed into a small
//! length-prefixed, pipe-delimited text protocol and sent in batches over a
//! fresh TCP connection per batch. Each batch is answered by one reply whose
//! count is reconciled against the records sent. Once the file is exhausted
//! the client finalizes and polls the server for its winners.
//!
//! ## Architecture
//!
//! - **record**: lazy reader over the CSV input
//! - **protocol**: frame building, reply assembly and decoding
//! - **transport**: connections (full writes, buffered reads)
//! - **session**: the batch / reconciliation state machine
//!
//! ## Example
//!
//! ```ignore
//! use agency_client::{RecordSource, Session, SessionConfig, TcpConnector};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> agency_client::Result<()> {
//!     let source = RecordSource::open("agency-1.csv", "1").await?;
//!     let session = Session::new(
//!         SessionConfig::new("1"),
//!         TcpConnector::new("127.0.0.1:12345"),
//!         source,
//!     );
//!
//!     let report = session.run(CancellationToken::new()).await?;
//!     println!("{}", report.summary_line());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod record;
pub mod report;
pub mod session;
pub mod transport;

pub use error::{ClientError, Result};
pub use record::{Record, RecordSource};
pub use report::SessionReport;
pub use session::{Outcome, Session, SessionConfig};
pub use transport::TcpConnector;
