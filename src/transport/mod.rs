//! Transport module - outbound connections to the server.
//!
//! Provides:
//! - [`Connector`]: opens a fresh connection per batch (TCP in production)
//! - [`Connection`]: full writes, buffered reply reads, consuming close

mod connection;

pub use connection::{Connection, Connector, TcpConnector};
