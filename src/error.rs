//! Error types for agency-client.

use thiserror::Error;

/// Main error type for all client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// I/O error while reading the local record file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error (session report only).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Could not establish the connection to the server.
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Write failed, possibly after part of the frame went out.
    #[error("Send failed: {0}")]
    Send(#[source] std::io::Error),

    /// Read failed while waiting for a reply.
    #[error("Receive failed: {0}")]
    Receive(#[source] std::io::Error),

    /// Peer closed the connection before a complete reply arrived.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Input line does not carry the expected number of fields.
    #[error("Malformed record on line {line}: expected 5 fields, found {found}")]
    MalformedRecord { line: usize, found: usize },

    /// Data frame could not be decoded.
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Acknowledgement payload is not a decimal count.
    #[error("Invalid acknowledgement count: {0:?}")]
    InvalidAck(String),

    /// Reply with an unknown tag, or a reply that is not valid in the current phase.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl ClientError {
    /// Whether this is a send/receive failure on an established connection.
    ///
    /// These end the session early but are reported through the session
    /// outcome instead of being returned as errors.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ClientError::Send(_) | ClientError::Receive(_) | ClientError::ConnectionClosed
        )
    }
}

/// Result type alias using ClientError.
pub type Result<T> = std::result::Result<T, ClientError>;
