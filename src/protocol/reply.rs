//! Server replies.
//!
//! A reply is one text line `{tag} {payload}`:
//!
//! | tag    | payload                          | variant              |
//! |--------|----------------------------------|----------------------|
//! | `err`  | error detail                     | [`Reply::Rejected`]  |
//! | `\|ack` | decimal count of stored records  | [`Reply::Ack`]       |
//! | `\|win` | space-separated winner ids       | [`Reply::Winners`]   |
//!
//! Replies are decoded once, at the transport boundary, into the closed
//! [`Reply`] enum.

use crate::error::{ClientError, Result};

/// Tag of an error reply.
pub const ERROR_TAG: &str = "err";
/// Tag of an acknowledgement reply.
pub const ACK_TAG: &str = "|ack";
/// Tag of a winner-list reply.
pub const WINNERS_TAG: &str = "|win";

/// A decoded server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The server stored `n` records.
    Ack(u64),
    /// The server refused the exchange.
    Rejected(String),
    /// Winner ids for this agency. Empty means "not available yet".
    Winners(Vec<String>),
}

impl Reply {
    /// Decode one reply line (terminator already stripped).
    ///
    /// An `|ack` payload that is not a decimal count is
    /// [`ClientError::InvalidAck`]; an unknown tag is [`ClientError::Protocol`].
    pub fn decode(line: &str) -> Result<Self> {
        let (tag, payload) = match line.split_once(' ') {
            Some((tag, payload)) => (tag, payload.trim()),
            None => (line.trim(), ""),
        };

        match tag {
            ERROR_TAG => Ok(Reply::Rejected(payload.to_string())),
            ACK_TAG => payload
                .parse::<u64>()
                .map(Reply::Ack)
                .map_err(|_| ClientError::InvalidAck(payload.to_string())),
            WINNERS_TAG => Ok(Reply::Winners(
                payload.split_whitespace().map(str::to_string).collect(),
            )),
            other => Err(ClientError::Protocol(format!(
                "unknown reply tag {:?} in {:?}",
                other, line
            ))),
        }
    }

    /// Short name of the variant, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Reply::Ack(_) => "ack",
            Reply::Rejected(_) => "err",
            Reply::Winners(_) => "win",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ack() {
        assert_eq!(Reply::decode("|ack 8").unwrap(), Reply::Ack(8));
        assert_eq!(Reply::decode("|ack 0").unwrap(), Reply::Ack(0));
    }

    #[test]
    fn test_decode_error() {
        assert_eq!(
            Reply::decode("err connection_refused").unwrap(),
            Reply::Rejected("connection_refused".into())
        );
        assert_eq!(Reply::decode("err").unwrap(), Reply::Rejected(String::new()));
    }

    #[test]
    fn test_decode_winners() {
        assert_eq!(
            Reply::decode("|win 5 12 7").unwrap(),
            Reply::Winners(vec!["5".into(), "12".into(), "7".into()])
        );
    }

    #[test]
    fn test_decode_empty_winners() {
        assert_eq!(Reply::decode("|win").unwrap(), Reply::Winners(vec![]));
        assert_eq!(Reply::decode("|win ").unwrap(), Reply::Winners(vec![]));
    }

    #[test]
    fn test_non_numeric_ack_is_invalid() {
        let err = Reply::decode("|ack eight").unwrap_err();
        assert!(matches!(err, ClientError::InvalidAck(ref p) if p == "eight"));

        assert!(matches!(
            Reply::decode("|ack").unwrap_err(),
            ClientError::InvalidAck(_)
        ));
    }

    #[test]
    fn test_unknown_tag() {
        let err = Reply::decode("|nope 1").unwrap_err();
        assert!(matches!(err, ClientError::Protocol(_)));

        // Tags are exact: an ack without its leading pipe is not an ack.
        assert!(Reply::decode("ack 3").is_err());
    }

    #[test]
    fn test_kind() {
        assert_eq!(Reply::Ack(1).kind(), "ack");
        assert_eq!(Reply::Rejected(String::new()).kind(), "err");
        assert_eq!(Reply::Winners(vec![]).kind(), "win");
    }
}
