//! Per-session counters and reply reconciliation.

use serde::Serialize;

use crate::error::{ClientError, Result};
use crate::protocol::Reply;

/// Records sent vs. records the server acknowledged.
///
/// Owned by the session; only the reconciliation step mutates `acked`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionCounters {
    pub total_sent: u64,
    pub acked: u64,
}

/// Result of reconciling one batch reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciled {
    /// Acknowledgement applied, keep going.
    Continue,
    /// The server answered `err`; stop sending.
    Rejected(String),
}

impl SessionCounters {
    /// Apply a batch (or finalize) reply.
    ///
    /// A winner list is only valid as an answer to the winner query, so
    /// receiving one here is a protocol violation.
    pub fn reconcile(&mut self, reply: Reply) -> Result<Reconciled> {
        match reply {
            Reply::Ack(n) => {
                self.acked = self.acked.checked_add(n).ok_or_else(|| {
                    ClientError::Protocol(format!(
                        "ack {} overflows the acknowledged total {}",
                        n, self.acked
                    ))
                })?;
                Ok(Reconciled::Continue)
            }
            Reply::Rejected(detail) => Ok(Reconciled::Rejected(detail)),
            Reply::Winners(winners) => Err(ClientError::Protocol(format!(
                "winner list {:?} received before the winner query",
                winners
            ))),
        }
    }

    /// Records sent but not (yet) acknowledged.
    pub fn unacknowledged(&self) -> u64 {
        self.total_sent.saturating_sub(self.acked)
    }
}
