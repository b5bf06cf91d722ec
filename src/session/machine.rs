//! Session state machine.
//!
//! ```text
//!            cancel            ┌──────────┐
//!   ┌─────────────────────────►│ Draining │────────────────┐
//!   │                          └──────────┘                │
//! ┌─┴───────┐ end of input ┌───────────┐ ack ┌──────────┐  ▼
//! │ Running ├─────────────►│ Finishing ├────►│ Querying ├─►Done
//! └─┬───────┘              └─────┬─────┘     └──────────┘  ▲
//!   │   err / budget / I/O       │ err / I/O               │
//!   └────────────────────────────┴─────────────────────────┘
//! ```

use std::time::Instant;

use tokio::io::AsyncBufRead;
use tokio_util::sync::CancellationToken;

use super::counters::{Reconciled, SessionCounters};
use super::{Outcome, SessionConfig};
use crate::error::{ClientError, Result};
use crate::protocol::{finalize_frame, frame_record, query_frame, Reply};
use crate::record::RecordSource;
use crate::report::SessionReport;
use crate::transport::{Connection, Connector};

/// Phase of the session.
#[derive(Debug)]
enum State {
    /// Sending batches.
    Running,
    /// Cancellation requested; release the connection.
    Draining,
    /// Input exhausted; finalize on the current connection.
    Finishing,
    /// Waiting for the winner list on a fresh connection.
    Querying,
    /// Terminal.
    Done(Outcome),
}

/// One run of the batch protocol against the server.
pub struct Session<C: Connector, R> {
    config: SessionConfig,
    connector: C,
    source: RecordSource<R>,
    counters: SessionCounters,
    conn: Option<Connection<C::Stream>>,
    winners: Vec<String>,
}

impl<C, R> Session<C, R>
where
    C: Connector,
    R: AsyncBufRead + Unpin,
{
    /// Create a session reading from `source` and connecting through `connector`.
    pub fn new(config: SessionConfig, connector: C, source: RecordSource<R>) -> Self {
        Self {
            config,
            connector,
            source,
            counters: SessionCounters::default(),
            conn: None,
            winners: Vec::new(),
        }
    }

    /// Drive the session to completion.
    ///
    /// `cancel` is observed between batches, where it takes precedence over
    /// the time budget, and while waiting for a pending reply after the
    /// budget ran out. A batch exchange in flight completes or fails on its
    /// own.
    ///
    /// Returns `Err` for failures that make the run meaningless (connect
    /// failure, malformed input, protocol violations). Send/receive failures
    /// and `err` replies end the run early and are reported in the outcome.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<SessionReport> {
        let started = Instant::now();
        let mut state = State::Running;

        let outcome = loop {
            let step = match state {
                State::Running => self.run_batch(started, &cancel).await,
                State::Draining => {
                    tracing::info!(client_id = %self.config.client_id, action = "cancel", result = "success");
                    self.close_connection().await;
                    Ok(State::Done(Outcome::Cancelled))
                }
                State::Finishing => self.finish().await,
                State::Querying => self.query().await,
                State::Done(outcome) => break outcome,
            };

            state = match step {
                Ok(next) => next,
                Err(e) if e.is_transport() => {
                    tracing::error!(
                        client_id = %self.config.client_id,
                        action = "exchange",
                        result = "fail",
                        error = %e
                    );
                    State::Done(Outcome::TransportFailed {
                        error: e.to_string(),
                    })
                }
                Err(e) => return Err(e),
            };
        };

        self.close_connection().await;

        let SessionCounters { total_sent, acked } = self.counters;
        if self.counters.unacknowledged() > 0 {
            tracing::warn!(
                client_id = %self.config.client_id,
                total_sent,
                acked,
                "server acknowledged fewer records than were sent"
            );
        }
        tracing::info!(
            client_id = %self.config.client_id,
            action = "loop_finished",
            result = "success",
            outcome = outcome.kind(),
            total_sent,
            acked
        );

        Ok(SessionReport {
            client_id: self.config.client_id,
            total_sent,
            acked,
            outcome,
            winners: self.winners,
        })
    }

    /// `Running`: one batch on a fresh connection.
    async fn run_batch(&mut self, started: Instant, cancel: &CancellationToken) -> Result<State> {
        if cancel.is_cancelled() {
            return Ok(State::Draining);
        }
        if started.elapsed() >= self.config.loop_lapse {
            tracing::info!(client_id = %self.config.client_id, action = "timeout_detected", result = "success");
            return self.drain_after_timeout(cancel).await;
        }

        self.close_connection().await;
        let conn = self.connector.connect().await?;
        let conn = self.conn.insert(conn);

        let batch_size = self.config.batch_size;
        for i in 0..batch_size {
            let Some(record) = self.source.next_record().await? else {
                tracing::info!(
                    client_id = %self.config.client_id,
                    action = "read_input",
                    result = "exhausted",
                    lines = self.source.lines_read()
                );
                return Ok(State::Finishing);
            };

            conn.send(&frame_record(&record, i + 1 == batch_size)).await?;
            self.counters.total_sent += 1;
        }

        let reply = conn.recv().await?;
        tracing::info!(
            client_id = %self.config.client_id,
            action = "receive_message",
            result = "success",
            reply = reply.kind()
        );
        if let Reconciled::Rejected(detail) = self.counters.reconcile(reply)? {
            tracing::info!(client_id = %self.config.client_id, action = "batch", result = "rejected", detail = %detail);
            return Ok(State::Done(Outcome::Rejected { detail }));
        }

        tokio::select! {
            _ = tokio::time::sleep(self.config.loop_period) => {}
            _ = cancel.cancelled() => {}
        }
        Ok(State::Running)
    }

    /// Budget exhausted: pick up a reply still in flight, then stop.
    ///
    /// The extra read is abandoned if cancellation arrives while it waits.
    async fn drain_after_timeout(&mut self, cancel: &CancellationToken) -> Result<State> {
        if self.counters.unacknowledged() > 0 {
            if let Some(conn) = self.conn.as_mut() {
                let received = tokio::select! {
                    received = conn.recv() => received,
                    _ = cancel.cancelled() => return Ok(State::Draining),
                };
                match received {
                    Ok(reply) => {
                        if let Reconciled::Rejected(detail) = self.counters.reconcile(reply)? {
                            tracing::info!(client_id = %self.config.client_id, detail = %detail, "pending batch rejected");
                        }
                    }
                    Err(e) if e.is_transport() => {
                        tracing::warn!(client_id = %self.config.client_id, error = %e, "no pending reply after timeout");
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(State::Done(Outcome::TimedOut))
    }

    /// `Finishing`: tell the server this agency is done.
    async fn finish(&mut self) -> Result<State> {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => self.connector.connect().await?,
        };
        let conn = self.conn.insert(conn);

        conn.send(&finalize_frame(&self.config.client_id)).await?;
        tracing::info!(client_id = %self.config.client_id, action = "finalize", result = "success");

        let reply = conn.recv().await?;
        match self.counters.reconcile(reply)? {
            Reconciled::Continue => Ok(State::Querying),
            Reconciled::Rejected(detail) => {
                tracing::info!(client_id = %self.config.client_id, action = "finalize", result = "rejected", detail = %detail);
                Ok(State::Done(Outcome::Rejected { detail }))
            }
        }
    }

    /// `Querying`: ask for the winners and poll until the list is non-empty.
    async fn query(&mut self) -> Result<State> {
        self.close_connection().await;
        let conn = self.connector.connect().await?;
        let conn = self.conn.insert(conn);

        conn.send(&query_frame(&self.config.client_id)).await?;

        let policy = self.config.query;
        for attempt in 0..policy.max_attempts {
            match conn.recv().await? {
                Reply::Winners(winners) if !winners.is_empty() => {
                    tracing::info!(
                        client_id = %self.config.client_id,
                        action = "query_winners",
                        result = "success",
                        count = winners.len()
                    );
                    self.winners = winners;
                    return Ok(State::Done(Outcome::Completed));
                }
                Reply::Winners(_) => {
                    tracing::debug!(client_id = %self.config.client_id, attempt, "winners not available yet");
                }
                Reply::Rejected(detail) => {
                    tracing::info!(client_id = %self.config.client_id, action = "query_winners", result = "rejected", detail = %detail);
                    return Ok(State::Done(Outcome::Rejected { detail }));
                }
                Reply::Ack(n) => {
                    return Err(ClientError::Protocol(format!(
                        "ack {} received while waiting for winners",
                        n
                    )))
                }
            }

            if attempt + 1 < policy.max_attempts {
                tokio::time::sleep(policy.delay(attempt)).await;
            }
        }

        tracing::warn!(
            client_id = %self.config.client_id,
            action = "query_winners",
            result = "fail",
            attempts = policy.max_attempts
        );
        Ok(State::Done(Outcome::QueryExhausted {
            attempts: policy.max_attempts,
        }))
    }

    /// Close the open connection, if any.
    async fn close_connection(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err(e) = conn.close().await {
                tracing::debug!(client_id = %self.config.client_id, error = %e, "close failed");
            }
        }
    }
}
