//! Session report and stdout output.
//!
//! Logs go to stderr; stdout carries only the final report, either as the
//! human-readable counters line or as a single JSON line.
//!
//! # Example
//!
//! ```ignore
//! use agency_client::report::write_stdout_json;
//!
//! let report = session.run(cancel).await?;
//! write_stdout_json(&report)?;
//! ```

use std::io::Write;

use serde::Serialize;

use crate::session::Outcome;

/// Final counters and result of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionReport {
    pub client_id: String,
    pub total_sent: u64,
    pub acked: u64,
    pub outcome: Outcome,
    pub winners: Vec<String>,
}

impl SessionReport {
    /// Human-readable counters line.
    pub fn summary_line(&self) -> String {
        format!("ACK: {} TOTAL SENT: {}", self.acked, self.total_sent)
    }
}

/// Write a line to stdout.
///
/// Writes the string followed by a single `\n` and flushes.
pub fn write_stdout_line(line: &str) -> std::io::Result<()> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    handle.write_all(line.as_bytes())?;
    handle.write_all(b"\n")?;
    handle.flush()?;
    Ok(())
}

/// Write a value to stdout as a single JSON line.
pub fn write_stdout_json<T: Serialize>(value: &T) -> crate::error::Result<()> {
    let json = serde_json::to_string(value)?;
    write_stdout_line(&json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(outcome: Outcome) -> SessionReport {
        SessionReport {
            client_id: "1".into(),
            total_sent: 10,
            acked: 8,
            outcome,
            winners: vec!["5".into(), "12".into()],
        }
    }

    #[test]
    fn test_summary_line() {
        assert_eq!(
            report(Outcome::Completed).summary_line(),
            "ACK: 8 TOTAL SENT: 10"
        );
    }

    #[test]
    fn test_report_json_shape() {
        let value = serde_json::to_value(report(Outcome::TimedOut)).unwrap();

        assert_eq!(value["client_id"], "1");
        assert_eq!(value["total_sent"], 10);
        assert_eq!(value["acked"], 8);
        assert_eq!(value["outcome"]["kind"], "timed_out");
        assert_eq!(value["winners"][1], "12");
    }

    #[test]
    fn test_write_stdout_json_serializes() {
        let result = write_stdout_json(&report(Outcome::Cancelled));
        assert!(result.is_ok());
    }
}
