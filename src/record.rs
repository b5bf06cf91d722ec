//! Record source - lazy, line-at-a-time reader over the agency CSV file.
//!
//! Each line carries five comma-separated fields:
//! `first_name,last_name,national_id,birth_date,chosen_number`.
//! The agency identifier is not part of the file; it is the client's own id.
//!
//! # Example
//!
//! ```ignore
//! use agency_client::record::RecordSource;
//!
//! let mut source = RecordSource::open("agency-1.csv", "1").await?;
//! while let Some(record) = source.next_record().await? {
//!     println!("{}", record.national_id);
//! }
//! ```

use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::error::{ClientError, Result};

/// Number of comma-separated fields on every input line.
pub const FIELDS_PER_LINE: usize = 5;

/// One bet, as read from the agency file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub agency_id: String,
    pub first_name: String,
    pub last_name: String,
    pub national_id: String,
    pub birth_date: String,
    pub chosen_number: String,
}

impl Record {
    /// Parse one input line (terminators already stripped or not).
    ///
    /// `line_no` is only used for error reporting.
    pub fn parse_line(agency_id: &str, line: &str, line_no: usize) -> Result<Self> {
        let line = line.trim_end_matches(['\n', '\r']);
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != FIELDS_PER_LINE {
            return Err(ClientError::MalformedRecord {
                line: line_no,
                found: fields.len(),
            });
        }

        Ok(Self {
            agency_id: agency_id.to_string(),
            first_name: fields[0].to_string(),
            last_name: fields[1].to_string(),
            national_id: fields[2].to_string(),
            birth_date: fields[3].to_string(),
            chosen_number: fields[4].to_string(),
        })
    }
}

/// Non-restartable source of records.
///
/// `next_record` yields `Ok(None)` at end of input, and keeps yielding it
/// afterwards without touching the reader again.
pub struct RecordSource<R> {
    reader: R,
    agency_id: String,
    line: String,
    line_no: usize,
    exhausted: bool,
}

impl RecordSource<BufReader<File>> {
    /// Open the agency file at `path`.
    pub async fn open(path: impl AsRef<Path>, agency_id: &str) -> Result<Self> {
        let file = File::open(path).await?;
        Ok(Self::new(BufReader::new(file), agency_id))
    }
}

impl<R: AsyncBufRead + Unpin> RecordSource<R> {
    /// Wrap an already-buffered reader.
    pub fn new(reader: R, agency_id: &str) -> Self {
        Self {
            reader,
            agency_id: agency_id.to_string(),
            line: String::new(),
            line_no: 0,
            exhausted: false,
        }
    }

    /// Read and parse the next record.
    pub async fn next_record(&mut self) -> Result<Option<Record>> {
        if self.exhausted {
            return Ok(None);
        }

        self.line.clear();
        let n = self.reader.read_line(&mut self.line).await?;
        if n == 0 {
            self.exhausted = true;
            return Ok(None);
        }
        self.line_no += 1;

        Record::parse_line(&self.agency_id, &self.line, self.line_no).map(Some)
    }

    /// Number of lines consumed so far.
    pub fn lines_read(&self) -> usize {
        self.line_no
    }
}
