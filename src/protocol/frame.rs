//! Message framer - builds the frames the client writes.
//!
//! Data frame layout:
//!
//! ```text
//! {is_last} {body_len}|AGENCIA {id}|NOMBRE {v}|APELLIDO {v}|DNI {v}|NACIMIENTO {v}|NUMERO {v}|$\n
//! └──── header ──────┘└──────────────────────── body (body_len bytes) ─────────────────────┘
//! ```
//!
//! Control frames are `end|{id}\n` (finalize) and `win|{id}\n` (winner query).
//!
//! # Example
//!
//! ```
//! use agency_client::protocol::{decode_data_frame, frame_record};
//! use agency_client::record::Record;
//!
//! let record = Record::parse_line("1", "Ana,Gomez,123,1990-01-01,42", 1).unwrap();
//! let bytes = frame_record(&record, true);
//! assert!(bytes.starts_with(b"1 "));
//!
//! let (is_last, decoded) = decode_data_frame(&bytes).unwrap();
//! assert!(is_last);
//! assert_eq!(decoded, record);
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{ClientError, Result};
use crate::record::Record;

/// Field tags of a data frame body, in wire order.
pub mod tags {
    pub const AGENCY: &str = "AGENCIA";
    pub const FIRST_NAME: &str = "NOMBRE";
    pub const LAST_NAME: &str = "APELLIDO";
    pub const NATIONAL_ID: &str = "DNI";
    pub const BIRTH_DATE: &str = "NACIMIENTO";
    pub const CHOSEN_NUMBER: &str = "NUMERO";

    /// All tags in the order they appear on the wire.
    pub const ORDER: [&str; 6] = [
        AGENCY,
        FIRST_NAME,
        LAST_NAME,
        NATIONAL_ID,
        BIRTH_DATE,
        CHOSEN_NUMBER,
    ];
}

/// Body terminator.
pub const BODY_TRAILER: &str = "$";

/// Prefix of the finalize frame.
pub const FINALIZE_TAG: &str = "end";

/// Prefix of the winner query frame.
pub const QUERY_TAG: &str = "win";

/// Build the body of a data frame (everything after the header).
fn encode_body(record: &Record) -> String {
    let values = [
        &record.agency_id,
        &record.first_name,
        &record.last_name,
        &record.national_id,
        &record.birth_date,
        &record.chosen_number,
    ];

    let mut body = String::with_capacity(128);
    for (tag, value) in tags::ORDER.iter().zip(values) {
        body.push('|');
        body.push_str(tag);
        body.push(' ');
        body.push_str(value);
    }
    body.push('|');
    body.push_str(BODY_TRAILER);
    body
}

/// Frame one record.
///
/// `is_last` marks the final record of a batch; the server uses it only for
/// its own bookkeeping.
pub fn frame_record(record: &Record, is_last: bool) -> Bytes {
    let body = encode_body(record);
    let header = format!("{} {}", u8::from(is_last), body.len());

    let mut buf = BytesMut::with_capacity(header.len() + body.len() + 1);
    buf.put_slice(header.as_bytes());
    buf.put_slice(body.as_bytes());
    buf.put_u8(b'\n');
    buf.freeze()
}

/// Build a control frame `{tag}|{client_id}\n`.
fn control_frame(tag: &str, client_id: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(tag.len() + client_id.len() + 2);
    buf.put_slice(tag.as_bytes());
    buf.put_u8(b'|');
    buf.put_slice(client_id.as_bytes());
    buf.put_u8(b'\n');
    buf.freeze()
}

/// Frame announcing that this client has no more records.
pub fn finalize_frame(client_id: &str) -> Bytes {
    control_frame(FINALIZE_TAG, client_id)
}

/// Frame asking the server for this agency's winners.
pub fn query_frame(client_id: &str) -> Bytes {
    control_frame(QUERY_TAG, client_id)
}

/// Decode a data frame back into its `is_last` flag and record.
///
/// Validates the flag, the declared body length, every field tag and the
/// trailer. A trailing newline is accepted but not required.
pub fn decode_data_frame(frame: &[u8]) -> Result<(bool, Record)> {
    let text = std::str::from_utf8(frame)
        .map_err(|e| ClientError::MalformedFrame(format!("not UTF-8: {}", e)))?;
    let text = text.strip_suffix('\n').unwrap_or(text);

    let body_start = text
        .find('|')
        .ok_or_else(|| ClientError::MalformedFrame("missing body".into()))?;
    let (header, body) = text.split_at(body_start);

    let (flag, declared_len) = header
        .split_once(' ')
        .ok_or_else(|| ClientError::MalformedFrame(format!("bad header {:?}", header)))?;
    let is_last = match flag {
        "0" => false,
        "1" => true,
        other => {
            return Err(ClientError::MalformedFrame(format!(
                "bad is_last flag {:?}",
                other
            )))
        }
    };
    let declared_len: usize = declared_len
        .parse()
        .map_err(|_| ClientError::MalformedFrame(format!("bad length {:?}", declared_len)))?;
    if declared_len != body.len() {
        return Err(ClientError::MalformedFrame(format!(
            "declared length {} but body has {} bytes",
            declared_len,
            body.len()
        )));
    }

    let fields = body
        .strip_prefix('|')
        .and_then(|b| b.strip_suffix(BODY_TRAILER))
        .and_then(|b| b.strip_suffix('|'))
        .ok_or_else(|| ClientError::MalformedFrame("body not delimited by '|...|$'".into()))?;

    let mut values = Vec::with_capacity(tags::ORDER.len());
    let mut parts = fields.split('|');
    for tag in tags::ORDER {
        let part = parts
            .next()
            .ok_or_else(|| ClientError::MalformedFrame(format!("missing field {}", tag)))?;
        let value = part
            .strip_prefix(tag)
            .and_then(|v| v.strip_prefix(' '))
            .ok_or_else(|| {
                ClientError::MalformedFrame(format!("expected field {}, got {:?}", tag, part))
            })?;
        values.push(value.to_string());
    }
    if parts.next().is_some() {
        return Err(ClientError::MalformedFrame("unexpected extra fields".into()));
    }

    let mut values = values.into_iter();
    let mut next = || values.next().unwrap_or_default();
    let record = Record {
        agency_id: next(),
        first_name: next(),
        last_name: next(),
        national_id: next(),
        birth_date: next(),
        chosen_number: next(),
    };

    Ok((is_last, record))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Record {
        Record::parse_line("1", "Santiago Lionel,Lorca,30904465,1999-03-17,7574", 1).unwrap()
    }

    #[test]
    fn test_frame_record_exact_bytes() {
        let bytes = frame_record(&sample(), false);
        let body = "|AGENCIA 1|NOMBRE Santiago Lionel|APELLIDO Lorca|DNI 30904465|NACIMIENTO 1999-03-17|NUMERO 7574|$";
        let expected = format!("0 {}{}\n", body.len(), body);

        assert_eq!(&bytes[..], expected.as_bytes());
    }

    #[test]
    fn test_frame_record_is_last_flag() {
        assert!(frame_record(&sample(), true).starts_with(b"1 "));
        assert!(frame_record(&sample(), false).starts_with(b"0 "));
    }

    #[test]
    fn test_declared_length_matches_body() {
        let bytes = frame_record(&sample(), true);
        let text = std::str::from_utf8(&bytes).unwrap();
        let (header, rest) = text.split_at(text.find('|').unwrap());
        let declared: usize = header.split(' ').nth(1).unwrap().parse().unwrap();

        assert_eq!(declared, rest.trim_end_matches('\n').len());
    }

    #[test]
    fn test_length_counts_bytes_not_chars() {
        let record = Record::parse_line("2", "José,Núñez,1,2000-01-01,5", 1).unwrap();
        let bytes = frame_record(&record, false);
        let (_, decoded) = decode_data_frame(&bytes).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_decode_recovers_fields_in_order() {
        let record = sample();
        let (is_last, decoded) = decode_data_frame(&frame_record(&record, true)).unwrap();

        assert!(is_last);
        assert_eq!(decoded.agency_id, "1");
        assert_eq!(decoded.first_name, "Santiago Lionel");
        assert_eq!(decoded.last_name, "Lorca");
        assert_eq!(decoded.national_id, "30904465");
        assert_eq!(decoded.birth_date, "1999-03-17");
        assert_eq!(decoded.chosen_number, "7574");
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        let err = decode_data_frame(b"0 5|AGENCIA 1|NOMBRE a|APELLIDO b|DNI c|NACIMIENTO d|NUMERO e|$\n")
            .unwrap_err();
        assert!(err.to_string().contains("declared length"));
    }

    #[test]
    fn test_decode_rejects_reordered_fields() {
        let body = "|NOMBRE a|AGENCIA 1|APELLIDO b|DNI c|NACIMIENTO d|NUMERO e|$";
        let frame = format!("0 {}{}", body.len(), body);
        let err = decode_data_frame(frame.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("expected field AGENCIA"));
    }

    #[test]
    fn test_decode_rejects_control_frame() {
        assert!(decode_data_frame(&finalize_frame("1")).is_err());
    }

    #[test]
    fn test_control_frames() {
        assert_eq!(&finalize_frame("4")[..], b"end|4\n");
        assert_eq!(&query_frame("4")[..], b"win|4\n");
    }
}
