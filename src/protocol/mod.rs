//! Protocol module - frame building, reply assembly and reply decoding.
//!
//! This module implements the text protocol spoken with the server:
//! - Data, finalize and query frames (client to server)
//! - Line buffer for accumulating partial reads
//! - Closed `Reply` type decoded from server lines

mod frame;
mod line_buffer;
mod reply;

pub use frame::{
    decode_data_frame, finalize_frame, frame_record, query_frame, tags, BODY_TRAILER,
    FINALIZE_TAG, QUERY_TAG,
};
pub use line_buffer::{LineBuffer, DEFAULT_MAX_LINE_LEN, MIN_HEADER_LEN};
pub use reply::{Reply, ACK_TAG, ERROR_TAG, WINNERS_TAG};
