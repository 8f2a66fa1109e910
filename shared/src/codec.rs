//! Newline codec for TCP framing
//!
//! Both drone and dashboard streams are framed as:
//! ```text
//! [ N bytes: UTF-8 payload ][ '\n' ]
//! ```
//!
//! Chunk boundaries on the socket are unrelated to frame boundaries, so the
//! decoder carries any trailing partial frame across reads.

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;
use thiserror::Error;

use crate::{PositionRecord, PositionReport};

/// Maximum frame length in bytes, excluding the delimiter
pub const MAX_FRAME_LEN: usize = 4 * 1024;

/// Frame delimiter
pub const DELIMITER: u8 = b'\n';

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Frame too long: {0} bytes (max: {MAX_FRAME_LEN})")]
    FrameTooLong(usize),

    #[error("JSON encode error: {0}")]
    EncodeError(#[from] serde_json::Error),
}

/// Streaming line decoder for one connection
#[derive(Debug)]
pub struct LineDecoder {
    /// Partial frame data being accumulated
    buffer: BytesMut,
    /// Bytes at the front of `buffer` already known to hold no delimiter
    scanned: usize,
    /// Dropping the remainder of an over-long frame
    discarding: bool,
    max_len: usize,
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl LineDecoder {
    /// Create a new line decoder
    pub fn new() -> Self {
        Self::with_max_len(MAX_FRAME_LEN)
    }

    /// Create a decoder with a custom frame length limit
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            scanned: 0,
            discarding: false,
            max_len,
        }
    }

    /// Add data to the decoder buffer
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode the next frame from the buffer
    ///
    /// Returns:
    /// - `Ok(Some(frame))` for each complete, non-empty frame, in order
    /// - `Ok(None)` if more data is needed
    /// - `Err(FrameTooLong)` once per over-long frame; the frame is dropped
    ///   and decoding resumes after its delimiter
    ///
    /// Call this repeatedly until it returns `Ok(None)` to drain all complete frames
    pub fn decode_next(&mut self) -> Result<Option<Bytes>, CodecError> {
        loop {
            let newline = self.buffer[self.scanned..]
                .iter()
                .position(|b| *b == DELIMITER)
                .map(|pos| self.scanned + pos);

            let Some(idx) = newline else {
                if self.discarding {
                    self.buffer.clear();
                    self.scanned = 0;
                    return Ok(None);
                }
                if self.buffer.len() > self.max_len {
                    let len = self.buffer.len();
                    self.buffer.clear();
                    self.scanned = 0;
                    self.discarding = true;
                    return Err(CodecError::FrameTooLong(len));
                }
                self.scanned = self.buffer.len();
                return Ok(None);
            };

            let mut line = self.buffer.split_to(idx + 1);
            self.scanned = 0;
            line.truncate(idx);

            if self.discarding {
                self.discarding = false;
                continue;
            }
            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }
            if line.len() > self.max_len {
                return Err(CodecError::FrameTooLong(line.len()));
            }
            if line.is_empty() {
                continue;
            }

            return Ok(Some(line.freeze()));
        }
    }

    /// Drop any trailing partial frame at end of stream, returning its length
    pub fn finish(&mut self) -> usize {
        let pending = if self.discarding { 0 } else { self.buffer.len() };
        self.buffer.clear();
        self.scanned = 0;
        self.discarding = false;
        pending
    }

    /// Get the current buffer length (for debugging)
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }
}

/// Encode a record as one dashboard line: `{"id":..,"long":..,"lat":..,"timestamp":..}\n`
pub fn encode_record<K: Serialize>(record: &PositionRecord<K>) -> Result<Bytes, CodecError> {
    let mut buf = BytesMut::with_capacity(128).writer();
    serde_json::to_writer(&mut buf, record)?;
    let mut buf = buf.into_inner();
    buf.put_u8(DELIMITER);
    Ok(buf.freeze())
}

/// Encode a report as one drone line: `{"long":..,"lat":..}\n`
///
/// Coordinates always carry a decimal point. The drone grammar has no sign,
/// so negative coordinates produce a frame the server rejects.
pub fn encode_report(report: &PositionReport) -> Bytes {
    let line = format!(
        "{{\"long\":{:?},\"lat\":{:?}}}\n",
        report.longitude, report.latitude
    );
    Bytes::from(line)
}
