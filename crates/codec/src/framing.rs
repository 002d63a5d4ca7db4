//! Length-prefixed framing
//!
//! TCP delivers a byte stream, not messages. Every payload on the wire is
//! preceded by a 4-byte little-endian length so the receiver can split the
//! stream back into whole payloads regardless of how reads are chunked.

use crate::error::FramingError;

/// Size of the length prefix in bytes
pub const HEADER_SIZE: usize = 4;

/// Default upper bound on a single payload (1 MiB)
pub const DEFAULT_MAX_FRAME_LEN: usize = 1 << 20;

/// Prefix `payload` with its length
pub fn encode_frame(payload: &[u8], max_frame_len: usize) -> Result<Vec<u8>, FramingError> {
    if payload.len() > max_frame_len || payload.len() > u32::MAX as usize {
        return Err(FramingError::TooLarge {
            len: payload.len(),
            max: max_frame_len,
        });
    }

    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}

/// Reassembles length-prefixed payloads from arbitrarily chunked reads
///
/// `push` copies the bytes of one read into an owned buffer, so the caller's
/// read buffer can be reused immediately. `next_frame` then yields each
/// complete payload in arrival order.
#[derive(Debug, Clone)]
pub struct FrameAssembler {
    buf: Vec<u8>,
    max_frame_len: usize,
}

impl FrameAssembler {
    pub fn new(max_frame_len: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_frame_len,
        }
    }

    /// Append the bytes from one read
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Pop the next complete payload, if one is buffered
    ///
    /// An oversized length prefix is an error; the stream cannot be
    /// resynchronized after it.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, FramingError> {
        if self.buf.len() < HEADER_SIZE {
            return Ok(None);
        }

        let len = u32::from_le_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]) as usize;
        if len > self.max_frame_len {
            return Err(FramingError::TooLarge {
                len,
                max: self.max_frame_len,
            });
        }

        let end = HEADER_SIZE + len;
        if self.buf.len() < end {
            return Ok(None);
        }

        let payload = self.buf[HEADER_SIZE..end].to_vec();
        self.buf.drain(..end);
        Ok(Some(payload))
    }

    /// Bytes received but not yet returned as a frame
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}
