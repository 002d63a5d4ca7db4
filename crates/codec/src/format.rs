//! Codec selection
//!
//! A deployment picks one [`FrameFormat`] for the whole session; both ends must
//! use the same one.

use crate::binary::{BinaryCodec, Visibility};
use crate::error::DecodeError;
use crate::text::TextCodec;
use crate::Board;

/// Board <-> payload conversion
pub trait FrameCodec {
    /// Serialize a full board snapshot
    fn encode(&self, board: &Board) -> Vec<u8>;

    /// Rebuild a board from a payload, or reject it as a whole
    fn decode(&self, payload: &[u8]) -> Result<Board, DecodeError>;
}

/// The wire format used for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    Text(TextCodec),
    Binary(BinaryCodec),
}

impl FrameFormat {
    pub fn text() -> Self {
        FrameFormat::Text(TextCodec)
    }

    pub fn binary(x_size: usize, y_size: usize, visibility: Visibility) -> Self {
        FrameFormat::Binary(BinaryCodec::new(x_size, y_size, visibility))
    }

    /// Create from environment variables
    ///
    /// - `TETRIS_SYNC_FORMAT`: `text` (default) or `binary`
    /// - `TETRIS_SYNC_BINARY_MASK`: `marked` (default) or `occupied`
    ///
    /// The binary format needs the board size out of band, so it is passed in.
    pub fn from_env(x_size: usize, y_size: usize) -> Self {
        use std::env;

        let binary = env::var("TETRIS_SYNC_FORMAT")
            .map(|v| v.trim().eq_ignore_ascii_case("binary"))
            .unwrap_or(false);
        if !binary {
            return Self::text();
        }

        let visibility = env::var("TETRIS_SYNC_BINARY_MASK")
            .ok()
            .and_then(|s| Visibility::from_str(&s))
            .unwrap_or_default();
        Self::binary(x_size, y_size, visibility)
    }

    pub fn name(&self) -> &'static str {
        match self {
            FrameFormat::Text(_) => "text",
            FrameFormat::Binary(_) => "binary",
        }
    }
}

impl Default for FrameFormat {
    fn default() -> Self {
        Self::text()
    }
}

impl FrameCodec for FrameFormat {
    fn encode(&self, board: &Board) -> Vec<u8> {
        match self {
            FrameFormat::Text(c) => c.encode(board),
            FrameFormat::Binary(c) => c.encode(board),
        }
    }

    fn decode(&self, payload: &[u8]) -> Result<Board, DecodeError> {
        match self {
            FrameFormat::Text(c) => c.decode(payload),
            FrameFormat::Binary(c) => c.decode(payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_dispatch() {
        let board = Board::new(2, 2);
        let text = FrameFormat::text();
        let binary = FrameFormat::binary(2, 2, Visibility::Occupied);

        assert_eq!(text.name(), "text");
        assert_eq!(binary.name(), "binary");
        assert_eq!(binary.encode(&board), vec![0; 4]);
        assert_eq!(text.decode(&text.encode(&board)).unwrap(), board);
    }

    #[test]
    fn test_formats_are_not_interchangeable() {
        let board = Board::new(2, 2);
        let payload = FrameFormat::text().encode(&board);
        assert!(FrameFormat::binary(2, 2, Visibility::Marked).decode(&payload).is_err());
    }
}
