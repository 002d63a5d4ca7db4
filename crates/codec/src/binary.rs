//! Binary frame format
//!
//! One byte per cell in row-major order, carrying the cell's color code. The
//! board size is not on the wire; both ends must agree on it up front.
//!
//! Flags are not transmitted. Depending on [`Visibility`], cells that carry no
//! flag may also be masked to 0, in which case a decoded 0 cannot tell a
//! neutral cell from a hidden colored one.

use crate::error::DecodeError;
use crate::format::FrameCodec;
use crate::types::{Block, BlockColor};
use crate::Board;

/// Which cells keep their color code on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// Only cells carrying a flag (moving piece or rotation point); all others encode as 0
    #[default]
    Marked,
    /// Every cell encodes its color code
    Occupied,
}

impl Visibility {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "marked" | "moving" => Some(Visibility::Marked),
            "occupied" | "all" => Some(Visibility::Occupied),
            _ => None,
        }
    }

    fn is_visible(self, block: &Block) -> bool {
        match self {
            Visibility::Marked => !block.flags().is_empty(),
            Visibility::Occupied => true,
        }
    }
}

/// Encoder/decoder for the fixed-size binary frame format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryCodec {
    x_size: usize,
    y_size: usize,
    visibility: Visibility,
}

impl BinaryCodec {
    pub fn new(x_size: usize, y_size: usize, visibility: Visibility) -> Self {
        Self {
            x_size,
            y_size,
            visibility,
        }
    }

    /// Payload length in bytes
    pub fn frame_len(&self) -> usize {
        self.x_size * self.y_size
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }
}

impl FrameCodec for BinaryCodec {
    /// # Panics
    ///
    /// Panics if the board size differs from the codec's configured size.
    fn encode(&self, board: &Board) -> Vec<u8> {
        assert!(
            board.x_size() == self.x_size && board.y_size() == self.y_size,
            "binary codec configured for {}x{}, board is {}x{}",
            self.x_size,
            self.y_size,
            board.x_size(),
            board.y_size()
        );

        board
            .cells()
            .iter()
            .map(|b| if self.visibility.is_visible(b) { b.value() } else { 0 })
            .collect()
    }

    fn decode(&self, payload: &[u8]) -> Result<Board, DecodeError> {
        if payload.len() != self.frame_len() {
            return Err(DecodeError::CellCount {
                expected: self.frame_len(),
                found: payload.len(),
            });
        }

        let mut board = Board::new(self.x_size, self.y_size);
        for (index, &code) in payload.iter().enumerate() {
            let color = BlockColor::from_code(code).ok_or(DecodeError::UnknownColor {
                index,
                code: code as u64,
            })?;
            if color != BlockColor::Neutral {
                board.set_cell(Block::new(color, index / self.y_size, index % self.y_size));
            }
        }
        Ok(board)
    }
}
