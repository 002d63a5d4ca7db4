//! Textual frame format
//!
//! ```text
//! {x_size};{y_size}
//! {x};{y};{moving:0|1};{rotation_point:0|1};{color_code}
//! ...one line per cell, row-major...
//! ```
//!
//! This format is self-describing and round-trips colors and flags exactly.

use std::fmt::Write as _;

use crate::error::DecodeError;
use crate::format::FrameCodec;
use crate::types::{Block, BlockColor, BlockFlag, BlockFlags};
use crate::Board;

/// Upper bound on `x_size * y_size` accepted from a header
pub const MAX_TEXT_CELLS: usize = 1 << 16;

const HEADER_FIELDS: usize = 2;
const CELL_FIELDS: usize = 5;

/// Encoder/decoder for the textual frame format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextCodec;

impl TextCodec {
    pub fn new() -> Self {
        Self
    }
}

impl FrameCodec for TextCodec {
    fn encode(&self, board: &Board) -> Vec<u8> {
        // Header plus roughly 12 bytes per cell line.
        let mut out = String::with_capacity(16 + board.cells().len() * 12);
        let _ = writeln!(out, "{};{}", board.x_size(), board.y_size());
        for block in board.cells() {
            let _ = writeln!(
                out,
                "{};{};{};{};{}",
                block.x(),
                block.y(),
                block.is_moving() as u8,
                block.is_rotation_point() as u8,
                block.value()
            );
        }
        out.into_bytes()
    }

    fn decode(&self, payload: &[u8]) -> Result<Board, DecodeError> {
        let text = std::str::from_utf8(payload).map_err(|_| DecodeError::NotUtf8)?;
        if text.trim().is_empty() {
            return Err(DecodeError::Empty);
        }

        // Line numbers are 1-based; blank lines (e.g. the trailing newline) are skipped.
        let mut lines = text
            .split('\n')
            .map(|l| l.strip_suffix('\r').unwrap_or(l))
            .enumerate()
            .map(|(i, l)| (i + 1, l))
            .filter(|(_, l)| !l.trim().is_empty());

        let (header_line, header) = lines.next().ok_or(DecodeError::Empty)?;
        let dims = split_fields(header_line, header, HEADER_FIELDS)?;
        let x_size = dims[0] as usize;
        let y_size = dims[1] as usize;
        let total = x_size
            .checked_mul(y_size)
            .filter(|&n| n > 0 && n <= MAX_TEXT_CELLS)
            .ok_or(DecodeError::BadDimensions { x_size, y_size })?;

        let mut board = Board::new(x_size, y_size);
        let mut seen = vec![false; total];
        let mut found = 0usize;

        for (line_no, line) in lines {
            let f = split_fields(line_no, line, CELL_FIELDS)?;
            let (x, y) = (f[0] as usize, f[1] as usize);
            if !board.contains(x, y) {
                return Err(DecodeError::OutOfBounds {
                    line: line_no,
                    x,
                    y,
                    x_size,
                    y_size,
                });
            }

            let index = x * y_size + y;
            if seen[index] {
                return Err(DecodeError::DuplicateCell { line: line_no, x, y });
            }
            seen[index] = true;

            let mut flags = BlockFlags::empty();
            if parse_flag(line_no, 2, f[2])? {
                flags.insert(BlockFlag::PartOfMovingObject);
            }
            if parse_flag(line_no, 3, f[3])? {
                flags.insert(BlockFlag::RotationPoint);
            }

            let color = u8::try_from(f[4])
                .ok()
                .and_then(BlockColor::from_code)
                .ok_or(DecodeError::UnknownColor { index, code: f[4] })?;

            board.set_cell(Block::new(color, x, y).with_flags(flags));
            found += 1;
        }

        if found != total {
            return Err(DecodeError::CellCount {
                expected: total,
                found,
            });
        }

        Ok(board)
    }
}

fn split_fields(line_no: usize, line: &str, expected: usize) -> Result<Vec<u64>, DecodeError> {
    let raw: Vec<&str> = line.split(';').collect();
    if raw.len() != expected {
        return Err(DecodeError::FieldCount {
            line: line_no,
            expected,
            found: raw.len(),
        });
    }

    raw.iter()
        .enumerate()
        .map(|(field, s)| {
            s.trim().parse::<u64>().map_err(|_| DecodeError::NotNumeric {
                line: line_no,
                field,
                value: s.to_string(),
            })
        })
        .collect()
}

fn parse_flag(line: usize, field: usize, value: u64) -> Result<bool, DecodeError> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(DecodeError::BadFlag { line, field, value }),
    }
}
