//! Codec error types

use thiserror::Error;

/// A frame payload that could not be turned into a board.
///
/// Decoding never applies a partial board: any of these means the whole
/// payload was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("frame is empty")]
    Empty,
    #[error("frame is not valid UTF-8")]
    NotUtf8,
    #[error("line {line}: expected {expected} fields, found {found}")]
    FieldCount {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("line {line}: field {field} is not a number: {value:?}")]
    NotNumeric {
        line: usize,
        field: usize,
        value: String,
    },
    #[error("board dimensions {x_size}x{y_size} are not allowed")]
    BadDimensions { x_size: usize, y_size: usize },
    #[error("line {line}: coordinate ({x}, {y}) outside {x_size}x{y_size} board")]
    OutOfBounds {
        line: usize,
        x: usize,
        y: usize,
        x_size: usize,
        y_size: usize,
    },
    #[error("line {line}: cell ({x}, {y}) appears twice")]
    DuplicateCell { line: usize, x: usize, y: usize },
    #[error("line {line}: flag field {field} must be 0 or 1, found {value}")]
    BadFlag { line: usize, field: usize, value: u64 },
    #[error("unknown color code {code} at cell {index}")]
    UnknownColor { index: usize, code: u64 },
    #[error("expected {expected} cells, found {found}")]
    CellCount { expected: usize, found: usize },
}

/// Length-prefix framing failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    #[error("payload of {len} bytes exceeds the {max} byte frame limit")]
    TooLarge { len: usize, max: usize },
}
