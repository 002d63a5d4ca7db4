//! Frame codec - board snapshots to bytes and back
//!
//! Two interchangeable wire encodings are provided:
//!
//! - [`TextCodec`]: self-describing text, one line per cell; round-trips
//!   colors and flags exactly
//! - [`BinaryCodec`]: one byte per cell with a visibility mask; lossy for flags
//!
//! [`FrameFormat`] picks one of them for a session. The [`framing`] module adds
//! the length prefix that the transport puts in front of every payload.
//!
//! # Example
//!
//! ```
//! use tetris_sync_codec::{FrameCodec, FrameFormat};
//! use tetris_sync_codec::core::Board;
//! use tetris_sync_codec::types::{Block, BlockColor};
//!
//! let mut board = Board::new(2, 2);
//! board.set_cell(Block::new(BlockColor::Yellow, 0, 0));
//!
//! let format = FrameFormat::text();
//! let payload = format.encode(&board);
//! assert_eq!(format.decode(&payload).unwrap(), board);
//! ```

pub mod binary;
pub mod error;
pub mod format;
pub mod framing;
pub mod text;

pub use tetris_sync_core as core;
pub use tetris_sync_types as types;

pub use tetris_sync_core::Board;

pub use binary::{BinaryCodec, Visibility};
pub use error::{DecodeError, FramingError};
pub use format::{FrameCodec, FrameFormat};
pub use framing::{encode_frame, FrameAssembler, DEFAULT_MAX_FRAME_LEN, HEADER_SIZE};
pub use text::TextCodec;
