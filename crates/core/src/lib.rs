//! Grid engine - pure, deterministic board logic
//!
//! This crate owns the play field and the algorithms that rewrite it. It has
//! **zero dependencies** on networking, timing or I/O.
//!
//! # Operations
//!
//! - [`Board::set_cell`]: overwrite one slot with a block
//! - [`Board::translate_moving`]: move the moving object as a unit
//! - [`Board::clear_full_rows`]: remove completed rows and compact the rest
//! - [`Board::clear`]: reset every slot
//! - [`Board::replace`]: apply a decoded snapshot of the same size
//!
//! # Example
//!
//! ```
//! use tetris_sync_core::Board;
//! use tetris_sync_core::types::{Block, BlockColor, BlockFlag, BlockFlags};
//!
//! let mut board = Board::new(4, 10);
//! let piece = BlockFlags::from_flags(&[BlockFlag::PartOfMovingObject]);
//! board.set_cell(Block::new(BlockColor::Purple, 0, 4).with_flags(piece));
//!
//! // Gravity: move the piece one row down.
//! board.translate_moving(1, 0);
//! assert_eq!(board.get(1, 4).unwrap().color(), BlockColor::Purple);
//! assert!(board.get(0, 4).unwrap().is_empty());
//! ```
//!
//! Out-of-range coordinates are programming errors and panic; no operation
//! here returns a `Result`.

pub mod board;

pub use tetris_sync_types as types;

pub use board::Board;
