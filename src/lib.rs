//! Tetris board sync (workspace facade crate).
//!
//! Re-exports the member crates under stable module names:
//! `tetris_sync::{types, core, codec, engine, adapter}`.

pub use tetris_sync_adapter as adapter;
pub use tetris_sync_codec as codec;
pub use tetris_sync_core as core;
pub use tetris_sync_engine as engine;
pub use tetris_sync_types as types;
