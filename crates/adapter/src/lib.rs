//! Adapter module - board frames over a single TCP connection
//!
//! This crate moves encoded board snapshots between exactly two processes:
//! a host that listens and a remote that connects. Payloads are opaque bytes
//! here; encoding and decoding belong to `tetris-sync-codec`.
//!
//! # Wire Framing
//!
//! Every payload is sent as a 4-byte little-endian length followed by the
//! payload bytes, so a frame split across reads, or several frames in one read,
//! are reassembled correctly on the receiving side.
//!
//! # Connection States
//!
//! `Idle -> Listening -> Connected -> Closed | Failed` (listener)
//!
//! `Idle -> Connected -> Closed | Failed` (connector)
//!
//! # Environment Variables
//!
//! - `TETRIS_SYNC_HOST`: Bind/connect address (default: "127.0.0.1")
//! - `TETRIS_SYNC_PORT`: Port number (default: 7777)
//! - `TETRIS_SYNC_MAX_FRAME`: Largest accepted payload in bytes (default: 1 MiB)
//! - `TETRIS_SYNC_READ_BUFFER`: Receive buffer override (default: socket size)
//! - `TETRIS_SYNC_IDLE_TIMEOUT_MS`: Fail a connection silent for this long (default: off)
//!
//! # Example
//!
//! ```no_run
//! use tetris_sync_adapter::{Transport, TransportConfig};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let mut host = Transport::listener(TransportConfig::default());
//! let mut frames = host.subscribe_frames();
//! host.start().await?;
//! host.wait_connected().await?;
//!
//! host.send(b"3;1\n...".to_vec())?;
//! while let Some(payload) = frames.recv().await {
//!     println!("received {} bytes", payload.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod runtime;
pub mod transport;

pub use tetris_sync_codec as codec;
pub use tetris_sync_codec::types;
pub use tetris_sync_engine as engine;

pub use config::TransportConfig;
pub use runtime::SyncTransport;
pub use transport::{ConnectionState, Transport, TransportError, TransportRole};
