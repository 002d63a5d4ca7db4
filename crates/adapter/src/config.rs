//! Transport configuration

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use anyhow::Context;

use crate::codec::DEFAULT_MAX_FRAME_LEN;
use crate::types::{DEFAULT_HOST, DEFAULT_PORT};

/// Transport configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub host: String,
    pub port: u16,
    /// Largest payload accepted in either direction
    pub max_frame_len: usize,
    /// Receive buffer size; None sizes it from the socket's receive buffer
    pub read_buffer_len: Option<usize>,
    /// Fail the connection when nothing arrives for this long; None waits forever
    pub idle_timeout: Option<Duration>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            read_buffer_len: None,
            idle_timeout: None,
        }
    }
}

impl TransportConfig {
    /// Create from environment variables
    ///
    /// - `TETRIS_SYNC_HOST` (default `127.0.0.1`)
    /// - `TETRIS_SYNC_PORT` (default `7777`)
    /// - `TETRIS_SYNC_MAX_FRAME` (default 1 MiB)
    /// - `TETRIS_SYNC_READ_BUFFER` (default: socket receive buffer size)
    /// - `TETRIS_SYNC_IDLE_TIMEOUT_MS` (default: none; 0 also disables it)
    pub fn from_env() -> Self {
        use std::env;

        let host = env::var("TETRIS_SYNC_HOST")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = env::var("TETRIS_SYNC_PORT")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let max_frame_len = env::var("TETRIS_SYNC_MAX_FRAME")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .filter(|&n: &usize| n > 0)
            .unwrap_or(DEFAULT_MAX_FRAME_LEN);

        let read_buffer_len = env::var("TETRIS_SYNC_READ_BUFFER")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .filter(|&n: &usize| n > 0);

        let idle_timeout = env::var("TETRIS_SYNC_IDLE_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .filter(|&ms: &u64| ms > 0)
            .map(Duration::from_millis);

        Self {
            host,
            port,
            max_frame_len,
            read_buffer_len,
            idle_timeout,
        }
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let ip: IpAddr = self
            .host
            .parse()
            .with_context(|| format!("invalid transport host {:?}", self.host))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}
