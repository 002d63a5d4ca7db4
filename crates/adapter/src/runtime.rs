//! Adapter runtime integration.
//!
//! Bridges a synchronous game loop with the async transport by owning a tokio
//! runtime and exposing non-blocking send/receive calls.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::runtime::Runtime;

use crate::config::TransportConfig;
use crate::engine::Subscription;
use crate::transport::{ConnectionState, Transport, TransportError, TransportRole};

/// Running transport for callers without their own async runtime
pub struct SyncTransport {
    transport: Transport,
    frames: Subscription<Vec<u8>>,
    rt: Runtime,
}

impl SyncTransport {
    /// Start a transport on a private multi-threaded runtime
    ///
    /// Returns once the listener is bound or the connector is connected.
    pub fn start(role: TransportRole, config: TransportConfig) -> anyhow::Result<Self> {
        let rt = Runtime::new()?;
        let mut transport = Transport::new(role, config);
        let frames = transport.subscribe_frames();
        rt.block_on(transport.start())?;

        Ok(Self {
            transport,
            frames,
            rt,
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.transport.local_addr()
    }

    /// Block until the peer is connected or `timeout` elapses
    ///
    /// Returns [`TransportError::Timeout`] if the deadline passes first; the
    /// transport keeps waiting for its peer and can be polled again.
    /// [`TransportError::Closed`] means the connection ended.
    pub fn wait_connected(&self, timeout: Duration) -> Result<SocketAddr, TransportError> {
        self.rt
            .block_on(tokio::time::timeout(timeout, self.transport.wait_connected()))
            .unwrap_or(Err(TransportError::Timeout))
    }

    /// Next received payload, if any, without blocking
    pub fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.frames.try_recv()
    }

    /// Block until a payload arrives or `timeout` elapses
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<Vec<u8>> {
        let frames = &mut self.frames;
        self.rt
            .block_on(tokio::time::timeout(timeout, frames.recv()))
            .ok()
            .flatten()
    }

    pub fn send(&self, payload: Vec<u8>) -> Result<(), TransportError> {
        self.transport.send(payload)
    }

    pub fn state(&self) -> ConnectionState {
        self.transport.state()
    }
}
