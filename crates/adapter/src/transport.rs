//! Point-to-point TCP transport for frame payloads
//!
//! One [`Transport`] owns exactly one connection. The listener role binds and
//! accepts a single peer; the connector role dials out. Once connected both
//! roles run the same loop:
//!
//! - reads land in a fixed buffer sized once from the socket's receive buffer,
//!   are copied into a [`FrameAssembler`], and every complete payload is
//!   published to the frame subscribers as an owned `Vec<u8>`;
//! - payloads passed to [`Transport::send`] are length-prefixed and written in
//!   submission order by a separate writer task, so a blocked write never
//!   stops the reads.
//!
//! The connection lifecycle is observable through [`ConnectionState`]. A peer
//! hang-up ends in `Closed`, an I/O or framing error in `Failed`. TCP keepalive
//! is enabled so the kernel eventually reports a peer that vanished without a
//! FIN, and [`TransportConfig::idle_timeout`] fails the connection sooner when
//! the peer is expected to send regularly. There are no retries: the embedder may
//! create a new transport after observing a terminal state.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpSocket, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::codec::{encode_frame, FrameAssembler, FramingError};
use crate::config::TransportConfig;
use crate::engine::{EventHub, Subscription, SubscriptionId};

/// Smallest receive buffer used regardless of the socket's report
pub const MIN_READ_BUFFER: usize = 1024;

/// Largest receive buffer used regardless of the socket's report
pub const MAX_READ_BUFFER: usize = 1 << 20;

/// Fallback when the socket does not report its receive buffer size
pub const DEFAULT_READ_BUFFER: usize = 64 * 1024;

/// Which side of the connection this endpoint plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportRole {
    /// Binds and accepts a single incoming connection (the host)
    Listener,
    /// Connects to a listener (the remote)
    Connector,
}

impl TransportRole {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "listener" | "server" | "host" => Some(TransportRole::Listener),
            "connector" | "client" | "remote" => Some(TransportRole::Connector),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransportRole::Listener => "listener",
            TransportRole::Connector => "connector",
        }
    }
}

/// Lifecycle of the single connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Created, `start` not yet called
    Idle,
    /// Bound and waiting for the peer
    Listening(SocketAddr),
    /// Connected to the given peer
    Connected(SocketAddr),
    /// Peer hung up, or the local side shut down
    Closed,
    /// Connection ended with an error
    Failed(String),
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected(_))
    }

    /// Closed or Failed; no further frames will flow
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Closed | ConnectionState::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("connection is closed")]
    Closed,
    #[error("timed out waiting for the connection")]
    Timeout,
    #[error(transparent)]
    Framing(#[from] FramingError),
}

/// One endpoint of a frame-streaming connection
pub struct Transport {
    role: TransportRole,
    config: TransportConfig,
    frames: EventHub<Vec<u8>>,
    state_tx: watch::Sender<ConnectionState>,
    state_rx: watch::Receiver<ConnectionState>,
    out_tx: mpsc::UnboundedSender<Vec<u8>>,
    out_rx: Option<mpsc::UnboundedReceiver<Vec<u8>>>,
    local_addr: Option<SocketAddr>,
    task: Option<JoinHandle<()>>,
}

impl Transport {
    /// Create an idle transport. Subscribe before calling [`Transport::start`]
    /// to be sure not to miss the first frames.
    pub fn new(role: TransportRole, config: TransportConfig) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        Self {
            role,
            config,
            frames: EventHub::new(),
            state_tx,
            state_rx,
            out_tx,
            out_rx: Some(out_rx),
            local_addr: None,
            task: None,
        }
    }

    pub fn listener(config: TransportConfig) -> Self {
        Self::new(TransportRole::Listener, config)
    }

    pub fn connector(config: TransportConfig) -> Self {
        Self::new(TransportRole::Connector, config)
    }

    pub fn role(&self) -> TransportRole {
        self.role
    }

    /// Bind (listener) or connect (connector) and spawn the connection loop
    ///
    /// Returns the local address. For the listener this resolves as soon as the
    /// socket is bound; use [`Transport::wait_connected`] to wait for the peer.
    pub async fn start(&mut self) -> anyhow::Result<SocketAddr> {
        let Some(out_rx) = self.out_rx.take() else {
            bail!("transport already started");
        };

        let addr = self.config.socket_addr()?;
        let result = match self.role {
            TransportRole::Listener => self.start_listener(addr, out_rx).await,
            TransportRole::Connector => self.start_connector(addr, out_rx).await,
        };

        match result {
            Ok(local) => {
                self.local_addr = Some(local);
                Ok(local)
            }
            Err(e) => {
                self.state_tx
                    .send_replace(ConnectionState::Failed(format!("{:#}", e)));
                Err(e)
            }
        }
    }

    async fn start_listener(
        &mut self,
        addr: SocketAddr,
        out_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    ) -> anyhow::Result<SocketAddr> {
        let socket = new_socket(addr)?;
        socket.set_reuseaddr(true)?;
        socket.set_keepalive(true)?;
        socket
            .bind(addr)
            .with_context(|| format!("bind {}", addr))?;
        // Accepted sockets inherit the listener's buffer sizes and keepalive.
        let read_len = read_buffer_len(&self.config, &socket);
        let listener = socket.listen(1)?;
        let bound = listener.local_addr()?;

        info!("transport listening on {}", bound);
        self.state_tx.send_replace(ConnectionState::Listening(bound));

        let link = self.link(read_len);
        self.task = Some(tokio::spawn(async move {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    // Exactly one peer per transport.
                    drop(listener);
                    run_connection(stream, peer, out_rx, link).await;
                }
                Err(e) => {
                    warn!("transport accept failed: {}", e);
                    link.state_tx
                        .send_replace(ConnectionState::Failed(e.to_string()));
                }
            }
        }));

        Ok(bound)
    }

    async fn start_connector(
        &mut self,
        addr: SocketAddr,
        out_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    ) -> anyhow::Result<SocketAddr> {
        let socket = new_socket(addr)?;
        socket.set_keepalive(true)?;
        let read_len = read_buffer_len(&self.config, &socket);
        let stream = socket
            .connect(addr)
            .await
            .with_context(|| format!("connect to {}", addr))?;
        let local = stream.local_addr()?;

        let link = self.link(read_len);
        self.task = Some(tokio::spawn(run_connection(stream, addr, out_rx, link)));

        Ok(local)
    }

    fn link(&self, read_len: usize) -> Link {
        Link {
            frames: self.frames.clone(),
            state_tx: self.state_tx.clone(),
            read_len,
            max_frame_len: self.config.max_frame_len,
            idle_timeout: self.config.idle_timeout,
        }
    }

    /// Queue a payload for sending (fire-and-forget)
    ///
    /// Payloads sent before the peer connects are queued and flushed once it
    /// does. Fails once the connection has ended.
    pub fn send(&self, payload: Vec<u8>) -> Result<(), TransportError> {
        if payload.len() > self.config.max_frame_len {
            return Err(FramingError::TooLarge {
                len: payload.len(),
                max: self.config.max_frame_len,
            }
            .into());
        }
        if self.state_rx.borrow().is_terminal() {
            return Err(TransportError::Closed);
        }
        self.out_tx.send(payload).map_err(|_| TransportError::Closed)
    }

    /// Receive every incoming payload on a channel
    pub fn subscribe_frames(&self) -> Subscription<Vec<u8>> {
        self.frames.subscribe()
    }

    /// Run `callback` on the connection task for every incoming payload
    pub fn on_frame<F>(&self, callback: F) -> SubscriptionId
    where
        F: FnMut(&Vec<u8>) + Send + 'static,
    {
        self.frames.on_event(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.frames.unsubscribe(id)
    }

    pub fn state(&self) -> ConnectionState {
        self.state_rx.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Wait until a peer is connected and return its address
    ///
    /// Fails with [`TransportError::Closed`] if the connection reaches a
    /// terminal state first.
    pub async fn wait_connected(&self) -> Result<SocketAddr, TransportError> {
        let mut rx = self.state_rx.clone();
        loop {
            let state = rx.borrow_and_update().clone();
            match state {
                ConnectionState::Connected(peer) => return Ok(peer),
                ConnectionState::Closed | ConnectionState::Failed(_) => {
                    return Err(TransportError::Closed)
                }
                ConnectionState::Idle | ConnectionState::Listening(_) => {}
            }
            rx.changed().await.map_err(|_| TransportError::Closed)?;
        }
    }

    /// Wait until the connection reaches `Closed` or `Failed`
    pub async fn wait_terminal(&self) -> ConnectionState {
        let mut rx = self.state_rx.clone();
        loop {
            let state = rx.borrow_and_update().clone();
            if state.is_terminal() {
                return state;
            }
            if rx.changed().await.is_err() {
                return ConnectionState::Closed;
            }
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// What the connection task needs from its owning [`Transport`]
struct Link {
    frames: EventHub<Vec<u8>>,
    state_tx: watch::Sender<ConnectionState>,
    read_len: usize,
    max_frame_len: usize,
    idle_timeout: Option<Duration>,
}

fn new_socket(addr: SocketAddr) -> std::io::Result<TcpSocket> {
    if addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
}

fn read_buffer_len(config: &TransportConfig, socket: &TcpSocket) -> usize {
    config
        .read_buffer_len
        .or_else(|| socket.recv_buffer_size().ok().map(|n| n as usize))
        .unwrap_or(DEFAULT_READ_BUFFER)
        .clamp(MIN_READ_BUFFER, MAX_READ_BUFFER)
}

async fn run_connection(
    stream: TcpStream,
    peer: SocketAddr,
    out_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    link: Link,
) {
    info!("transport connected to {} ({} byte reads)", peer, link.read_len);
    link.state_tx.send_replace(ConnectionState::Connected(peer));

    let _ = stream.set_nodelay(true);
    let (reader, writer) = stream.into_split();
    let mut write_task = tokio::spawn(write_frames(writer, out_rx, link.max_frame_len));

    // Whichever half finishes first decides the outcome.
    let outcome = tokio::select! {
        outcome = read_frames(reader, &link) => {
            write_task.abort();
            outcome
        }
        joined = &mut write_task => match joined {
            Ok(outcome) => outcome,
            Err(e) => ConnectionState::Failed(format!("writer task ended: {}", e)),
        },
    };

    match &outcome {
        ConnectionState::Failed(reason) => warn!("transport connection to {} failed: {}", peer, reason),
        _ => info!("transport connection to {} closed", peer),
    }
    link.state_tx.send_replace(outcome);
}

async fn read_frames(mut reader: OwnedReadHalf, link: &Link) -> ConnectionState {
    let mut buf = vec![0u8; link.read_len];
    let mut assembler = FrameAssembler::new(link.max_frame_len);

    loop {
        let read = match link.idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, reader.read(&mut buf)).await {
                Ok(read) => read,
                Err(_) => {
                    return ConnectionState::Failed(format!("idle timeout after {:?}", limit))
                }
            },
            None => reader.read(&mut buf).await,
        };

        match read {
            Ok(0) => return ConnectionState::Closed,
            Ok(n) => {
                assembler.push(&buf[..n]);
                if let Err(e) = publish_frames(&mut assembler, &link.frames) {
                    return ConnectionState::Failed(e.to_string());
                }
            }
            Err(e) => return ConnectionState::Failed(e.to_string()),
        }
    }
}

async fn write_frames(
    mut writer: OwnedWriteHalf,
    mut out_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    max_frame_len: usize,
) -> ConnectionState {
    while let Some(payload) = out_rx.recv().await {
        let wire = match encode_frame(&payload, max_frame_len) {
            Ok(wire) => wire,
            Err(e) => {
                warn!("transport dropped outgoing payload: {}", e);
                continue;
            }
        };
        if let Err(e) = writer.write_all(&wire).await {
            return ConnectionState::Failed(e.to_string());
        }
        debug!("transport sent {} byte frame", payload.len());
    }

    // Owning transport is gone.
    let _ = writer.shutdown().await;
    ConnectionState::Closed
}

fn publish_frames(
    assembler: &mut FrameAssembler,
    frames: &EventHub<Vec<u8>>,
) -> Result<usize, FramingError> {
    let mut count = 0;
    while let Some(frame) = assembler.next_frame()? {
        debug!("transport received {} byte frame", frame.len());
        frames.publish(frame);
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_from_str() {
        assert_eq!(TransportRole::from_str("host"), Some(TransportRole::Listener));
        assert_eq!(TransportRole::from_str("Server"), Some(TransportRole::Listener));
        assert_eq!(TransportRole::from_str("remote"), Some(TransportRole::Connector));
        assert_eq!(TransportRole::from_str("peer"), None);
    }

    #[test]
    fn test_state_predicates() {
        assert!(!ConnectionState::Idle.is_terminal());
        assert!(ConnectionState::Closed.is_terminal());
        assert!(ConnectionState::Failed("x".into()).is_terminal());
        assert!(ConnectionState::Connected("127.0.0.1:1".parse().unwrap()).is_connected());
    }

    #[test]
    fn test_send_rejects_oversized_payload() {
        let config = TransportConfig {
            max_frame_len: 4,
            ..TransportConfig::default()
        };
        let transport = Transport::connector(config);
        assert_eq!(
            transport.send(vec![0; 5]).unwrap_err(),
            TransportError::Framing(FramingError::TooLarge { len: 5, max: 4 })
        );
        assert!(transport.send(vec![0; 4]).is_ok());
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let config = TransportConfig {
            port: 0,
            ..TransportConfig::default()
        };
        let mut transport = Transport::listener(config);
        transport.start().await.unwrap();
        assert!(transport.start().await.is_err());
    }

    #[tokio::test]
    async fn test_connect_refused_is_failed_state() {
        // Grab a free port, then close it so nothing listens there.
        let scratch = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = scratch.local_addr().unwrap().port();
        drop(scratch);

        let config = TransportConfig {
            port,
            ..TransportConfig::default()
        };
        let mut transport = Transport::connector(config);
        assert!(transport.start().await.is_err());
        assert!(matches!(transport.state(), ConnectionState::Failed(_)));
        assert_eq!(transport.send(b"x".to_vec()).unwrap_err(), TransportError::Closed);
        assert_eq!(transport.wait_connected().await.unwrap_err(), TransportError::Closed);
    }
}
