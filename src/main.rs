//! Board sync runner (default binary).
//!
//! Runs one endpoint, selected by `TETRIS_SYNC_ROLE`:
//!
//! - `host` (default): listens, drops a two-cell demo piece on every tick and
//!   streams the board to the remote whenever it changes
//! - `remote`: connects and applies every received frame to a local board
//!
//! Board size comes from `TETRIS_SYNC_ROWS` / `TETRIS_SYNC_COLS`, tick rate from
//! `TETRIS_SYNC_TICK_MS`. Transport and format settings are documented on
//! `TransportConfig::from_env` and `FrameFormat::from_env`.

use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use tetris_sync::adapter::{ConnectionState, Transport, TransportConfig, TransportRole};
use tetris_sync::codec::{FrameCodec, FrameFormat};
use tetris_sync::core::Board;
use tetris_sync::engine::{Subscription, TickScheduler};
use tetris_sync::types::{
    Block, BlockColor, BlockFlag, BlockFlags, DEFAULT_COLS, DEFAULT_ROWS, DEFAULT_TICK_MS,
};

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    let role = std::env::var("TETRIS_SYNC_ROLE")
        .ok()
        .and_then(|s| TransportRole::from_str(&s))
        .unwrap_or(TransportRole::Listener);
    let rows = env_or("TETRIS_SYNC_ROWS", DEFAULT_ROWS).max(2);
    let cols = env_or("TETRIS_SYNC_COLS", DEFAULT_COLS).max(1);
    let tick_ms = env_or("TETRIS_SYNC_TICK_MS", DEFAULT_TICK_MS);

    let config = TransportConfig::from_env();
    let format = FrameFormat::from_env(rows, cols);
    info!(
        "starting {} on {}:{} ({}x{} board, {} frames)",
        role.as_str(),
        config.host,
        config.port,
        rows,
        cols,
        format.name()
    );

    match role {
        TransportRole::Listener => run_host(config, format, rows, cols, tick_ms).await,
        TransportRole::Connector => run_remote(config, format, rows, cols).await,
    }
}

async fn run_host(
    config: TransportConfig,
    format: FrameFormat,
    rows: usize,
    cols: usize,
    tick_ms: u64,
) -> Result<()> {
    let mut transport = Transport::listener(config);
    transport.start().await?;
    let peer = transport.wait_connected().await?;
    info!("remote {} connected", peer);

    let ticks = TickScheduler::new(Duration::from_millis(tick_ms));
    let mut tick_rx = ticks.subscribe();
    ticks.start()?;

    let mut board = Board::new(rows, cols);
    let mut last_sent = None;
    let mut spawned = 0usize;

    while let Some(tick) = tick_rx.recv().await {
        if !step(&mut board, &mut spawned) {
            info!("board topped out at tick {}", tick.count);
            board.clear();
        }

        let fingerprint = board.fingerprint();
        if last_sent != Some(fingerprint) {
            if let Err(e) = transport.send(format.encode(&board)) {
                warn!("stopping: {}", e);
                break;
            }
            last_sent = Some(fingerprint);
        }
    }

    ticks.cancel();
    Ok(())
}

/// Advance the demo piece by one row. Returns false if a new piece cannot spawn.
fn step(board: &mut Board, spawned: &mut usize) -> bool {
    let moving: Vec<Block> = board.cells().iter().filter(|b| b.is_moving()).copied().collect();

    if moving.is_empty() {
        let y = *spawned % board.y_size();
        if !board.get(0, y).is_some_and(Block::is_empty) || !board.get(1, y).is_some_and(Block::is_empty) {
            return false;
        }
        let color = BlockColor::ALL[1 + *spawned % (BlockColor::ALL.len() - 1)];
        let piece = BlockFlags::from_flags(&[BlockFlag::PartOfMovingObject]);
        let pivot = BlockFlags::from_flags(&[BlockFlag::PartOfMovingObject, BlockFlag::RotationPoint]);
        board.set_cell(Block::new(color, 0, y).with_flags(piece));
        board.set_cell(Block::new(color, 1, y).with_flags(pivot));
        *spawned += 1;
        return true;
    }

    let can_fall = moving.iter().all(|b| {
        board
            .get(b.x() + 1, b.y())
            .is_some_and(|below| below.is_moving() || below.is_empty())
    });

    if can_fall {
        board.translate_moving(1, 0);
    } else {
        for block in moving {
            board.set_cell(block.with_flags(BlockFlags::empty()));
        }
        let cleared = board.clear_full_rows();
        if !cleared.is_empty() {
            info!("cleared rows {:?}", cleared);
        }
    }
    true
}

async fn run_remote(config: TransportConfig, format: FrameFormat, rows: usize, cols: usize) -> Result<()> {
    let mut transport = Transport::connector(config);
    let mut frames = transport.subscribe_frames();
    transport.start().await?;

    let mut board = Board::new(rows, cols);
    let (applied, state) = mirror_frames(&transport, &mut frames, &format, &mut board).await;
    match state {
        ConnectionState::Failed(reason) => warn!("connection failed: {}", reason),
        _ => info!("host closed the connection after {} frames", applied),
    }

    Ok(())
}

/// Apply every received frame to `board` until the connection ends
///
/// Frames already received when the connection ends are still applied.
/// Returns the number of frames applied and the terminal state.
async fn mirror_frames(
    transport: &Transport,
    frames: &mut Subscription<Vec<u8>>,
    format: &FrameFormat,
    board: &mut Board,
) -> (u64, ConnectionState) {
    let mut applied = 0u64;

    loop {
        tokio::select! {
            biased;

            Some(payload) = frames.recv() => {
                if apply_frame(format, board, &payload) {
                    applied += 1;
                    info!("frame {}: {} occupied cells", applied, board.occupied_count());
                }
            }
            state = transport.wait_terminal() => {
                // Frames are published before the terminal state is set.
                while let Some(payload) = frames.try_recv() {
                    if apply_frame(format, board, &payload) {
                        applied += 1;
                    }
                }
                return (applied, state);
            }
        }
    }
}

fn apply_frame(format: &FrameFormat, board: &mut Board, payload: &[u8]) -> bool {
    match format.decode(payload) {
        Ok(snapshot) if snapshot.x_size() == board.x_size() && snapshot.y_size() == board.y_size() => {
            board.replace(snapshot);
            true
        }
        Ok(snapshot) => {
            warn!(
                "ignoring {}x{} frame for {}x{} board",
                snapshot.x_size(),
                snapshot.y_size(),
                board.x_size(),
                board.y_size()
            );
            false
        }
        Err(e) => {
            warn!("dropping malformed frame: {}", e);
            false
        }
    }
}
