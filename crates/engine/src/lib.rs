//! Engine module - timing and event fan-out for the embedding game loop
//!
//! - [`hub`]: observer registry used for tick and frame subscriptions
//! - [`tick`]: fixed-rate tick scheduler driving board updates
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use tetris_sync_engine::TickScheduler;
//!
//! # async fn demo() {
//! let ticks = TickScheduler::new(Duration::from_millis(500));
//! let mut sub = ticks.subscribe();
//! ticks.start().expect("inside a tokio runtime");
//!
//! while let Some(tick) = sub.recv().await {
//!     if tick.count == 10 {
//!         ticks.cancel();
//!         break;
//!     }
//! }
//! # }
//! ```

pub mod hub;
pub mod tick;

pub use hub::{EventHub, Subscription, SubscriptionId};
pub use tick::{TickError, TickEvent, TickScheduler};
