//! Fixed-rate tick scheduler
//!
//! [`TickScheduler::start`] spawns a loop on the current tokio runtime that
//! repeatedly:
//!
//! 1. checks the cancellation flag and stops if it is set,
//! 2. increments the tick count,
//! 3. publishes a [`TickEvent`] to every subscriber,
//! 4. sleeps for the current rate.
//!
//! Cancellation is cooperative: it is observed at the next loop boundary and
//! never cuts a sleep short. A rate change applies to the next sleep.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::hub::{EventHub, Subscription, SubscriptionId};

/// One tick, carrying the count that was just reached (starting at 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickEvent {
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TickError {
    #[error("tick scheduler was already started")]
    AlreadyStarted,
    #[error("tick scheduler must be started from within a tokio runtime")]
    NoRuntime,
}

#[derive(Debug)]
struct TickShared {
    rate_nanos: AtomicU64,
    count: AtomicU64,
    cancelled: AtomicBool,
    started: AtomicBool,
}

impl TickShared {
    fn rate(&self) -> Duration {
        Duration::from_nanos(self.rate_nanos.load(Ordering::Acquire))
    }
}

/// Publishes monotonically increasing tick counts at a configurable rate
///
/// Dropping the scheduler cancels its loop.
pub struct TickScheduler {
    shared: Arc<TickShared>,
    hub: EventHub<TickEvent>,
}

impl TickScheduler {
    pub fn new(rate: Duration) -> Self {
        Self {
            shared: Arc::new(TickShared {
                rate_nanos: AtomicU64::new(duration_nanos(rate)),
                count: AtomicU64::new(0),
                cancelled: AtomicBool::new(false),
                started: AtomicBool::new(false),
            }),
            hub: EventHub::new(),
        }
    }

    pub fn from_millis(rate_ms: u64) -> Self {
        Self::new(Duration::from_millis(rate_ms))
    }

    /// Spawn the tick loop on the current runtime
    ///
    /// A scheduler runs at most once; it cannot be restarted after `cancel`.
    pub fn start(&self) -> Result<JoinHandle<()>, TickError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| TickError::NoRuntime)?;
        if self.shared.started.swap(true, Ordering::AcqRel) {
            return Err(TickError::AlreadyStarted);
        }

        let shared = Arc::clone(&self.shared);
        let hub = self.hub.clone();
        Ok(handle.spawn(run_ticks(shared, hub)))
    }

    /// Current delay between ticks
    pub fn rate(&self) -> Duration {
        self.shared.rate()
    }

    /// Change the delay used for the next sleep
    pub fn set_rate(&self, rate: Duration) {
        self.shared.rate_nanos.store(duration_nanos(rate), Ordering::Release);
        debug!("tick rate set to {:?}", rate);
    }

    /// Last published tick count (0 before the first tick)
    pub fn count(&self) -> u64 {
        self.shared.count.load(Ordering::Acquire)
    }

    /// Request the loop to stop at its next boundary
    pub fn cancel(&self) {
        self.shared.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::Acquire)
    }

    /// Receive ticks on a channel; drop the subscription to stop
    pub fn subscribe(&self) -> Subscription<TickEvent> {
        self.hub.subscribe()
    }

    /// Run `callback` on the tick task for every tick
    ///
    /// A callback that panics is logged and unsubscribed; the scheduler keeps
    /// ticking for everyone else. Builds with `panic = "abort"` still abort.
    pub fn on_tick<F>(&self, callback: F) -> SubscriptionId
    where
        F: FnMut(&TickEvent) + Send + 'static,
    {
        self.hub.on_event(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.hub.unsubscribe(id)
    }
}

impl Drop for TickScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn duration_nanos(rate: Duration) -> u64 {
    u64::try_from(rate.as_nanos()).unwrap_or(u64::MAX)
}

async fn run_ticks(shared: Arc<TickShared>, hub: EventHub<TickEvent>) {
    info!("tick scheduler started ({:?} per tick)", shared.rate());

    while !shared.cancelled.load(Ordering::Acquire) {
        let count = shared.count.fetch_add(1, Ordering::AcqRel) + 1;
        hub.publish(TickEvent { count });

        let rate = shared.rate();
        if rate.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(rate).await;
        }
    }

    info!(
        "tick scheduler stopped after {} ticks",
        shared.count.load(Ordering::Acquire)
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::time::{timeout, Instant};

    #[test]
    fn test_start_outside_runtime_fails() {
        let ticks = TickScheduler::from_millis(10);
        assert_eq!(ticks.start().unwrap_err(), TickError::NoRuntime);
    }

    #[tokio::test]
    async fn test_counts_are_sequential_and_spaced() {
        let rate = Duration::from_millis(15);
        let ticks = TickScheduler::new(rate);

        // Callbacks run at publish time, so these are the real emission instants.
        let stamps = Arc::new(Mutex::new(Vec::new()));
        let stamps_cb = Arc::clone(&stamps);
        ticks.on_tick(move |e| stamps_cb.lock().unwrap().push((e.count, Instant::now())));

        let mut sub = ticks.subscribe();
        let _task = ticks.start().unwrap();
        for expected in 1..=4u64 {
            let event = timeout(Duration::from_secs(2), sub.recv())
                .await
                .expect("tick timed out")
                .expect("scheduler gone");
            assert_eq!(event.count, expected);
        }
        ticks.cancel();

        let stamps = stamps.lock().unwrap().clone();
        for pair in stamps.windows(2) {
            assert_eq!(pair[1].0, pair[0].0 + 1);
            assert!(pair[1].1 - pair[0].1 >= rate);
        }
    }

    #[tokio::test]
    async fn test_cannot_start_twice() {
        let ticks = TickScheduler::from_millis(10);
        let _task = ticks.start().unwrap();
        assert_eq!(ticks.start().unwrap_err(), TickError::AlreadyStarted);
    }

    #[tokio::test]
    async fn test_cancel_stops_publishing() {
        let ticks = TickScheduler::from_millis(5);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_cb = Arc::clone(&seen);
        ticks.on_tick(move |e| seen_cb.lock().unwrap().push(e.count));

        let task = ticks.start().unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        ticks.cancel();
        timeout(Duration::from_secs(2), task)
            .await
            .expect("loop did not stop")
            .unwrap();

        let stopped_at = ticks.count();
        let seen_now = seen.lock().unwrap().clone();
        assert!(stopped_at >= 1);
        assert_eq!(seen_now, (1..=stopped_at).collect::<Vec<_>>());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(ticks.count(), stopped_at);
    }

    #[tokio::test]
    async fn test_cancel_before_start_publishes_nothing() {
        let ticks = TickScheduler::from_millis(5);
        let mut sub = ticks.subscribe();
        ticks.cancel();
        let task = ticks.start().unwrap();
        task.await.unwrap();
        assert_eq!(ticks.count(), 0);
        assert_eq!(sub.try_recv(), None);
    }

    #[tokio::test]
    async fn test_set_rate_applies_to_next_sleep() {
        let ticks = TickScheduler::from_millis(1000);
        let mut sub = ticks.subscribe();
        let _task = ticks.start().unwrap();

        // First tick is immediate; the loop is now in a 1s sleep.
        assert_eq!(sub.recv().await.unwrap().count, 1);
        ticks.set_rate(Duration::from_millis(5));
        assert_eq!(ticks.rate(), Duration::from_millis(5));

        // The in-flight sleep is not shortened.
        assert!(timeout(Duration::from_millis(300), sub.recv()).await.is_err());
        let second = timeout(Duration::from_secs(3), sub.recv()).await.unwrap().unwrap();
        assert_eq!(second.count, 2);
        let third = timeout(Duration::from_millis(500), sub.recv()).await.unwrap().unwrap();
        assert_eq!(third.count, 3);
    }

    #[tokio::test]
    async fn test_panicking_callback_does_not_stop_ticks() {
        let ticks = TickScheduler::from_millis(5);
        ticks.on_tick(|e| {
            if e.count == 2 {
                panic!("tick observer bug");
            }
        });
        let mut sub = ticks.subscribe();
        let task = ticks.start().unwrap();

        for expected in 1..=4 {
            let event = timeout(Duration::from_secs(2), sub.recv())
                .await
                .expect("ticks stopped")
                .unwrap();
            assert_eq!(event.count, expected);
        }
        assert!(!task.is_finished());
        ticks.cancel();
    }
}
