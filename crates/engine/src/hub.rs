//! Observer registry
//!
//! An [`EventHub`] fans one event stream out to any number of subscribers.
//! Two subscription styles are supported:
//!
//! - [`EventHub::subscribe`] returns a [`Subscription`] channel. Dropping it
//!   unsubscribes; the hub prunes closed channels on the next publish.
//! - [`EventHub::on_event`] registers a callback that runs inline on the
//!   publishing task. It stays registered until [`EventHub::unsubscribe`].
//!
//! The hub is not locked while callbacks run, so a callback may subscribe,
//! unsubscribe (itself included) or publish through the same hub. A nested
//! publish skips the callback that triggered it. A callback that panics is
//! logged and removed; the publisher and the other subscribers carry on.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, ThreadId};

use tokio::sync::mpsc;
use tracing::warn;

/// Identifies one registration on a hub
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback<T> = Box<dyn FnMut(&T) + Send>;

enum Invoked {
    Ran,
    Skipped,
    Panicked,
}

struct CallbackSlot<T> {
    id: SubscriptionId,
    active: AtomicBool,
    /// Thread currently inside the callback, if any
    running_on: Mutex<Option<ThreadId>>,
    callback: Mutex<Callback<T>>,
}

impl<T> CallbackSlot<T> {
    fn invoke(&self, event: &T) -> Invoked {
        if !self.active.load(Ordering::Acquire) {
            return Invoked::Skipped;
        }

        let me = thread::current().id();
        if *relock(&self.running_on) == Some(me) {
            // Published from inside this very callback.
            return Invoked::Skipped;
        }

        let mut callback = relock(&self.callback);
        if !self.active.load(Ordering::Acquire) {
            return Invoked::Skipped;
        }
        *relock(&self.running_on) = Some(me);
        let result = panic::catch_unwind(AssertUnwindSafe(|| (*callback)(event)));
        *relock(&self.running_on) = None;

        match result {
            Ok(()) => Invoked::Ran,
            Err(_) => Invoked::Panicked,
        }
    }
}

fn relock<U>(mutex: &Mutex<U>) -> MutexGuard<'_, U> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

struct HubInner<T> {
    next_id: u64,
    channels: Vec<(SubscriptionId, mpsc::UnboundedSender<T>)>,
    callbacks: Vec<Arc<CallbackSlot<T>>>,
}

impl<T> HubInner<T> {
    fn next_id(&mut self) -> SubscriptionId {
        self.next_id += 1;
        SubscriptionId(self.next_id)
    }
}

/// Cloneable handle to a shared subscriber list
pub struct EventHub<T> {
    inner: Arc<Mutex<HubInner<T>>>,
}

impl<T> Clone for EventHub<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + 'static> EventHub<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HubInner {
                next_id: 0,
                channels: Vec::new(),
                callbacks: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HubInner<T>> {
        relock(&self.inner)
    }

    /// Open a channel subscription
    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        let id = inner.next_id();
        inner.channels.push((id, tx));
        Subscription { id, rx }
    }

    /// Register a callback invoked synchronously for every event
    pub fn on_event<F>(&self, callback: F) -> SubscriptionId
    where
        F: FnMut(&T) + Send + 'static,
    {
        let mut inner = self.lock();
        let id = inner.next_id();
        inner.callbacks.push(Arc::new(CallbackSlot {
            id,
            active: AtomicBool::new(true),
            running_on: Mutex::new(None),
            callback: Mutex::new(Box::new(callback)),
        }));
        id
    }

    /// Remove a registration. Returns false if it was not (or no longer) registered.
    ///
    /// A removed callback is not invoked again, even by a publish already in
    /// progress.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.lock();
        let channels = inner.channels.len();
        inner.channels.retain(|(i, _)| *i != id);
        if inner.channels.len() != channels {
            return true;
        }

        match inner.callbacks.iter().position(|slot| slot.id == id) {
            Some(pos) => {
                let slot = inner.callbacks.remove(pos);
                slot.active.store(false, Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Deliver an event to every subscriber: callbacks first, then channels,
    /// each in registration order
    ///
    /// Returns the number of subscribers that received it.
    pub fn publish(&self, event: T) -> usize {
        let callbacks = self.lock().callbacks.clone();

        let mut delivered = 0;
        for slot in callbacks {
            match slot.invoke(&event) {
                Invoked::Ran => delivered += 1,
                Invoked::Skipped => {}
                Invoked::Panicked => {
                    warn!("subscriber {:?} panicked and was removed", slot.id);
                    self.unsubscribe(slot.id);
                }
            }
        }

        let mut inner = self.lock();
        inner.channels.retain(|(_, tx)| tx.send(event.clone()).is_ok());
        delivered + inner.channels.len()
    }

    pub fn subscriber_count(&self) -> usize {
        let inner = self.lock();
        inner.callbacks.len() + inner.channels.iter().filter(|(_, tx)| !tx.is_closed()).count()
    }
}

impl<T: Clone + Send + 'static> Default for EventHub<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving end of a channel subscription
#[derive(Debug)]
pub struct Subscription<T> {
    id: SubscriptionId,
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> Subscription<T> {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next event. Returns None once the hub side is gone or
    /// this subscription was removed.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_channel_subscribers_receive_in_order() {
        let hub = EventHub::new();
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();

        assert_eq!(hub.publish(1u32), 2);
        assert_eq!(hub.publish(2u32), 2);

        assert_eq!(a.try_recv(), Some(1));
        assert_eq!(a.try_recv(), Some(2));
        assert_eq!(b.try_recv(), Some(1));
        assert_eq!(b.try_recv(), Some(2));
        assert_eq!(a.try_recv(), None);
    }

    #[test]
    fn test_dropped_subscription_is_pruned() {
        let hub = EventHub::new();
        let keep = hub.subscribe();
        let gone = hub.subscribe();
        drop(gone);

        assert_eq!(hub.subscriber_count(), 1);
        assert_eq!(hub.publish(7u8), 1);
        drop(keep);
        assert_eq!(hub.publish(8u8), 0);
    }

    #[test]
    fn test_callbacks_and_unsubscribe() {
        let hub = EventHub::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_cb = Arc::clone(&seen);
        let id = hub.on_event(move |v: &usize| {
            seen_cb.fetch_add(*v, Ordering::SeqCst);
        });

        hub.publish(3);
        hub.publish(4);
        assert_eq!(seen.load(Ordering::SeqCst), 7);

        assert!(hub.unsubscribe(id));
        assert!(!hub.unsubscribe(id));
        hub.publish(100);
        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn test_unsubscribe_closes_channel() {
        let hub = EventHub::new();
        let mut sub = hub.subscribe();
        assert!(hub.unsubscribe(sub.id()));
        hub.publish(1i32);
        assert_eq!(sub.try_recv(), None);
    }

    #[test]
    fn test_callback_can_unsubscribe_itself() {
        let hub: EventHub<u32> = EventHub::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let own_id = Arc::new(Mutex::new(None));

        let hub_cb = hub.clone();
        let calls_cb = Arc::clone(&calls);
        let own_id_cb = Arc::clone(&own_id);
        let id = hub.on_event(move |_| {
            calls_cb.fetch_add(1, Ordering::SeqCst);
            if let Some(id) = *own_id_cb.lock().unwrap() {
                assert!(hub_cb.unsubscribe(id));
            }
        });
        *own_id.lock().unwrap() = Some(id);

        // Run on a separate thread so a deadlock fails the test instead of hanging it.
        let (done_tx, done_rx) = std::sync::mpsc::channel();
        let hub_pub = hub.clone();
        thread::spawn(move || {
            let first = hub_pub.publish(1);
            let second = hub_pub.publish(2);
            let _ = done_tx.send((first, second));
        });

        let (first, second) = done_rx
            .recv_timeout(std::time::Duration::from_secs(3))
            .expect("publish did not return");
        assert_eq!((first, second), (1, 0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn test_callback_can_subscribe_and_publish() {
        let hub: EventHub<u32> = EventHub::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let hub_cb = hub.clone();
        let seen_cb = Arc::clone(&seen);
        hub.on_event(move |v| {
            seen_cb.lock().unwrap().push(*v);
            if *v == 1 {
                let _late = hub_cb.subscribe();
                hub_cb.publish(2);
            }
        });

        let mut sub = hub.subscribe();
        hub.publish(1);

        // The nested publish skips the callback that issued it.
        assert_eq!(*seen.lock().unwrap(), vec![1]);
        assert_eq!(sub.try_recv(), Some(2));
        assert_eq!(sub.try_recv(), Some(1));
    }

    #[test]
    fn test_panicking_callback_is_removed() {
        let hub: EventHub<u32> = EventHub::new();
        let seen = Arc::new(AtomicUsize::new(0));

        hub.on_event(|v| {
            if *v == 2 {
                panic!("subscriber bug");
            }
        });
        let seen_cb = Arc::clone(&seen);
        hub.on_event(move |_| {
            seen_cb.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(hub.publish(1), 2);
        assert_eq!(hub.publish(2), 1);
        assert_eq!(hub.publish(3), 1);
        assert_eq!(seen.load(Ordering::SeqCst), 3);
        assert_eq!(hub.subscriber_count(), 1);
    }
}
