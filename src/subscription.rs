use crate::types::LightState;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

/// Unique identifier for a callback subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Returns the raw ID value
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sub({})", self.0)
    }
}

/// Returns `false` once the observer behind it is gone
type Callback = Arc<dyn Fn(&LightState) -> bool + Send + Sync>;

/// Fan-out of committed light states to callbacks and channel receivers
///
/// Ids increase, so callbacks run in registration order.
pub(crate) struct ObserverRegistry {
    next_id: AtomicU64,
    callbacks: RwLock<BTreeMap<SubscriptionId, Callback>>,
    tx: broadcast::Sender<LightState>,
}

impl ObserverRegistry {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            next_id: AtomicU64::new(1),
            callbacks: RwLock::new(BTreeMap::new()),
            tx,
        }
    }

    fn insert(&self, callback: Callback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.callbacks.write().insert(id, callback);
        id
    }

    pub(crate) fn on_state_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&LightState) + Send + Sync + 'static,
    {
        self.insert(Arc::new(move |state: &LightState| {
            callback(state);
            true
        }))
    }

    /// Registers a callback that lives only as long as `observer`
    pub(crate) fn observe<T, F>(&self, observer: &Arc<T>, callback: F) -> SubscriptionId
    where
        T: Send + Sync + 'static,
        F: Fn(&T, &LightState) + Send + Sync + 'static,
    {
        let weak: Weak<T> = Arc::downgrade(observer);
        self.insert(Arc::new(move |state: &LightState| match weak.upgrade() {
            Some(observer) => {
                callback(&observer, state);
                true
            }
            None => false,
        }))
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.callbacks.write().remove(&id).is_some()
    }

    pub(crate) fn subscribe(&self) -> StateReceiver {
        StateReceiver::new(self.tx.subscribe())
    }

    #[cfg(test)]
    pub(crate) fn callback_count(&self) -> usize {
        self.callbacks.read().len()
    }

    /// Deliver `state` to every observer
    ///
    /// Callbacks run without any registry lock held, so they may
    /// subscribe or unsubscribe.
    pub(crate) fn notify(&self, state: &LightState) {
        let callbacks: Vec<(SubscriptionId, Callback)> = self
            .callbacks
            .read()
            .iter()
            .map(|(id, cb)| (*id, cb.clone()))
            .collect();

        let dead: Vec<SubscriptionId> = callbacks
            .into_iter()
            .filter_map(|(id, cb)| (!cb(state)).then_some(id))
            .collect();

        if !dead.is_empty() {
            let mut registry = self.callbacks.write();
            for id in dead {
                tracing::debug!("Dropping {} (observer gone)", id);
                registry.remove(&id);
            }
        }

        // No receivers is not an error
        let _ = self.tx.send(*state);
    }
}

/// Receiver for light state updates
///
/// Every update carries the full [`LightState`]. Dropping the receiver
/// ends the subscription.
pub struct StateReceiver {
    rx: broadcast::Receiver<LightState>,
}

impl StateReceiver {
    pub(crate) fn new(rx: broadcast::Receiver<LightState>) -> Self {
        Self { rx }
    }

    /// Receive the next state update
    ///
    /// A receiver that fell behind skips to the oldest state still buffered.
    /// Returns `None` once the controller is gone.
    pub async fn recv(&mut self) -> Option<LightState> {
        loop {
            match self.rx.recv().await {
                Ok(state) => return Some(state),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::debug!("State receiver lagged by {} updates", n);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Try to receive a state update without blocking
    ///
    /// Returns `None` if no update is available.
    pub fn try_recv(&mut self) -> Option<LightState> {
        loop {
            match self.rx.try_recv() {
                Ok(state) => return Some(state),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Brightness, Power};
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn callbacks_receive_full_state() {
        let registry = ObserverRegistry::new();
        let seen = Arc::new(RwLock::new(Vec::new()));

        let sink = seen.clone();
        registry.on_state_changed(move |state| sink.write().push(*state));

        let state = LightState::default().with_power(Power::On);
        registry.notify(&state);

        assert_eq!(*seen.read(), vec![state]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let registry = ObserverRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));

        let counter = count.clone();
        let id = registry.on_state_changed(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        registry.notify(&LightState::default());
        assert!(registry.unsubscribe(id));
        assert!(!registry.unsubscribe(id));
        registry.notify(&LightState::default());

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callbacks_run_in_registration_order() {
        let registry = ObserverRegistry::new();
        let order = Arc::new(RwLock::new(Vec::new()));

        for tag in 0..16 {
            let sink = order.clone();
            registry.on_state_changed(move |_| sink.write().push(tag));
        }
        registry.notify(&LightState::default());

        assert_eq!(*order.read(), (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn weak_observer_is_pruned_after_drop() {
        let registry = ObserverRegistry::new();
        let observer = Arc::new(AtomicUsize::new(0));

        registry.observe(&observer, |count, _| {
            count.fetch_add(1, Ordering::SeqCst);
        });

        registry.notify(&LightState::default());
        assert_eq!(observer.load(Ordering::SeqCst), 1);
        assert_eq!(Arc::strong_count(&observer), 1);

        drop(observer);
        registry.notify(&LightState::default());
        assert_eq!(registry.callback_count(), 0);
    }

    #[test]
    fn receiver_skips_lagged_updates() {
        let registry = ObserverRegistry::new();
        let mut rx = registry.subscribe();

        for value in 0..(CHANNEL_CAPACITY as i64 + 10) {
            registry.notify(&LightState::default().with_brightness(Brightness::clamped(value)));
        }

        assert!(rx.try_recv().is_some());
    }
}
