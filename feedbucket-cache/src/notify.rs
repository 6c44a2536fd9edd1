//! Notification hub: per-key listener registry and delivery.
//!
//! The hub only stores listeners. Delivery happens after the cache has
//! released its state lock, against a copy of the listener list taken under
//! the lock, so a listener may subscribe, unsubscribe or mutate the cache
//! from inside its callback.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use feedbucket_core::FilterKey;

use crate::bucket::BucketSnapshot;

/// Callback invoked with the current snapshot of a bucket, or `None` once the
/// bucket has been removed.
pub type Listener<T> = Arc<dyn Fn(Option<&BucketSnapshot<T>>) + Send + Sync>;

/// Identifier of one registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

pub(crate) struct NotificationHub<T> {
    listeners: HashMap<FilterKey, Vec<(SubscriptionId, Listener<T>)>>,
    next_id: u64,
}

impl<T> Default for NotificationHub<T> {
    fn default() -> Self {
        Self {
            listeners: HashMap::new(),
            next_id: 1,
        }
    }
}

impl<T> NotificationHub<T> {
    pub fn add(&mut self, key: &FilterKey, listener: Listener<T>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners
            .entry(key.clone())
            .or_default()
            .push((id, listener));
        id
    }

    pub fn remove(&mut self, key: &FilterKey, id: SubscriptionId) -> bool {
        let Some(list) = self.listeners.get_mut(key) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        let removed = list.len() != before;
        if list.is_empty() {
            self.listeners.remove(key);
        }
        removed
    }

    /// Copy of the listeners currently registered for `key`.
    pub fn listeners_for(&self, key: &FilterKey) -> Vec<Listener<T>> {
        self.listeners
            .get(key)
            .map(|list| list.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default()
    }

    /// Remove and return every listener for `key`.
    pub fn take_key(&mut self, key: &FilterKey) -> Vec<Listener<T>> {
        self.listeners
            .remove(key)
            .map(|list| list.into_iter().map(|(_, l)| l).collect())
            .unwrap_or_default()
    }

    pub fn has_listeners(&self, key: &FilterKey) -> bool {
        self.listeners.contains_key(key)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.values().map(Vec::len).sum()
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}

/// One pending notification: the listeners to call and what to hand them.
pub(crate) struct Delivery<T> {
    pub key: FilterKey,
    pub listeners: Vec<Listener<T>>,
    pub snapshot: Option<BucketSnapshot<T>>,
}

impl<T> Delivery<T> {
    /// Invoke every listener, isolating panics. Returns the number of
    /// listeners that panicked.
    pub fn dispatch(self) -> u64 {
        let mut failures = 0;
        for listener in &self.listeners {
            let result = catch_unwind(AssertUnwindSafe(|| listener(self.snapshot.as_ref())));
            if let Err(payload) = result {
                failures += 1;
                tracing::error!(
                    key = %self.key,
                    panic = panic_message(payload.as_ref()),
                    "Feed listener panicked"
                );
            }
        }
        failures
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        *msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "<non-string panic payload>"
    }
}
