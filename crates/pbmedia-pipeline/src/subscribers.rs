//! Snapshot subscriber registry.
//!
//! The queue manager is the producer; UI layers register callbacks here and
//! receive an immutable [`QueueSnapshot`] after every state transition.
//! Callbacks are invoked without any pipeline lock held, so a subscriber may
//! freely call back into the manager.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use pbmedia_core::QueueSnapshot;

pub type SnapshotCallback = Arc<dyn Fn(&QueueSnapshot) + Send + Sync>;

#[derive(Default)]
pub(crate) struct SubscriberRegistry {
    callbacks: Mutex<HashMap<u64, SnapshotCallback>>,
    next_id: AtomicU64,
}

impl SubscriberRegistry {
    pub(crate) fn register(&self, callback: SnapshotCallback) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.callbacks
            .lock()
            .expect("subscriber registry poisoned")
            .insert(id, callback);
        id
    }

    pub(crate) fn deregister(&self, id: u64) {
        self.callbacks
            .lock()
            .expect("subscriber registry poisoned")
            .remove(&id);
    }

    pub(crate) fn notify(&self, snapshot: &QueueSnapshot) {
        let callbacks: Vec<SnapshotCallback> = self
            .callbacks
            .lock()
            .expect("subscriber registry poisoned")
            .values()
            .cloned()
            .collect();
        for callback in callbacks {
            callback(snapshot);
        }
    }
}

/// Keeps a subscription alive; dropping it (or calling
/// [`unsubscribe`](Self::unsubscribe)) deregisters the callback.
pub struct SubscriptionGuard {
    id: u64,
    registry: Weak<SubscriberRegistry>,
}

impl SubscriptionGuard {
    pub(crate) fn new(id: u64, registry: Weak<SubscriberRegistry>) -> Self {
        Self { id, registry }
    }

    pub fn unsubscribe(self) {
        // Drop does the work.
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.deregister(self.id);
        }
    }
}
