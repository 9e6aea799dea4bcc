//! Topic registry keyed by package id.
//!
//! # Responsibility
//! - Map each package id to the senders of its active subscriptions.
//! - Detach a subscription's sender when the subscription is dropped.
//!
//! # Invariants
//! - A topic exists only while it has at least one live subscription.
//! - For one topic, snapshots arrive in publish order.

use crate::model::package::{PackageId, PackageRecord};
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

type Topics = HashMap<PackageId, Vec<Listener>>;

struct Listener {
    token: u64,
    tx: Sender<PackageRecord>,
}

#[derive(Default)]
struct Registry {
    topics: Mutex<Topics>,
    next_token: AtomicU64,
}

impl Registry {
    fn lock_topics(&self) -> MutexGuard<'_, Topics> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.topics.lock().unwrap_or_else(|poisoned| {
            warn!("event=notify_lock module=notify status=recovered reason=poisoned");
            poisoned.into_inner()
        })
    }

    fn detach(&self, id: &str, token: u64) {
        let mut topics = self.lock_topics();
        if let Some(listeners) = topics.get_mut(id) {
            listeners.retain(|listener| listener.token != token);
            if listeners.is_empty() {
                topics.remove(id);
            }
        }
    }
}

/// Cloneable handle to a shared topic registry.
#[derive(Clone, Default)]
pub struct ChangeNotifier {
    registry: Arc<Registry>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a live subscription for `id`.
    ///
    /// Only snapshots published after this call are delivered.
    pub fn subscribe(&self, id: &str) -> Subscription {
        let (tx, rx) = mpsc::channel();
        let token = self.registry.next_token.fetch_add(1, Ordering::Relaxed);
        let mut topics = self.registry.lock_topics();
        let listeners = topics.entry(id.to_string()).or_default();
        listeners.push(Listener { token, tx });
        debug!(
            "event=notify_subscribe module=notify status=ok listeners={}",
            listeners.len()
        );
        Subscription {
            id: id.to_string(),
            token,
            rx,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Delivers `record` to every live subscriber of `id`.
    ///
    /// Returns the number of subscribers reached.
    pub fn publish(&self, id: &str, record: &PackageRecord) -> usize {
        let mut topics = self.registry.lock_topics();
        let Some(listeners) = topics.get_mut(id) else {
            return 0;
        };

        listeners.retain(|listener| listener.tx.send(record.clone()).is_ok());
        let delivered = listeners.len();
        if delivered == 0 {
            topics.remove(id);
        }
        debug!(
            "event=notify_publish module=notify status=ok delivered={}",
            delivered
        );
        delivered
    }

    /// Number of live subscriptions for `id`.
    pub fn subscriber_count(&self, id: &str) -> usize {
        self.registry.lock_topics().get(id).map_or(0, Vec::len)
    }

    pub fn topic_count(&self) -> usize {
        self.registry.lock_topics().len()
    }
}

/// Live stream of snapshots for one package id.
///
/// Iterating blocks until the next publish; the stream only ends once every
/// handle to the notifier is gone. Dropping it detaches permanently.
pub struct Subscription {
    id: PackageId,
    token: u64,
    rx: Receiver<PackageRecord>,
    registry: Weak<Registry>,
}

impl Subscription {
    pub fn package_id(&self) -> &str {
        &self.id
    }

    /// Returns an already delivered snapshot without blocking.
    pub fn try_next(&self) -> Option<PackageRecord> {
        match self.rx.try_recv() {
            Ok(record) => Some(record),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Waits up to `timeout` for the next snapshot.
    pub fn next_timeout(&self, timeout: Duration) -> Option<PackageRecord> {
        match self.rx.recv_timeout(timeout) {
            Ok(record) => Some(record),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.detach(&self.id, self.token);
        }
    }
}

impl Iterator for Subscription {
    type Item = PackageRecord;

    fn next(&mut self) -> Option<Self::Item> {
        self.rx.recv().ok()
    }
}
