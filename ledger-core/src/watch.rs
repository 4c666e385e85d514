//! Watch Registry: per-context subscription fan-out.
//!
//! Generalizes a `messenger_gateway::sse::GatewaySSE`-style channel, which
//! pairs a bounded `tokio::sync::mpsc` channel with a `ReceiverStream`-
//! backed SSE response, into a registry that fans the same channel out to
//! many subscribers per context with optional key filters.
//! A subscriber "terminates" the moment it drops its [`mpsc::Receiver`];
//! the registry notices this lazily (a closed sender) the next time it
//! touches that context's subscriber list, which keeps `notify` itself
//! allocation- and lock-contention-free for contexts nobody is pruning.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;

use crate::entry::Entry;

/// Default bounded capacity for a subscriber's delivery queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 128;

/// Identifies the caller holding one or more subscriptions (a connection,
/// task, or stream). Opaque to the registry.
pub type SubscriberId = u64;

/// Opaque reference returned by `subscribe`, identifying one subscription.
pub type SubscriptionRef = u64;

struct Subscription {
    subscriber: SubscriberId,
    subscription_ref: SubscriptionRef,
    key_filter: Option<String>,
    sender: mpsc::Sender<Arc<Entry>>,
}

/// Owns per-context subscriber lists and fans committed entries out to them.
pub struct WatchRegistry {
    by_context: RwLock<HashMap<String, Vec<Subscription>>>,
    next_ref: AtomicU64,
    queue_capacity: usize,
}

impl Default for WatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchRegistry {
    /// A registry with the default per-subscriber queue capacity.
    pub fn new() -> Self {
        Self::with_queue_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// A registry whose subscriber queues hold at most `capacity` entries
    /// before the subscription is evicted on overflow.
    pub fn with_queue_capacity(capacity: usize) -> Self {
        Self {
            by_context: RwLock::new(HashMap::new()),
            next_ref: AtomicU64::new(1),
            queue_capacity: capacity,
        }
    }

    /// Registers interest in `context_id`, optionally filtered to one key.
    /// Returns an opaque subscription ref and the receiving end of the
    /// subscriber's delivery channel.
    pub fn subscribe(
        &self,
        subscriber: SubscriberId,
        context_id: &str,
        key_filter: Option<String>,
    ) -> (SubscriptionRef, mpsc::Receiver<Arc<Entry>>) {
        let (sender, receiver) = mpsc::channel(self.queue_capacity);
        let subscription_ref = self.next_ref.fetch_add(1, Ordering::Relaxed);

        let mut by_context = self.by_context.write().unwrap();
        by_context
            .entry(context_id.to_string())
            .or_default()
            .push(Subscription {
                subscriber,
                subscription_ref,
                key_filter,
                sender,
            });

        (subscription_ref, receiver)
    }

    /// Removes every subscription `subscriber` holds on `context_id`.
    pub fn unsubscribe(&self, subscriber: SubscriberId, context_id: &str) {
        let mut by_context = self.by_context.write().unwrap();
        if let Some(subs) = by_context.get_mut(context_id) {
            subs.retain(|s| s.subscriber != subscriber);
        }
    }

    /// Current live subscription count for `context_id`. Prunes dead
    /// subscribers (closed channels) as a side effect.
    pub fn subscriber_count(&self, context_id: &str) -> usize {
        let mut by_context = self.by_context.write().unwrap();
        match by_context.get_mut(context_id) {
            Some(subs) => {
                subs.retain(|s| !s.sender.is_closed());
                subs.len()
            }
            None => 0,
        }
    }

    /// Delivers `entry` to every live subscription on `entry.context_id`
    /// whose filter is nil or equals `entry.key`. Never blocks: delivery
    /// uses a non-blocking bounded send, and a subscriber whose queue is
    /// full is evicted rather than allowed to stall the caller.
    ///
    /// The subscriber list is snapshotted (senders cloned) under a short
    /// read lock and released before any `try_send`, so fan-out to a large
    /// or slow set of subscribers never holds the lock other
    /// subscribe/unsubscribe calls need.
    pub fn notify(&self, entry: &Entry) {
        let matching: Vec<(SubscriptionRef, mpsc::Sender<Arc<Entry>>)> = {
            let by_context = self.by_context.read().unwrap();
            match by_context.get(&entry.context_id) {
                Some(subs) => subs
                    .iter()
                    .filter(|s| !s.sender.is_closed())
                    .filter(|s| match &s.key_filter {
                        Some(filter) => filter == &entry.key,
                        None => true,
                    })
                    .map(|s| (s.subscription_ref, s.sender.clone()))
                    .collect(),
                None => return,
            }
        };
        if matching.is_empty() {
            return;
        }

        let shared = Arc::new(entry.clone());
        let mut dead = Vec::new();
        for (subscription_ref, sender) in matching {
            match sender.try_send(shared.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_))
                | Err(mpsc::error::TrySendError::Closed(_)) => dead.push(subscription_ref),
            }
        }

        if !dead.is_empty() {
            let mut by_context = self.by_context.write().unwrap();
            if let Some(subs) = by_context.get_mut(&entry.context_id) {
                subs.retain(|s| !dead.contains(&s.subscription_ref));
            }
        }
    }
}
