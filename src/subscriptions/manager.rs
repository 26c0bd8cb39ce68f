//! Per-post subscriber registry and comment fan-out.

use crate::types::{Comment, PostId};
use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use super::types::{CancelToken, PublishReport, SubscriptionConfig, SubscriptionHandle, SubscriptionId};

/// Internal subscriber state.
struct Subscriber {
    id: SubscriptionId,
    sender: Sender<Comment>,
}

/// Subscribers grouped by post. Shared with cancel tokens.
pub(crate) struct Registry {
    subscribers: RwLock<HashMap<PostId, Vec<Subscriber>>>,
}

impl Registry {
    fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    fn insert(&self, post_id: PostId, subscriber: Subscriber) {
        self.subscribers
            .write()
            .entry(post_id)
            .or_default()
            .push(subscriber);
    }

    /// Remove one subscriber. Dropping its sender disconnects the receiver.
    pub(crate) fn remove(&self, post_id: &PostId, id: SubscriptionId) -> bool {
        let mut subs = self.subscribers.write();
        let Some(list) = subs.get_mut(post_id) else {
            return false;
        };

        let before = list.len();
        list.retain(|sub| sub.id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            subs.remove(post_id);
        }

        if removed {
            debug!(post_id = %post_id, subscription = id.0, "removed subscriber");
        }
        removed
    }
}

/// Fans out newly created comments to live subscribers.
///
/// The registry has its own lock, independent of any store, and publishing
/// only ever `try_send`s, so a slow consumer misses comments instead of
/// stalling the writer.
pub struct Notifier {
    registry: Arc<Registry>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
    config: SubscriptionConfig,
}

impl Notifier {
    /// Create a notifier with capacity-1 subscriber buffers.
    pub fn new() -> Self {
        Self::with_config(SubscriptionConfig::default())
    }

    pub fn with_config(config: SubscriptionConfig) -> Self {
        Self {
            registry: Arc::new(Registry::new()),
            next_id: AtomicU64::new(1),
            config,
        }
    }

    /// Register a new subscriber for comments on `post_id`. Never blocks.
    ///
    /// Only comments published after this call are delivered.
    pub fn subscribe(&self, post_id: PostId) -> SubscriptionHandle {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(self.config.buffer_size.max(1));

        self.registry
            .insert(post_id.clone(), Subscriber { id, sender });
        debug!(post_id = %post_id, subscription = id.0, "registered subscriber");

        let token = CancelToken {
            id,
            post_id,
            registry: Arc::downgrade(&self.registry),
        };
        SubscriptionHandle::new(receiver, token)
    }

    /// Unsubscribe and clean up.
    pub fn unsubscribe(&self, post_id: &PostId, id: SubscriptionId) -> bool {
        self.registry.remove(post_id, id)
    }

    /// Deliver `comment` to every subscriber of `post_id`, best effort.
    pub fn publish(&self, post_id: &PostId, comment: &Comment) -> PublishReport {
        let mut report = PublishReport::default();
        let mut to_remove = Vec::new();

        {
            let subs = self.registry.subscribers.read();
            if let Some(list) = subs.get(post_id) {
                for sub in list {
                    match sub.sender.try_send(comment.clone()) {
                        Ok(()) => report.delivered += 1,
                        Err(TrySendError::Full(_)) => {
                            debug!(
                                comment_id = %comment.id,
                                subscription = sub.id.0,
                                "skipped notification: buffer full"
                            );
                            report.skipped += 1;
                        }
                        Err(TrySendError::Disconnected(_)) => to_remove.push(sub.id),
                    }
                }
            }
        }

        // Prune receivers that went away without cancelling
        for id in to_remove {
            if self.registry.remove(post_id, id) {
                report.pruned += 1;
            }
        }

        debug!(
            post_id = %post_id,
            comment_id = %comment.id,
            delivered = report.delivered,
            skipped = report.skipped,
            "published comment"
        );
        report
    }

    /// Number of live subscribers on one post.
    pub fn subscriber_count(&self, post_id: &PostId) -> usize {
        self.registry
            .subscribers
            .read()
            .get(post_id)
            .map_or(0, Vec::len)
    }

    /// Number of live subscribers across all posts.
    pub fn total_subscribers(&self) -> usize {
        self.registry.subscribers.read().values().map(Vec::len).sum()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
