//! Subscription types for live comment feeds.

use super::manager::Registry;
use crate::types::{Comment, PostId};
use std::sync::Weak;
use std::time::Duration;

/// Configuration for new subscriptions.
#[derive(Clone, Debug)]
pub struct SubscriptionConfig {
    /// Buffered comments per subscriber before deliveries are dropped.
    /// Default: 1
    pub buffer_size: usize,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self { buffer_size: 1 }
    }
}

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Outcome of one publish. Informational only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    /// Subscribers whose buffer was full; they stay registered.
    pub skipped: usize,
    /// Subscribers whose receiver was gone; they were removed.
    pub pruned: usize,
}

/// Cancels one subscription from anywhere.
///
/// Holds only a weak reference to the registry, so an outstanding token
/// never keeps a notifier alive. Cancelling twice is a no-op.
#[derive(Clone)]
pub struct CancelToken {
    pub(super) id: SubscriptionId,
    pub(super) post_id: PostId,
    pub(super) registry: Weak<Registry>,
}

impl CancelToken {
    /// Remove the subscription. Returns false if it was already gone.
    pub fn cancel(&self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.remove(&self.post_id, self.id),
            None => false,
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("id", &self.id)
            .field("post_id", &self.post_id)
            .finish()
    }
}

/// Live feed of comments on one post.
///
/// Dropping the handle cancels the subscription. After cancellation the
/// receiver drains whatever was buffered and then reports disconnection.
#[derive(Debug)]
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    pub post_id: PostId,
    receiver: crossbeam_channel::Receiver<Comment>,
    token: CancelToken,
}

impl SubscriptionHandle {
    pub(super) fn new(
        receiver: crossbeam_channel::Receiver<Comment>,
        token: CancelToken,
    ) -> Self {
        Self {
            id: token.id,
            post_id: token.post_id.clone(),
            receiver,
            token,
        }
    }

    /// Receive the next comment (blocking).
    pub fn recv(&self) -> Result<Comment, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a comment (non-blocking).
    pub fn try_recv(&self) -> Result<Comment, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: Duration,
    ) -> Result<Comment, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain buffered comments without blocking.
    pub fn try_iter(&self) -> crossbeam_channel::TryIter<'_, Comment> {
        self.receiver.try_iter()
    }

    /// Token that cancels this subscription from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Unsubscribe now.
    pub fn cancel(self) {
        // Drop does the work.
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
