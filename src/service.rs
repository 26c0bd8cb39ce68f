//! The board: input validation, storage, and live notification in one place.

use crate::config::{open_storage, BoardConfig};
use crate::error::{ErrorKind, Result, StoreError};
use crate::store::{MemoryStore, Storage};
use crate::subscriptions::{Notifier, SubscriptionConfig, SubscriptionHandle};
use crate::thread::{build_thread, CommentNode};
use crate::types::{Comment, CommentId, NewComment, Page, Post, PostId, StoreStats};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Entry point for callers (query/mutation resolvers, tests, tools).
///
/// Validates raw input before anything reaches the store, stores, then
/// publishes new comments to live subscribers. Store errors pass through
/// with their kind intact.
pub struct Board {
    store: Arc<dyn Storage>,
    notifier: Notifier,
    config: BoardConfig,
}

impl Board {
    pub fn new(store: Arc<dyn Storage>, config: BoardConfig) -> Self {
        let notifier = Notifier::with_config(SubscriptionConfig {
            buffer_size: config.subscriber_buffer,
        });
        Self {
            store,
            notifier,
            config,
        }
    }

    /// A board over a fresh in-memory store with default settings.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), BoardConfig::default())
    }

    /// Open the backend named in `config`.
    pub fn open(config: BoardConfig) -> Result<Self> {
        let store = open_storage(&config.storage)?;
        Ok(Self::new(store, config))
    }

    pub fn store(&self) -> &Arc<dyn Storage> {
        &self.store
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    // --- Writes ---

    /// Publish a new post.
    pub fn create_post(
        &self,
        title: &str,
        content: &str,
        author: &str,
        allow_comments: bool,
    ) -> Result<Post> {
        require_non_empty(&[("title", title), ("content", content), ("author", author)])?;

        let post = Post::new(title, content, author, allow_comments);
        self.store.create_post(post.clone()).map_err(log_failure)?;

        info!(post_id = %post.id, allow_comments, "created post");
        Ok(post)
    }

    /// Add a comment (or a reply, when `parent_id` is set) and notify
    /// subscribers of the post.
    pub fn create_comment(
        &self,
        post_id: &PostId,
        parent_id: Option<&CommentId>,
        author: &str,
        text: &str,
    ) -> Result<Comment> {
        debug!(post_id = %post_id, parent_id = ?parent_id, "adding comment");

        require_non_empty(&[("author", author), ("text", text)])?;
        let chars = text.chars().count();
        if chars > self.config.max_comment_chars {
            debug!(chars, max = self.config.max_comment_chars, "comment too long");
            return Err(StoreError::Validation(format!(
                "comment is {} characters, limit is {}",
                chars, self.config.max_comment_chars
            )));
        }

        let mut input = NewComment::new(post_id.clone(), author, text);
        if let Some(parent) = parent_id {
            input = input.reply_to(parent.clone());
        }

        let comment = self.store.create_comment(input).map_err(log_failure)?;
        self.notifier.publish(&comment.post_id, &comment);

        info!(comment_id = %comment.id, post_id = %comment.post_id, "created comment");
        Ok(comment)
    }

    // --- Reads ---

    pub fn posts(&self) -> Result<Vec<Post>> {
        self.store.posts().map_err(log_failure)
    }

    pub fn post(&self, id: &PostId) -> Result<Post> {
        self.store.post(id).map_err(log_failure)
    }

    pub fn comment(&self, id: &CommentId) -> Result<Comment> {
        self.store.comment(id).map_err(log_failure)
    }

    /// Root comments of a post.
    pub fn comments(&self, post_id: &PostId, page: Page) -> Result<Vec<Comment>> {
        self.store.comments_by_post(post_id, page).map_err(log_failure)
    }

    /// Direct replies to a comment.
    pub fn replies(&self, comment_id: &CommentId, page: Page) -> Result<Vec<Comment>> {
        self.store
            .replies_by_comment(comment_id, page)
            .map_err(log_failure)
    }

    /// Full reply forest of a post, nesting capped at `max_depth` if given.
    pub fn thread(&self, post_id: &PostId, max_depth: Option<usize>) -> Result<Vec<CommentNode>> {
        self.post(post_id)?;
        build_thread(
            self.store.as_ref(),
            post_id,
            self.config.thread_page_size,
            max_depth,
        )
        .map_err(log_failure)
    }

    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    // --- Live feed ---

    /// Watch new comments on an existing post.
    pub fn subscribe(&self, post_id: &PostId) -> Result<SubscriptionHandle> {
        self.post(post_id)?;
        info!(post_id = %post_id, "new subscription");
        Ok(self.notifier.subscribe(post_id.clone()))
    }
}

fn require_non_empty(fields: &[(&str, &str)]) -> Result<()> {
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| *name)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(StoreError::Validation(format!(
            "{} must not be empty",
            missing.join(", ")
        )))
    }
}

/// Log at a level matching how surprising the failure is, then pass it on.
fn log_failure(err: StoreError) -> StoreError {
    match err.kind() {
        ErrorKind::ConflictOrInternal => warn!(error = %err, "store operation failed"),
        _ => debug!(error = %err, "request rejected"),
    }
    err
}
