//! Post and comment storage.
//!
//! [`Storage`] is the contract every backend satisfies:
//! - [`MemoryStore`]: everything in memory, gone with the process
//! - [`LogStore`]: the same tables rebuilt from an append-only log on disk
//!
//! Both take one coarse lock per store. Writes check every referential rule
//! and append under the write lock, so readers never see a half-created
//! comment and listing order is lock-acquisition order.

mod memory;
mod persistent;
mod tables;

pub use memory::MemoryStore;
pub use persistent::{LogStore, LogStoreConfig};

use crate::error::Result;
use crate::types::{Comment, CommentId, NewComment, Page, Post, PostId, StoreStats};

/// Read/write surface over posts and comments.
pub trait Storage: Send + Sync {
    /// Append a post whose identity was already assigned.
    fn create_post(&self, post: Post) -> Result<()>;

    /// All posts, ordered by the store's `PostOrder`.
    fn posts(&self) -> Result<Vec<Post>>;

    fn post(&self, id: &PostId) -> Result<Post>;

    /// Create a comment.
    ///
    /// Fails with `NotFound(Post)` if the post is missing, `CommentsDisabled`
    /// if it does not take comments, and `NotFound(Parent)` if the parent is
    /// missing or belongs to another post. Assigns an identity when the input
    /// has none.
    fn create_comment(&self, comment: NewComment) -> Result<Comment>;

    fn comment(&self, id: &CommentId) -> Result<Comment>;

    /// Root comments of a post in creation order. Unknown posts give an
    /// empty listing.
    fn comments_by_post(&self, post_id: &PostId, page: Page) -> Result<Vec<Comment>>;

    /// Direct replies to a comment in creation order.
    fn replies_by_comment(&self, comment_id: &CommentId, page: Page) -> Result<Vec<Comment>>;

    fn stats(&self) -> StoreStats;
}
