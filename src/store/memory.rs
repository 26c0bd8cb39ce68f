//! In-memory store.

use super::tables::Tables;
use super::Storage;
use crate::error::Result;
use crate::types::{Comment, CommentId, NewComment, Page, Post, PostId, PostOrder, StoreStats};
use parking_lot::RwLock;
use tracing::debug;

/// Store that keeps everything in process memory.
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_post_order(PostOrder::default())
    }

    pub fn with_post_order(post_order: PostOrder) -> Self {
        Self {
            tables: RwLock::new(Tables::new(post_order)),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStore {
    fn create_post(&self, post: Post) -> Result<()> {
        let mut tables = self.tables.write();
        tables.check_post(&post)?;
        tables.insert_post(post);
        Ok(())
    }

    fn posts(&self) -> Result<Vec<Post>> {
        Ok(self.tables.read().posts())
    }

    fn post(&self, id: &PostId) -> Result<Post> {
        self.tables.read().post(id)
    }

    fn create_comment(&self, mut input: NewComment) -> Result<Comment> {
        let mut tables = self.tables.write();
        tables.check_comment(&input)?;

        let id = input.id.take().unwrap_or_else(CommentId::generate);
        let comment = input.into_comment(id);
        tables.insert_comment(comment.clone());

        debug!(comment_id = %comment.id, post_id = %comment.post_id, "stored comment");
        Ok(comment)
    }

    fn comment(&self, id: &CommentId) -> Result<Comment> {
        self.tables.read().comment(id)
    }

    fn comments_by_post(&self, post_id: &PostId, page: Page) -> Result<Vec<Comment>> {
        Ok(self.tables.read().root_comments(post_id, page))
    }

    fn replies_by_comment(&self, comment_id: &CommentId, page: Page) -> Result<Vec<Comment>> {
        Ok(self.tables.read().direct_replies(comment_id, page))
    }

    fn stats(&self) -> StoreStats {
        self.tables.read().stats()
    }
}
