//! Invariant-enforcing tables shared by every store backend.

use crate::error::{NotFoundKind, Result, StoreError};
use crate::types::{Comment, CommentId, NewComment, Page, Post, PostId, PostOrder, StoreStats};
use std::collections::HashMap;

/// Posts and comments in creation order, plus lookup indices.
///
/// Children are tracked as positions into `comments`, keyed by parent, so
/// nothing here owns another comment.
pub(crate) struct Tables {
    post_order: PostOrder,
    posts: Vec<Post>,
    post_positions: HashMap<PostId, usize>,
    comments: Vec<Comment>,
    comment_positions: HashMap<CommentId, usize>,
    /// post -> positions of its root comments.
    roots: HashMap<PostId, Vec<usize>>,
    /// comment -> positions of its direct replies.
    replies: HashMap<CommentId, Vec<usize>>,
}

impl Tables {
    pub(crate) fn new(post_order: PostOrder) -> Self {
        Self {
            post_order,
            posts: Vec::new(),
            post_positions: HashMap::new(),
            comments: Vec::new(),
            comment_positions: HashMap::new(),
            roots: HashMap::new(),
            replies: HashMap::new(),
        }
    }

    /// Reject a post whose identity is already taken.
    pub(crate) fn check_post(&self, post: &Post) -> Result<()> {
        if self.post_positions.contains_key(&post.id) {
            return Err(StoreError::Conflict(format!(
                "post {} already exists",
                post.id
            )));
        }
        Ok(())
    }

    /// Append a post. Callers run `check_post` first.
    pub(crate) fn insert_post(&mut self, post: Post) {
        self.post_positions.insert(post.id.clone(), self.posts.len());
        self.posts.push(post);
    }

    /// Check every referential rule a new comment must satisfy.
    ///
    /// Order matters: a missing post wins over a disabled one, which wins
    /// over a bad parent.
    pub(crate) fn check_comment(&self, input: &NewComment) -> Result<()> {
        let post = self.find_post(&input.post_id)?;
        if !post.allow_comments {
            return Err(StoreError::CommentsDisabled(post.id.clone()));
        }

        if let Some(parent_id) = &input.parent_id {
            let parent = self
                .comment_positions
                .get(parent_id)
                .map(|&pos| &self.comments[pos]);
            match parent {
                Some(parent) if parent.post_id == input.post_id => {}
                _ => return Err(StoreError::not_found(NotFoundKind::Parent, parent_id)),
            }
        }

        if let Some(id) = &input.id {
            self.check_comment_id(id)?;
        }

        Ok(())
    }

    /// Reject an identity that is already taken.
    pub(crate) fn check_comment_id(&self, id: &CommentId) -> Result<()> {
        if self.comment_positions.contains_key(id) {
            return Err(StoreError::Conflict(format!("comment {} already exists", id)));
        }
        Ok(())
    }

    /// Append a comment. Callers run `check_comment` first.
    pub(crate) fn insert_comment(&mut self, comment: Comment) {
        let pos = self.comments.len();
        match &comment.parent_id {
            Some(parent) => self.replies.entry(parent.clone()).or_default().push(pos),
            None => self.roots.entry(comment.post_id.clone()).or_default().push(pos),
        }
        self.comment_positions.insert(comment.id.clone(), pos);
        self.comments.push(comment);
    }

    pub(crate) fn post(&self, id: &PostId) -> Result<Post> {
        self.find_post(id).cloned()
    }

    fn find_post(&self, id: &PostId) -> Result<&Post> {
        self.post_positions
            .get(id)
            .map(|&pos| &self.posts[pos])
            .ok_or_else(|| StoreError::not_found(NotFoundKind::Post, id))
    }

    pub(crate) fn posts(&self) -> Vec<Post> {
        let mut posts = self.posts.clone();
        if self.post_order == PostOrder::NewestFirst {
            // Stable sort keeps creation order among equal timestamps.
            posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        }
        posts
    }

    pub(crate) fn comment(&self, id: &CommentId) -> Result<Comment> {
        self.comment_positions
            .get(id)
            .map(|&pos| self.comments[pos].clone())
            .ok_or_else(|| StoreError::not_found(NotFoundKind::Comment, id))
    }

    pub(crate) fn root_comments(&self, post_id: &PostId, page: Page) -> Vec<Comment> {
        self.collect(self.roots.get(post_id), page)
    }

    pub(crate) fn direct_replies(&self, comment_id: &CommentId, page: Page) -> Vec<Comment> {
        self.collect(self.replies.get(comment_id), page)
    }

    fn collect(&self, positions: Option<&Vec<usize>>, page: Page) -> Vec<Comment> {
        positions
            .map(|positions| {
                page.slice(positions)
                    .iter()
                    .map(|&pos| self.comments[pos].clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn stats(&self) -> StoreStats {
        StoreStats {
            post_count: self.posts.len() as u64,
            comment_count: self.comments.len() as u64,
            root_comment_count: self.roots.values().map(|r| r.len() as u64).sum(),
        }
    }
}
