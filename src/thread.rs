//! Nested reply trees, built on top of the paginated listings.

use crate::error::Result;
use crate::store::Storage;
use crate::types::{Comment, Page, PostId};
use serde::Serialize;

/// A comment together with its (possibly truncated) reply tree.
///
/// Building, comparing, measuring and dropping walk the tree with an
/// explicit stack, so reply chains of any length are safe. `Debug` and
/// `Serialize` recurse; pass a `max_depth` when rendering.
#[derive(Debug, Serialize)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: Comment,
    pub replies: Vec<CommentNode>,
}

impl CommentNode {
    /// Number of comments in this subtree, including this one.
    pub fn len(&self) -> usize {
        let mut count = 0;
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            count += 1;
            pending.extend(node.replies.iter());
        }
        count
    }

    /// Depth of the deepest reply chain; a leaf has depth 1.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(self, 1)];
        while let Some((node, depth)) = pending.pop() {
            deepest = deepest.max(depth);
            pending.extend(node.replies.iter().map(|reply| (reply, depth + 1)));
        }
        deepest
    }
}

impl PartialEq for CommentNode {
    fn eq(&self, other: &Self) -> bool {
        let mut pending = vec![(self, other)];
        while let Some((a, b)) = pending.pop() {
            if a.comment != b.comment || a.replies.len() != b.replies.len() {
                return false;
            }
            pending.extend(a.replies.iter().zip(b.replies.iter()));
        }
        true
    }
}

impl Eq for CommentNode {}

impl Drop for CommentNode {
    fn drop(&mut self) {
        // Flatten before dropping so nested drops never recurse.
        let mut pending = std::mem::take(&mut self.replies);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.replies);
        }
    }
}

/// One fetched comment waiting to be assembled into a node.
struct Slot {
    comment: Comment,
    parent: Option<usize>,
    depth: usize,
}

/// Build the reply forest of `post_id`.
///
/// Listings are read `page_size` at a time until exhausted. `max_depth`
/// caps nesting (roots are depth 1). Comments are fetched level by level
/// into a flat list, then nodes are assembled from the deepest up, so no
/// step recurses. The walk ends because a parent always exists before its
/// replies, so reply chains cannot loop.
pub fn build_thread(
    store: &dyn Storage,
    post_id: &PostId,
    page_size: usize,
    max_depth: Option<usize>,
) -> Result<Vec<CommentNode>> {
    let mut slots: Vec<Slot> = read_all(page_size, |page| store.comments_by_post(post_id, page))?
        .into_iter()
        .map(|root| Slot {
            comment: root,
            parent: None,
            depth: 1,
        })
        .collect();

    // Breadth-first: every reply lands after its parent, siblings stay adjacent.
    let mut next = 0;
    while next < slots.len() {
        let depth = slots[next].depth;
        if max_depth.map_or(true, |max| depth < max) {
            let parent_id = slots[next].comment.id.clone();
            for reply in read_all(page_size, |page| store.replies_by_comment(&parent_id, page))? {
                slots.push(Slot {
                    comment: reply,
                    parent: Some(next),
                    depth: depth + 1,
                });
            }
        }
        next += 1;
    }

    // Children always sit after their parent, so walking backwards finishes
    // every subtree before the node that owns it.
    let mut children: Vec<Vec<CommentNode>> = (0..slots.len()).map(|_| Vec::new()).collect();
    let mut roots = Vec::new();
    while let Some(slot) = slots.pop() {
        let mut replies = std::mem::take(&mut children[slots.len()]);
        replies.reverse();
        let node = CommentNode {
            comment: slot.comment,
            replies,
        };
        match slot.parent {
            Some(parent) => children[parent].push(node),
            None => roots.push(node),
        }
    }
    roots.reverse();

    Ok(roots)
}

/// Page through a listing until a short page comes back.
pub(crate) fn read_all<F>(page_size: usize, mut fetch: F) -> Result<Vec<Comment>>
where
    F: FnMut(Page) -> Result<Vec<Comment>>,
{
    let mut page = Page::first(page_size.max(1));
    let mut all = Vec::new();
    loop {
        let batch = fetch(page)?;
        let short = batch.len() < page.limit;
        all.extend(batch);
        if short {
            return Ok(all);
        }
        page = page.next();
    }
}
