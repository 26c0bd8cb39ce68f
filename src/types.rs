//! Core types for the board store.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque identity of a post.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(String);

impl PostId {
    /// A fresh random identity.
    pub fn generate() -> Self {
        PostId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PostId({})", self.0)
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PostId {
    fn from(s: &str) -> Self {
        PostId(s.to_string())
    }
}

impl From<String> for PostId {
    fn from(s: String) -> Self {
        PostId(s)
    }
}

/// Opaque identity of a comment.
///
/// The in-memory store hands out UUIDs; the log store hands out its
/// auto-increment counter rendered in decimal.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentId(String);

impl CommentId {
    /// A fresh random identity.
    pub fn generate() -> Self {
        CommentId(Uuid::new_v4().to_string())
    }

    /// Identity backed by a numeric sequence.
    pub fn from_sequence(seq: u64) -> Self {
        CommentId(seq.to_string())
    }

    /// The numeric sequence, if this identity is one.
    pub fn as_sequence(&self) -> Option<u64> {
        self.0.parse().ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommentId({})", self.0)
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CommentId {
    fn from(s: &str) -> Self {
        CommentId(s.to_string())
    }
}

impl From<String> for CommentId {
    fn from(s: String) -> Self {
        CommentId(s)
    }
}

/// Creation time, UTC with second precision. Renders as RFC3339.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        Timestamp(Utc::now().trunc_subsecs(0))
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

impl FromStr for Timestamp {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = DateTime::parse_from_rfc3339(s)?;
        Ok(Timestamp(parsed.with_timezone(&Utc).trunc_subsecs(0)))
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Timestamp(dt.trunc_subsecs(0))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_rfc3339())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.to_rfc3339())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

/// A published post.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub content: String,
    pub author: String,
    pub allow_comments: bool,
    pub created_at: Timestamp,
}

impl Post {
    /// Build a post with a fresh identity stamped now.
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        author: impl Into<String>,
        allow_comments: bool,
    ) -> Self {
        Self {
            id: PostId::generate(),
            title: title.into(),
            content: content.into(),
            author: author.into(),
            allow_comments,
            created_at: Timestamp::now(),
        }
    }
}

/// A stored comment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub parent_id: Option<CommentId>,
    pub author: String,
    pub text: String,
    pub created_at: Timestamp,
}

impl Comment {
    /// True if this comment has no parent.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Input for creating a comment (before identity is assigned).
#[derive(Clone, Debug)]
pub struct NewComment {
    /// Leave `None` to have the store assign one.
    pub id: Option<CommentId>,
    pub post_id: PostId,
    pub parent_id: Option<CommentId>,
    pub author: String,
    pub text: String,
    pub created_at: Timestamp,
}

impl NewComment {
    /// A root comment on `post_id`, stamped now.
    pub fn new(post_id: PostId, author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: None,
            post_id,
            parent_id: None,
            author: author.into(),
            text: text.into(),
            created_at: Timestamp::now(),
        }
    }

    /// Make this a reply to `parent`.
    pub fn reply_to(mut self, parent: CommentId) -> Self {
        self.parent_id = Some(parent);
        self
    }

    /// Pin the identity instead of letting the store assign one.
    pub fn with_id(mut self, id: CommentId) -> Self {
        self.id = Some(id);
        self
    }

    pub(crate) fn into_comment(self, id: CommentId) -> Comment {
        Comment {
            id,
            post_id: self.post_id,
            parent_id: self.parent_id,
            author: self.author,
            text: self.text,
            created_at: self.created_at,
        }
    }
}

/// Offset/limit window over an ordered listing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

impl Page {
    pub fn new(limit: usize, offset: usize) -> Self {
        Self { limit, offset }
    }

    /// The first `limit` items.
    pub fn first(limit: usize) -> Self {
        Self { limit, offset: 0 }
    }

    /// The window right after this one.
    pub fn next(self) -> Self {
        Self {
            limit: self.limit,
            offset: self.offset.saturating_add(self.limit),
        }
    }

    /// Apply the window. Offsets past the end give an empty slice.
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        if self.offset >= items.len() {
            return &[];
        }
        let end = self.offset.saturating_add(self.limit).min(items.len());
        &items[self.offset..end]
    }
}

/// Ordering for `posts()` listings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PostOrder {
    /// Order of creation.
    #[default]
    Insertion,
    /// Newest timestamp first; creation order breaks ties.
    NewestFirst,
}

impl FromStr for PostOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "insertion" | "created" => Ok(PostOrder::Insertion),
            "newest" | "newest_first" | "desc" => Ok(PostOrder::NewestFirst),
            other => Err(format!("unknown post order: {}", other)),
        }
    }
}

/// Store statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub post_count: u64,
    pub comment_count: u64,
    pub root_comment_count: u64,
}
