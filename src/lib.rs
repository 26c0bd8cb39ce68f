//! # Postboard
//!
//! Posts, threaded comments, and live comment feeds behind one concurrent
//! store.
//!
//! ## Core Concepts
//!
//! - **Posts**: immutable once published; may refuse comments
//! - **Comments**: root comments or replies, linked by parent id only
//! - **Storage**: one contract, in-memory or log-backed on disk
//! - **Subscriptions**: per-post feeds that never slow down writers
//!
//! ## Example
//!
//! ```ignore
//! use postboard::{Board, Page};
//!
//! let board = Board::in_memory();
//! let post = board.create_post("Hello", "First post", "alice", true)?;
//!
//! let feed = board.subscribe(&post.id)?;
//! let comment = board.create_comment(&post.id, None, "bob", "nice")?;
//! assert_eq!(feed.recv()?, comment);
//!
//! let page = board.comments(&post.id, Page::first(20))?;
//! ```

pub mod config;
pub mod error;
pub mod records;
pub mod service;
pub mod store;
pub mod subscriptions;
pub mod thread;
pub mod types;

// Re-exports
pub use config::{open_storage, BoardConfig, StorageConfig, StorageKind};
pub use error::{ErrorKind, NotFoundKind, Result, StoreError};
pub use records::{BoardLog, LogEntry};
pub use service::Board;
pub use store::{LogStore, LogStoreConfig, MemoryStore, Storage};
pub use subscriptions::{
    CancelToken, Notifier, PublishReport, SubscriptionConfig, SubscriptionHandle, SubscriptionId,
};
pub use thread::{build_thread, CommentNode};
pub use types::*;
