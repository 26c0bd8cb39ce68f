//! Live comment feeds.
//!
//! A [`Notifier`] keeps, per post, the channels of everyone watching it:
//! - Subscribing never blocks and never replays older comments
//! - Publishing never blocks: a full buffer drops that delivery
//! - Dropping the handle (or firing its [`CancelToken`]) unregisters it
//!
//! # Example
//!
//! ```ignore
//! let notifier = Notifier::new();
//! let handle = notifier.subscribe(post_id.clone());
//!
//! // elsewhere, after a comment is stored
//! notifier.publish(&post_id, &comment);
//!
//! while let Ok(comment) = handle.recv() {
//!     println!("{}: {}", comment.author, comment.text);
//! }
//! ```

mod manager;
mod types;

pub use manager::Notifier;
pub use types::{CancelToken, PublishReport, SubscriptionConfig, SubscriptionHandle, SubscriptionId};
