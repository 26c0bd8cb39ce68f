//! On-disk record log backing the persistent store.
//!
//! Posts and comments are appended as checksummed MessagePack records and
//! replayed in order when the store is reopened.

mod log;

pub use log::{BoardLog, LogEntry};
