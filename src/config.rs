//! Board configuration.
//!
//! Every field has a default; `from_env` overrides them from `POSTBOARD_*`
//! variables, reading a `.env` file first if one is present.

use crate::error::{Result, StoreError};
use crate::store::{LogStore, LogStoreConfig, MemoryStore, Storage};
use crate::types::PostOrder;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Default cap on comment length, in characters.
pub const DEFAULT_MAX_COMMENT_CHARS: usize = 2000;

/// Which backend holds posts and comments.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StorageKind {
    #[default]
    Memory,
    Log,
}

impl FromStr for StorageKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" | "inmemory" | "in-memory" => Ok(StorageKind::Memory),
            "log" | "disk" | "persistent" => Ok(StorageKind::Log),
            other => Err(format!("unknown storage kind: {}", other)),
        }
    }
}

/// Storage backend configuration.
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub kind: StorageKind,

    /// Directory for the log backend.
    pub data_dir: PathBuf,

    /// Log backend: sync every N appends.
    pub sync_interval: u64,

    pub post_order: PostOrder,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: StorageKind::default(),
            data_dir: PathBuf::from("./board"),
            sync_interval: LogStoreConfig::default().sync_interval,
            post_order: PostOrder::default(),
        }
    }
}

/// Top-level configuration.
#[derive(Clone, Debug)]
pub struct BoardConfig {
    pub storage: StorageConfig,

    /// Buffered comments per live subscriber.
    pub subscriber_buffer: usize,

    /// Longest accepted comment, in characters.
    pub max_comment_chars: usize,

    /// Page size used when reading whole reply trees.
    pub thread_page_size: usize,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            subscriber_buffer: 1,
            max_comment_chars: DEFAULT_MAX_COMMENT_CHARS,
            thread_page_size: 100,
        }
    }
}

impl BoardConfig {
    /// Load from the process environment (and `.env`, if present).
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            info!(path = %path.display(), "loaded .env file");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(kind) = parse_var(&lookup, "POSTBOARD_STORAGE")? {
            config.storage.kind = kind;
        }
        if let Some(dir) = lookup("POSTBOARD_DATA_DIR") {
            config.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(interval) = parse_var(&lookup, "POSTBOARD_SYNC_INTERVAL")? {
            config.storage.sync_interval = interval;
        }
        if let Some(order) = parse_var(&lookup, "POSTBOARD_POST_ORDER")? {
            config.storage.post_order = order;
        }
        if let Some(buffer) = parse_var::<usize, _>(&lookup, "POSTBOARD_SUBSCRIBER_BUFFER")? {
            if buffer == 0 {
                return Err(StoreError::InvalidConfig(
                    "POSTBOARD_SUBSCRIBER_BUFFER must be at least 1".into(),
                ));
            }
            config.subscriber_buffer = buffer;
        }
        if let Some(max) = parse_var::<usize, _>(&lookup, "POSTBOARD_MAX_COMMENT_CHARS")? {
            if max == 0 {
                return Err(StoreError::InvalidConfig(
                    "POSTBOARD_MAX_COMMENT_CHARS must be at least 1".into(),
                ));
            }
            config.max_comment_chars = max;
        }

        Ok(config)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| StoreError::InvalidConfig(format!("{}: {}", key, e))),
        _ => Ok(None),
    }
}

/// Open the backend described by `config`.
pub fn open_storage(config: &StorageConfig) -> Result<Arc<dyn Storage>> {
    match config.kind {
        StorageKind::Memory => {
            info!("using in-memory storage");
            Ok(Arc::new(MemoryStore::with_post_order(config.post_order)))
        }
        StorageKind::Log => {
            info!(path = %config.data_dir.display(), "using log storage");
            let store = LogStore::open_or_create(LogStoreConfig {
                path: config.data_dir.clone(),
                create_if_missing: true,
                sync_interval: config.sync_interval,
                post_order: config.post_order,
            })?;
            Ok(Arc::new(store))
        }
    }
}
