//! Persistent store backed by the board log.

use super::tables::Tables;
use super::Storage;
use crate::error::{Result, StoreError};
use crate::records::{BoardLog, LogEntry};
use crate::types::{Comment, CommentId, NewComment, Page, Post, PostId, PostOrder, StoreStats};
use fs2::FileExt;
use parking_lot::RwLock;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Magic bytes for store manifest.
const STORE_MAGIC: &[u8; 4] = b"PBS\0";

/// Current store format version.
const STORE_VERSION: u8 = 1;

/// Log store configuration.
#[derive(Clone, Debug)]
pub struct LogStoreConfig {
    /// Base directory for the store.
    pub path: PathBuf,

    /// Whether to create the store if it doesn't exist.
    pub create_if_missing: bool,

    /// Sync the log every N appends.
    pub sync_interval: u64,

    pub post_order: PostOrder,
}

impl Default for LogStoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./board"),
            create_if_missing: true,
            sync_interval: BoardLog::DEFAULT_SYNC_INTERVAL,
            post_order: PostOrder::default(),
        }
    }
}

struct State {
    tables: Tables,
    /// Next auto-increment comment identity.
    next_comment_seq: u64,
}

impl State {
    fn new(post_order: PostOrder) -> Self {
        Self {
            tables: Tables::new(post_order),
            next_comment_seq: 1,
        }
    }

    fn observe_comment_id(&mut self, id: &CommentId) {
        if let Some(seq) = id.as_sequence() {
            self.next_comment_seq = self.next_comment_seq.max(seq.saturating_add(1));
        }
    }
}

/// Store whose tables are rebuilt from an append-only log on open.
///
/// Comments get auto-increment identities that keep counting across
/// reopens. Every write is validated, appended to the log, and only then
/// made visible, all under the write lock.
pub struct LogStore {
    config: LogStoreConfig,

    /// Lock file for exclusive access.
    _lock_file: File,

    log: BoardLog,

    state: RwLock<State>,
}

impl LogStore {
    /// Open an existing store or create a new one.
    pub fn open_or_create(config: LogStoreConfig) -> Result<Self> {
        if config.path.join("MANIFEST").exists() {
            Self::open(config)
        } else if config.create_if_missing {
            Self::create(config)
        } else {
            Err(StoreError::NotInitialized)
        }
    }

    /// Create a new store. Fails with `Conflict` if one already exists at
    /// the path; use `open` or `open_or_create` for that.
    pub fn create(config: LogStoreConfig) -> Result<Self> {
        fs::create_dir_all(&config.path)?;
        let lock_file = Self::acquire_lock(&config.path)?;
        if config.path.join("MANIFEST").exists() {
            return Err(StoreError::Conflict(format!(
                "a store already exists at {}",
                config.path.display()
            )));
        }
        Self::write_manifest(&config.path)?;

        let log = BoardLog::open_with_sync_interval(Self::log_path(&config.path), config.sync_interval)?;
        let state = State::new(config.post_order);

        info!(path = %config.path.display(), "created log store");

        Ok(Self {
            config,
            _lock_file: lock_file,
            log,
            state: RwLock::new(state),
        })
    }

    /// Open an existing store, replaying its log.
    pub fn open(config: LogStoreConfig) -> Result<Self> {
        Self::verify_manifest(&config.path)?;
        let lock_file = Self::acquire_lock(&config.path)?;

        let log = BoardLog::open_with_sync_interval(Self::log_path(&config.path), config.sync_interval)?;
        let state = Self::rebuild(log.replay()?, config.post_order)?;

        let stats = state.tables.stats();
        info!(
            path = %config.path.display(),
            posts = stats.post_count,
            comments = stats.comment_count,
            "opened log store"
        );

        Ok(Self {
            config,
            _lock_file: lock_file,
            log,
            state: RwLock::new(state),
        })
    }

    pub fn config(&self) -> &LogStoreConfig {
        &self.config
    }

    /// Force sync the log to disk.
    pub fn sync(&self) -> Result<()> {
        self.log.sync()
    }

    /// Replay log entries into fresh tables.
    ///
    /// Entries were validated before they were written, so any rule broken
    /// here means the log itself is damaged.
    fn rebuild(entries: Vec<LogEntry>, post_order: PostOrder) -> Result<State> {
        let mut state = State::new(post_order);

        for entry in entries {
            match entry {
                LogEntry::Post(post) => {
                    if state.tables.check_post(&post).is_err() {
                        return Err(StoreError::Corruption(format!(
                            "duplicate post {} in board log",
                            post.id
                        )));
                    }
                    state.tables.insert_post(post);
                }
                LogEntry::Comment(comment) => {
                    if state.tables.check_comment_id(&comment.id).is_err() {
                        return Err(StoreError::Corruption(format!(
                            "duplicate comment {} in board log",
                            comment.id
                        )));
                    }
                    state.observe_comment_id(&comment.id);
                    state.tables.insert_comment(comment);
                }
            }
        }

        Ok(state)
    }

    fn log_path(path: &Path) -> PathBuf {
        path.join("board.log")
    }

    fn write_manifest(path: &Path) -> Result<()> {
        let mut file = File::create(path.join("MANIFEST"))?;
        file.write_all(STORE_MAGIC)?;
        file.write_all(&[STORE_VERSION])?;
        file.sync_all()?;
        Ok(())
    }

    fn verify_manifest(path: &Path) -> Result<()> {
        let mut file = File::open(path.join("MANIFEST"))?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != STORE_MAGIC {
            return Err(StoreError::InvalidFormat("Invalid store magic".into()));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != STORE_VERSION {
            return Err(StoreError::InvalidFormat(format!(
                "Unsupported store version: {}",
                version[0]
            )));
        }

        Ok(())
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_file = File::create(path.join("LOCK"))?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| StoreError::Locked)?;
        Ok(lock_file)
    }
}

impl Storage for LogStore {
    fn create_post(&self, post: Post) -> Result<()> {
        let mut state = self.state.write();
        state.tables.check_post(&post)?;

        self.log.append(&LogEntry::Post(post.clone()))?;
        state.tables.insert_post(post);
        Ok(())
    }

    fn posts(&self) -> Result<Vec<Post>> {
        Ok(self.state.read().tables.posts())
    }

    fn post(&self, id: &PostId) -> Result<Post> {
        self.state.read().tables.post(id)
    }

    fn create_comment(&self, mut input: NewComment) -> Result<Comment> {
        let mut state = self.state.write();
        state.tables.check_comment(&input)?;

        let id = input
            .id
            .take()
            .unwrap_or_else(|| CommentId::from_sequence(state.next_comment_seq));
        let comment = input.into_comment(id);

        let offset = self.log.append(&LogEntry::Comment(comment.clone()))?;
        state.observe_comment_id(&comment.id);
        state.tables.insert_comment(comment.clone());

        debug!(comment_id = %comment.id, post_id = %comment.post_id, offset, "appended comment");
        Ok(comment)
    }

    fn comment(&self, id: &CommentId) -> Result<Comment> {
        self.state.read().tables.comment(id)
    }

    fn comments_by_post(&self, post_id: &PostId, page: Page) -> Result<Vec<Comment>> {
        Ok(self.state.read().tables.root_comments(post_id, page))
    }

    fn replies_by_comment(&self, comment_id: &CommentId, page: Page) -> Result<Vec<Comment>> {
        Ok(self.state.read().tables.direct_replies(comment_id, page))
    }

    fn stats(&self) -> StoreStats {
        self.state.read().tables.stats()
    }
}

impl Drop for LogStore {
    fn drop(&mut self) {
        // Best-effort sync on drop
        let _ = self.log.sync();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> LogStoreConfig {
        LogStoreConfig {
            path: dir.path().join("board"),
            sync_interval: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_reopen_preserves_everything() {
        let dir = TempDir::new().unwrap();
        let post = Post::new("T", "C", "A", true);

        let (root, reply) = {
            let store = LogStore::create(test_config(&dir)).unwrap();
            store.create_post(post.clone()).unwrap();
            let root = store
                .create_comment(NewComment::new(post.id.clone(), "j", "root"))
                .unwrap();
            let reply = store
                .create_comment(NewComment::new(post.id.clone(), "k", "reply").reply_to(root.id.clone()))
                .unwrap();
            (root, reply)
        };

        let store = LogStore::open(test_config(&dir)).unwrap();
        assert_eq!(store.post(&post.id).unwrap(), post);
        assert_eq!(
            store.comments_by_post(&post.id, Page::first(10)).unwrap(),
            vec![root.clone()]
        );
        assert_eq!(
            store.replies_by_comment(&root.id, Page::first(10)).unwrap(),
            vec![reply]
        );
    }

    #[test]
    fn test_comment_ids_resume_after_reopen() {
        let dir = TempDir::new().unwrap();
        let post = Post::new("T", "C", "A", true);

        {
            let store = LogStore::create(test_config(&dir)).unwrap();
            store.create_post(post.clone()).unwrap();
            for expected in 1..=3 {
                let c = store
                    .create_comment(NewComment::new(post.id.clone(), "j", "hi"))
                    .unwrap();
                assert_eq!(c.id.as_sequence(), Some(expected));
            }
        }

        let store = LogStore::open(test_config(&dir)).unwrap();
        let c = store
            .create_comment(NewComment::new(post.id.clone(), "j", "after"))
            .unwrap();
        assert_eq!(c.id, CommentId::from_sequence(4));
    }

    #[test]
    fn test_pinned_numeric_id_advances_counter() {
        let dir = TempDir::new().unwrap();
        let store = LogStore::create(test_config(&dir)).unwrap();
        let post = Post::new("T", "C", "A", true);
        store.create_post(post.clone()).unwrap();

        store
            .create_comment(NewComment::new(post.id.clone(), "j", "pinned").with_id(CommentId::from_sequence(10)))
            .unwrap();
        let next = store
            .create_comment(NewComment::new(post.id.clone(), "j", "auto"))
            .unwrap();
        assert_eq!(next.id, CommentId::from_sequence(11));
    }

    #[test]
    fn test_create_refuses_existing_store() {
        let dir = TempDir::new().unwrap();
        let post = Post::new("T", "C", "A", true);
        {
            let store = LogStore::create(test_config(&dir)).unwrap();
            store.create_post(post.clone()).unwrap();
            store
                .create_comment(NewComment::new(post.id.clone(), "j", "hi"))
                .unwrap();
        }

        assert!(matches!(
            LogStore::create(test_config(&dir)),
            Err(StoreError::Conflict(_))
        ));

        // The existing store is untouched.
        let store = LogStore::open(test_config(&dir)).unwrap();
        assert_eq!(store.stats().comment_count, 1);
        let next = store
            .create_comment(NewComment::new(post.id.clone(), "j", "again"))
            .unwrap();
        assert_eq!(next.id, CommentId::from_sequence(2));
    }

    #[test]
    fn test_failed_sync_leaves_no_trace() {
        let dir = TempDir::new().unwrap();
        let post = Post::new("T", "C", "A", true);
        {
            let store = LogStore::create(test_config(&dir)).unwrap();
            store.create_post(post.clone()).unwrap();

            store.log.fail_next_sync();
            assert!(store
                .create_comment(NewComment::new(post.id.clone(), "j", "lost"))
                .is_err());
            assert_eq!(store.stats().comment_count, 0);

            let kept = store
                .create_comment(NewComment::new(post.id.clone(), "j", "kept"))
                .unwrap();
            assert_eq!(kept.id, CommentId::from_sequence(1));
        }

        let store = LogStore::open(test_config(&dir)).unwrap();
        let comments = store.comments_by_post(&post.id, Page::first(10)).unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].text, "kept");
    }

    #[test]
    fn test_duplicate_record_is_corruption() {
        let dir = TempDir::new().unwrap();
        let comment = {
            let store = LogStore::create(test_config(&dir)).unwrap();
            let post = Post::new("T", "C", "A", true);
            store.create_post(post.clone()).unwrap();
            store
                .create_comment(NewComment::new(post.id, "j", "hi"))
                .unwrap()
        };

        {
            let log = BoardLog::open(dir.path().join("board").join("board.log")).unwrap();
            log.append(&LogEntry::Comment(comment)).unwrap();
        }

        match LogStore::open(test_config(&dir)) {
            Err(StoreError::Corruption(msg)) => {
                assert_eq!(msg, "duplicate comment 1 in board log")
            }
            other => panic!("expected corruption, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_second_open_is_locked() {
        let dir = TempDir::new().unwrap();
        let _store = LogStore::create(test_config(&dir)).unwrap();

        let result = LogStore::open(test_config(&dir));
        assert!(matches!(result, Err(StoreError::Locked)));
    }

    #[test]
    fn test_open_missing_without_create() {
        let dir = TempDir::new().unwrap();
        let config = LogStoreConfig {
            create_if_missing: false,
            ..test_config(&dir)
        };
        assert!(matches!(
            LogStore::open_or_create(config),
            Err(StoreError::NotInitialized)
        ));
    }

    #[test]
    fn test_rejected_comment_never_reaches_log() {
        let dir = TempDir::new().unwrap();
        let store = LogStore::create(test_config(&dir)).unwrap();
        let post = Post::new("T", "C", "A", false);
        store.create_post(post.clone()).unwrap();
        let size = store.log.size();

        assert!(store
            .create_comment(NewComment::new(post.id, "j", "hi"))
            .is_err());
        assert_eq!(store.log.size(), size);
    }
}
