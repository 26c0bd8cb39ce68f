//! Append-only board log.

use crate::error::{Result, StoreError};
use crate::types::{Comment, Post};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
#[cfg(test)]
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

/// Magic bytes for board log records.
const LOG_MAGIC: &[u8; 4] = b"PBL\0";

/// Current log format version.
const LOG_VERSION: u8 = 1;

/// Record header size: magic + version + kind + payload length.
const RECORD_HEADER_SIZE: usize = 4 + 1 + 1 + 4;

/// Trailing checksum size.
const RECORD_TRAILER_SIZE: usize = 4;

const KIND_POST: u8 = 1;
const KIND_COMMENT: u8 = 2;

/// One entry in the log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogEntry {
    Post(Post),
    Comment(Comment),
}

impl LogEntry {
    fn kind(&self) -> u8 {
        match self {
            LogEntry::Post(_) => KIND_POST,
            LogEntry::Comment(_) => KIND_COMMENT,
        }
    }

    fn encode_payload(&self) -> Result<Vec<u8>> {
        let payload = match self {
            LogEntry::Post(post) => rmp_serde::to_vec_named(post)?,
            LogEntry::Comment(comment) => rmp_serde::to_vec_named(comment)?,
        };
        Ok(payload)
    }

    fn decode_payload(kind: u8, payload: &[u8]) -> Result<Self> {
        match kind {
            KIND_POST => Ok(LogEntry::Post(rmp_serde::from_slice(payload)?)),
            KIND_COMMENT => Ok(LogEntry::Comment(rmp_serde::from_slice(payload)?)),
            other => Err(StoreError::InvalidFormat(format!(
                "Unknown record kind: {}",
                other
            ))),
        }
    }
}

struct LogWriter {
    file: File,
    /// Current file size (for appending).
    size: u64,
    /// Number of writes since last sync.
    writes_since_sync: u64,
}

/// Append-only log of posts and comments.
pub struct BoardLog {
    path: PathBuf,
    writer: Mutex<LogWriter>,
    /// Sync every N writes.
    sync_interval: u64,
    #[cfg(test)]
    sync_failure: AtomicBool,
}

impl BoardLog {
    /// Appends between syncs unless configured otherwise.
    pub const DEFAULT_SYNC_INTERVAL: u64 = 100;

    /// Open or create a board log with default sync interval.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_sync_interval(path, Self::DEFAULT_SYNC_INTERVAL)
    }

    /// Open or create a board log with custom sync interval.
    /// - sync_interval = 0 or 1: sync every write
    /// - sync_interval = 100: sync every 100 writes
    pub fn open_with_sync_interval(path: impl AsRef<Path>, sync_interval: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;
        let size = file.metadata()?.len();

        Ok(Self {
            path,
            writer: Mutex::new(LogWriter {
                file,
                size,
                writes_since_sync: 0,
            }),
            sync_interval: sync_interval.max(1),
            #[cfg(test)]
            sync_failure: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an entry. Returns the offset it was written at.
    pub fn append(&self, entry: &LogEntry) -> Result<u64> {
        let payload = entry.encode_payload()?;
        let payload_len = u32::try_from(payload.len())
            .map_err(|_| StoreError::Serialization("record payload too large".into()))?;

        let mut buf = Vec::with_capacity(RECORD_HEADER_SIZE + payload.len() + RECORD_TRAILER_SIZE);
        buf.extend_from_slice(LOG_MAGIC);
        buf.push(LOG_VERSION);
        buf.push(entry.kind());
        buf.extend_from_slice(&payload_len.to_le_bytes());
        buf.extend_from_slice(&payload);
        buf.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());

        let mut writer = self.writer.lock();
        let offset = writer.size;
        writer.file.seek(SeekFrom::Start(offset))?;
        if let Err(e) = writer.file.write_all(&buf) {
            // Drop whatever part of the record made it out so the tail stays clean.
            let _ = writer.file.set_len(offset);
            return Err(e.into());
        }

        if writer.writes_since_sync + 1 >= self.sync_interval {
            if let Err(e) = self.sync_file(&writer.file) {
                // A failed append leaves nothing behind, durable or not.
                let _ = writer.file.set_len(offset);
                return Err(e.into());
            }
            writer.writes_since_sync = 0;
        } else {
            writer.writes_since_sync += 1;
        }
        writer.size = offset + buf.len() as u64;

        Ok(offset)
    }

    fn sync_file(&self, file: &File) -> std::io::Result<()> {
        if self.take_injected_sync_failure() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "injected sync failure",
            ));
        }
        file.sync_all()
    }

    #[cfg(test)]
    fn take_injected_sync_failure(&self) -> bool {
        self.sync_failure.swap(false, Ordering::SeqCst)
    }

    #[cfg(not(test))]
    fn take_injected_sync_failure(&self) -> bool {
        false
    }

    /// Make the next sync issued by `append` fail.
    #[cfg(test)]
    pub(crate) fn fail_next_sync(&self) {
        self.sync_failure.store(true, Ordering::SeqCst);
    }

    /// Force sync all pending writes to disk.
    pub fn sync(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.file.sync_all()?;
        writer.writes_since_sync = 0;
        Ok(())
    }

    /// Current file size.
    pub fn size(&self) -> u64 {
        self.writer.lock().size
    }

    /// Read every entry in order.
    ///
    /// A record cut short at the end of the file (a crash mid-append) is
    /// truncated away. Anything else malformed is an error, including a
    /// record whose declared length runs past the end while later records
    /// follow it.
    pub fn replay(&self) -> Result<Vec<LogEntry>> {
        let mut writer = self.writer.lock();
        let end = writer.size;
        writer.file.seek(SeekFrom::Start(0))?;

        let mut entries = Vec::new();
        let mut offset = 0u64;
        let mut torn = false;
        {
            let mut reader = BufReader::new(&mut writer.file);
            while offset < end {
                match Self::read_record(&mut reader, offset, end - offset)? {
                    Some((entry, len)) => {
                        entries.push(entry);
                        offset += len;
                    }
                    None => {
                        torn = true;
                        break;
                    }
                }
            }
        }

        if torn {
            warn!(
                path = %self.path.display(),
                offset,
                dropped_bytes = end - offset,
                "truncating torn record at end of board log"
            );
            writer.file.set_len(offset)?;
            writer.file.sync_all()?;
            writer.size = offset;
        }

        Ok(entries)
    }

    /// Read one record starting at `offset` with `remaining` bytes left in
    /// the file. Returns the entry and its encoded length, or `None` for a
    /// torn final record.
    fn read_record(
        reader: &mut impl Read,
        offset: u64,
        remaining: u64,
    ) -> Result<Option<(LogEntry, u64)>> {
        if remaining < RECORD_HEADER_SIZE as u64 {
            return Ok(None);
        }

        let mut header = [0u8; RECORD_HEADER_SIZE];
        reader.read_exact(&mut header)?;

        if &header[0..4] != LOG_MAGIC {
            return Err(StoreError::InvalidFormat("Invalid record magic".into()));
        }
        if header[4] != LOG_VERSION {
            return Err(StoreError::InvalidFormat(format!(
                "Unsupported log version: {}",
                header[4]
            )));
        }
        let kind = header[5];
        let payload_len = u32::from_le_bytes([header[6], header[7], header[8], header[9]]) as usize;

        let len = (RECORD_HEADER_SIZE + payload_len + RECORD_TRAILER_SIZE) as u64;
        if len > remaining {
            // Torn only if nothing after this header looks like another record.
            let mut rest = Vec::new();
            reader
                .take(remaining - RECORD_HEADER_SIZE as u64)
                .read_to_end(&mut rest)?;
            if rest.windows(LOG_MAGIC.len()).any(|w| w == &LOG_MAGIC[..]) {
                return Err(StoreError::Corruption(format!(
                    "record at offset {} declares {} payload bytes but later records follow",
                    offset, payload_len
                )));
            }
            return Ok(None);
        }

        let mut payload = vec![0u8; payload_len];
        reader.read_exact(&mut payload)?;

        let mut checksum_bytes = [0u8; RECORD_TRAILER_SIZE];
        reader.read_exact(&mut checksum_bytes)?;
        let stored_checksum = u32::from_le_bytes(checksum_bytes);
        let computed_checksum = crc32fast::hash(&payload);
        if stored_checksum != computed_checksum {
            return Err(StoreError::ChecksumMismatch {
                expected: stored_checksum,
                got: computed_checksum,
            });
        }

        let entry = LogEntry::decode_payload(kind, &payload)?;
        Ok(Some((entry, len)))
    }
}
