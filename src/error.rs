//! Error types for the board store.

use crate::types::PostId;
use std::fmt;
use thiserror::Error;

/// Which kind of entity a lookup failed to find.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NotFoundKind {
    Post,
    Comment,
    /// The parent named by a new reply (missing, or on another post).
    Parent,
}

impl fmt::Display for NotFoundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotFoundKind::Post => write!(f, "post"),
            NotFoundKind::Comment => write!(f, "comment"),
            NotFoundKind::Parent => write!(f, "parent comment"),
        }
    }
}

/// Coarse classification callers can branch on without matching every variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound(NotFoundKind),
    PermissionDenied,
    ConflictOrInternal,
}

/// Main error type for board operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: NotFoundKind, id: String },

    #[error("comments are disabled for post {0}")]
    CommentsDisabled(PostId),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("Invalid store format: {0}")]
    InvalidFormat(String),

    #[error("Store is locked by another process")]
    Locked,

    #[error("Store not initialized")]
    NotInitialized,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl StoreError {
    pub(crate) fn not_found(kind: NotFoundKind, id: impl fmt::Display) -> Self {
        StoreError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Validation(_) => ErrorKind::Validation,
            StoreError::NotFound { kind, .. } => ErrorKind::NotFound(*kind),
            StoreError::CommentsDisabled(_) => ErrorKind::PermissionDenied,
            _ => ErrorKind::ConflictOrInternal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

impl From<rmp_serde::encode::Error> for StoreError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for StoreError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        StoreError::Deserialization(e.to_string())
    }
}

/// Result type for board operations.
pub type Result<T> = std::result::Result<T, StoreError>;
