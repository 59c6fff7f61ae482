//! Error types for the seqstore-core crate.
//!
//! All store operations return [`StoreError`] via [`StoreResult`].
//! Absent or unparseable persisted state is never an error: stores fall back
//! to defaults instead. Everything here is fatal to the operation that
//! produced it and is handed back to the caller untouched.

use std::path::PathBuf;

use thiserror::Error;

/// Alias for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in a message store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A required setting was not supplied when creating a store.
    #[error("session {session_id}: required setting not found: {key}")]
    MissingSetting {
        session_id: String,
        key: &'static str,
    },

    /// A setting was supplied but its value cannot be used.
    #[error("session {session_id}: invalid value for setting {key}: {message}")]
    InvalidSetting {
        session_id: String,
        key: &'static str,
        message: String,
    },

    /// The session id cannot be used as a file name stem.
    #[error("invalid session id {0:?}: must be non-empty and free of path separators")]
    InvalidSessionId(String),

    /// A file operation failed.
    #[error("I/O error while {operation} {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A sequence number outside `1..=MAX_SEQ_NUM` was supplied.
    #[error("sequence number {0} is out of range")]
    InvalidSeqNum(u64),

    /// The store's handles were released by `close()`.
    #[error("store is closed; refresh it before further use")]
    Closed,

    /// An external storage engine reported a failure.
    #[error("{backend} backend error: {source}")]
    Backend {
        backend: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl StoreError {
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn backend(
        backend: &'static str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Backend {
            backend,
            source: Box::new(source),
        }
    }
}
