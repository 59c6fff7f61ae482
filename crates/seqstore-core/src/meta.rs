//! Session creation timestamp file.
//!
//! Written once when a session is first seen (and again after a reset).
//! The encoding is RFC 3339 in UTC with nanosecond precision, which is
//! fixed width for every timestamp this crate produces.

use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::file_store::{open_or_create, remove_if_exists};

/// Canonical text form of a creation timestamp.
pub fn encode_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse a timestamp written by [`encode_timestamp`] (any RFC 3339 offset is accepted).
pub fn decode_timestamp(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// The `<session>.session` file.
#[derive(Debug)]
pub struct SessionMetaFile {
    path: PathBuf,
    file: Option<File>,
}

impl SessionMetaFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the recorded creation time; `None` means the session has not
    /// been recorded yet (or the record is unreadable).
    pub fn read(&self) -> Option<DateTime<Utc>> {
        std::fs::read_to_string(&self.path)
            .ok()
            .as_deref()
            .and_then(decode_timestamp)
    }

    pub fn open(&mut self) -> StoreResult<()> {
        self.file = Some(open_or_create(&self.path)?);
        Ok(())
    }

    pub fn close(&mut self) {
        self.file = None;
    }

    /// Rewrite the file with `timestamp` and flush it to stable storage.
    pub fn write(&mut self, timestamp: &DateTime<Utc>) -> StoreResult<()> {
        let encoded = encode_timestamp(timestamp);
        let file = self.file.as_mut().ok_or(StoreError::Closed)?;

        file.seek(SeekFrom::Start(0))
            .map_err(|e| StoreError::io("rewinding", &self.path, e))?;
        file.write_all(encoded.as_bytes())
            .map_err(|e| StoreError::io("writing", &self.path, e))?;
        file.set_len(encoded.len() as u64)
            .map_err(|e| StoreError::io("truncating", &self.path, e))?;
        file.sync_all()
            .map_err(|e| StoreError::io("flushing", &self.path, e))?;

        debug!(path = %self.path.display(), creation_time = %encoded, "creation time written");
        Ok(())
    }

    pub fn remove(&mut self) -> StoreResult<()> {
        self.close();
        remove_if_exists(&self.path)
    }
}

// ── tests ────────────────────────────────────────────────────────────
