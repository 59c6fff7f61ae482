//! Fixed-width sequence number files.
//!
//! Each counter is a 19-digit zero-padded decimal with no delimiter. The
//! encoded width never changes, so every update is a seek to offset zero and
//! an overwrite of the same bytes; the file never grows.

use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::file_store::{open_or_create, remove_if_exists};

/// Number of decimal digits in an encoded counter.
pub const SEQ_NUM_WIDTH: usize = 19;

/// Largest sequence number that fits in [`SEQ_NUM_WIDTH`] digits.
pub const MAX_SEQ_NUM: u64 = 9_999_999_999_999_999_999;

/// Render `seq_num` in the on-disk counter format.
pub fn encode_seq_num(seq_num: u64) -> StoreResult<String> {
    if seq_num > MAX_SEQ_NUM {
        return Err(StoreError::InvalidSeqNum(seq_num));
    }
    Ok(format!("{seq_num:0width$}", width = SEQ_NUM_WIDTH))
}

/// Parse counter file content. Only `1..=MAX_SEQ_NUM` is a valid sequence
/// number; anything else reads as absent.
pub fn decode_seq_num(content: &str) -> Option<u64> {
    content
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|n| (1..=MAX_SEQ_NUM).contains(n))
}

/// One durable sequence counter (`senderseqnums` or `targetseqnums`).
#[derive(Debug)]
pub struct SeqCounterFile {
    path: PathBuf,
    file: Option<File>,
}

impl SeqCounterFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Read the persisted value straight from disk.
    ///
    /// Returns `None` when the file is missing or does not hold a valid
    /// counter; the owning store then keeps its default.
    pub fn read(&self) -> Option<u64> {
        std::fs::read_to_string(&self.path)
            .ok()
            .as_deref()
            .and_then(decode_seq_num)
    }

    /// Open the counter for in-place rewrites, creating it if absent.
    pub fn open(&mut self) -> StoreResult<()> {
        let file = open_or_create(&self.path)?;
        let len = file
            .metadata()
            .map_err(|e| StoreError::io("inspecting", &self.path, e))?
            .len();
        // Anything past the fixed width can only be damage; drop it so the
        // next write leaves a parseable file.
        if len > SEQ_NUM_WIDTH as u64 {
            file.set_len(SEQ_NUM_WIDTH as u64)
                .map_err(|e| StoreError::io("truncating", &self.path, e))?;
        }
        self.file = Some(file);
        Ok(())
    }

    pub fn close(&mut self) {
        self.file = None;
    }

    /// Overwrite the counter with `seq_num` and flush it to stable storage.
    pub fn write(&mut self, seq_num: u64) -> StoreResult<()> {
        let encoded = encode_seq_num(seq_num)?;
        let file = self.file.as_mut().ok_or(StoreError::Closed)?;

        file.seek(SeekFrom::Start(0))
            .map_err(|e| StoreError::io("rewinding", &self.path, e))?;
        file.write_all(encoded.as_bytes())
            .map_err(|e| StoreError::io("writing", &self.path, e))?;
        file.sync_all()
            .map_err(|e| StoreError::io("flushing", &self.path, e))?;

        debug!(path = %self.path.display(), seq_num, "sequence counter written");
        Ok(())
    }

    /// Release the handle and delete the file if it exists.
    pub fn remove(&mut self) -> StoreResult<()> {
        self.close();
        remove_if_exists(&self.path)
    }
}

// ── tests ────────────────────────────────────────────────────────────
