//! In-memory session state shared by every store backend.
//!
//! [`SequenceCache`] holds the creation time and the two sequence counters.
//! It does no I/O and cannot fail; stores validate values before handing
//! them over and take care of persisting whatever the cache ends up holding.

use chrono::{DateTime, Utc};

/// Creation time plus next sender/target sequence numbers for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceCache {
    creation_time: DateTime<Utc>,
    next_sender_seq_num: u64,
    next_target_seq_num: u64,
}

impl SequenceCache {
    /// A fresh cache: created now, both counters at 1.
    pub fn new() -> Self {
        Self {
            creation_time: Utc::now(),
            next_sender_seq_num: 1,
            next_target_seq_num: 1,
        }
    }

    pub fn creation_time(&self) -> DateTime<Utc> {
        self.creation_time
    }

    /// Adopt a creation time recovered from persistent storage.
    pub fn set_creation_time(&mut self, creation_time: DateTime<Utc>) {
        self.creation_time = creation_time;
    }

    pub fn next_sender_seq_num(&self) -> u64 {
        self.next_sender_seq_num
    }

    pub fn next_target_seq_num(&self) -> u64 {
        self.next_target_seq_num
    }

    pub fn set_next_sender_seq_num(&mut self, next: u64) {
        self.next_sender_seq_num = next;
    }

    pub fn set_next_target_seq_num(&mut self, next: u64) {
        self.next_target_seq_num = next;
    }

    /// Advance by one. Stores reject the step with `check_seq_num` before
    /// calling this, so the saturation at `u64::MAX` is never reached
    /// through a store.
    pub fn incr_next_sender_seq_num(&mut self) {
        self.next_sender_seq_num = self.next_sender_seq_num.saturating_add(1);
    }

    /// Advance by one; see [`Self::incr_next_sender_seq_num`].
    pub fn incr_next_target_seq_num(&mut self) {
        self.next_target_seq_num = self.next_target_seq_num.saturating_add(1);
    }

    /// Start over: new creation time, both counters back to 1.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for SequenceCache {
    fn default() -> Self {
        Self::new()
    }
}

// ── tests ────────────────────────────────────────────────────────────
