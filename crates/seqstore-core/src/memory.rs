//! Non-durable [`MessageStore`] kept entirely in memory.
//!
//! Useful for tests and for sessions whose history does not need to
//! survive a restart. `refresh` and `close` have nothing to do.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::cache::SequenceCache;
use crate::config::SessionSettings;
use crate::error::StoreResult;
use crate::store::{MessageStore, MessageStoreFactory, check_seq_num};

#[derive(Debug, Default)]
pub struct MemoryStore {
    cache: SequenceCache,
    messages: BTreeMap<u64, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}

impl MessageStore for MemoryStore {
    fn next_sender_seq_num(&self) -> u64 {
        self.cache.next_sender_seq_num()
    }

    fn next_target_seq_num(&self) -> u64 {
        self.cache.next_target_seq_num()
    }

    fn set_next_sender_seq_num(&mut self, next: u64) -> StoreResult<()> {
        self.cache.set_next_sender_seq_num(check_seq_num(next)?);
        Ok(())
    }

    fn set_next_target_seq_num(&mut self, next: u64) -> StoreResult<()> {
        self.cache.set_next_target_seq_num(check_seq_num(next)?);
        Ok(())
    }

    fn incr_next_sender_seq_num(&mut self) -> StoreResult<()> {
        check_seq_num(self.cache.next_sender_seq_num().saturating_add(1))?;
        self.cache.incr_next_sender_seq_num();
        Ok(())
    }

    fn incr_next_target_seq_num(&mut self) -> StoreResult<()> {
        check_seq_num(self.cache.next_target_seq_num().saturating_add(1))?;
        self.cache.incr_next_target_seq_num();
        Ok(())
    }

    fn creation_time(&self) -> DateTime<Utc> {
        self.cache.creation_time()
    }

    fn save_message(&mut self, seq_num: u64, msg: &[u8]) -> StoreResult<()> {
        self.messages.insert(seq_num, msg.to_vec());
        Ok(())
    }

    fn get_messages(&self, begin: u64, end: u64) -> StoreResult<Vec<Vec<u8>>> {
        if begin > end {
            return Ok(Vec::new());
        }
        Ok(self
            .messages
            .range(begin..=end)
            .map(|(_, msg)| msg.clone())
            .collect())
    }

    fn reset(&mut self) -> StoreResult<()> {
        debug!(dropped = self.messages.len(), "memory store reset");
        self.cache.reset();
        self.messages.clear();
        Ok(())
    }

    fn refresh(&mut self) -> StoreResult<()> {
        Ok(())
    }

    fn close(&mut self) -> StoreResult<()> {
        Ok(())
    }
}

/// Factory for [`MemoryStore`]; settings are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryStoreFactory;

impl MessageStoreFactory for MemoryStoreFactory {
    fn create(
        &self,
        session_id: &str,
        _settings: &SessionSettings,
    ) -> StoreResult<Box<dyn MessageStore>> {
        debug!(session_id, "memory store created");
        Ok(Box::new(MemoryStore::new()))
    }
}

// ── tests ────────────────────────────────────────────────────────────
