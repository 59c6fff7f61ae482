//! The store contract every backend implements.

use chrono::{DateTime, Utc};

use crate::config::SessionSettings;
use crate::counter::MAX_SEQ_NUM;
use crate::error::{StoreError, StoreResult};

/// Durable state of one session: creation time, next sender/target
/// sequence numbers, and the raw bytes of every message keyed by
/// sequence number.
///
/// Implementations assume a single owner; callers serialize access.
pub trait MessageStore: Send {
    /// Next sequence number this side will send.
    fn next_sender_seq_num(&self) -> u64;

    /// Next sequence number expected from the counterparty.
    fn next_target_seq_num(&self) -> u64;

    fn set_next_sender_seq_num(&mut self, next: u64) -> StoreResult<()>;

    fn set_next_target_seq_num(&mut self, next: u64) -> StoreResult<()>;

    fn incr_next_sender_seq_num(&mut self) -> StoreResult<()>;

    fn incr_next_target_seq_num(&mut self) -> StoreResult<()>;

    /// When the session was first created (or last reset).
    fn creation_time(&self) -> DateTime<Utc>;

    /// Persist `msg` under `seq_num`. Saving a seq_num again replaces what
    /// later reads return.
    fn save_message(&mut self, seq_num: u64, msg: &[u8]) -> StoreResult<()>;

    /// Messages with `begin <= seq_num <= end` in increasing order; missing
    /// sequence numbers are omitted and `begin > end` yields nothing.
    fn get_messages(&self, begin: u64, end: u64) -> StoreResult<Vec<Vec<u8>>>;

    /// Wipe the session: no messages, both counters at 1, new creation time.
    fn reset(&mut self) -> StoreResult<()>;

    /// Reload all state from the backing storage.
    fn refresh(&mut self) -> StoreResult<()>;

    /// Release backing resources. Safe to call more than once.
    fn close(&mut self) -> StoreResult<()>;
}

/// Creates a store bound to one session id.
pub trait MessageStoreFactory {
    fn create(
        &self,
        session_id: &str,
        settings: &SessionSettings,
    ) -> StoreResult<Box<dyn MessageStore>>;
}

/// Validate a caller-supplied next sequence number.
pub fn check_seq_num(seq_num: u64) -> StoreResult<u64> {
    if seq_num == 0 || seq_num > MAX_SEQ_NUM {
        return Err(StoreError::InvalidSeqNum(seq_num));
    }
    Ok(seq_num)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_seq_num_bounds() {
        assert!(check_seq_num(0).is_err());
        assert_eq!(check_seq_num(1).unwrap(), 1);
        assert_eq!(check_seq_num(MAX_SEQ_NUM).unwrap(), MAX_SEQ_NUM);
        assert!(matches!(
            check_seq_num(MAX_SEQ_NUM + 1),
            Err(StoreError::InvalidSeqNum(_))
        ));
    }
}
