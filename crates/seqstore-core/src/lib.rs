//! # seqstore-core
//!
//! Durable session state for sequence-numbered messaging protocols.
//!
//! A session owns a creation timestamp, the next outgoing (sender) and next
//! incoming (target) sequence numbers, and the raw bytes of every message it
//! has sent or received, keyed by sequence number. Stores persist that state
//! so a session can be recovered after a restart and historical messages can
//! be resent during gap-fill.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │  MessageStore / MessageStoreFactory (contract)  │
//! ├───────────────────────┬─────────────────────────┤
//! │  FileStore            │  MemoryStore            │
//! │  ├ FileLog            │  (BTreeMap, no I/O)     │
//! │  │  body + header     │                         │
//! │  ├ SessionMetaFile    │                         │
//! │  └ SeqCounterFile x2  │                         │
//! ├───────────────────────┴─────────────────────────┤
//! │  SequenceCache (creation time + two counters)   │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use seqstore_core::{FileStoreFactory, MessageStore, MessageStoreFactory, SessionSettings};
//!
//! let settings = SessionSettings::new().with("storage_directory", "data/store");
//! let mut store = FileStoreFactory.create("FIX.4.4-SENDER-TARGET", &settings)?;
//! store.save_message(store.next_sender_seq_num(), b"8=FIX.4.4\x01...")?;
//! store.incr_next_sender_seq_num()?;
//! ```

pub mod cache;
pub mod config;
pub mod counter;
pub mod error;
pub mod file_store;
pub mod log;
pub mod memory;
pub mod meta;
pub mod store;

// ── re-exports ───────────────────────────────────────────────────────

pub use cache::SequenceCache;
pub use config::{FileStoreConfig, STORAGE_DIRECTORY, SessionSettings};
pub use counter::{MAX_SEQ_NUM, SEQ_NUM_WIDTH, SeqCounterFile};
pub use error::{StoreError, StoreResult};
pub use file_store::{FileStore, FileStoreFactory, StorePaths};
pub use log::{FileLog, HeaderRecords, MessageLocation};
pub use memory::{MemoryStore, MemoryStoreFactory};
pub use meta::{SessionMetaFile, decode_timestamp, encode_timestamp};
pub use store::{MessageStore, MessageStoreFactory, check_seq_num};
