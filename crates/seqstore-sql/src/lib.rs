//! SQLite backend for the seqstore message store contract.
//!
//! Sessions share one database file; each store owns a row in
//! `<prefix>sessions` and its messages in `<prefix>messages`. The schema is
//! created and upgraded by the embedded migration list on open.
//!
//! ```text
//!   SqlStore ── SequenceCache (in-memory view)
//!       │
//!       └── Database ── rusqlite::Connection (WAL, synchronous=FULL)
//!                           ├── <prefix>schema_migrations
//!                           ├── <prefix>sessions
//!                           └── <prefix>messages
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod migration;
pub mod store;

pub use config::{SQL_DATABASE_PATH, SQL_TABLE_NAME_PREFIX, SqlStoreConfig};
pub use db::Database;
pub use error::{SqlError, SqlResult};
pub use store::{SqlStore, SqlStoreFactory};
