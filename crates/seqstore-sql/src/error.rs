//! Error types for the seqstore-sql crate.
//!
//! Internal operations return [`SqlError`] via [`SqlResult`]; at the
//! [`MessageStore`](seqstore_core::MessageStore) boundary every `SqlError`
//! becomes a [`StoreError::Backend`].

use seqstore_core::StoreError;
use thiserror::Error;

/// Alias for `Result<T, SqlError>`.
pub type SqlResult<T> = Result<T, SqlError>;

/// Errors raised by the SQLite backend.
#[derive(Debug, Error)]
pub enum SqlError {
    /// SQLite operation failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A schema migration failed.
    #[error("migration v{version} failed: {message}")]
    Migration { version: u32, message: String },

    /// A stored column could not be interpreted.
    #[error("session {session_id}: column {column} holds an invalid value: {value}")]
    InvalidColumn {
        session_id: String,
        column: &'static str,
        value: String,
    },

    /// A sequence number does not fit in an SQLite INTEGER.
    #[error("sequence number {0} does not fit in a signed 64-bit column")]
    SeqNumOverflow(u64),
}

impl From<SqlError> for StoreError {
    fn from(err: SqlError) -> Self {
        StoreError::backend("sqlite", err)
    }
}

/// Convert a sequence number for binding as an SQLite INTEGER.
pub(crate) fn to_sql_int(seq_num: u64) -> SqlResult<i64> {
    i64::try_from(seq_num).map_err(|_| SqlError::SeqNumOverflow(seq_num))
}
