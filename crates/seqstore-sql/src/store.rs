//! SQLite-backed [`MessageStore`].
//!
//! One row per session in `<prefix>sessions` holds the creation time and
//! both counters; messages live in `<prefix>messages` keyed by
//! `(session_id, msgseqnum)`. Counter updates hit the row first and the
//! cache only once the row is written.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use seqstore_core::{
    MessageStore, MessageStoreFactory, SequenceCache, SessionSettings, StoreError, StoreResult,
    check_seq_num, decode_timestamp, encode_timestamp,
};
use tracing::{debug, info, instrument};

use crate::config::SqlStoreConfig;
use crate::db::Database;
use crate::error::{SqlError, SqlResult, to_sql_int};

/// Which counter column an update targets.
#[derive(Debug, Clone, Copy)]
enum SeqColumn {
    /// Next sequence number expected from the counterparty.
    Incoming,
    /// Next sequence number this side will send.
    Outgoing,
}

impl SeqColumn {
    fn name(self) -> &'static str {
        match self {
            Self::Incoming => "incoming_seqnum",
            Self::Outgoing => "outgoing_seqnum",
        }
    }
}

/// A session store kept in SQLite tables.
#[derive(Debug)]
pub struct SqlStore {
    session_id: String,
    table_prefix: String,
    cache: SequenceCache,
    db: Option<Database>,
}

impl SqlStore {
    /// Open the database named by `config`, migrate it and load the session.
    pub fn open(session_id: impl Into<String>, config: &SqlStoreConfig) -> StoreResult<Self> {
        let db = Database::open(&config.database_path)?;
        Self::with_database(session_id, db, &config.table_prefix)
    }

    /// Bind a store to an already opened database.
    pub fn with_database(
        session_id: impl Into<String>,
        db: Database,
        table_prefix: &str,
    ) -> StoreResult<Self> {
        db.run_migrations(table_prefix)?;

        let mut store = Self {
            session_id: session_id.into(),
            table_prefix: table_prefix.to_string(),
            cache: SequenceCache::new(),
            db: Some(db),
        };
        store.populate_cache()?;

        info!(
            session_id = %store.session_id,
            next_sender_seq_num = store.cache.next_sender_seq_num(),
            next_target_seq_num = store.cache.next_target_seq_num(),
            "sql store opened"
        );
        Ok(store)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn is_open(&self) -> bool {
        self.db.is_some()
    }

    fn table(&self, name: &str) -> String {
        format!("{}{}", self.table_prefix, name)
    }

    fn db(&self) -> StoreResult<&Database> {
        self.db.as_ref().ok_or(StoreError::Closed)
    }

    fn db_mut(&mut self) -> StoreResult<&mut Database> {
        self.db.as_mut().ok_or(StoreError::Closed)
    }

    /// Adopt the session row if there is one, otherwise record the cache's
    /// defaults as a new row.
    fn populate_cache(&mut self) -> StoreResult<()> {
        let select = format!(
            "SELECT creation_time, incoming_seqnum, outgoing_seqnum FROM {} WHERE session_id = ?1",
            self.table("sessions")
        );
        let row = self.db()?.execute(|conn| {
            Ok(conn
                .query_row(&select, params![self.session_id], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                })
                .optional()?)
        })?;

        let Some((creation_time, incoming, outgoing)) = row else {
            self.insert_session_row()?;
            debug!(session_id = %self.session_id, "session row created");
            return Ok(());
        };

        let creation_time =
            decode_timestamp(&creation_time).ok_or_else(|| SqlError::InvalidColumn {
                session_id: self.session_id.clone(),
                column: "creation_time",
                value: creation_time.clone(),
            })?;
        let incoming = self.seq_num_from_column(SeqColumn::Incoming, incoming)?;
        let outgoing = self.seq_num_from_column(SeqColumn::Outgoing, outgoing)?;

        self.cache.set_creation_time(creation_time);
        self.cache.set_next_target_seq_num(incoming);
        self.cache.set_next_sender_seq_num(outgoing);
        Ok(())
    }

    fn seq_num_from_column(&self, column: SeqColumn, value: i64) -> SqlResult<u64> {
        u64::try_from(value)
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| SqlError::InvalidColumn {
                session_id: self.session_id.clone(),
                column: column.name(),
                value: value.to_string(),
            })
    }

    fn insert_session_row(&self) -> StoreResult<()> {
        let insert = format!(
            "INSERT INTO {} (session_id, creation_time, incoming_seqnum, outgoing_seqnum) \
             VALUES (?1, ?2, ?3, ?4)",
            self.table("sessions")
        );
        let incoming = to_sql_int(self.cache.next_target_seq_num())?;
        let outgoing = to_sql_int(self.cache.next_sender_seq_num())?;
        self.db()?.execute(|conn| {
            conn.execute(
                &insert,
                params![
                    self.session_id,
                    encode_timestamp(&self.cache.creation_time()),
                    incoming,
                    outgoing
                ],
            )?;
            Ok(())
        })?;
        Ok(())
    }

    fn update_seq_num(&self, column: SeqColumn, next: u64) -> StoreResult<()> {
        let update = format!(
            "UPDATE {} SET {} = ?1 WHERE session_id = ?2",
            self.table("sessions"),
            column.name()
        );
        let next = to_sql_int(next)?;
        self.db()?.execute(|conn| {
            conn.execute(&update, params![next, self.session_id])?;
            Ok(())
        })?;
        Ok(())
    }
}

impl MessageStore for SqlStore {
    fn next_sender_seq_num(&self) -> u64 {
        self.cache.next_sender_seq_num()
    }

    fn next_target_seq_num(&self) -> u64 {
        self.cache.next_target_seq_num()
    }

    fn set_next_sender_seq_num(&mut self, next: u64) -> StoreResult<()> {
        check_seq_num(next)?;
        self.update_seq_num(SeqColumn::Outgoing, next)?;
        self.cache.set_next_sender_seq_num(next);
        Ok(())
    }

    fn set_next_target_seq_num(&mut self, next: u64) -> StoreResult<()> {
        check_seq_num(next)?;
        self.update_seq_num(SeqColumn::Incoming, next)?;
        self.cache.set_next_target_seq_num(next);
        Ok(())
    }

    fn incr_next_sender_seq_num(&mut self) -> StoreResult<()> {
        let next = self.cache.next_sender_seq_num().saturating_add(1);
        self.set_next_sender_seq_num(next)
    }

    fn incr_next_target_seq_num(&mut self) -> StoreResult<()> {
        let next = self.cache.next_target_seq_num().saturating_add(1);
        self.set_next_target_seq_num(next)
    }

    fn creation_time(&self) -> DateTime<Utc> {
        self.cache.creation_time()
    }

    fn save_message(&mut self, seq_num: u64, msg: &[u8]) -> StoreResult<()> {
        let upsert = format!(
            "INSERT INTO {} (session_id, msgseqnum, message) VALUES (?1, ?2, ?3) \
             ON CONFLICT(session_id, msgseqnum) DO UPDATE SET message = excluded.message",
            self.table("messages")
        );
        let seq_num = to_sql_int(seq_num)?;
        self.db()?.execute(|conn| {
            conn.execute(&upsert, params![self.session_id, seq_num, msg])?;
            Ok(())
        })?;
        Ok(())
    }

    fn get_messages(&self, begin: u64, end: u64) -> StoreResult<Vec<Vec<u8>>> {
        let db = self.db()?;
        // Nothing can be stored above i64::MAX, so clamp the bounds.
        let Ok(begin) = i64::try_from(begin) else {
            return Ok(Vec::new());
        };
        let end = i64::try_from(end).unwrap_or(i64::MAX);
        if begin > end {
            return Ok(Vec::new());
        }

        let select = format!(
            "SELECT message FROM {} WHERE session_id = ?1 AND msgseqnum >= ?2 AND msgseqnum <= ?3 \
             ORDER BY msgseqnum",
            self.table("messages")
        );
        let messages = db.execute(|conn| {
            let mut stmt = conn.prepare(&select)?;
            let rows = stmt
                .query_map(params![self.session_id, begin, end], |row| {
                    row.get::<_, Vec<u8>>(0)
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        Ok(messages)
    }

    #[instrument(skip(self), fields(session_id = %self.session_id))]
    fn reset(&mut self) -> StoreResult<()> {
        let fresh = SequenceCache::new();
        let delete = format!(
            "DELETE FROM {} WHERE session_id = ?1",
            self.table("messages")
        );
        let update = format!(
            "UPDATE {} SET creation_time = ?1, incoming_seqnum = ?2, outgoing_seqnum = ?3 \
             WHERE session_id = ?4",
            self.table("sessions")
        );
        let creation_time = encode_timestamp(&fresh.creation_time());
        let incoming = to_sql_int(fresh.next_target_seq_num())?;
        let outgoing = to_sql_int(fresh.next_sender_seq_num())?;
        let session_id = self.session_id.clone();

        let deleted = self.db_mut()?.execute_mut(|conn| {
            let tx = conn.transaction()?;
            let deleted = tx.execute(&delete, params![session_id])?;
            tx.execute(
                &update,
                params![creation_time, incoming, outgoing, session_id],
            )?;
            tx.commit()?;
            Ok(deleted)
        })?;

        self.cache = fresh;
        info!(deleted, "sql store reset");
        Ok(())
    }

    fn refresh(&mut self) -> StoreResult<()> {
        self.db()?;
        self.cache.reset();
        self.populate_cache()
    }

    fn close(&mut self) -> StoreResult<()> {
        if let Some(db) = self.db.take() {
            db.close()?;
            debug!(session_id = %self.session_id, "sql store closed");
        }
        Ok(())
    }
}

/// Factory for [`SqlStore`]; requires the `sql_database_path` setting.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlStoreFactory;

impl MessageStoreFactory for SqlStoreFactory {
    fn create(
        &self,
        session_id: &str,
        settings: &SessionSettings,
    ) -> StoreResult<Box<dyn MessageStore>> {
        let config = SqlStoreConfig::from_settings(session_id, settings)?;
        Ok(Box::new(SqlStore::open(session_id, &config)?))
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_store(session_id: &str) -> SqlStore {
        SqlStore::with_database(session_id, Database::open_in_memory().unwrap(), "").unwrap()
    }

    fn session_row(store: &SqlStore) -> (String, i64, i64) {
        store
            .db()
            .unwrap()
            .execute(|conn| {
                Ok(conn.query_row(
                    "SELECT creation_time, incoming_seqnum, outgoing_seqnum FROM sessions \
                     WHERE session_id = ?1",
                    params![store.session_id],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )?)
            })
            .unwrap()
    }

    #[test]
    fn open_inserts_session_row() {
        let store = memory_store("S");
        let (creation_time, incoming, outgoing) = session_row(&store);
        assert_eq!(decode_timestamp(&creation_time), Some(store.creation_time()));
        assert_eq!((incoming, outgoing), (1, 1));
    }

    #[test]
    fn counters_update_row() {
        let mut store = memory_store("S");
        store.set_next_sender_seq_num(12).unwrap();
        store.incr_next_target_seq_num().unwrap();
        store.incr_next_target_seq_num().unwrap();

        let (_, incoming, outgoing) = session_row(&store);
        assert_eq!(incoming, 3);
        assert_eq!(outgoing, 12);
    }

    #[test]
    fn refresh_reloads_row() {
        let mut store = memory_store("S");
        store
            .db()
            .unwrap()
            .execute(|conn| {
                conn.execute(
                    "UPDATE sessions SET outgoing_seqnum = 77 WHERE session_id = 'S'",
                    [],
                )?;
                Ok(())
            })
            .unwrap();
        assert_eq!(store.next_sender_seq_num(), 1);

        store.refresh().unwrap();
        assert_eq!(store.next_sender_seq_num(), 77);
    }

    #[test]
    fn save_twice_keeps_latest() {
        let mut store = memory_store("S");
        store.save_message(1, b"first").unwrap();
        store.save_message(1, b"second").unwrap();
        assert_eq!(store.get_messages(1, 1).unwrap(), vec![b"second".to_vec()]);
    }

    #[test]
    fn range_bounds_above_sqlite_integer_are_clamped() {
        let mut store = memory_store("S");
        store.save_message(5, b"five").unwrap();
        assert_eq!(store.get_messages(1, u64::MAX).unwrap().len(), 1);
        assert!(store.get_messages(u64::MAX - 1, u64::MAX).unwrap().is_empty());
        assert!(matches!(
            store.save_message(u64::MAX, b"x"),
            Err(StoreError::Backend { .. })
        ));
    }

    #[test]
    fn reset_only_touches_own_session() {
        let db = Database::open_in_memory().unwrap();
        let mut store = SqlStore::with_database("A", db, "").unwrap();
        store.save_message(1, b"a1").unwrap();
        store
            .db()
            .unwrap()
            .execute(|conn| {
                conn.execute(
                    "INSERT INTO messages (session_id, msgseqnum, message) VALUES ('B', 1, x'42')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();

        store.reset().unwrap();

        let remaining: i64 = store
            .db()
            .unwrap()
            .execute(|conn| Ok(conn.query_row("SELECT count(*) FROM messages", [], |row| row.get(0))?))
            .unwrap();
        assert_eq!(remaining, 1);
        assert!(store.get_messages(1, 10).unwrap().is_empty());
    }

    #[test]
    fn corrupt_creation_time_is_backend_error() {
        let mut store = memory_store("S");
        store
            .db()
            .unwrap()
            .execute(|conn| {
                conn.execute("UPDATE sessions SET creation_time = 'garbage'", [])?;
                Ok(())
            })
            .unwrap();
        let err = store.refresh().unwrap_err();
        assert!(matches!(err, StoreError::Backend { backend: "sqlite", .. }));
    }

    #[test]
    fn close_is_idempotent_and_blocks_io() {
        let mut store = memory_store("S");
        store.close().unwrap();
        store.close().unwrap();
        assert!(!store.is_open());
        assert!(matches!(store.save_message(1, b"x"), Err(StoreError::Closed)));
        assert!(matches!(store.get_messages(1, 1), Err(StoreError::Closed)));
        assert!(matches!(store.refresh(), Err(StoreError::Closed)));
    }
}
