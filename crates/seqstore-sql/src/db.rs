//! SQLite connection setup with WAL mode and durability pragmas.
//!
//! [`Database`] owns one `rusqlite::Connection`. A message store is used by a
//! single owner, so calls run inline on the caller's thread through
//! [`Database::execute`] and [`Database::execute_mut`].

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::SqlResult;
use crate::migration;

/// Handle to a SQLite database.
#[derive(Debug)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) a database at `path` and apply pragmas.
    ///
    /// The special path `:memory:` opens a private in-memory database.
    pub fn open(path: impl AsRef<Path>) -> SqlResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening database");

        let conn = Connection::open(path)?;
        Self::apply_pragmas(&conn)?;

        Ok(Self { conn })
    }

    /// Create an in-memory database, mainly for tests.
    pub fn open_in_memory() -> SqlResult<Self> {
        debug!("opening in-memory database");

        let conn = Connection::open_in_memory()?;
        Self::apply_pragmas(&conn)?;

        Ok(Self { conn })
    }

    /// Run all pending schema migrations for `table_prefix`.
    pub fn run_migrations(&self, table_prefix: &str) -> SqlResult<()> {
        migration::run_all(&self.conn, table_prefix)
    }

    /// Execute a closure against the connection.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let count: i64 = db.execute(|conn| {
    ///     Ok(conn.query_row("SELECT count(*) FROM messages", [], |row| row.get(0))?)
    /// })?;
    /// ```
    pub fn execute<F, T>(&self, f: F) -> SqlResult<T>
    where
        F: FnOnce(&Connection) -> SqlResult<T>,
    {
        f(&self.conn)
    }

    /// Execute a mutable closure (for transactions, etc.).
    ///
    /// The closure receives a `&mut Connection` so you can call
    /// `conn.transaction()` and friends.
    pub fn execute_mut<F, T>(&mut self, f: F) -> SqlResult<T>
    where
        F: FnOnce(&mut Connection) -> SqlResult<T>,
    {
        f(&mut self.conn)
    }

    /// Close the connection, reporting any error SQLite raises while doing so.
    pub fn close(self) -> SqlResult<()> {
        self.conn.close().map_err(|(_, e)| e.into())
    }

    // ── pragmas ──────────────────────────────────────────────────────

    /// Apply all pragmas to a fresh connection.
    fn apply_pragmas(conn: &Connection) -> SqlResult<()> {
        debug!("applying SQLite pragmas");

        // WAL mode: readers do not block the writer.
        let journal_mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;

        // FULL sync: a committed update survives power loss, matching the
        // flush-before-return rule of the file store.
        conn.pragma_update(None, "synchronous", "FULL")?;

        // Temp tables and indices in memory, not on disk.
        conn.pragma_update(None, "temp_store", "MEMORY")?;

        // Another process holding the write lock makes us wait, not fail.
        conn.busy_timeout(Duration::from_millis(5_000))?;

        info!(journal_mode = %journal_mode, "database pragmas applied");
        Ok(())
    }
}

// ── tests ────────────────────────────────────────────────────────────
