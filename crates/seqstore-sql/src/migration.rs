//! Schema migration system.
//!
//! Migrations are static SQL templates keyed by version number. Every table
//! name is written as `{prefix}name` and expanded with the store's table
//! prefix, so several independent stores can share one database file. The
//! applied version is tracked per prefix in `<prefix>schema_migrations`.

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::error::{SqlError, SqlResult};

/// A single migration definition.
struct Migration {
    /// Monotonically increasing version number (1, 2, 3, ...).
    version: u32,
    /// Human-readable description.
    description: &'static str,
    /// SQL template; `{prefix}` is replaced with the table prefix.
    sql: &'static str,
}

/// All migrations in order. Add new migrations to the end of this array.
static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "initial schema: sessions and messages",
    sql: r#"
            CREATE TABLE {prefix}sessions (
                session_id      TEXT PRIMARY KEY,
                creation_time   TEXT NOT NULL,
                incoming_seqnum INTEGER NOT NULL CHECK(incoming_seqnum >= 1),
                outgoing_seqnum INTEGER NOT NULL CHECK(outgoing_seqnum >= 1)
            );

            CREATE TABLE {prefix}messages (
                session_id TEXT NOT NULL,
                msgseqnum  INTEGER NOT NULL,
                message    BLOB NOT NULL,
                PRIMARY KEY (session_id, msgseqnum)
            );
        "#,
}];

/// Version of the newest migration.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

// ── public API ───────────────────────────────────────────────────────

/// Run all pending migrations for `table_prefix` against `conn`.
pub fn run_all(conn: &Connection, table_prefix: &str) -> SqlResult<()> {
    ensure_migrations_table(conn, table_prefix)?;

    let current = current_version(conn, table_prefix)?;
    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();

    if pending.is_empty() {
        debug!(
            table_prefix,
            current_version = current,
            "database schema is up to date"
        );
        return Ok(());
    }

    info!(
        table_prefix,
        current_version = current,
        pending = pending.len(),
        "running pending migrations"
    );

    for migration in pending {
        apply(conn, table_prefix, migration)?;
    }

    info!(
        table_prefix,
        new_version = latest_version(),
        "all migrations applied"
    );
    Ok(())
}

/// Return the latest applied migration version for `table_prefix`, or 0 if none.
pub fn current_version(conn: &Connection, table_prefix: &str) -> SqlResult<u32> {
    let sql = format!("SELECT COALESCE(MAX(version), 0) FROM {table_prefix}schema_migrations");
    let version: u32 = conn
        .query_row(&sql, [], |row| row.get(0))
        .map_err(|e| SqlError::Migration {
            version: 0,
            message: format!("failed to read current version: {e}"),
        })?;
    Ok(version)
}

// ── internals ────────────────────────────────────────────────────────

/// Create the bookkeeping table if it does not exist.
fn ensure_migrations_table(conn: &Connection, table_prefix: &str) -> SqlResult<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {table_prefix}schema_migrations (
            version     INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at  INTEGER NOT NULL
        );"
    ))
    .map_err(|e| SqlError::Migration {
        version: 0,
        message: format!("failed to create {table_prefix}schema_migrations table: {e}"),
    })?;
    Ok(())
}

/// Apply a single migration inside a transaction.
fn apply(conn: &Connection, table_prefix: &str, migration: &Migration) -> SqlResult<()> {
    info!(
        version = migration.version,
        description = migration.description,
        "applying migration"
    );

    // `conn.transaction()` needs `&mut Connection`; manage it by hand.
    conn.execute_batch("BEGIN IMMEDIATE;")
        .map_err(|e| SqlError::Migration {
            version: migration.version,
            message: format!("failed to begin transaction: {e}"),
        })?;

    let result = (|| -> SqlResult<()> {
        conn.execute_batch(&migration.sql.replace("{prefix}", table_prefix))
            .map_err(|e| SqlError::Migration {
                version: migration.version,
                message: format!("SQL execution failed: {e}"),
            })?;

        let now = chrono::Utc::now().timestamp();
        conn.execute(
            &format!(
                "INSERT INTO {table_prefix}schema_migrations (version, description, applied_at) \
                 VALUES (?1, ?2, ?3)"
            ),
            rusqlite::params![migration.version, migration.description, now],
        )
        .map_err(|e| SqlError::Migration {
            version: migration.version,
            message: format!("failed to record migration: {e}"),
        })?;

        Ok(())
    })();

    match &result {
        Ok(()) => {
            conn.execute_batch("COMMIT;")
                .map_err(|e| SqlError::Migration {
                    version: migration.version,
                    message: format!("failed to commit: {e}"),
                })?;
            info!(version = migration.version, "migration applied successfully");
        }
        Err(err) => {
            warn!(version = migration.version, %err, "migration failed, rolling back");
            let _ = conn.execute_batch("ROLLBACK;");
        }
    }

    result
}

// ── tests ────────────────────────────────────────────────────────────
