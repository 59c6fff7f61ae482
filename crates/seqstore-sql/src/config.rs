//! Settings for the SQLite backend.

use seqstore_core::{SessionSettings, StoreError, StoreResult};

/// Path of the SQLite database file (`:memory:` for a private in-memory database).
pub const SQL_DATABASE_PATH: &str = "sql_database_path";

/// Optional prefix prepended to every table name.
pub const SQL_TABLE_NAME_PREFIX: &str = "sql_table_name_prefix";

/// Typed configuration for [`SqlStore`](crate::SqlStore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlStoreConfig {
    pub database_path: String,
    pub table_prefix: String,
}

impl SqlStoreConfig {
    pub fn new(database_path: impl Into<String>) -> Self {
        Self {
            database_path: database_path.into(),
            table_prefix: String::new(),
        }
    }

    #[must_use]
    pub fn with_table_prefix(mut self, table_prefix: impl Into<String>) -> Self {
        self.table_prefix = table_prefix.into();
        self
    }

    pub fn from_settings(session_id: &str, settings: &SessionSettings) -> StoreResult<Self> {
        let database_path = settings.require(session_id, SQL_DATABASE_PATH)?;
        let table_prefix = settings.get(SQL_TABLE_NAME_PREFIX).unwrap_or_default();

        // The prefix is spliced into SQL text, so only identifier characters pass.
        if !table_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(StoreError::InvalidSetting {
                session_id: session_id.to_string(),
                key: SQL_TABLE_NAME_PREFIX,
                message: format!("{table_prefix:?} may only contain ASCII letters, digits and '_'"),
            });
        }

        Ok(Self {
            database_path: database_path.to_string(),
            table_prefix: table_prefix.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_path_is_required() {
        let err = SqlStoreConfig::from_settings("S", &SessionSettings::new()).unwrap_err();
        assert!(matches!(
            err,
            StoreError::MissingSetting {
                key: SQL_DATABASE_PATH,
                ..
            }
        ));
    }

    #[test]
    fn prefix_defaults_to_empty() {
        let settings = SessionSettings::new().with(SQL_DATABASE_PATH, "/tmp/s.db");
        let config = SqlStoreConfig::from_settings("S", &settings).unwrap();
        assert_eq!(config, SqlStoreConfig::new("/tmp/s.db"));
    }

    #[test]
    fn prefix_with_sql_metacharacters_is_rejected() {
        let settings = SessionSettings::new()
            .with(SQL_DATABASE_PATH, ":memory:")
            .with(SQL_TABLE_NAME_PREFIX, "x; DROP TABLE sessions; --");
        let err = SqlStoreConfig::from_settings("S", &settings).unwrap_err();
        assert!(matches!(err, StoreError::InvalidSetting { .. }));
    }

    #[test]
    fn valid_prefix_is_kept() {
        let settings = SessionSettings::new()
            .with(SQL_DATABASE_PATH, ":memory:")
            .with(SQL_TABLE_NAME_PREFIX, "fix44_");
        let config = SqlStoreConfig::from_settings("S", &settings).unwrap();
        assert_eq!(config.table_prefix, "fix44_");
    }
}
