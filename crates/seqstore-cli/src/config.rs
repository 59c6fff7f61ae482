//! Settings file for the `seqstore` binary.
//!
//! ```toml
//! backend = "file"          # or "sql"
//!
//! [default]
//! storage_directory = "data/store"
//!
//! [sessions."FIX.4.4-SENDER-TARGET"]
//! storage_directory = "data/other"
//! ```
//!
//! Per-session tables override `[default]`; command-line flags override both.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use seqstore_core::{FileStoreFactory, MessageStoreFactory, SessionSettings};
use seqstore_sql::SqlStoreFactory;
use serde::{Deserialize, Serialize};

/// Storage backend selected by the config file or `--backend`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// One set of flat files per session.
    #[default]
    File,
    /// Rows in a SQLite database.
    Sql,
}

impl Backend {
    pub fn factory(self) -> Box<dyn MessageStoreFactory> {
        match self {
            Self::File => Box::new(FileStoreFactory),
            Self::Sql => Box::new(SqlStoreFactory),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Sql => "sql",
        }
    }
}

/// Parsed contents of the settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CliConfig {
    #[serde(default)]
    pub backend: Backend,
    #[serde(default)]
    pub default: SessionSettings,
    #[serde(default)]
    pub sessions: BTreeMap<String, SessionSettings>,
}

impl CliConfig {
    /// Read and parse a settings file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// `[default]` with the session's own table applied on top.
    pub fn settings_for(&self, session_id: &str) -> SessionSettings {
        match self.sessions.get(session_id) {
            Some(overrides) => self.default.merged(overrides),
            None => self.default.clone(),
        }
    }
}

// ── tests ────────────────────────────────────────────────────────────
