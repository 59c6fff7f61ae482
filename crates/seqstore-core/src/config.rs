//! Session settings and typed backend configuration.
//!
//! Factories receive a [`SessionSettings`] map of named string options and
//! turn it into a typed config for their backend, failing with
//! [`StoreError::MissingSetting`] when a required key is absent.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Directory holding the file backend's per-session files.
pub const STORAGE_DIRECTORY: &str = "storage_directory";

/// Named string options for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionSettings(BTreeMap<String, String>);

impl SessionSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Look up a key that the backend cannot work without.
    pub fn require(&self, session_id: &str, key: &'static str) -> StoreResult<&str> {
        self.get(key).ok_or_else(|| StoreError::MissingSetting {
            session_id: session_id.to_string(),
            key,
        })
    }

    /// Return a copy of `self` with every entry of `overrides` applied on top.
    #[must_use]
    pub fn merged(&self, overrides: &SessionSettings) -> Self {
        let mut merged = self.clone();
        for (key, value) in &overrides.0 {
            merged.set(key.clone(), value.clone());
        }
        merged
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SessionSettings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

/// Typed configuration for [`FileStore`](crate::FileStore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStoreConfig {
    pub storage_directory: PathBuf,
}

impl FileStoreConfig {
    pub fn from_settings(session_id: &str, settings: &SessionSettings) -> StoreResult<Self> {
        let dir = settings.require(session_id, STORAGE_DIRECTORY)?;
        if dir.trim().is_empty() {
            return Err(StoreError::InvalidSetting {
                session_id: session_id.to_string(),
                key: STORAGE_DIRECTORY,
                message: "path is empty".to_string(),
            });
        }
        Ok(Self {
            storage_directory: PathBuf::from(dir),
        })
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_reports_missing_key() {
        let settings = SessionSettings::new();
        let err = settings.require("S", STORAGE_DIRECTORY).unwrap_err();
        assert!(matches!(
            err,
            StoreError::MissingSetting { key: STORAGE_DIRECTORY, .. }
        ));
    }

    #[test]
    fn merged_prefers_overrides() {
        let base = SessionSettings::new()
            .with(STORAGE_DIRECTORY, "/data/a")
            .with("other", "kept");
        let overrides = SessionSettings::new().with(STORAGE_DIRECTORY, "/data/b");

        let merged = base.merged(&overrides);
        assert_eq!(merged.get(STORAGE_DIRECTORY), Some("/data/b"));
        assert_eq!(merged.get("other"), Some("kept"));
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn file_config_from_settings() {
        let settings = SessionSettings::new().with(STORAGE_DIRECTORY, "/var/lib/seqstore");
        let config = FileStoreConfig::from_settings("S", &settings).unwrap();
        assert_eq!(config.storage_directory, PathBuf::from("/var/lib/seqstore"));
    }

    #[test]
    fn file_config_rejects_blank_directory() {
        let settings = SessionSettings::new().with(STORAGE_DIRECTORY, "  ");
        let err = FileStoreConfig::from_settings("S", &settings).unwrap_err();
        assert!(matches!(err, StoreError::InvalidSetting { .. }));
    }

    #[test]
    fn settings_deserialize_from_toml_table() {
        let settings: SessionSettings =
            toml::from_str("storage_directory = \"/tmp/store\"\nextra = \"x\"\n").unwrap();
        assert_eq!(settings.get(STORAGE_DIRECTORY), Some("/tmp/store"));
        assert_eq!(settings.get("extra"), Some("x"));
    }

    #[test]
    fn settings_collect_from_pairs() {
        let settings: SessionSettings = [(STORAGE_DIRECTORY, "/a")].into_iter().collect();
        assert_eq!(settings.get(STORAGE_DIRECTORY), Some("/a"));
    }
}
