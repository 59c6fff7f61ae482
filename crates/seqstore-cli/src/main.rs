//! CLI entry point for seqstore.
//!
//! This binary provides the `seqstore` command for inspecting a session's
//! counters and messages and for repairing them by hand.

mod cli;
mod commands;
mod config;

use std::io;

use anyhow::{Context, Result};
use clap::Parser;
use seqstore_core::{STORAGE_DIRECTORY, SessionSettings};
use seqstore_sql::SQL_DATABASE_PATH;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::config::CliConfig;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing("info");

    let file_config = match &cli.config {
        Some(path) => CliConfig::load(path)?,
        None => CliConfig::default(),
    };
    let backend = cli.backend.unwrap_or(file_config.backend);
    let settings = session_settings(&cli, &file_config);
    debug!(session_id = %cli.session, backend = backend.name(), "opening store");

    let mut store = backend
        .factory()
        .create(&cli.session, &settings)
        .with_context(|| {
            format!(
                "failed to open session {} with the {} backend",
                cli.session,
                backend.name()
            )
        })?;

    let mut stdout = io::stdout().lock();
    let result = match cli.command {
        Commands::Status { json } => {
            commands::status(store.as_ref(), &cli.session, backend, json, &mut stdout)
        }
        Commands::Messages { begin, end, raw } => {
            commands::messages(store.as_ref(), begin, end, raw, &mut stdout)
        }
        Commands::Save { seq, text, soh } => commands::save(store.as_mut(), seq, &text, soh),
        Commands::SetSeq { sender, target } => commands::set_seq(store.as_mut(), sender, target),
        Commands::Reset => commands::reset(store.as_mut()),
    };

    store.close().context("failed to close store")?;
    result
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Settings for the selected session: config file first, then flags.
fn session_settings(cli: &Cli, file_config: &CliConfig) -> SessionSettings {
    let mut settings = file_config.settings_for(&cli.session);
    if let Some(dir) = &cli.dir {
        settings.set(STORAGE_DIRECTORY, dir.display().to_string());
    }
    if let Some(database) = &cli.database {
        settings.set(SQL_DATABASE_PATH, database.clone());
    }
    settings
}

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber with the given default log level.
fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Backend;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_config_file() {
        let cli = Cli::parse_from([
            "seqstore",
            "--session",
            "S",
            "--dir",
            "/flag/dir",
            "status",
        ]);
        let file_config =
            CliConfig::parse("[default]\nstorage_directory = \"/file/dir\"\nsql_database_path = \"f.db\"\n")
                .unwrap();

        let settings = session_settings(&cli, &file_config);
        assert_eq!(settings.get(STORAGE_DIRECTORY), Some("/flag/dir"));
        assert_eq!(settings.get(SQL_DATABASE_PATH), Some("f.db"));
    }

    #[test]
    fn backend_flag_parses() {
        let cli = Cli::parse_from([
            "seqstore",
            "-s",
            "S",
            "--backend",
            "sql",
            "--database",
            ":memory:",
            "set-seq",
            "--sender",
            "5",
        ]);
        assert_eq!(cli.backend, Some(Backend::Sql));
        assert!(matches!(
            cli.command,
            Commands::SetSeq {
                sender: Some(5),
                target: None
            }
        ));
    }

    #[test]
    fn file_backend_round_trip_through_settings() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli::parse_from([
            "seqstore",
            "--session",
            "S",
            "--dir",
            dir.path().to_str().unwrap(),
            "save",
            "--seq",
            "1",
            "--soh",
            "35=0|",
        ]);
        let settings = session_settings(&cli, &CliConfig::default());

        let mut store = Backend::File.factory().create("S", &settings).unwrap();
        commands::save(store.as_mut(), 1, "35=0|", true).unwrap();
        store.close().unwrap();

        let store = Backend::File.factory().create("S", &settings).unwrap();
        assert_eq!(store.get_messages(1, 1).unwrap(), vec![b"35=0\x01".to_vec()]);
    }
}
