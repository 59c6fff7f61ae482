//! CLI argument definitions for the `seqstore` binary.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Backend;

/// seqstore -- inspect and repair durable session message stores.
#[derive(Parser)]
#[command(
    name = "seqstore",
    version,
    about = "Inspect and repair durable session message stores",
    long_about = "Opens one session of a file or SQLite message store and reads or \
                  rewrites its counters and stored messages."
)]
pub struct Cli {
    /// TOML file with backend choice and per-session settings.
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Session to open.
    #[arg(long, short)]
    pub session: String,

    /// Storage backend; overrides the config file.
    #[arg(long, short, value_enum)]
    pub backend: Option<Backend>,

    /// Directory of the file backend; overrides `storage_directory`.
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// SQLite database path; overrides `sql_database_path`.
    #[arg(long)]
    pub database: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show creation time and next sequence numbers.
    Status {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print stored messages in a sequence number range.
    Messages {
        /// First sequence number (inclusive).
        #[arg(long, default_value_t = 1)]
        begin: u64,

        /// Last sequence number (inclusive).
        #[arg(long, default_value_t = u64::MAX)]
        end: u64,

        /// Print bytes as stored instead of showing SOH as `|`.
        #[arg(long)]
        raw: bool,
    },

    /// Store a message under a sequence number.
    Save {
        /// Sequence number to store the message under.
        #[arg(long)]
        seq: u64,

        /// Message text.
        text: String,

        /// Convert every `|` in the text to SOH (0x01) before storing.
        #[arg(long)]
        soh: bool,
    },

    /// Overwrite the next sender and/or target sequence number.
    SetSeq {
        /// Next sequence number to send.
        #[arg(long)]
        sender: Option<u64>,

        /// Next sequence number expected from the counterparty.
        #[arg(long)]
        target: Option<u64>,
    },

    /// Wipe the session: drop all messages and restart both counters at 1.
    Reset,
}
