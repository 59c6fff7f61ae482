//! Subcommand implementations.
//!
//! Each command works on an already opened `dyn MessageStore` and writes
//! its output to the given writer so tests can capture it.

use std::io::Write;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, SecondsFormat, Utc};
use seqstore_core::MessageStore;
use serde::Serialize;
use tracing::info;

use crate::config::Backend;

/// Field separator used inside stored messages.
const SOH: u8 = 0x01;

/// Printable stand-in for [`SOH`].
const SOH_DISPLAY: u8 = b'|';

/// Snapshot printed by `status`.
#[derive(Debug, Serialize)]
pub struct Status<'a> {
    pub session_id: &'a str,
    pub backend: Backend,
    pub creation_time: DateTime<Utc>,
    pub next_sender_seq_num: u64,
    pub next_target_seq_num: u64,
}

// ---------------------------------------------------------------------------
// status
// ---------------------------------------------------------------------------

pub fn status(
    store: &dyn MessageStore,
    session_id: &str,
    backend: Backend,
    json: bool,
    out: &mut impl Write,
) -> Result<()> {
    let status = Status {
        session_id,
        backend,
        creation_time: store.creation_time(),
        next_sender_seq_num: store.next_sender_seq_num(),
        next_target_seq_num: store.next_target_seq_num(),
    };

    if json {
        serde_json::to_writer_pretty(&mut *out, &status).context("failed to encode status")?;
        writeln!(out)?;
        return Ok(());
    }

    writeln!(out, "session:          {}", status.session_id)?;
    writeln!(out, "backend:          {}", status.backend.name())?;
    writeln!(
        out,
        "created:          {}",
        status
            .creation_time
            .to_rfc3339_opts(SecondsFormat::Nanos, true)
    )?;
    writeln!(out, "next sender seq:  {}", status.next_sender_seq_num)?;
    writeln!(out, "next target seq:  {}", status.next_target_seq_num)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// messages
// ---------------------------------------------------------------------------

pub fn messages(
    store: &dyn MessageStore,
    begin: u64,
    end: u64,
    raw: bool,
    out: &mut impl Write,
) -> Result<()> {
    let messages = store
        .get_messages(begin, end)
        .with_context(|| format!("failed to read messages {begin}..={end}"))?;

    for msg in &messages {
        if raw {
            out.write_all(msg)?;
        } else {
            out.write_all(&replace_byte(msg, SOH, SOH_DISPLAY))?;
        }
        writeln!(out)?;
    }
    info!(count = messages.len(), begin, end, "messages listed");
    Ok(())
}

// ---------------------------------------------------------------------------
// save
// ---------------------------------------------------------------------------

pub fn save(store: &mut dyn MessageStore, seq: u64, text: &str, soh: bool) -> Result<()> {
    let bytes = if soh {
        replace_byte(text.as_bytes(), SOH_DISPLAY, SOH)
    } else {
        text.as_bytes().to_vec()
    };
    store
        .save_message(seq, &bytes)
        .with_context(|| format!("failed to save message {seq}"))?;
    info!(seq, size = bytes.len(), "message saved");
    Ok(())
}

// ---------------------------------------------------------------------------
// set-seq
// ---------------------------------------------------------------------------

pub fn set_seq(
    store: &mut dyn MessageStore,
    sender: Option<u64>,
    target: Option<u64>,
) -> Result<()> {
    if sender.is_none() && target.is_none() {
        bail!("nothing to do: pass --sender and/or --target");
    }
    if let Some(next) = sender {
        store
            .set_next_sender_seq_num(next)
            .with_context(|| format!("failed to set next sender seq num to {next}"))?;
        info!(next, "next sender seq num set");
    }
    if let Some(next) = target {
        store
            .set_next_target_seq_num(next)
            .with_context(|| format!("failed to set next target seq num to {next}"))?;
        info!(next, "next target seq num set");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// reset
// ---------------------------------------------------------------------------

pub fn reset(store: &mut dyn MessageStore) -> Result<()> {
    store.reset().context("failed to reset session")?;
    Ok(())
}

fn replace_byte(bytes: &[u8], from: u8, to: u8) -> Vec<u8> {
    bytes
        .iter()
        .map(|&b| if b == from { to } else { b })
        .collect()
}

// ── tests ────────────────────────────────────────────────────────────
