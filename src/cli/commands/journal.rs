//! Pending write journal commands.

use crate::cli::commands::{config_dir, open_workspace};
use crate::cli::JournalCommands;
use crate::error::{Error, Result};
use crate::journal::{PendingWriteEntry, PendingWriteJournal};
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Serialize)]
struct JournalEntryOutput<'a> {
    id: Uuid,
    path: &'a PathBuf,
    enqueued_at: DateTime<Utc>,
    bytes: usize,
}

#[derive(Serialize)]
struct JournalListOutput<'a> {
    entries: Vec<JournalEntryOutput<'a>>,
    count: usize,
}

/// Execute journal commands.
pub fn execute(
    command: &JournalCommands,
    root: Option<&PathBuf>,
    config_dir: Option<&PathBuf>,
    json: bool,
) -> Result<()> {
    match command {
        JournalCommands::List => list(config_dir, json),
        JournalCommands::Replay => replay(root, config_dir, json),
        JournalCommands::Drop { id } => drop_entry(id, config_dir, json),
    }
}

fn open_journal(config_dir_arg: Option<&PathBuf>) -> Result<PendingWriteJournal> {
    PendingWriteJournal::open(&config_dir(config_dir_arg)?)
}

fn list(config_dir: Option<&PathBuf>, json: bool) -> Result<()> {
    let journal = open_journal(config_dir)?;
    let entries = journal.entries();

    if json {
        let output = JournalListOutput {
            count: entries.len(),
            entries: entries.iter().map(entry_output).collect(),
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No pending writes.");
        return Ok(());
    }
    println!("{}", format!("{} pending write(s)", entries.len()).bold());
    for entry in &entries {
        println!(
            "  {} {} ({} bytes, queued {})",
            entry.id.to_string().dimmed(),
            entry.path.display(),
            entry.content.len(),
            entry.enqueued_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

fn entry_output(entry: &PendingWriteEntry) -> JournalEntryOutput<'_> {
    JournalEntryOutput {
        id: entry.id,
        path: &entry.path,
        enqueued_at: entry.enqueued_at,
        bytes: entry.content.len(),
    }
}

fn replay(root: Option<&PathBuf>, config_dir: Option<&PathBuf>, json: bool) -> Result<()> {
    let workspace = open_workspace(root, config_dir)?;
    let report = workspace.replay_journal()?;

    if json {
        println!("{}", serde_json::to_string(&report)?);
        return Ok(());
    }

    println!(
        "Replayed: {} written, {} failed, {} still pending",
        report.succeeded.to_string().green(),
        report.failed.to_string().red(),
        report.remaining
    );
    for failure in &report.failures {
        println!("  {} {}: {}", "✗".red(), failure.path.display(), failure.reason);
    }
    Ok(())
}

fn drop_entry(id: &str, config_dir: Option<&PathBuf>, json: bool) -> Result<()> {
    let id = Uuid::parse_str(id)
        .map_err(|e| Error::InvalidArgument(format!("'{id}' is not an entry id: {e}")))?;
    let journal = open_journal(config_dir)?;

    if !journal.dequeue(id)? {
        return Err(Error::InvalidArgument(format!(
            "No pending write with id {id}; see `tf journal list`"
        )));
    }

    if json {
        println!("{}", serde_json::json!({ "dropped": id }));
    } else {
        println!("Dropped pending write {id}");
    }
    Ok(())
}
