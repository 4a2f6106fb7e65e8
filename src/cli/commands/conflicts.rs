//! Conflict commands: inspect and resolve unreconciled versions.
//!
//! Task files are never merged. `show` prints the local content and every
//! version; `resolve` keeps one and discards the rest.

use crate::cli::commands::open_workspace;
use crate::cli::ConflictCommands;
use crate::error::{Error, Result};
use crate::store::ConflictChoice;
use crate::workspace::Workspace;
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct ConflictSummary {
    path: PathBuf,
    versions: usize,
    redundant: bool,
}

#[derive(Serialize)]
struct ConflictListOutput {
    conflicts: Vec<ConflictSummary>,
    count: usize,
}

#[derive(Serialize)]
struct ResolveOutput<'a> {
    path: &'a Path,
    kept: String,
    discarded: usize,
}

/// Execute conflict commands.
pub fn execute(
    command: &ConflictCommands,
    root: Option<&PathBuf>,
    config_dir: Option<&PathBuf>,
    json: bool,
) -> Result<()> {
    let workspace = open_workspace(root, config_dir)?;
    match command {
        ConflictCommands::List => list(&workspace, json),
        ConflictCommands::Show { path } => show(&workspace, path, json),
        ConflictCommands::Resolve {
            path,
            keep_local,
            version,
        } => resolve(&workspace, path, *keep_local, *version, json),
    }
}

fn list(workspace: &Workspace, json: bool) -> Result<()> {
    let store = workspace.store();
    let mut conflicts = Vec::new();
    for identity in store.enumerate()? {
        if let Some(set) = store.conflicts(identity.path())? {
            conflicts.push(ConflictSummary {
                versions: set.versions.len(),
                redundant: set.is_redundant(),
                path: set.path,
            });
        }
    }

    if json {
        let output = ConflictListOutput {
            count: conflicts.len(),
            conflicts,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No conflicts.");
        return Ok(());
    }
    println!("{}", format!("{} file(s) with conflicts", conflicts.len()).magenta().bold());
    for conflict in &conflicts {
        let note = if conflict.redundant {
            " (identical to local)".dimmed().to_string()
        } else {
            String::new()
        };
        println!(
            "  {} [{} version(s)]{note}",
            conflict.path.display(),
            conflict.versions
        );
    }
    Ok(())
}

fn show(workspace: &Workspace, path: &Path, json: bool) -> Result<()> {
    let set = workspace
        .store()
        .conflicts(path)?
        .ok_or_else(|| Error::NoConflict {
            path: workspace.store().resolve(path),
        })?;

    if json {
        println!("{}", serde_json::to_string(&set)?);
        return Ok(());
    }

    println!("{} {}", "Local".cyan().bold(), set.path.display());
    println!("{}", short_hash(&set.local_hash).dimmed());
    println!("{}", set.local);
    for (index, version) in set.versions.iter().enumerate() {
        let label = format!("Version {index}");
        println!(
            "{} {} (modified {})",
            label.yellow().bold(),
            version.location.display(),
            version.modified.format("%Y-%m-%d %H:%M:%S")
        );
        if version.redundant {
            println!("{}", "identical to local".dimmed());
            continue;
        }
        println!("{}", short_hash(&version.content_hash).dimmed());
        println!("{}", version.content);
    }
    println!();
    println!("Keep one with `tf conflicts resolve <path> --keep-local` or `--version N`.");
    Ok(())
}

fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}

fn resolve(
    workspace: &Workspace,
    path: &Path,
    keep_local: bool,
    version: Option<usize>,
    json: bool,
) -> Result<()> {
    let store = workspace.store();
    let set = store.conflicts(path)?.ok_or_else(|| Error::NoConflict {
        path: store.resolve(path),
    })?;

    let choice = match (keep_local, version) {
        (_, Some(index)) => ConflictChoice::Version(index),
        (true, None) => ConflictChoice::Local,
        // Nothing to choose between
        (false, None) if set.is_redundant() => ConflictChoice::Local,
        (false, None) => {
            return Err(Error::InvalidArgument(
                "versions differ from the local file; pass --keep-local or --version N".into(),
            ));
        }
    };

    workspace.watcher().mark_self_write(&set.path);
    store.resolve_conflict(&set.path, choice)?;

    let kept = match choice {
        ConflictChoice::Local => "local".to_string(),
        ConflictChoice::Version(index) => format!("version {index}"),
    };
    if json {
        let output = ResolveOutput {
            path: &set.path,
            kept,
            discarded: set.versions.len(),
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!(
            "Kept {kept} for {}; discarded {} version(s)",
            set.path.display(),
            set.versions.len()
        );
    }
    Ok(())
}
