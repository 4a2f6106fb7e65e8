//! Diagnostics command: list files that fail to parse.

use crate::cli::commands::open_workspace;
use crate::error::Result;
use crate::sync::ParseFailureDiagnostic;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct DiagnosticsOutput {
    diagnostics: Vec<ParseFailureDiagnostic>,
    count: usize,
}

/// Execute the diagnostics command.
///
/// Runs a full pass first, since diagnostics live only as long as the
/// process that found them.
///
/// # Errors
///
/// Returns an error if the folder cannot be opened or enumerated.
pub fn execute(root: Option<&PathBuf>, config_dir: Option<&PathBuf>, json: bool) -> Result<()> {
    let workspace = open_workspace(root, config_dir)?;
    workspace.sync_pass()?;
    let diagnostics = workspace.watcher().diagnostics();

    if json {
        let output = DiagnosticsOutput {
            count: diagnostics.len(),
            diagnostics,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if diagnostics.is_empty() {
        println!("All task files parse.");
        return Ok(());
    }

    println!("{}", format!("{} unparseable file(s)", diagnostics.len()).red().bold());
    for diagnostic in &diagnostics {
        println!("  {}", diagnostic.path.display());
        println!("    {}", diagnostic.reason.dimmed());
    }
    println!();
    println!("Fix or delete these files; they are retried whenever they change.");
    Ok(())
}
