//! Scan command: run watcher passes over the task folder.

use crate::cli::commands::open_workspace;
use crate::error::Result;
use crate::sync::{SyncReport, WatcherEvent};
use colored::Colorize;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

/// Execute the scan command.
///
/// Without `watch` runs one pass. The first pass of a process has no
/// baseline, so every file is reported as created.
///
/// # Errors
///
/// Returns an error if the folder cannot be opened or enumerated.
pub fn execute(
    watch: bool,
    interval: u64,
    passes: Option<usize>,
    root: Option<&PathBuf>,
    config_dir: Option<&PathBuf>,
    json: bool,
) -> Result<()> {
    let workspace = open_workspace(root, config_dir)?;
    let limit = if watch { passes } else { Some(1) };

    let mut pass = 0;
    loop {
        let report = workspace.sync_pass()?;
        pass += 1;

        if json {
            // One line per pass
            println!("{}", serde_json::to_string(&report)?);
        } else if pass == 1 || !report.summary.is_quiet() {
            print_report(&report);
        }

        if limit.is_some_and(|n| pass >= n) {
            break;
        }
        thread::sleep(Duration::from_secs(interval.max(1)));
    }

    Ok(())
}

fn print_report(report: &SyncReport) {
    for event in &report.events {
        print_event(event);
    }

    let s = &report.summary;
    println!(
        "{} {} ingested, {} failed, {} deleted, {} conflicted, {} suppressed, {} deferred ({} ms)",
        "Scan:".bold(),
        s.ingested,
        s.failed,
        s.deleted,
        s.conflicted,
        s.suppressed,
        s.deferred,
        report.timings.total.as_millis()
    );
    if s.sidecars_resolved > 0 {
        println!("  Resolved {} sidecar conflict(s)", s.sidecars_resolved);
    }
}

fn print_event(event: &WatcherEvent) {
    match event {
        WatcherEvent::Created { path, .. } => {
            println!("{} {}", "+".green(), path.display());
        }
        WatcherEvent::Modified { path, .. } => {
            println!("{} {}", "~".yellow(), path.display());
        }
        WatcherEvent::Deleted { path, .. } => {
            println!("{} {}", "-".red(), path.display());
        }
        WatcherEvent::Conflict { path, versions, .. } => {
            println!(
                "{} {} ({} version(s); see `tf conflicts show`)",
                "!".magenta().bold(),
                path.display(),
                versions.len()
            );
        }
        WatcherEvent::Unparseable { path, reason, .. } => {
            println!("{} {}: {}", "?".red().bold(), path.display(), reason.dimmed());
        }
        WatcherEvent::RateLimitedBatch {
            paths,
            dominant_source,
            ..
        } => {
            println!(
                "{} {} new files (mostly from {})",
                "+".green().bold(),
                paths.len(),
                dominant_source.cyan()
            );
        }
    }
}
