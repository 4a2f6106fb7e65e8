//! Initialize taskfold on this device.
//!
//! # Architecture
//!
//! taskfold keeps two places apart:
//! - **Config dir** (`~/.taskfold/`): settings, the folder bookmark and the
//!   pending-write journal. Device-local, never synced.
//! - **Task folder**: the synced directory of task files. `tf init` resolves
//!   it (or bookmarks `--folder`) and creates it if missing.

use crate::cli::commands::{config_dir, resolver};
use crate::config::{Settings, SETTINGS_FILE};
use crate::error::{Error, Result};
use crate::folder::ResolutionSource;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

#[derive(Serialize)]
struct InitOutput {
    root: PathBuf,
    source: ResolutionSource,
    config_dir: PathBuf,
    bookmarked: bool,
    created_settings: bool,
}

/// Execute the init command.
///
/// With `folder`, the folder is created if needed and bookmarked so later
/// runs pick it without `--root`.
///
/// # Errors
///
/// Returns an error if the folder cannot be resolved, created or bookmarked.
pub fn execute(
    folder: Option<&PathBuf>,
    root: Option<&PathBuf>,
    config_dir_arg: Option<&PathBuf>,
    json: bool,
) -> Result<()> {
    let config_dir = config_dir(config_dir_arg)?;
    fs::create_dir_all(&config_dir).map_err(|source| Error::IoAt {
        path: config_dir.clone(),
        source,
    })?;

    let settings_path = config_dir.join(SETTINGS_FILE);
    let created_settings = !settings_path.exists();
    let settings = Settings::load(&config_dir)?;
    if created_settings {
        settings.save(&config_dir)?;
    }

    let resolver = resolver(root, &config_dir, &settings);
    let bookmarked = if let Some(folder) = folder {
        fs::create_dir_all(folder).map_err(|source| Error::IoAt {
            path: folder.clone(),
            source,
        })?;
        resolver.remember(folder)?;
        true
    } else {
        false
    };
    let resolution = resolver.ensure()?;

    if json {
        let output = InitOutput {
            root: resolution.root,
            source: resolution.source,
            config_dir,
            bookmarked,
            created_settings,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("Task folder: {}", resolution.root.display());
        println!("  Chosen by: {}", resolution.source);
        if bookmarked {
            println!("  Bookmarked for future runs");
        }
        println!("Config: {}", config_dir.display());
        if created_settings {
            println!("  Wrote default {SETTINGS_FILE}");
        }
    }

    Ok(())
}
