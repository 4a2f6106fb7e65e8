//! Command implementations.

pub mod completions;
pub mod conflicts;
pub mod diagnostics;
pub mod init;
pub mod journal;
pub mod root;
pub mod scan;
pub mod task;
pub mod version;

use std::path::{Path, PathBuf};

use crate::config::{resolve_config_dir, root_override, Settings};
use crate::error::{Error, Result};
use crate::folder::FolderResolver;
use crate::workspace::Workspace;

/// Config directory from the flag, `TASKFOLD_HOME`, or `~/.taskfold`.
pub(crate) fn config_dir(explicit: Option<&PathBuf>) -> Result<PathBuf> {
    resolve_config_dir(explicit.map(PathBuf::as_path))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))
}

pub(crate) fn resolver(
    root: Option<&PathBuf>,
    config_dir: &Path,
    settings: &Settings,
) -> FolderResolver {
    FolderResolver::new(settings)
        .with_override(root_override(root.map(PathBuf::as_path)))
        .with_config_dir(config_dir)
}

/// Resolve the task folder (creating it if needed) and open it.
pub(crate) fn open_workspace(
    root: Option<&PathBuf>,
    config_dir: Option<&PathBuf>,
) -> Result<Workspace> {
    let config_dir = self::config_dir(config_dir)?;
    let settings = Settings::load(&config_dir)?;
    let resolution = resolver(root, &config_dir, &settings).ensure()?;
    Workspace::open(&resolution.root, &config_dir, settings)
}
