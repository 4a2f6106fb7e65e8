//! Configuration management.
//!
//! This module provides functions for locating the device-local config
//! directory, the cloud-documents root, and loading settings.
//!
//! # Layout
//!
//! - **Config dir** (`~/.taskfold/` by default): `settings.json`, the folder
//!   bookmark, and the pending-write journal. Never synced.
//! - **Canonical root**: the synced task folder, resolved by
//!   [`crate::folder::FolderResolver`].

mod bookmark;
mod settings;

pub use bookmark::{
    clear_bookmark, read_bookmark, validate_bookmark, write_bookmark, FolderBookmark,
    BOOKMARK_FILE,
};
pub use settings::{
    DetectionSettings, ProviderKind, RefIdSettings, Settings, WatcherSettings, SETTINGS_FILE,
};

use std::path::{Path, PathBuf};

/// Environment variable overriding the config directory.
pub const HOME_ENV: &str = "TASKFOLD_HOME";
/// Environment variable overriding the canonical root.
pub const ROOT_ENV: &str = "TASKFOLD_ROOT";
/// Environment variable overriding the cloud-documents root.
pub const CLOUD_ROOT_ENV: &str = "TASKFOLD_CLOUD_ROOT";
/// Environment variable naming the actor for completion attribution.
pub const ACTOR_ENV: &str = "TF_ACTOR";

/// iCloud Drive, relative to the home directory.
const ICLOUD_DRIVE: &str = "Library/Mobile Documents/com~apple~CloudDocs";

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

fn home_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().to_path_buf())
}

/// Resolve the config directory.
///
/// Priority:
/// 1. If `explicit` is provided, use it directly
/// 2. `TASKFOLD_HOME` environment variable
/// 3. `~/.taskfold`
#[must_use]
pub fn resolve_config_dir(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    env_path(HOME_ENV).or_else(|| home_dir().map(|h| h.join(".taskfold")))
}

/// The out-of-band root override: explicit flag, then `TASKFOLD_ROOT`.
#[must_use]
pub fn root_override(explicit: Option<&Path>) -> Option<PathBuf> {
    explicit.map(Path::to_path_buf).or_else(|| env_path(ROOT_ENV))
}

/// Resolve the cloud-documents root that default folders live under.
///
/// Priority:
/// 1. `TASKFOLD_CLOUD_ROOT` environment variable
/// 2. `settings.cloud_root`
/// 3. iCloud Drive under the home directory, when present
/// 4. The platform documents directory
/// 5. `~/Documents`
#[must_use]
pub fn cloud_documents_root(settings: &Settings) -> Option<PathBuf> {
    pick_cloud_root(
        env_path(CLOUD_ROOT_ENV),
        settings,
        home_dir().as_deref(),
        directories::UserDirs::new().and_then(|u| u.document_dir().map(Path::to_path_buf)),
    )
}

fn pick_cloud_root(
    env: Option<PathBuf>,
    settings: &Settings,
    home: Option<&Path>,
    documents: Option<PathBuf>,
) -> Option<PathBuf> {
    if let Some(path) = env.or_else(|| settings.cloud_root.clone()) {
        return Some(path);
    }
    if let Some(home) = home {
        let icloud = home.join(ICLOUD_DRIVE);
        if icloud.is_dir() {
            return Some(icloud);
        }
    }
    documents.or_else(|| home.map(|h| h.join("Documents")))
}

/// Get the default actor name.
///
/// Priority:
/// 1. `TF_ACTOR` environment variable
/// 2. Git user name
/// 3. System username
/// 4. "unknown"
#[must_use]
pub fn default_actor() -> String {
    if let Ok(actor) = std::env::var(ACTOR_ENV) {
        if !actor.is_empty() {
            return actor;
        }
    }

    if let Ok(output) = std::process::Command::new("git")
        .args(["config", "user.name"])
        .output()
    {
        if output.status.success() {
            let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if !name.is_empty() {
                return name;
            }
        }
    }

    if let Ok(user) = std::env::var("USER") {
        return user;
    }

    "unknown".to_string()
}
