//! `settings.json` in the config directory.
//!
//! Every field has a default, so a missing or partial file is fine. Unknown
//! keys are ignored.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::store::write_atomic;

pub const SETTINGS_FILE: &str = "settings.json";

/// Which sync-layer conventions the root follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Plain directory.
    Local,
    /// Consumer cloud drive (placeholders, conflicted copies).
    #[default]
    Synced,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Overrides the detected cloud-documents directory.
    pub cloud_root: Option<PathBuf>,
    /// Folder name used by older installs, under the cloud root.
    pub legacy_folder_name: Option<String>,
    /// Folder created under the cloud root when nothing else resolves.
    pub default_folder_name: String,
    /// Task file extension, without the dot.
    pub extension: String,
    pub provider: ProviderKind,
    pub ref_ids: RefIdSettings,
    pub watcher: WatcherSettings,
    pub detection: DetectionSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cloud_root: None,
            legacy_folder_name: None,
            default_folder_name: "Tasks".to_string(),
            extension: "md".to_string(),
            provider: ProviderKind::default(),
            ref_ids: RefIdSettings::default(),
            watcher: WatcherSettings::default(),
            detection: DetectionSettings::default(),
        }
    }
}

/// Reference-id issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefIdSettings {
    pub prefix: String,
    /// Hex digits while the corpus is small.
    pub short_len: u32,
    /// Hex digits once the corpus exceeds `long_threshold`.
    pub long_len: u32,
    pub long_threshold: usize,
    /// Random draws before falling back to enumeration.
    pub random_attempts: u32,
}

impl Default for RefIdSettings {
    fn default() -> Self {
        Self {
            prefix: "T-".to_string(),
            short_len: 4,
            long_len: 6,
            long_threshold: 4096,
            random_attempts: 16,
        }
    }
}

/// Watcher pass tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherSettings {
    /// Max distance between a self-write mark and the file's mtime.
    pub echo_tolerance_ms: u64,
    /// How long self-write marks are kept.
    pub echo_retention_secs: u64,
    /// Creations allowed inside the window before they are batched.
    pub rate_limit_threshold: usize,
    pub rate_limit_window_secs: u64,
    /// Files parsed per chunk.
    pub parse_chunk_size: usize,
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            echo_tolerance_ms: 2_000,
            echo_retention_secs: 30,
            rate_limit_threshold: 25,
            rate_limit_window_secs: 60,
            parse_chunk_size: 64,
        }
    }
}

impl WatcherSettings {
    #[must_use]
    pub const fn echo_tolerance(&self) -> Duration {
        Duration::from_millis(self.echo_tolerance_ms)
    }

    #[must_use]
    pub const fn echo_retention(&self) -> Duration {
        Duration::from_secs(self.echo_retention_secs)
    }

    #[must_use]
    pub const fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }
}

/// Folder auto-detection scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    /// Directory names that suggest a task folder (case-insensitive).
    pub known_names: Vec<String>,
    pub max_depth: usize,
    pub name_weight: u32,
    pub sidecar_weight: u32,
    pub marker_weight: u32,
    /// Markdown files counted and sampled per candidate.
    pub sample_files: usize,
    pub min_score: u32,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            known_names: ["tasks", "todo", "todos", "taskfold", "to-do"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_depth: 2,
            name_weight: 10,
            sidecar_weight: 15,
            marker_weight: 5,
            sample_files: 20,
            min_score: 10,
        }
    }
}

impl Settings {
    /// Load settings from `<config_dir>/settings.json`.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the file exists but is not valid settings JSON.
    pub fn load(config_dir: &Path) -> Result<Self> {
        let path = config_dir.join(SETTINGS_FILE);
        match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| Error::Config(format!("{}: {e}", path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(Error::IoAt { path, source }),
        }
    }

    /// Write settings to `<config_dir>/settings.json`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, config_dir: &Path) -> Result<()> {
        let path = config_dir.join(SETTINGS_FILE);
        let mut content = serde_json::to_string_pretty(self)?;
        content.push('\n');
        write_atomic(&path, content.as_bytes()).map_err(|source| Error::IoAt { path, source })
    }
}
