//! Canonical root resolution.
//!
//! One directory is the ground truth for all task files. It is resolved in
//! priority order:
//! 1. Explicit override (`--root` / `TASKFOLD_ROOT`)
//! 2. Bookmarked folder, cleared and skipped if it no longer resolves
//! 3. Legacy folder name under the cloud-documents root
//! 4. Heuristic detection under the cloud-documents root
//! 5. Default folder name under the cloud-documents root

mod detect;

pub use detect::{detect, has_schema_markers, score_directory, Candidate};

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::{
    self, clear_bookmark, read_bookmark, validate_bookmark, write_bookmark, FolderBookmark,
    Settings,
};
use crate::error::{Error, Result};

/// Which rule produced the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ResolutionSource {
    Override,
    Bookmark,
    Legacy,
    Detected { score: u32 },
    Default,
}

impl std::fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Override => f.write_str("override"),
            Self::Bookmark => f.write_str("bookmark"),
            Self::Legacy => f.write_str("legacy folder name"),
            Self::Detected { score } => write!(f, "auto-detected (score {score})"),
            Self::Default => f.write_str("default"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub root: PathBuf,
    pub source: ResolutionSource,
}

/// Resolves the canonical root from overrides, bookmark, and settings.
#[derive(Debug, Clone)]
pub struct FolderResolver {
    settings: Settings,
    override_root: Option<PathBuf>,
    config_dir: Option<PathBuf>,
    cloud_root: Option<PathBuf>,
}

impl FolderResolver {
    /// Resolver using the environment's cloud-documents root.
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        Self {
            settings: settings.clone(),
            override_root: None,
            config_dir: None,
            cloud_root: config::cloud_documents_root(settings),
        }
    }

    #[must_use]
    pub fn with_override(mut self, root: Option<PathBuf>) -> Self {
        self.override_root = root;
        self
    }

    #[must_use]
    pub fn with_config_dir(mut self, config_dir: impl Into<PathBuf>) -> Self {
        self.config_dir = Some(config_dir.into());
        self
    }

    #[must_use]
    pub fn with_cloud_root(mut self, cloud_root: impl Into<PathBuf>) -> Self {
        self.cloud_root = Some(cloud_root.into());
        self
    }

    /// Resolve the root without touching the filesystem beyond reads.
    ///
    /// # Errors
    ///
    /// Returns `Config` when no rule applies because no cloud-documents root
    /// could be determined.
    pub fn resolve(&self) -> Result<Resolution> {
        if let Some(root) = &self.override_root {
            return Ok(self.found(root.clone(), ResolutionSource::Override));
        }

        if let Some(root) = self.bookmarked() {
            return Ok(self.found(root, ResolutionSource::Bookmark));
        }

        let Some(cloud_root) = &self.cloud_root else {
            return Err(Error::Config(
                "no cloud documents directory found; pass --root or set TASKFOLD_ROOT".to_string(),
            ));
        };

        if let Some(name) = self
            .settings
            .legacy_folder_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
        {
            return Ok(self.found(cloud_root.join(name), ResolutionSource::Legacy));
        }

        if let Some(candidate) =
            detect(cloud_root, &self.settings.detection, &self.settings.extension)
        {
            return Ok(self.found(
                candidate.path,
                ResolutionSource::Detected {
                    score: candidate.score,
                },
            ));
        }

        Ok(self.found(
            cloud_root.join(&self.settings.default_folder_name),
            ResolutionSource::Default,
        ))
    }

    /// Resolve and create the root directory if it is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if resolution fails or the directory cannot be created.
    pub fn ensure(&self) -> Result<Resolution> {
        let resolution = self.resolve()?;
        if !resolution.root.is_dir() {
            fs::create_dir_all(&resolution.root).map_err(|source| Error::IoAt {
                path: resolution.root.clone(),
                source,
            })?;
            info!(root = %resolution.root.display(), "Created task folder");
        }
        Ok(resolution)
    }

    /// Bookmark `folder` so later resolutions pick it.
    ///
    /// # Errors
    ///
    /// Returns `Config` without a config directory, or the write error.
    pub fn remember(&self, folder: &Path) -> Result<FolderBookmark> {
        let config_dir = self
            .config_dir
            .as_deref()
            .ok_or_else(|| Error::Config("no config directory to store the bookmark".into()))?;
        let folder = fs::canonicalize(folder).map_err(|source| Error::IoAt {
            path: folder.to_path_buf(),
            source,
        })?;
        write_bookmark(config_dir, &folder)
    }

    fn bookmarked(&self) -> Option<PathBuf> {
        let config_dir = self.config_dir.as_deref()?;
        let bookmark = read_bookmark(config_dir)?;
        match validate_bookmark(&bookmark) {
            Ok(root) => Some(root),
            Err(reason) => {
                warn!(%reason, "Folder bookmark no longer resolves; clearing it");
                clear_bookmark(config_dir);
                None
            }
        }
    }

    fn found(&self, root: PathBuf, source: ResolutionSource) -> Resolution {
        debug!(root = %root.display(), %source, "Resolved task folder");
        Resolution { root, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixture {
        _config: TempDir,
        _cloud: TempDir,
        config_dir: PathBuf,
        cloud_root: PathBuf,
    }

    fn fixture() -> Fixture {
        let config = TempDir::new().unwrap();
        let cloud = TempDir::new().unwrap();
        Fixture {
            config_dir: config.path().to_path_buf(),
            cloud_root: cloud.path().to_path_buf(),
            _config: config,
            _cloud: cloud,
        }
    }

    fn resolver(fx: &Fixture, settings: &Settings) -> FolderResolver {
        FolderResolver::new(settings)
            .with_config_dir(&fx.config_dir)
            .with_cloud_root(&fx.cloud_root)
    }

    #[test]
    fn test_override_wins() {
        let fx = fixture();
        let resolver = resolver(&fx, &Settings::default())
            .with_override(Some(PathBuf::from("/explicit/root")));
        let resolution = resolver.resolve().unwrap();
        assert_eq!(resolution.root, PathBuf::from("/explicit/root"));
        assert_eq!(resolution.source, ResolutionSource::Override);
    }

    #[test]
    fn test_bookmark_used_then_cleared_when_stale() {
        let fx = fixture();
        let picked = fx.cloud_root.join("Picked");
        fs::create_dir(&picked).unwrap();

        let resolver = resolver(&fx, &Settings::default());
        resolver.remember(&picked).unwrap();
        let resolution = resolver.resolve().unwrap();
        assert_eq!(resolution.source, ResolutionSource::Bookmark);
        assert_eq!(resolution.root, fs::canonicalize(&picked).unwrap());

        fs::remove_dir(&picked).unwrap();
        let resolution = resolver.resolve().unwrap();
        assert_eq!(resolution.source, ResolutionSource::Default);
        assert!(read_bookmark(&fx.config_dir).is_none());
    }

    #[test]
    fn test_legacy_name_before_detection() {
        let fx = fixture();
        fs::create_dir(fx.cloud_root.join("Tasks")).unwrap();
        let settings = Settings {
            legacy_folder_name: Some("My Old Tasks".into()),
            ..Settings::default()
        };
        let resolution = resolver(&fx, &settings).resolve().unwrap();
        assert_eq!(resolution.source, ResolutionSource::Legacy);
        assert_eq!(resolution.root, fx.cloud_root.join("My Old Tasks"));
    }

    #[test]
    fn test_detection_then_default() {
        let fx = fixture();
        let resolver = resolver(&fx, &Settings::default());

        let resolution = resolver.resolve().unwrap();
        assert_eq!(resolution.source, ResolutionSource::Default);
        assert_eq!(resolution.root, fx.cloud_root.join("Tasks"));

        fs::create_dir(fx.cloud_root.join("todo")).unwrap();
        let resolution = resolver.resolve().unwrap();
        assert!(matches!(resolution.source, ResolutionSource::Detected { .. }));
        assert_eq!(resolution.root, fx.cloud_root.join("todo"));
    }

    #[test]
    fn test_ensure_creates_directory() {
        let fx = fixture();
        let resolution = resolver(&fx, &Settings::default()).ensure().unwrap();
        assert!(resolution.root.is_dir());
    }

    #[test]
    fn test_no_cloud_root_is_config_error() {
        let resolver = FolderResolver {
            settings: Settings::default(),
            override_root: None,
            config_dir: None,
            cloud_root: None,
        };
        assert!(matches!(resolver.resolve(), Err(Error::Config(_))));
    }
}
