//! Sidecar JSON files at the root.
//!
//! Small settings shared across devices: the manual task order and saved
//! view definitions. They are written with the same atomic discipline as
//! task files. Unlike task files, a sidecar conflict is resolved without
//! asking: the latest modification wins.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use super::{FileError, FileStore};
use crate::error::{Error, Result};

pub const ORDERING_FILE: &str = ".ordering.json";
pub const VIEWS_FILE: &str = ".views.json";

/// Every sidecar file name, for detection and conflict sweeps.
pub const SIDECAR_FILES: [&str; 2] = [ORDERING_FILE, VIEWS_FILE];

/// Manual ordering: reference ids, first to last.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManualOrdering {
    pub order: Vec<String>,
}

impl ManualOrdering {
    /// Position of a reference id, if it has been placed.
    #[must_use]
    pub fn position(&self, reference: &str) -> Option<usize> {
        self.order.iter().position(|r| r == reference)
    }
}

/// One saved view. The query string is opaque to taskfold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedView {
    pub name: String,
    pub query: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SavedViews {
    pub views: Vec<SavedView>,
}

/// Reads and writes sidecars through a [`FileStore`].
#[derive(Debug, Clone)]
pub struct SidecarStore {
    store: Arc<FileStore>,
}

impl SidecarStore {
    #[must_use]
    pub const fn new(store: Arc<FileStore>) -> Self {
        Self { store }
    }

    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn ordering(&self) -> Result<ManualOrdering> {
        self.load(ORDERING_FILE)
    }

    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_ordering(&self, ordering: &ManualOrdering) -> Result<()> {
        self.save(ORDERING_FILE, ordering)
    }

    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn views(&self) -> Result<SavedViews> {
        self.load(VIEWS_FILE)
    }

    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_views(&self, views: &SavedViews) -> Result<()> {
        self.save(VIEWS_FILE, views)
    }

    /// Auto-resolve conflicts on every sidecar. Returns how many were resolved.
    ///
    /// A failure on one sidecar is logged and does not stop the others.
    #[must_use]
    pub fn resolve_conflicts(&self) -> usize {
        let mut resolved = 0;
        for name in SIDECAR_FILES {
            match self.store.auto_resolve_latest(Path::new(name)) {
                Ok(true) => {
                    info!(file = name, "Resolved sidecar conflict by latest modification");
                    resolved += 1;
                }
                Ok(false) => {}
                Err(e) => warn!(file = name, error = %e, "Could not resolve sidecar conflict"),
            }
        }
        resolved
    }

    fn load<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T> {
        let path = Path::new(name);
        self.store.auto_resolve_latest(path)?;

        match self.store.read(path) {
            Ok(content) if content.trim().is_empty() => Ok(T::default()),
            Ok(content) => serde_json::from_str(&content).map_err(|e| Error::Parse {
                path: self.store.resolve(path),
                reason: e.to_string(),
            }),
            Err(FileError::NotFound(_)) => Ok(T::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let mut content = serde_json::to_string_pretty(value)?;
        content.push('\n');
        self.store.write(Path::new(name), &content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SyncedFolder;
    use std::fs;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> Arc<FileStore> {
        Arc::new(FileStore::new(dir.path(), Arc::new(SyncedFolder::new())))
    }

    #[test]
    fn test_missing_sidecars_are_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let sidecars = SidecarStore::new(store);
        assert_eq!(sidecars.ordering().unwrap(), ManualOrdering::default());
        assert!(sidecars.views().unwrap().views.is_empty());
    }

    #[test]
    fn test_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let sidecars = SidecarStore::new(store);

        let ordering = ManualOrdering {
            order: vec!["T-0002".into(), "T-0001".into()],
        };
        sidecars.save_ordering(&ordering).unwrap();
        assert_eq!(sidecars.ordering().unwrap().position("T-0001"), Some(1));

        let views = SavedViews {
            views: vec![SavedView {
                name: "Today".into(),
                query: "due <= today".into(),
            }],
        };
        sidecars.save_views(&views).unwrap();
        assert_eq!(sidecars.views().unwrap(), views);
    }

    #[test]
    fn test_corrupt_sidecar_is_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(ORDERING_FILE), "{not json").unwrap();
        let store = store(&temp_dir);
        assert!(matches!(
            SidecarStore::new(store).ordering(),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn test_conflict_resolved_on_read() {
        let temp_dir = TempDir::new().unwrap();
        let local = temp_dir.path().join(ORDERING_FILE);
        let copy = temp_dir
            .path()
            .join(".ordering (tablet's conflicted copy).json");
        fs::write(&local, r#"{"order":["T-0001"]}"#).unwrap();
        fs::write(&copy, r#"{"order":["T-0002"]}"#).unwrap();

        let now = SystemTime::now();
        fs::File::options()
            .write(true)
            .open(&local)
            .unwrap()
            .set_modified(now - Duration::from_secs(30))
            .unwrap();

        let store = store(&temp_dir);
        let ordering = SidecarStore::new(store).ordering().unwrap();
        assert_eq!(ordering.order, vec!["T-0002".to_string()]);
        assert!(!copy.exists());
    }

    #[test]
    fn test_resolve_conflicts_counts() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(VIEWS_FILE), "{}").unwrap();
        fs::write(
            temp_dir.path().join(".views (laptop's conflicted copy).json"),
            "{}",
        )
        .unwrap();

        let store = store(&temp_dir);
        let sidecars = SidecarStore::new(store);
        assert_eq!(sidecars.resolve_conflicts(), 1);
        assert_eq!(sidecars.resolve_conflicts(), 0);
    }
}
