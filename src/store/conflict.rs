//! Conflict exposure and resolution.
//!
//! Task files are never auto-merged. A caller sees the local content and
//! every unreconciled version, then picks one. Versions byte-identical to
//! the local file are flagged `redundant` so they can be dropped without
//! asking anyone.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::info;

use super::{content_hash, ConflictVersion, FileError, FileStore};
use crate::error::{Error, Result};

/// One side of a conflict a caller can choose.
#[derive(Debug, Clone, Serialize)]
pub struct ConflictCandidate {
    pub location: PathBuf,
    pub modified: DateTime<Utc>,
    pub content: String,
    pub content_hash: String,
    /// Same bytes as the local file.
    pub redundant: bool,
}

/// The local content of a path plus its unreconciled versions.
#[derive(Debug, Clone, Serialize)]
pub struct ConflictSet {
    pub path: PathBuf,
    pub local: String,
    pub local_hash: String,
    pub versions: Vec<ConflictCandidate>,
}

impl ConflictSet {
    /// Whether every version matches the local content.
    #[must_use]
    pub fn is_redundant(&self) -> bool {
        self.versions.iter().all(|v| v.redundant)
    }
}

/// Which content wins a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictChoice {
    /// Keep the local file.
    Local,
    /// Take the version at this index of [`ConflictSet::versions`].
    Version(usize),
}

impl FileStore {
    /// Local content and unreconciled versions of `path`, if any exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the local file or a version cannot be read.
    pub fn conflicts(&self, path: &Path) -> Result<Option<ConflictSet>> {
        let path = self.resolve(path);
        let versions = self.provider.conflict_versions(&path)?;
        if versions.is_empty() {
            return Ok(None);
        }

        let local = match self.read(&path) {
            Ok(content) => content,
            Err(FileError::NotFound(_)) => String::new(),
            Err(e) => return Err(e.into()),
        };
        let local_hash = content_hash(&local);

        let mut candidates = Vec::with_capacity(versions.len());
        for version in versions {
            let content = std::fs::read_to_string(&version.location).map_err(|source| {
                Error::IoAt {
                    path: version.location.clone(),
                    source,
                }
            })?;
            let hash = content_hash(&content);
            candidates.push(ConflictCandidate {
                location: version.location,
                modified: DateTime::<Utc>::from(version.modified),
                redundant: hash == local_hash,
                content,
                content_hash: hash,
            });
        }

        Ok(Some(ConflictSet {
            path,
            local,
            local_hash,
            versions: candidates,
        }))
    }

    /// Keep the chosen content at `path` and discard every version.
    ///
    /// # Errors
    ///
    /// Returns `NoConflict` if nothing is unresolved, `InvalidArgument` for
    /// an out-of-range version index, or the write/discard error.
    pub fn resolve_conflict(&self, path: &Path, choice: ConflictChoice) -> Result<()> {
        let path = self.resolve(path);
        let versions = self.provider.conflict_versions(&path)?;
        if versions.is_empty() {
            return Err(Error::NoConflict { path });
        }

        if let ConflictChoice::Version(index) = choice {
            let chosen = versions.get(index).ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "version {index} does not exist ({} available)",
                    versions.len()
                ))
            })?;
            let content =
                std::fs::read_to_string(&chosen.location).map_err(|source| Error::IoAt {
                    path: chosen.location.clone(),
                    source,
                })?;
            self.write(&path, &content)?;
        }

        self.discard_all(&versions)?;
        info!(path = %path.display(), ?choice, "Resolved conflict");
        Ok(())
    }

    /// Keep whichever of local and versions was modified last.
    ///
    /// Returns `false` when there was nothing to resolve.
    ///
    /// # Errors
    ///
    /// Returns an error if the winning content cannot be written or a
    /// version cannot be discarded.
    pub fn auto_resolve_latest(&self, path: &Path) -> Result<bool> {
        let path = self.resolve(path);
        let versions = self.provider.conflict_versions(&path)?;
        if versions.is_empty() {
            return Ok(false);
        }

        let local_modified = std::fs::metadata(&path)
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let latest = versions
            .iter()
            .enumerate()
            .max_by_key(|(_, v)| v.modified)
            .filter(|(_, v)| v.modified > local_modified)
            .map(|(i, _)| i);

        let choice = latest.map_or(ConflictChoice::Local, ConflictChoice::Version);
        self.resolve_conflict(&path, choice)?;
        Ok(true)
    }

    fn discard_all(&self, versions: &[ConflictVersion]) -> Result<()> {
        let _guard = self.lock.write().unwrap_or_else(|e| e.into_inner());
        for version in versions {
            self.provider.discard_version(version)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SyncedFolder;
    use std::fs;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FileStore, PathBuf, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path(), Arc::new(SyncedFolder::new()));
        let path = store.root().join("Buy milk.md");
        let copy = store
            .root()
            .join("Buy milk (phone's conflicted copy 2026-03-01).md");
        fs::write(&path, "local").unwrap();
        fs::write(&copy, "remote").unwrap();
        (temp_dir, store, path, copy)
    }

    fn set_mtime(path: &Path, time: SystemTime) {
        fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    #[test]
    fn test_conflicts_lists_local_and_versions() {
        let (_dir, store, path, copy) = setup();
        let set = store.conflicts(&path).unwrap().unwrap();
        assert_eq!(set.local, "local");
        assert_eq!(set.versions.len(), 1);
        assert_eq!(set.versions[0].location, copy);
        assert_eq!(set.versions[0].content, "remote");
        assert!(!set.versions[0].redundant);
        assert!(!set.is_redundant());
    }

    #[test]
    fn test_identical_version_is_redundant() {
        let (_dir, store, path, copy) = setup();
        fs::write(&copy, "local").unwrap();
        let set = store.conflicts(&path).unwrap().unwrap();
        assert!(set.is_redundant());
    }

    #[test]
    fn test_no_conflicts() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path(), Arc::new(SyncedFolder::new()));
        fs::write(store.root().join("a.md"), "x").unwrap();
        assert!(store.conflicts(Path::new("a.md")).unwrap().is_none());
        assert!(matches!(
            store.resolve_conflict(Path::new("a.md"), ConflictChoice::Local),
            Err(Error::NoConflict { .. })
        ));
    }

    #[test]
    fn test_resolve_with_version() {
        let (_dir, store, path, copy) = setup();
        store
            .resolve_conflict(&path, ConflictChoice::Version(0))
            .unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "remote");
        assert!(!copy.exists());
    }

    #[test]
    fn test_resolve_out_of_range() {
        let (_dir, store, path, copy) = setup();
        assert!(matches!(
            store.resolve_conflict(&path, ConflictChoice::Version(3)),
            Err(Error::InvalidArgument(_))
        ));
        assert!(copy.exists());
    }

    #[test]
    fn test_auto_resolve_takes_latest() {
        let (_dir, store, path, copy) = setup();
        let now = SystemTime::now();
        set_mtime(&path, now - Duration::from_secs(60));
        set_mtime(&copy, now);

        assert!(store.auto_resolve_latest(&path).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "remote");
        assert!(!copy.exists());
        assert!(!store.auto_resolve_latest(&path).unwrap());
    }

    #[test]
    fn test_auto_resolve_keeps_newer_local() {
        let (_dir, store, path, copy) = setup();
        let now = SystemTime::now();
        set_mtime(&copy, now - Duration::from_secs(60));
        set_mtime(&path, now);

        assert!(store.auto_resolve_latest(&path).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "local");
        assert!(!copy.exists());
    }
}
