//! Cloud-sync layer adapters.
//!
//! taskfold does not talk to any sync service. It only needs three answers
//! from whatever replicates the folder: are a file's bytes local, please
//! fetch them, and which unreconciled versions exist for a file. The
//! [`CloudProvider`] trait captures those; [`SyncedFolder`] answers them
//! from the naming conventions consumer cloud drives leave on disk.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use tracing::debug;

use super::{FileError, FileResult};

/// Local availability of a file's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Materialization {
    /// Bytes are on disk.
    Local,
    /// Only a cloud placeholder exists.
    Placeholder,
    /// Neither the file nor a placeholder exists.
    Missing,
}

/// One unreconciled alternate copy of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictVersion {
    pub location: PathBuf,
    pub modified: SystemTime,
}

/// What taskfold needs from the sync layer replicating the folder.
pub trait CloudProvider: Send + Sync + std::fmt::Debug {
    /// Whether the bytes of `path` are available locally.
    fn materialization(&self, path: &Path) -> Materialization;

    /// Ask the sync layer to download `path`. Must not block on the download.
    fn request_materialization(&self, path: &Path);

    /// Unresolved conflict versions for `path`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the version listing cannot be read.
    fn conflict_versions(&self, path: &Path) -> FileResult<Vec<ConflictVersion>>;

    /// Drop one conflict version once a caller has chosen.
    ///
    /// # Errors
    ///
    /// Returns an error if the version cannot be removed.
    fn discard_version(&self, version: &ConflictVersion) -> FileResult<()>;

    /// The real file name a placeholder entry stands in for, if `name` is one.
    fn placeholder_target(&self, name: &str) -> Option<String>;

    /// Whether the entry at `path` is sync-layer bookkeeping rather than a
    /// user file.
    fn is_artifact(&self, path: &Path) -> bool;
}

// ── Local disk ───────────────────────────────────────────────

/// A plain directory: everything is local and nothing ever conflicts.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalDisk;

impl CloudProvider for LocalDisk {
    fn materialization(&self, path: &Path) -> Materialization {
        if path.exists() {
            Materialization::Local
        } else {
            Materialization::Missing
        }
    }

    fn request_materialization(&self, _path: &Path) {}

    fn conflict_versions(&self, _path: &Path) -> FileResult<Vec<ConflictVersion>> {
        Ok(Vec::new())
    }

    fn discard_version(&self, _version: &ConflictVersion) -> FileResult<()> {
        Ok(())
    }

    fn placeholder_target(&self, _name: &str) -> Option<String> {
        None
    }

    fn is_artifact(&self, _path: &Path) -> bool {
        false
    }
}

// ── Synced folder ────────────────────────────────────────────

const PLACEHOLDER_SUFFIX: &str = ".icloud";
const CONFLICT_MARKER: &str = "conflicted copy";

/// A folder replicated by a consumer cloud drive.
///
/// Recognizes:
/// - placeholders: `.<name>.icloud` next to where `<name>` would be
/// - conflict copies: `<stem> (<anything> conflicted copy <anything>).<ext>`
///
/// Materialization requests are remembered so callers can report them.
#[derive(Debug, Default)]
pub struct SyncedFolder {
    requested: Mutex<BTreeSet<PathBuf>>,
}

impl SyncedFolder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths a download was requested for, in path order.
    #[must_use]
    pub fn requested(&self) -> Vec<PathBuf> {
        self.requested
            .lock()
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn placeholder_path(path: &Path) -> Option<PathBuf> {
        let name = path.file_name()?.to_string_lossy();
        Some(path.with_file_name(format!(".{name}{PLACEHOLDER_SUFFIX}")))
    }

    /// Whether `candidate` is a conflict copy of a file named `stem.ext`.
    fn is_conflict_copy_of(candidate: &str, stem: &str, extension: Option<&str>) -> bool {
        let Some(rest) = candidate.strip_prefix(stem) else {
            return false;
        };
        let rest = match extension {
            Some(ext) => match rest.strip_suffix(ext).and_then(|r| r.strip_suffix('.')) {
                Some(r) => r,
                None => return false,
            },
            None => rest,
        };
        rest.starts_with(" (")
            && rest.ends_with(')')
            && rest.to_lowercase().contains(CONFLICT_MARKER)
    }
}

impl CloudProvider for SyncedFolder {
    fn materialization(&self, path: &Path) -> Materialization {
        if path.exists() {
            Materialization::Local
        } else if Self::placeholder_path(path).is_some_and(|p| p.exists()) {
            Materialization::Placeholder
        } else {
            Materialization::Missing
        }
    }

    fn request_materialization(&self, path: &Path) {
        let newly = self
            .requested
            .lock()
            .map(|mut set| set.insert(path.to_path_buf()))
            .unwrap_or(false);
        if !newly {
            return;
        }
        debug!(path = %path.display(), "Requested download of cloud placeholder");

        #[cfg(target_os = "macos")]
        {
            // brctl only schedules the download and returns.
            match std::process::Command::new("brctl")
                .arg("download")
                .arg(path)
                .output()
            {
                Ok(output) if output.status.success() => {}
                Ok(output) => tracing::warn!(
                    path = %path.display(),
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "brctl download failed"
                ),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "brctl not available"),
            }
        }
    }

    fn conflict_versions(&self, path: &Path) -> FileResult<Vec<ConflictVersion>> {
        let (Some(dir), Some(stem)) = (path.parent(), path.file_stem()) else {
            return Ok(Vec::new());
        };
        let stem = stem.to_string_lossy();
        let extension = path.extension().map(|e| e.to_string_lossy().to_string());

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(FileError::Io {
                    path: dir.to_path_buf(),
                    source,
                });
            }
        };

        let mut versions = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if !Self::is_conflict_copy_of(&name, &stem, extension.as_deref()) {
                continue;
            }
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            versions.push(ConflictVersion {
                location: entry.path(),
                modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }
        versions.sort_by(|a, b| {
            a.modified
                .cmp(&b.modified)
                .then_with(|| a.location.cmp(&b.location))
        });
        Ok(versions)
    }

    fn discard_version(&self, version: &ConflictVersion) -> FileResult<()> {
        match fs::remove_file(&version.location) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(FileError::Io {
                path: version.location.clone(),
                source,
            }),
        }
    }

    fn placeholder_target(&self, name: &str) -> Option<String> {
        name.strip_prefix('.')?
            .strip_suffix(PLACEHOLDER_SUFFIX)
            .filter(|target| !target.is_empty())
            .map(ToString::to_string)
    }

    fn is_artifact(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
            return false;
        };
        if self.placeholder_target(&name).is_some() {
            return true;
        }
        // A conflict copy only counts as one while its original is present.
        let extension = path.extension().map(|e| e.to_string_lossy());
        name.match_indices(" (").any(|(at, _)| {
            let stem = &name[..at];
            if !Self::is_conflict_copy_of(&name, stem, extension.as_deref()) {
                return false;
            }
            let original = match extension.as_deref() {
                Some(ext) => path.with_file_name(format!("{stem}.{ext}")),
                None => path.with_file_name(stem),
            };
            self.materialization(&original) != Materialization::Missing
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_placeholder_detection() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("Plan trip.md");
        fs::write(temp_dir.path().join(".Plan trip.md.icloud"), "").unwrap();

        let provider = SyncedFolder::new();
        assert_eq!(provider.materialization(&target), Materialization::Placeholder);
        assert_eq!(
            provider.placeholder_target(".Plan trip.md.icloud").as_deref(),
            Some("Plan trip.md")
        );
        assert!(provider.is_artifact(&temp_dir.path().join(".Plan trip.md.icloud")));

        provider.request_materialization(&target);
        provider.request_materialization(&target);
        assert_eq!(provider.requested(), vec![target]);
    }

    #[test]
    fn test_conflict_copy_matching() {
        assert!(SyncedFolder::is_conflict_copy_of(
            "Buy milk (Sam's conflicted copy 2026-03-01).md",
            "Buy milk",
            Some("md")
        ));
        assert!(!SyncedFolder::is_conflict_copy_of(
            "Buy milk 2.md",
            "Buy milk",
            Some("md")
        ));
        assert!(!SyncedFolder::is_conflict_copy_of(
            "Buy milk (conflicted copy).txt",
            "Buy milk",
            Some("md")
        ));
        assert!(!SyncedFolder::is_conflict_copy_of(
            "Buy milkshake (conflicted copy).md",
            "Buy milk",
            Some("md")
        ));
    }

    #[test]
    fn test_conflict_versions_listed_and_discarded() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("Buy milk.md");
        fs::write(&path, "local").unwrap();
        let copy = temp_dir
            .path()
            .join("Buy milk (laptop's conflicted copy 2026-03-01).md");
        fs::write(&copy, "remote").unwrap();

        let provider = SyncedFolder::new();
        let versions = provider.conflict_versions(&path).unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].location, copy);

        provider.discard_version(&versions[0]).unwrap();
        assert!(provider.conflict_versions(&path).unwrap().is_empty());
        // Discarding twice is fine
        provider.discard_version(&versions[0]).unwrap();
    }

    #[test]
    fn test_conflict_copy_needs_original() {
        let temp_dir = TempDir::new().unwrap();
        let provider = SyncedFolder::new();

        let lone = temp_dir.path().join("Clean up Dropbox (conflicted copy) files.md");
        fs::write(&lone, "x").unwrap();
        assert!(!provider.is_artifact(&lone));

        let orphan = temp_dir.path().join("Buy milk (laptop's conflicted copy).md");
        fs::write(&orphan, "x").unwrap();
        assert!(!provider.is_artifact(&orphan));

        fs::write(temp_dir.path().join("Buy milk.md"), "x").unwrap();
        assert!(provider.is_artifact(&orphan));

        // An original that is only a placeholder still counts
        let remote = temp_dir.path().join("Plan trip (conflicted copy).md");
        fs::write(&remote, "x").unwrap();
        fs::write(temp_dir.path().join(".Plan trip.md.icloud"), "").unwrap();
        assert!(provider.is_artifact(&remote));
    }

    #[test]
    fn test_local_disk_never_conflicts() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.md");
        assert_eq!(LocalDisk.materialization(&path), Materialization::Missing);
        fs::write(&path, "x").unwrap();
        assert_eq!(LocalDisk.materialization(&path), Materialization::Local);
        assert!(LocalDisk.conflict_versions(&path).unwrap().is_empty());
    }
}
