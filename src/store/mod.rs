//! Coordinated file I/O over the canonical root.
//!
//! [`FileStore`] owns every byte that goes to or comes from the task folder:
//! - `enumerate` / `scan`: matching files (and their fingerprints) under root
//! - `read`: only once the cloud layer has the bytes locally
//! - `write`: atomic replace, never observed half-written
//! - `delete`: idempotent
//!
//! Readers and writers of one store are coordinated by an in-process
//! `RwLock`. Other processes and devices are not coordinated; the watcher
//! notices their changes on the next pass.

mod atomic;
mod cloud;
mod conflict;
mod sidecar;

pub use atomic::{content_hash, is_temp_name, write_atomic};
pub use cloud::{CloudProvider, ConflictVersion, LocalDisk, Materialization, SyncedFolder};
pub use conflict::{ConflictCandidate, ConflictChoice, ConflictSet};
pub use sidecar::{
    ManualOrdering, SavedView, SavedViews, SidecarStore, ORDERING_FILE, SIDECAR_FILES, VIEWS_FILE,
};

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::model::{FileFingerprint, FileIdentity};

/// File-level errors.
#[derive(Error, Debug)]
pub enum FileError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("File not yet downloaded: {}", .0.display())]
    Unavailable(PathBuf),

    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FileError {
    fn from_io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound(path.to_path_buf())
        } else {
            Self::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

/// Result type for file operations.
pub type FileResult<T> = std::result::Result<T, FileError>;

/// Default task file extension.
pub const DEFAULT_EXTENSION: &str = "md";

/// Atomic, materialization-aware file access under one root.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    provider: Arc<dyn CloudProvider>,
    extension: String,
    lock: RwLock<()>,
}

impl FileStore {
    /// Create a store over `root`. The root is canonicalized when it exists.
    pub fn new(root: impl AsRef<Path>, provider: Arc<dyn CloudProvider>) -> Self {
        let root = root.as_ref();
        let root = fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
        Self {
            root,
            provider,
            extension: DEFAULT_EXTENSION.to_string(),
            lock: RwLock::new(()),
        }
    }

    /// Match files with a different extension (without the dot).
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    #[must_use]
    pub fn provider(&self) -> &dyn CloudProvider {
        self.provider.as_ref()
    }

    /// Relative paths are taken relative to the root.
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Whether a file (or a placeholder for it) occupies `path`.
    #[must_use]
    pub fn exists(&self, path: &Path) -> bool {
        self.provider.materialization(&self.resolve(path)) != Materialization::Missing
    }

    fn is_task_file(&self, name: &str) -> bool {
        Path::new(name)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.extension))
    }

    // ── Enumeration ──────────────────────────────────────────

    /// List matching task files under the root, in path order.
    ///
    /// Hidden entries, temp files and sync-layer artifacts are skipped.
    /// Placeholders for matching files trigger a download request and are
    /// left out until they are local. Symlinks are resolved once; a
    /// directory reachable twice is only walked the first time.
    ///
    /// # Errors
    ///
    /// Returns an error if the root itself cannot be listed.
    pub fn enumerate(&self) -> FileResult<Vec<FileIdentity>> {
        let _guard = self.lock.read().unwrap_or_else(|e| e.into_inner());

        let mut visited = HashSet::new();
        let mut files = Vec::new();
        let mut seen_files = HashSet::new();

        let root = fs::canonicalize(&self.root).map_err(|e| FileError::from_io(&self.root, e))?;
        visited.insert(root.clone());
        let mut pending = vec![root];
        let mut first = true;

        while let Some(dir) = pending.pop() {
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) if first => return Err(FileError::from_io(&dir, e)),
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "Skipping unreadable directory");
                    continue;
                }
            };
            first = false;

            for entry in entries.flatten() {
                let name = entry.file_name().to_string_lossy().to_string();
                let path = entry.path();

                if let Some(target) = self.provider.placeholder_target(&name) {
                    if self.is_task_file(&target) {
                        self.provider.request_materialization(&dir.join(&target));
                    }
                    continue;
                }
                if name.starts_with('.') || is_temp_name(&name) || self.provider.is_artifact(&path)
                {
                    trace!(path = %path.display(), "Skipping hidden or artifact entry");
                    continue;
                }

                // metadata() follows symlinks; a dangling link is skipped.
                let Ok(meta) = fs::metadata(&path) else {
                    continue;
                };

                if meta.is_dir() {
                    if let Ok(canonical) = fs::canonicalize(&path) {
                        if visited.insert(canonical.clone()) {
                            pending.push(canonical);
                        } else {
                            debug!(dir = %path.display(), "Directory already visited");
                        }
                    }
                } else if meta.is_file() && self.is_task_file(&name) {
                    let identity = FileIdentity::new(&path);
                    if seen_files.insert(identity.clone()) {
                        files.push(identity);
                    }
                }
            }
        }

        files.sort();
        Ok(files)
    }

    /// Fingerprint every matching file.
    ///
    /// Files that disappear between listing and stat are left out.
    ///
    /// # Errors
    ///
    /// Returns an error if enumeration fails.
    pub fn scan(&self) -> FileResult<Vec<FileFingerprint>> {
        let mut fingerprints = Vec::new();
        for identity in self.enumerate()? {
            match self.fingerprint_identity(identity) {
                Ok(fp) => fingerprints.push(fp),
                Err(FileError::NotFound(path)) => {
                    debug!(path = %path.display(), "File vanished during scan");
                }
                Err(e) => warn!(error = %e, "Could not fingerprint file"),
            }
        }
        Ok(fingerprints)
    }

    /// Size and modification time of one file, without reading it.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for a missing file.
    pub fn fingerprint(&self, path: &Path) -> FileResult<FileFingerprint> {
        self.fingerprint_identity(FileIdentity::new(self.resolve(path)))
    }

    fn fingerprint_identity(&self, identity: FileIdentity) -> FileResult<FileFingerprint> {
        let meta =
            fs::metadata(identity.path()).map_err(|e| FileError::from_io(identity.path(), e))?;
        let modified = meta
            .modified()
            .map_err(|e| FileError::from_io(identity.path(), e))?;
        Ok(FileFingerprint {
            identity,
            size: meta.len(),
            modified,
        })
    }

    // ── Read / write / delete ────────────────────────────────

    /// Read a file as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` (after requesting a download) when only a cloud
    /// placeholder exists, `NotFound` when nothing exists.
    pub fn read(&self, path: &Path) -> FileResult<String> {
        let path = self.resolve(path);
        let _guard = self.lock.read().unwrap_or_else(|e| e.into_inner());

        match self.provider.materialization(&path) {
            Materialization::Local => {}
            Materialization::Placeholder => {
                self.provider.request_materialization(&path);
                return Err(FileError::Unavailable(path));
            }
            Materialization::Missing => return Err(FileError::NotFound(path)),
        }

        fs::read_to_string(&path).map_err(|e| FileError::from_io(&path, e))
    }

    /// Atomically replace (or create) a file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the write fails; the previous content is kept.
    pub fn write(&self, path: &Path, content: &str) -> FileResult<FileIdentity> {
        let path = self.resolve(path);
        let _guard = self.lock.write().unwrap_or_else(|e| e.into_inner());

        write_atomic(&path, content.as_bytes()).map_err(|source| FileError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), bytes = content.len(), "Wrote file");
        Ok(FileIdentity::new(&path))
    }

    /// Remove a file. Removing an absent file succeeds.
    ///
    /// # Errors
    ///
    /// Returns an I/O error for anything other than "already gone".
    pub fn delete(&self, path: &Path) -> FileResult<()> {
        let path = self.resolve(path);
        let _guard = self.lock.write().unwrap_or_else(|e| e.into_inner());

        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "Deleted file");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(FileError::Io { path, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> FileStore {
        FileStore::new(dir.path(), Arc::new(SyncedFolder::new()))
    }

    #[test]
    fn test_enumerate_skips_hidden_and_other_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("a.md"), "a").unwrap();
        fs::write(root.join("b.MD"), "b").unwrap();
        fs::write(root.join("notes.txt"), "x").unwrap();
        fs::write(root.join(".hidden.md"), "x").unwrap();
        fs::write(root.join(".a.md.1234.tmp"), "x").unwrap();
        fs::write(root.join("a (phone's conflicted copy).md"), "x").unwrap();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("sub/c.md"), "c").unwrap();

        let names: Vec<_> = store(&temp_dir)
            .enumerate()
            .unwrap()
            .iter()
            .map(|i| i.name().to_string())
            .collect();
        assert_eq!(names.len(), 3);
        assert!(names.contains(&"a.md".to_string()));
        assert!(names.contains(&"b.MD".to_string()));
        assert!(names.contains(&"c.md".to_string()));
    }

    #[test]
    fn test_enumerate_keeps_conflict_wording_without_original() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("Clean up Dropbox (conflicted copy) files.md"), "x").unwrap();
        fs::write(root.join("Notes (old conflicted copy).md"), "x").unwrap();

        let mut names: Vec<_> = store(&temp_dir)
            .enumerate()
            .unwrap()
            .iter()
            .map(|i| i.name().to_string())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "Clean up Dropbox (conflicted copy) files.md".to_string(),
                "Notes (old conflicted copy).md".to_string(),
            ]
        );
    }

    #[test]
    fn test_enumerate_missing_root_fails() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path().join("nope"), Arc::new(LocalDisk));
        assert!(matches!(store.enumerate(), Err(FileError::NotFound(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_enumerate_survives_symlink_loop() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("sub/a.md"), "a").unwrap();
        std::os::unix::fs::symlink(root, root.join("sub/loop")).unwrap();
        std::os::unix::fs::symlink(root.join("sub/a.md"), root.join("alias.md")).unwrap();

        let files = store(&temp_dir).enumerate().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name(), "a.md");
    }

    #[test]
    fn test_placeholder_read_is_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(".Later.md.icloud"), "").unwrap();
        let provider = Arc::new(SyncedFolder::new());
        let store = FileStore::new(temp_dir.path(), provider.clone());

        assert!(store.enumerate().unwrap().is_empty());
        assert_eq!(provider.requested().len(), 1);

        let result = store.read(Path::new("Later.md"));
        assert!(matches!(result, Err(FileError::Unavailable(_))));
        assert!(store.exists(Path::new("Later.md")));
    }

    #[test]
    fn test_read_write_delete() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let path = Path::new("nested/Task.md");

        assert!(matches!(store.read(path), Err(FileError::NotFound(_))));

        let identity = store.write(path, "hello").unwrap();
        assert_eq!(identity.name(), "Task.md");
        assert_eq!(store.read(path).unwrap(), "hello");
        assert_eq!(store.fingerprint(path).unwrap().size, 5);

        store.delete(path).unwrap();
        store.delete(path).unwrap();
        assert!(!store.exists(path));
    }

    #[test]
    fn test_scan_fingerprints() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("one.md"), "1").unwrap();
        fs::write(temp_dir.path().join("two.md"), "22").unwrap();

        let fps = store(&temp_dir).scan().unwrap();
        let sizes: Vec<u64> = fps.iter().map(|f| f.size).collect();
        assert_eq!(sizes, vec![1, 2]);
    }
}
