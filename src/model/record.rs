//! File identity, fingerprints, and task records.
//!
//! A [`FileIdentity`] is the one normalized name of a physical file. Two
//! references to the same file (relative vs absolute, through a symlink)
//! always produce equal identities.

use serde::Serialize;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use crate::model::task::TaskDocument;

/// Normalized absolute path plus basename of one file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FileIdentity {
    path: PathBuf,
    name: String,
}

impl FileIdentity {
    /// Build an identity, resolving symlinks when the file exists.
    ///
    /// For a path that no longer exists (a deleted file), the parent
    /// directory is resolved instead and the file name re-attached, so the
    /// identity still matches the one recorded while the file existed.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = normalize_path(path.as_ref());
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Self { path, name }
    }

    /// The normalized absolute path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The file name component.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// File name without its extension.
    #[must_use]
    pub fn stem(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name)
    }
}

impl std::fmt::Display for FileIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

fn normalize_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(path) {
        return canonical;
    }

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    let cleaned = lexical_clean(&absolute);

    match (cleaned.parent(), cleaned.file_name()) {
        (Some(parent), Some(name)) => match fs::canonicalize(parent) {
            Ok(parent) => parent.join(name),
            Err(_) => cleaned,
        },
        _ => cleaned,
    }
}

/// Remove `.` and resolve `..` components without touching the filesystem.
fn lexical_clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Cheap "content may have changed" proxy: size plus modification time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFingerprint {
    pub identity: FileIdentity,
    pub size: u64,
    pub modified: SystemTime,
}

impl FileFingerprint {
    /// Equal size and mtime: assume the content is unchanged.
    #[must_use]
    pub fn same_content_as(&self, other: &Self) -> bool {
        self.size == other.size && self.modified == other.modified
    }
}

/// A point-in-time read of one task file.
///
/// The file stays the source of truth; a record is never written back
/// without going through the repository.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRecord {
    pub identity: FileIdentity,
    pub document: TaskDocument,
}

impl TaskRecord {
    #[must_use]
    pub fn path(&self) -> &Path {
        self.identity.path()
    }

    #[must_use]
    pub fn reference(&self) -> Option<&str> {
        self.document.reference.as_deref()
    }
}
