//! Persisted folder handle.
//!
//! Remembers the root the user picked with `tf init --folder`, so later
//! runs resolve to it without detection. A handle that no longer points at
//! a listable directory is cleared rather than reported as an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{Error, Result};
use crate::store::write_atomic;

pub const BOOKMARK_FILE: &str = "folder-bookmark.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderBookmark {
    pub path: PathBuf,
    pub saved_at: DateTime<Utc>,
}

fn bookmark_path(config_dir: &Path) -> PathBuf {
    config_dir.join(BOOKMARK_FILE)
}

/// Read the stored bookmark.
///
/// Returns `None` if there is none. A corrupted file is removed.
pub fn read_bookmark(config_dir: &Path) -> Option<FolderBookmark> {
    let path = bookmark_path(config_dir);
    let content = fs::read_to_string(&path).ok()?;

    match serde_json::from_str(&content) {
        Ok(bookmark) => Some(bookmark),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Discarding corrupted folder bookmark");
            let _ = fs::remove_file(&path);
            None
        }
    }
}

/// Store `folder` as the bookmarked root.
///
/// # Errors
///
/// Returns an error if the bookmark file cannot be written.
pub fn write_bookmark(config_dir: &Path, folder: &Path) -> Result<FolderBookmark> {
    let bookmark = FolderBookmark {
        path: folder.to_path_buf(),
        saved_at: Utc::now(),
    };
    let path = bookmark_path(config_dir);
    let json = serde_json::to_string_pretty(&bookmark)?;
    write_atomic(&path, json.as_bytes()).map_err(|source| Error::IoAt { path, source })?;
    Ok(bookmark)
}

/// Remove the bookmark. Removing an absent bookmark succeeds.
pub fn clear_bookmark(config_dir: &Path) -> bool {
    match fs::remove_file(bookmark_path(config_dir)) {
        Ok(()) => true,
        Err(e) => e.kind() == std::io::ErrorKind::NotFound,
    }
}

/// Check that a bookmarked folder is an existing, listable directory.
///
/// # Errors
///
/// Returns a human-readable reason when it is not.
pub fn validate_bookmark(bookmark: &FolderBookmark) -> std::result::Result<PathBuf, String> {
    let path = &bookmark.path;
    let meta = fs::metadata(path).map_err(|e| format!("{}: {e}", path.display()))?;
    if !meta.is_dir() {
        return Err(format!("{} is not a directory", path.display()));
    }
    fs::read_dir(path).map_err(|e| format!("{} is not listable: {e}", path.display()))?;
    Ok(fs::canonicalize(path).unwrap_or_else(|_| path.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_read_clear() {
        let config = TempDir::new().unwrap();
        let folder = TempDir::new().unwrap();

        assert!(read_bookmark(config.path()).is_none());

        let written = write_bookmark(config.path(), folder.path()).unwrap();
        let read = read_bookmark(config.path()).unwrap();
        assert_eq!(read, written);
        assert!(validate_bookmark(&read).is_ok());

        assert!(clear_bookmark(config.path()));
        assert!(read_bookmark(config.path()).is_none());
        assert!(clear_bookmark(config.path()));
    }

    #[test]
    fn test_corrupted_bookmark_removed() {
        let config = TempDir::new().unwrap();
        fs::write(config.path().join(BOOKMARK_FILE), "garbage").unwrap();
        assert!(read_bookmark(config.path()).is_none());
        assert!(!config.path().join(BOOKMARK_FILE).exists());
    }

    #[test]
    fn test_validate_rejects_missing_and_files() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("file.txt");
        fs::write(&file, "x").unwrap();

        let missing = FolderBookmark {
            path: temp_dir.path().join("gone"),
            saved_at: Utc::now(),
        };
        assert!(validate_bookmark(&missing).is_err());

        let not_dir = FolderBookmark {
            path: file,
            saved_at: Utc::now(),
        };
        assert!(validate_bookmark(&not_dir).is_err());
    }
}
