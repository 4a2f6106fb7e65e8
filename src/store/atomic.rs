//! Atomic file replacement and content hashing.
//!
//! Every write in taskfold goes through [`write_atomic`]:
//! 1. Write the bytes to a hidden temp file in the destination directory
//! 2. `fsync` the temp file
//! 3. Rename it over the target
//!
//! If any step fails the original file (if any) remains untouched, and a
//! reader never observes a half-written file.

use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Suffix shared by every temp file this module creates.
const TEMP_SUFFIX: &str = ".tmp";

/// Write content to a file atomically, creating parent directories.
///
/// # Errors
///
/// Returns the underlying I/O error if any step fails. The temp file never
/// outlives a failed call.
pub fn write_atomic(path: &Path, content: &[u8]) -> io::Result<()> {
    write_atomic_with(path, |writer| writer.write_all(content))
}

fn write_atomic_with(
    path: &Path,
    fill: impl FnOnce(&mut BufWriter<File>) -> io::Result<()>,
) -> io::Result<()> {
    let temp_path = temp_path_for(path)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let file = File::create(&temp_path)?;
    let written = (|| {
        let mut writer = BufWriter::new(file);
        fill(&mut writer)?;
        writer.flush()?;
        // Sync to disk before rename
        writer.get_ref().sync_all()?;
        fs::rename(&temp_path, path)
    })();

    if written.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    written
}

/// Temp file next to `path`: `.<name>.<uuid>.tmp`.
fn temp_path_for(path: &Path) -> io::Result<PathBuf> {
    let name = path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("not a file path: {}", path.display()),
        )
    })?;
    let temp_name = format!(
        ".{}.{}{TEMP_SUFFIX}",
        name.to_string_lossy(),
        uuid::Uuid::new_v4().simple()
    );
    Ok(path.with_file_name(temp_name))
}

/// Whether a file name looks like one of our in-flight temp files.
#[must_use]
pub fn is_temp_name(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(TEMP_SUFFIX)
}

/// SHA256 of some content, lowercase hex.
#[must_use]
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
