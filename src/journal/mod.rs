//! Pending write journal.
//!
//! A device-local retry queue for writes that failed because the folder was
//! unavailable. Entries live in `pending-writes.jsonl` under the config
//! directory, one JSON object per line:
//!
//! ```json
//! {"id":"6f1c…","path":"/Users/me/Tasks/Buy milk.md","content":"---\n…","enqueued_at":"2026-03-01T10:00:00Z"}
//! ```
//!
//! The file is rewritten atomically on every change. An entry leaves the
//! journal only when its replayed write succeeds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::store::write_atomic;

/// Journal file name inside the config directory.
pub const JOURNAL_FILE: &str = "pending-writes.jsonl";

/// One write waiting to be retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingWriteEntry {
    pub id: Uuid,
    pub path: PathBuf,
    pub content: String,
    pub enqueued_at: DateTime<Utc>,
}

/// A replayed write that failed again.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayFailure {
    pub id: Uuid,
    pub path: PathBuf,
    pub reason: String,
}

/// Result of one replay.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ReplayReport {
    pub succeeded: usize,
    pub failed: usize,
    /// Entries still queued after the replay, including ones added meanwhile.
    pub remaining: usize,
    pub failures: Vec<ReplayFailure>,
}

#[derive(Debug)]
pub struct PendingWriteJournal {
    file: PathBuf,
    entries: Mutex<Vec<PendingWriteEntry>>,
}

impl PendingWriteJournal {
    /// Open (or start) the journal in `config_dir`.
    ///
    /// Lines that cannot be parsed are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing journal file cannot be read.
    pub fn open(config_dir: &Path) -> Result<Self> {
        let file = config_dir.join(JOURNAL_FILE);
        let entries = if file.exists() {
            read_entries(&file)?
        } else {
            Vec::new()
        };
        if !entries.is_empty() {
            debug!(pending = entries.len(), file = %file.display(), "Loaded pending writes");
        }
        Ok(Self {
            file,
            entries: Mutex::new(entries),
        })
    }

    #[must_use]
    pub fn file(&self) -> &Path {
        &self.file
    }

    fn lock(&self) -> MutexGuard<'_, Vec<PendingWriteEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a write for later.
    ///
    /// # Errors
    ///
    /// Returns `JournalUnavailable` if the journal cannot be persisted; the
    /// entry is not kept in memory either.
    pub fn enqueue(&self, path: impl Into<PathBuf>, content: impl Into<String>) -> Result<Uuid> {
        let entry = PendingWriteEntry {
            id: Uuid::new_v4(),
            path: path.into(),
            content: content.into(),
            enqueued_at: Utc::now(),
        };
        let id = entry.id;

        let mut entries = self.lock();
        entries.push(entry);
        if let Err(e) = self.persist(&entries) {
            entries.pop();
            return Err(e);
        }
        info!(%id, pending = entries.len(), "Queued pending write");
        Ok(id)
    }

    /// Remove one entry. Returns `false` if it was not queued.
    ///
    /// # Errors
    ///
    /// Returns `JournalUnavailable` if the journal cannot be persisted; the
    /// entry stays queued.
    pub fn dequeue(&self, id: Uuid) -> Result<bool> {
        let mut entries = self.lock();
        let Some(index) = entries.iter().position(|e| e.id == id) else {
            return Ok(false);
        };
        let removed = entries.remove(index);
        if let Err(e) = self.persist(&entries) {
            entries.insert(index, removed);
            return Err(e);
        }
        Ok(true)
    }

    /// Queued entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<PendingWriteEntry> {
        self.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Retry every queued write with `write`.
    ///
    /// The queue is snapshotted and the lock released before any write runs,
    /// so `write` may itself enqueue. Afterwards only entries whose write
    /// succeeded are removed; anything enqueued meanwhile stays.
    ///
    /// # Errors
    ///
    /// Returns `JournalUnavailable` if the reconciled journal cannot be
    /// persisted. Failed writes are reported, not returned as errors.
    pub fn replay(
        &self,
        mut write: impl FnMut(&PendingWriteEntry) -> Result<()>,
    ) -> Result<ReplayReport> {
        let snapshot = self.entries();
        let mut report = ReplayReport::default();
        let mut done = Vec::new();

        for entry in &snapshot {
            match write(entry) {
                Ok(()) => {
                    report.succeeded += 1;
                    done.push(entry.id);
                }
                Err(e) => {
                    warn!(id = %entry.id, path = %entry.path.display(), error = %e, "Pending write failed again");
                    report.failed += 1;
                    report.failures.push(ReplayFailure {
                        id: entry.id,
                        path: entry.path.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let mut entries = self.lock();
        if !done.is_empty() {
            entries.retain(|e| !done.contains(&e.id));
            self.persist(&entries)?;
        }
        report.remaining = entries.len();
        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            remaining = report.remaining,
            "Replayed pending writes"
        );
        Ok(report)
    }

    fn persist(&self, entries: &[PendingWriteEntry]) -> Result<()> {
        let mut content = String::new();
        for entry in entries {
            content.push_str(&serde_json::to_string(entry)?);
            content.push('\n');
        }
        write_atomic(&self.file, content.as_bytes())
            .map_err(|e| Error::JournalUnavailable(format!("{}: {e}", self.file.display())))
    }
}

fn read_entries(path: &Path) -> Result<Vec<PendingWriteEntry>> {
    let file = File::open(path).map_err(|source| Error::IoAt {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);
    let mut entries = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<PendingWriteEntry>(&line) {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!(line = line_num + 1, error = %e, "Skipping corrupt journal line"),
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_enqueue_persists_and_reopens() {
        let temp_dir = TempDir::new().unwrap();
        let journal = PendingWriteJournal::open(temp_dir.path()).unwrap();
        let id = journal.enqueue("/tasks/a.md", "content").unwrap();

        let reopened = PendingWriteJournal::open(temp_dir.path()).unwrap();
        let entries = reopened.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, id);
        assert_eq!(entries[0].content, "content");
    }

    #[test]
    fn test_corrupt_line_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let journal = PendingWriteJournal::open(temp_dir.path()).unwrap();
        journal.enqueue("/tasks/a.md", "a").unwrap();
        let file = temp_dir.path().join(JOURNAL_FILE);
        let mut text = fs::read_to_string(&file).unwrap();
        text.push_str("{not json\n");
        fs::write(&file, text).unwrap();

        let reopened = PendingWriteJournal::open(temp_dir.path()).unwrap();
        assert_eq!(reopened.len(), 1);
    }

    #[test]
    fn test_dequeue() {
        let temp_dir = TempDir::new().unwrap();
        let journal = PendingWriteJournal::open(temp_dir.path()).unwrap();
        let id = journal.enqueue("/tasks/a.md", "a").unwrap();

        assert!(journal.dequeue(id).unwrap());
        assert!(!journal.dequeue(id).unwrap());
        assert!(journal.is_empty());
        assert!(PendingWriteJournal::open(temp_dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_replay_removes_only_successes() {
        let temp_dir = TempDir::new().unwrap();
        let journal = PendingWriteJournal::open(temp_dir.path()).unwrap();
        journal.enqueue("/tasks/ok.md", "ok").unwrap();
        let stuck = journal.enqueue("/tasks/stuck.md", "stuck").unwrap();

        let report = journal
            .replay(|entry| {
                if entry.content == "ok" {
                    Ok(())
                } else {
                    Err(Error::Unavailable {
                        path: entry.path.clone(),
                    })
                }
            })
            .unwrap();

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.remaining, 1);
        assert_eq!(journal.entries()[0].id, stuck);
    }

    #[test]
    fn test_enqueue_during_replay_survives() {
        let temp_dir = TempDir::new().unwrap();
        let journal = PendingWriteJournal::open(temp_dir.path()).unwrap();
        journal.enqueue("/tasks/a.md", "a").unwrap();

        let mut added = None;
        let report = journal
            .replay(|_| {
                added = Some(journal.enqueue("/tasks/b.md", "b")?);
                Ok(())
            })
            .unwrap();

        assert_eq!(report.succeeded, 1);
        let entries = journal.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(Some(entries[0].id), added);
        assert_eq!(PendingWriteJournal::open(temp_dir.path()).unwrap().len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_unpersistable_journal_rolls_back() {
        let temp_dir = TempDir::new().unwrap();
        // A regular file where the config directory should be
        let blocker = temp_dir.path().join("config");
        fs::write(&blocker, "").unwrap();
        let journal = PendingWriteJournal::open(&blocker).unwrap();

        let result = journal.enqueue("/tasks/a.md", "a");
        assert!(matches!(result, Err(Error::JournalUnavailable(_))));
        assert!(journal.is_empty());
    }
}
