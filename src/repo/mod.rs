//! Task lifecycle operations.
//!
//! The repository turns documents into files and back. Every write goes
//! through [`FileStore`], and the [`WriteObserver`] hears about it first so
//! the watcher can tell its own writes from external ones.
//!
//! Reference ids are issued against a cache of every id found on disk. The
//! cache is filled by a full scan on first use; afterwards only watcher
//! passes refresh it.

mod filename;
mod ref_id;

pub use filename::{sanitize_stem, unique_path, MAX_STEM_CHARS};
pub use ref_id::RefIdIssuer;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::codec::DocumentCodec;
use crate::config::RefIdSettings;
use crate::error::{Error, Result};
use crate::model::{FileIdentity, NextDates, RecurrenceRule, Status, TaskDocument, TaskRecord};
use crate::store::FileStore;
use crate::validate::{find_similar_ids, validate_document};

/// Notified before the repository writes or deletes a file.
pub trait WriteObserver: Send + Sync {
    fn will_write(&self, path: &Path);
}

/// Outcome of completing a recurring task.
#[derive(Debug, Clone, Serialize)]
pub struct RepeatOutcome {
    pub completed: TaskRecord,
    /// `None` when the rule's `UNTIL` ended the series.
    pub successor: Option<TaskRecord>,
}

pub struct TaskRepository {
    store: Arc<FileStore>,
    codec: Arc<dyn DocumentCodec>,
    observer: Option<Arc<dyn WriteObserver>>,
    ref_settings: RefIdSettings,
    /// Filled lazily from a full scan.
    ids: Mutex<Option<RefIdIssuer>>,
}

impl std::fmt::Debug for TaskRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRepository")
            .field("root", &self.store.root())
            .field("has_observer", &self.observer.is_some())
            .finish_non_exhaustive()
    }
}

impl TaskRepository {
    pub fn new(
        store: Arc<FileStore>,
        codec: Arc<dyn DocumentCodec>,
        ref_settings: RefIdSettings,
    ) -> Self {
        Self {
            store,
            codec,
            observer: None,
            ref_settings,
            ids: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn WriteObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    #[must_use]
    pub fn store(&self) -> &FileStore {
        &self.store
    }

    // ── Reads ────────────────────────────────────────────────

    /// Read and decode one task file.
    ///
    /// # Errors
    ///
    /// Returns the file error, or `Parse` if the codec rejects the content.
    pub fn load(&self, path: &Path) -> Result<TaskRecord> {
        let path = self.store.resolve(path);
        let text = self.store.read(&path)?;
        let document = self.codec.decode(&text).map_err(|e| Error::Parse {
            path: path.clone(),
            reason: e.reason,
        })?;
        Ok(TaskRecord {
            identity: FileIdentity::new(&path),
            document,
        })
    }

    /// Load every readable task, skipping (and logging) files that fail.
    ///
    /// # Errors
    ///
    /// Returns an error only if the root cannot be enumerated.
    pub fn load_all(&self) -> Result<Vec<TaskRecord>> {
        let mut records = Vec::new();
        for identity in self.store.enumerate()? {
            match self.load(identity.path()) {
                Ok(record) => records.push(record),
                Err(e) => debug!(path = %identity, error = %e, "Skipping unreadable task"),
            }
        }
        Ok(records)
    }

    /// Find a task by its reference id (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns `TaskNotFound` with similar known ids when nothing matches.
    pub fn find_by_reference(&self, reference: &str) -> Result<TaskRecord> {
        let records = self.load_all()?;
        if let Some(record) = records.iter().find(|r| {
            r.reference()
                .is_some_and(|id| id.eq_ignore_ascii_case(reference))
        }) {
            return Ok(record.clone());
        }

        let known: Vec<String> = records
            .iter()
            .filter_map(|r| r.reference().map(ToString::to_string))
            .collect();
        Err(Error::TaskNotFound {
            reference: reference.to_string(),
            similar: find_similar_ids(reference, &known, 3),
        })
    }

    // ── Reference ids ────────────────────────────────────────

    fn issuer(&self) -> Result<MutexGuard<'_, Option<RefIdIssuer>>> {
        let mut guard = self.ids.lock().unwrap_or_else(|e| e.into_inner());
        if guard.is_none() {
            let mut issuer = RefIdIssuer::new(self.ref_settings.clone());
            let records = self.load_all()?;
            issuer.extend(records.iter().filter_map(TaskRecord::reference));
            debug!(known = issuer.len(), "Loaded known reference ids");
            *guard = Some(issuer);
        }
        Ok(guard)
    }

    /// Issue a new reference id unique among all known ids.
    ///
    /// # Errors
    ///
    /// Returns an error if the first-use scan cannot enumerate the root.
    pub fn issue_reference(&self) -> Result<String> {
        let mut guard = self.issuer()?;
        let issuer = guard
            .as_mut()
            .ok_or_else(|| Error::Other("reference id cache not loaded".into()))?;
        Ok(issuer.issue())
    }

    /// Add ids seen by a watcher pass to the cache.
    ///
    /// Ignored until the cache has been loaded; the first-use scan sees them.
    pub fn observe_references<'a>(&self, ids: impl IntoIterator<Item = &'a str>) {
        let mut guard = self.ids.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(issuer) = guard.as_mut() {
            issuer.extend(ids);
        }
    }

    /// Every id known to the cache, loading it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the first-use scan cannot enumerate the root.
    pub fn known_references(&self) -> Result<Vec<String>> {
        Ok(self.issuer()?.as_ref().map(RefIdIssuer::known).unwrap_or_default())
    }

    // ── Writes ───────────────────────────────────────────────

    /// Validate and encode a document without writing it.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the document is invalid.
    pub fn render(&self, document: &TaskDocument) -> Result<String> {
        validate_document(document, &self.ref_settings.prefix)?;
        Ok(self.codec.encode(document))
    }

    fn persist(&self, path: &Path, document: &TaskDocument) -> Result<TaskRecord> {
        let text = self.render(document)?;

        if let Some(observer) = &self.observer {
            observer.will_write(path);
        }
        let identity = self.store.write(path, &text)?;
        Ok(TaskRecord {
            identity,
            document: document.clone(),
        })
    }

    /// Create a task file.
    ///
    /// Stamps created/modified when unset and issues a reference id when the
    /// document has none. Without `preferred_name` the file name comes from
    /// the title, suffixed ` 2`, ` 3`, ... on collision. A preferred name
    /// that is already taken is a validation failure.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for invalid documents, or the write error.
    pub fn create(
        &self,
        mut document: TaskDocument,
        preferred_name: Option<&str>,
    ) -> Result<TaskRecord> {
        // Validate before spending an id
        let unnumbered = TaskDocument {
            reference: None,
            ..document.clone()
        };
        validate_document(&unnumbered, &self.ref_settings.prefix)?;

        let now = Utc::now();
        document.created.get_or_insert(now);
        document.modified.get_or_insert(now);

        match &document.reference {
            Some(reference) => {
                let mut guard = self.issuer()?;
                if let Some(issuer) = guard.as_mut() {
                    issuer.insert(reference);
                }
            }
            None => document.reference = Some(self.issue_reference()?),
        }

        let path = self.target_path(&document, preferred_name)?;
        let record = self.persist(&path, &document)?;
        info!(path = %record.identity, reference = ?record.reference(), "Created task");
        Ok(record)
    }

    fn target_path(
        &self,
        document: &TaskDocument,
        preferred_name: Option<&str>,
    ) -> Result<PathBuf> {
        let root = self.store.root();
        let extension = self.store.extension();

        if let Some(name) = preferred_name {
            let stem = sanitize_stem(name.strip_suffix(&format!(".{extension}")).unwrap_or(name));
            let path = root.join(format!("{stem}.{extension}"));
            if self.store.exists(&path) {
                return Err(Error::validation(
                    "filename",
                    format!("{} already exists", path.display()),
                ));
            }
            return Ok(path);
        }

        let stem = sanitize_stem(&document.title);
        Ok(unique_path(root, &stem, extension, |p| self.store.exists(p)))
    }

    /// Load, mutate, stamp `modified`, validate, and write back.
    ///
    /// Fields the codec does not know are carried through untouched.
    ///
    /// # Errors
    ///
    /// Returns the load error, `Validation` if the mutation made the
    /// document invalid, or the write error.
    pub fn update(
        &self,
        path: &Path,
        mutate: impl FnOnce(&mut TaskDocument),
    ) -> Result<TaskRecord> {
        let record = self.load(path)?;
        let mut document = record.document;
        mutate(&mut document);
        document.modified = Some(Utc::now());

        if let Some(reference) = &document.reference {
            self.observe_references([reference.as_str()]);
        }
        self.persist(record.identity.path(), &document)
    }

    /// Remove a task file. Removing an absent file succeeds.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file exists but cannot be removed.
    pub fn delete(&self, path: &Path) -> Result<()> {
        let path = self.store.resolve(path);
        if let Some(observer) = &self.observer {
            observer.will_write(&path);
        }
        self.store.delete(&path)?;
        info!(path = %path.display(), "Deleted task");
        Ok(())
    }

    /// Mark a task done.
    ///
    /// # Errors
    ///
    /// Same as [`Self::update`].
    pub fn complete(
        &self,
        path: &Path,
        at: DateTime<Utc>,
        completed_by: Option<&str>,
    ) -> Result<TaskRecord> {
        self.update(path, |doc| mark_done(doc, at, completed_by))
    }

    /// Complete a recurring task and create its next occurrence.
    ///
    /// Two separate writes: (a) the original is marked done with its
    /// recurrence cleared, (b) a successor is created with advanced dates.
    /// The rule is parsed and the next dates computed before (a), so a bad
    /// rule leaves the file untouched. If (b) fails after (a) succeeded the
    /// result is `SuccessorNotCreated`; nothing retries it.
    ///
    /// # Errors
    ///
    /// Returns `Recurrence` for a missing or invalid rule, the error of step
    /// (a), or `SuccessorNotCreated`.
    pub fn complete_repeating(
        &self,
        path: &Path,
        at: DateTime<Utc>,
        completed_by: Option<&str>,
    ) -> Result<RepeatOutcome> {
        let original = self.load(path)?;
        let rule_text = original
            .document
            .recurrence
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .ok_or_else(|| Error::Recurrence("task has no recurrence rule".into()))?;
        let rule = RecurrenceRule::parse(rule_text).map_err(Error::Recurrence)?;

        let current = NextDates {
            due: original.document.due,
            defer: original.document.defer,
            scheduled: original.document.scheduled,
        };
        let next = rule
            .next_dates(current, at.date_naive())
            .map_err(Error::Recurrence)?;

        // (a)
        let completed = self.update(original.identity.path(), |doc| {
            mark_done(doc, at, completed_by);
            doc.recurrence = None;
        })?;

        let Some(next) = next else {
            info!(path = %completed.identity, "Recurring series ended");
            return Ok(RepeatOutcome {
                completed,
                successor: None,
            });
        };

        // (b)
        let mut successor = original.document;
        successor.status = Status::Todo;
        successor.completed = None;
        successor.completed_by = None;
        successor.reference = None;
        successor.created = None;
        successor.modified = None;
        successor.due = next.due;
        successor.defer = next.defer;
        successor.scheduled = next.scheduled;

        match self.create(successor, None) {
            Ok(record) => Ok(RepeatOutcome {
                completed,
                successor: Some(record),
            }),
            Err(e) => {
                warn!(path = %completed.identity, error = %e, "Successor of recurring task not created");
                Err(Error::SuccessorNotCreated {
                    completed: completed.identity.path().to_path_buf(),
                    reason: e.to_string(),
                })
            }
        }
    }
}

fn mark_done(doc: &mut TaskDocument, at: DateTime<Utc>, completed_by: Option<&str>) {
    doc.status = Status::Done;
    doc.completed = Some(at);
    doc.completed_by = completed_by.map(ToString::to_string);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::FrontMatterCodec;
    use crate::model::{Blocking, Priority};
    use crate::store::LocalDisk;
    use chrono::{NaiveDate, TimeZone};
    use std::fs;
    use tempfile::TempDir;

    fn repo(dir: &TempDir) -> TaskRepository {
        let store = Arc::new(FileStore::new(dir.path(), Arc::new(LocalDisk)));
        TaskRepository::new(store, Arc::new(FrontMatterCodec), RefIdSettings::default())
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_create_then_load_round_trips_fields() {
        let temp_dir = TempDir::new().unwrap();
        let repo = repo(&temp_dir);

        let mut doc = TaskDocument::new("File taxes");
        doc.status = Status::Doing;
        doc.due = Some(date(2026, 4, 15));
        doc.defer = Some(date(2026, 4, 1));
        doc.scheduled = Some(date(2026, 4, 10));
        doc.priority = Priority::High;
        doc.flagged = true;
        doc.area = Some("Home".into());
        doc.project = Some("Finances".into());
        doc.tags = vec!["money".into(), "yearly".into()];
        doc.assignee = Some("sam".into());
        doc.blocking = Blocking::By(vec!["T-00aa".into()]);
        doc.source = Some("import".into());
        doc.recurrence = Some("FREQ=YEARLY".into());
        doc.body = "Receipts are in the drawer.\n".into();
        doc.extra.insert("energy".into(), "low".into());

        let created = repo.create(doc, None).unwrap();
        let loaded = repo.load(created.path()).unwrap();
        assert_eq!(loaded.document, created.document);
        assert!(loaded.reference().is_some());
        assert_eq!(loaded.identity.name(), "File taxes.md");
    }

    #[test]
    fn test_padded_and_quoted_values_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let repo = repo(&temp_dir);

        let mut doc = TaskDocument::new("Call mom ");
        doc.area = Some(" Home".into());
        doc.project = Some("yes".into());
        doc.tags = vec!["\"quoted\"".into(), "'single'".into()];
        doc.assignee = Some("null".into());
        doc.source = Some("a: b # c".into());

        let created = repo.create(doc, None).unwrap();
        let loaded = repo.load(created.path()).unwrap();
        assert_eq!(loaded.document, created.document);
        assert_eq!(loaded.document.title, "Call mom ");
        assert_eq!(loaded.document.tags, vec!["\"quoted\"", "'single'"]);
    }

    #[test]
    fn test_identical_titles_get_distinct_files() {
        let temp_dir = TempDir::new().unwrap();
        let repo = repo(&temp_dir);

        let a = repo.create(TaskDocument::new("Call mom"), None).unwrap();
        let b = repo.create(TaskDocument::new("Call mom"), None).unwrap();
        assert_ne!(a.path(), b.path());
        assert_eq!(b.identity.name(), "Call mom 2.md");
        assert_ne!(a.reference(), b.reference());
    }

    #[test]
    fn test_preferred_name_collision() {
        let temp_dir = TempDir::new().unwrap();
        let repo = repo(&temp_dir);

        let record = repo
            .create(TaskDocument::new("Whatever"), Some("inbox.md"))
            .unwrap();
        assert_eq!(record.identity.name(), "inbox.md");
        assert!(matches!(
            repo.create(TaskDocument::new("Other"), Some("inbox")),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn test_create_rejects_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let repo = repo(&temp_dir);
        let result = repo.create(TaskDocument::new(""), None);
        assert!(matches!(result, Err(Error::Validation { ref field, .. }) if field == "title"));
        assert!(fs::read_dir(temp_dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn test_update_preserves_unknown_fields() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("Hand written.md"),
            "---\ntitle: Hand written\nstatus: todo\nmood: sunny\nx-sync-id: 42\n---\nnotes\n",
        )
        .unwrap();
        let repo = repo(&temp_dir);

        let updated = repo
            .update(Path::new("Hand written.md"), |doc| doc.flagged = true)
            .unwrap();
        assert!(updated.document.modified.is_some());

        let text = fs::read_to_string(temp_dir.path().join("Hand written.md")).unwrap();
        assert!(text.contains("mood: sunny"));
        assert!(text.contains("x-sync-id: 42"));
        assert!(text.ends_with("notes\n"));
    }

    #[test]
    fn test_update_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let repo = repo(&temp_dir);
        assert!(matches!(
            repo.update(Path::new("nope.md"), |_| {}),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let repo = repo(&temp_dir);
        let record = repo.create(TaskDocument::new("Temp"), None).unwrap();
        repo.delete(record.path()).unwrap();
        repo.delete(record.path()).unwrap();
        assert!(!record.path().exists());
    }

    #[test]
    fn test_complete_stamps_attribution() {
        let temp_dir = TempDir::new().unwrap();
        let repo = repo(&temp_dir);
        let record = repo.create(TaskDocument::new("Water plants"), None).unwrap();
        let at = Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap();

        let done = repo.complete(record.path(), at, Some("alex")).unwrap();
        assert_eq!(done.document.status, Status::Done);
        assert_eq!(done.document.completed, Some(at));
        assert_eq!(done.document.completed_by.as_deref(), Some("alex"));
    }

    #[test]
    fn test_complete_repeating_monthly() {
        let temp_dir = TempDir::new().unwrap();
        let repo = repo(&temp_dir);

        let mut doc = TaskDocument::new("Pay rent");
        doc.due = Some(date(2026, 3, 1));
        doc.recurrence = Some("FREQ=MONTHLY".into());
        let original = repo.create(doc, None).unwrap();

        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let outcome = repo.complete_repeating(original.path(), at, None).unwrap();

        let completed = repo.load(original.path()).unwrap().document;
        assert_eq!(completed.status, Status::Done);
        assert_eq!(completed.recurrence, None);
        assert_eq!(completed.completed, Some(at));

        let successor = outcome.successor.unwrap();
        let next = repo.load(successor.path()).unwrap().document;
        assert_ne!(successor.path(), original.path());
        assert_eq!(next.status, Status::Todo);
        assert_eq!(next.due, Some(date(2026, 4, 1)));
        assert_eq!(next.recurrence.as_deref(), Some("FREQ=MONTHLY"));
        assert_eq!(next.completed, None);
        assert_ne!(next.reference, completed.reference);
    }

    #[test]
    fn test_complete_repeating_bad_rule_leaves_file() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("Odd.md"),
            "---\ntitle: Odd\nstatus: todo\nrecurrence: whenever\n---\n",
        )
        .unwrap();
        let before = fs::read_to_string(temp_dir.path().join("Odd.md")).unwrap();
        let repo = repo(&temp_dir);

        let result = repo.complete_repeating(Path::new("Odd.md"), Utc::now(), None);
        assert!(matches!(result, Err(Error::Recurrence(_))));
        let after = fs::read_to_string(temp_dir.path().join("Odd.md")).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_complete_repeating_successor_write_fails() {
        // Occupies the second path written with a directory so the rename fails
        struct Blocker(Mutex<usize>);
        impl WriteObserver for Blocker {
            fn will_write(&self, path: &Path) {
                let mut seen = self.0.lock().unwrap();
                *seen += 1;
                if *seen == 2 {
                    fs::create_dir(path).unwrap();
                }
            }
        }

        let temp_dir = TempDir::new().unwrap();
        let mut doc = TaskDocument::new("Pay rent");
        doc.due = Some(date(2026, 3, 1));
        doc.recurrence = Some("FREQ=MONTHLY".into());
        let original = repo(&temp_dir).create(doc, None).unwrap();

        let repo = repo(&temp_dir).with_observer(Arc::new(Blocker(Mutex::new(0))));
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let result = repo.complete_repeating(original.path(), at, None);

        match result {
            Err(Error::SuccessorNotCreated { completed, .. }) => {
                assert_eq!(completed, original.path());
            }
            other => panic!("unexpected: {other:?}"),
        }

        let completed = repo.load(original.path()).unwrap().document;
        assert_eq!(completed.status, Status::Done);
        assert_eq!(completed.recurrence, None);
        assert!(!temp_dir.path().join("Pay rent 2.md").is_file());
        let all = repo.load_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].path(), original.path());
    }

    #[test]
    fn test_complete_repeating_until_ends_series() {
        let temp_dir = TempDir::new().unwrap();
        let repo = repo(&temp_dir);
        let mut doc = TaskDocument::new("Last one");
        doc.due = Some(date(2026, 3, 1));
        doc.recurrence = Some("FREQ=MONTHLY;UNTIL=2026-03-15".into());
        let original = repo.create(doc, None).unwrap();

        let outcome = repo
            .complete_repeating(original.path(), Utc::now(), None)
            .unwrap();
        assert!(outcome.successor.is_none());
        assert_eq!(outcome.completed.document.status, Status::Done);
        assert_eq!(repo.load_all().unwrap().len(), 1);
    }

    #[test]
    fn test_find_by_reference_suggests() {
        let temp_dir = TempDir::new().unwrap();
        let repo = repo(&temp_dir);
        let mut doc = TaskDocument::new("Known");
        doc.reference = Some("T-00a1".into());
        repo.create(doc, None).unwrap();

        let found = repo.find_by_reference("t-00A1").unwrap();
        assert_eq!(found.document.title, "Known");

        match repo.find_by_reference("T-00a2") {
            Err(Error::TaskNotFound { similar, .. }) => {
                assert_eq!(similar, vec!["T-00a1".to_string()]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_observer_notified_before_write() {
        struct Recorder(Mutex<Vec<PathBuf>>);
        impl WriteObserver for Recorder {
            fn will_write(&self, path: &Path) {
                assert!(!path.exists() || path.is_file());
                self.0.lock().unwrap().push(path.to_path_buf());
            }
        }

        let temp_dir = TempDir::new().unwrap();
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        let repo = repo(&temp_dir).with_observer(recorder.clone());

        let record = repo.create(TaskDocument::new("Seen"), None).unwrap();
        repo.delete(record.path()).unwrap();
        assert_eq!(recorder.0.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_known_references_from_disk() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("a.md"),
            "---\ntitle: A\nstatus: todo\nref: T-beef\n---\n",
        )
        .unwrap();
        let repo = repo(&temp_dir);
        assert_eq!(repo.known_references().unwrap(), vec!["T-beef".to_string()]);

        repo.observe_references(["T-cafe"]);
        assert_eq!(repo.known_references().unwrap().len(), 2);
    }
}
