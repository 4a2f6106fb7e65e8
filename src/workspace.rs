//! The long-lived service over one task folder.
//!
//! A [`Workspace`] owns every stateful component for a root and wires them
//! together: repository writes are marked as self-writes on the watcher,
//! watcher passes refresh the repository's known reference ids, and
//! durable writes fall back to the pending write journal.

use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use tracing::{info, warn};

use crate::codec::{DocumentCodec, FrontMatterCodec};
use crate::config::{ProviderKind, Settings};
use crate::error::{Error, Result};
use crate::journal::{PendingWriteJournal, ReplayReport};
use crate::model::{FileIdentity, TaskDocument, TaskRecord};
use crate::repo::TaskRepository;
use crate::store::{CloudProvider, FileError, FileStore, LocalDisk, SidecarStore, SyncedFolder};
use crate::sync::{SyncReport, Watcher};

/// What happened to a durable write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DurableWrite {
    Written { identity: FileIdentity },
    /// Queued in the journal for `tf journal replay`.
    Queued { id: Uuid },
}

#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    settings: Settings,
    store: Arc<FileStore>,
    repo: TaskRepository,
    watcher: Arc<Watcher>,
    journal: PendingWriteJournal,
    sidecars: SidecarStore,
}

impl Workspace {
    /// Open `root` with the provider named in `settings` and the front matter codec.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `root` is not a directory, or the journal error.
    pub fn open(root: &Path, config_dir: &Path, settings: Settings) -> Result<Self> {
        let provider: Arc<dyn CloudProvider> = match settings.provider {
            ProviderKind::Local => Arc::new(LocalDisk),
            ProviderKind::Synced => Arc::new(SyncedFolder::new()),
        };
        Self::open_with(root, config_dir, settings, provider, Arc::new(FrontMatterCodec))
    }

    /// Open with explicit collaborators.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `root` is not a directory, or the journal error.
    pub fn open_with(
        root: &Path,
        config_dir: &Path,
        settings: Settings,
        provider: Arc<dyn CloudProvider>,
        codec: Arc<dyn DocumentCodec>,
    ) -> Result<Self> {
        if !root.is_dir() {
            return Err(Error::NotFound {
                path: root.to_path_buf(),
            });
        }

        let store =
            Arc::new(FileStore::new(root, provider).with_extension(settings.extension.clone()));
        let sidecars = SidecarStore::new(Arc::clone(&store));
        let watcher = Arc::new(
            Watcher::new(Arc::clone(&store), Arc::clone(&codec), settings.watcher.clone())
                .with_sidecars(sidecars.clone()),
        );
        let repo = TaskRepository::new(Arc::clone(&store), codec, settings.ref_ids.clone())
            .with_observer(watcher.clone());
        let journal = PendingWriteJournal::open(config_dir)?;

        info!(root = %store.root().display(), pending = journal.len(), "Opened workspace");
        Ok(Self {
            root: store.root().to_path_buf(),
            settings,
            store,
            repo,
            watcher,
            journal,
            sidecars,
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn store(&self) -> &FileStore {
        &self.store
    }

    #[must_use]
    pub const fn repository(&self) -> &TaskRepository {
        &self.repo
    }

    #[must_use]
    pub fn watcher(&self) -> &Watcher {
        &self.watcher
    }

    #[must_use]
    pub const fn journal(&self) -> &PendingWriteJournal {
        &self.journal
    }

    #[must_use]
    pub const fn sidecars(&self) -> &SidecarStore {
        &self.sidecars
    }

    /// Run one watcher pass and feed the ids it saw to the repository.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be enumerated.
    pub fn sync_pass(&self) -> Result<SyncReport> {
        let report = self.watcher.run_pass()?;
        self.repo
            .observe_references(report.records.iter().filter_map(TaskRecord::reference));
        Ok(report)
    }

    /// Write through the store, queueing the write if the folder is unavailable.
    ///
    /// # Errors
    ///
    /// Returns `JournalUnavailable` if the fallback cannot be persisted.
    pub fn write_durably(&self, path: &Path, content: &str) -> Result<DurableWrite> {
        let path = self.store.resolve(path);
        self.watcher.mark_self_write(&path);

        match self.store.write(&path, content) {
            Ok(identity) => Ok(DurableWrite::Written { identity }),
            Err(e @ (FileError::Unavailable(_) | FileError::Io { .. })) => {
                warn!(path = %path.display(), error = %e, "Write failed; queueing for replay");
                let id = self.journal.enqueue(path, content)?;
                Ok(DurableWrite::Queued { id })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Update a task like [`TaskRepository::update`], queueing the write on failure.
    ///
    /// # Errors
    ///
    /// Returns the load error, `Validation`, or `JournalUnavailable`.
    pub fn update_durably(
        &self,
        path: &Path,
        mutate: impl FnOnce(&mut TaskDocument),
    ) -> Result<(TaskDocument, DurableWrite)> {
        let record = self.repo.load(path)?;
        let mut document = record.document;
        mutate(&mut document);
        document.modified = Some(Utc::now());

        let text = self.repo.render(&document)?;
        let outcome = self.write_durably(record.identity.path(), &text)?;
        Ok((document, outcome))
    }

    /// Retry every queued write.
    ///
    /// # Errors
    ///
    /// Returns `JournalUnavailable` if the journal cannot be rewritten.
    pub fn replay_journal(&self) -> Result<ReplayReport> {
        self.journal.replay(|entry| {
            self.watcher.mark_self_write(&entry.path);
            self.store.write(&entry.path, &entry.content)?;
            Ok(())
        })
    }
}
