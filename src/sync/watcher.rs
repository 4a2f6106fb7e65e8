//! Fingerprint-diff watcher.
//!
//! A pass enumerates the root, diffs against the previous snapshot and
//! reports what changed. State lives behind one mutex and is copied out at
//! pass start, so marks recorded while a pass runs survive its commit.

use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Instant, SystemTime};

use tracing::{debug, info, warn};

use super::echo::SelfWriteLog;
use super::rate_limit::CreationWindow;
use super::types::{
    ParseFailureDiagnostic, PassTimings, SyncReport, SyncSummary, WatcherEvent,
};
use crate::codec::DocumentCodec;
use crate::config::WatcherSettings;
use crate::error::Result;
use crate::model::{FileFingerprint, FileIdentity, TaskRecord};
use crate::repo::WriteObserver;
use crate::store::{FileError, FileStore, Materialization, SidecarStore};

/// Source attributed to a batch when no document names one.
pub const UNKNOWN_SOURCE: &str = "unknown";

#[derive(Debug, Default)]
struct WatcherState {
    /// Bumped by `reset()` so an in-flight pass does not restore the old baseline.
    generation: u64,
    snapshot: HashMap<FileIdentity, FileFingerprint>,
    self_writes: SelfWriteLog,
    creations: CreationWindow,
    diagnostics: BTreeMap<FileIdentity, ParseFailureDiagnostic>,
    last_timings: Option<PassTimings>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Created,
    Modified,
}

enum Outcome {
    Parsed(TaskRecord),
    Failed(String),
    /// The sync layer does not have the bytes yet, or the read failed.
    Deferred,
    /// Gone between enumeration and read.
    Vanished,
    Suppressed,
}

struct Candidate {
    fingerprint: FileFingerprint,
    change: Change,
    conflict: Vec<PathBuf>,
    outcome: Outcome,
}

/// Polling change detector for one task folder.
pub struct Watcher {
    store: Arc<FileStore>,
    codec: Arc<dyn DocumentCodec>,
    settings: WatcherSettings,
    sidecars: Option<SidecarStore>,
    state: Mutex<WatcherState>,
    /// Serializes passes; independent of `state`.
    pass_lock: Mutex<()>,
}

impl std::fmt::Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("root", &self.store.root())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Watcher {
    pub fn new(
        store: Arc<FileStore>,
        codec: Arc<dyn DocumentCodec>,
        settings: WatcherSettings,
    ) -> Self {
        Self {
            store,
            codec,
            settings,
            sidecars: None,
            state: Mutex::new(WatcherState::default()),
            pass_lock: Mutex::new(()),
        }
    }

    /// Auto-resolve sidecar conflicts at the start of every pass.
    #[must_use]
    pub fn with_sidecars(mut self, sidecars: SidecarStore) -> Self {
        self.sidecars = Some(sidecars);
        self
    }

    fn state(&self) -> MutexGuard<'_, WatcherState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ── Self-writes ──────────────────────────────────────────

    /// Record that this process is about to write `path`.
    pub fn mark_self_write(&self, path: &Path) {
        let identity = FileIdentity::new(self.store.resolve(path));
        debug!(path = %identity, "Marked self-write");
        self.state().self_writes.mark(identity, SystemTime::now());
    }

    // ── Diagnostics ──────────────────────────────────────────

    /// Files that currently fail to parse, in path order.
    #[must_use]
    pub fn diagnostics(&self) -> Vec<ParseFailureDiagnostic> {
        self.state().diagnostics.values().cloned().collect()
    }

    /// Forget the diagnostic for `path`. Returns `false` if there was none.
    ///
    /// The file is not re-reported until it changes again.
    pub fn dismiss_diagnostic(&self, path: &Path) -> bool {
        let identity = FileIdentity::new(self.store.resolve(path));
        self.state().diagnostics.remove(&identity).is_some()
    }

    #[must_use]
    pub fn last_timings(&self) -> Option<PassTimings> {
        self.state().last_timings
    }

    /// Drop the baseline; the next pass reports every file as created.
    pub fn reset(&self) {
        let mut state = self.state();
        state.generation += 1;
        state.snapshot.clear();
        info!("Watcher baseline reset");
    }

    // ── Pass ─────────────────────────────────────────────────

    /// Run one detection pass.
    ///
    /// A file that fails to parse never aborts the pass.
    ///
    /// # Errors
    ///
    /// Returns an error only if the root cannot be enumerated.
    pub fn run_pass(&self) -> Result<SyncReport> {
        let _pass = self.pass_lock.lock().unwrap_or_else(|e| e.into_inner());
        let started = Instant::now();
        let now = SystemTime::now();
        let at = Utc::now();
        let mut summary = SyncSummary::default();

        if let Some(sidecars) = &self.sidecars {
            summary.sidecars_resolved = sidecars.resolve_conflicts();
        }

        let current = self.store.scan()?;
        let enumeration = started.elapsed();

        let (generation, previous, self_writes, window) = {
            let mut state = self.state();
            state
                .self_writes
                .prune(now, self.settings.echo_retention());
            state
                .creations
                .prune(now, self.settings.rate_limit_window());
            (
                state.generation,
                state.snapshot.clone(),
                state.self_writes.clone(),
                state.creations.clone(),
            )
        };

        // Classify and check for conflicts before echo suppression
        let mut candidates = Vec::new();
        for fingerprint in &current {
            let change = match previous.get(&fingerprint.identity) {
                None => Change::Created,
                Some(prior) if prior.same_content_as(fingerprint) => continue,
                Some(_) => Change::Modified,
            };
            let conflict = self.conflict_versions(fingerprint.identity.path());
            let outcome = if change == Change::Modified
                && self_writes.matches(fingerprint, self.settings.echo_tolerance())
            {
                Outcome::Suppressed
            } else {
                Outcome::Deferred
            };
            candidates.push(Candidate {
                fingerprint: fingerprint.clone(),
                change,
                conflict,
                outcome,
            });
        }

        let parse_started = Instant::now();
        let files_parsed = self.parse_candidates(&mut candidates);
        let parse = parse_started.elapsed();

        // Deferred and vanished files come back as creations on a later pass
        let creations = candidates
            .iter()
            .filter(|c| {
                c.change == Change::Created
                    && matches!(c.outcome, Outcome::Parsed(_) | Outcome::Failed(_))
            })
            .count();
        let rate_limited = window.would_exceed(creations, self.settings.rate_limit_threshold);
        if rate_limited {
            info!(
                creations,
                recent = window.len(),
                threshold = self.settings.rate_limit_threshold,
                "Creation burst; folding into one batch"
            );
        }

        // Emit per-candidate events in path order
        let mut events = Vec::new();
        let mut records = Vec::new();
        let mut batch = Vec::new();
        let mut next_snapshot: HashMap<FileIdentity, FileFingerprint> = current
            .iter()
            .map(|fp| (fp.identity.clone(), fp.clone()))
            .collect();
        let mut failures = Vec::new();
        let mut recovered = Vec::new();

        for candidate in candidates {
            let identity = candidate.fingerprint.identity;
            let path = identity.path().to_path_buf();

            if !candidate.conflict.is_empty() {
                summary.conflicted += 1;
                events.push(WatcherEvent::Conflict {
                    path: path.clone(),
                    versions: candidate.conflict,
                    at,
                });
            }

            match candidate.outcome {
                Outcome::Suppressed => {
                    debug!(path = %path.display(), "Suppressed self-write echo");
                    summary.suppressed += 1;
                }
                Outcome::Parsed(record) => {
                    summary.ingested += 1;
                    recovered.push(identity);
                    match candidate.change {
                        Change::Created if rate_limited => batch.push(record.clone()),
                        Change::Created => events.push(WatcherEvent::Created { path, at }),
                        Change::Modified => events.push(WatcherEvent::Modified { path, at }),
                    }
                    records.push(record);
                }
                Outcome::Failed(reason) => {
                    summary.failed += 1;
                    events.push(WatcherEvent::Unparseable {
                        path: path.clone(),
                        reason: reason.clone(),
                        at,
                    });
                    failures.push((identity, ParseFailureDiagnostic { path, reason, at }));
                }
                Outcome::Deferred => {
                    summary.deferred += 1;
                    keep_previous(&mut next_snapshot, &previous, &identity);
                }
                Outcome::Vanished => keep_previous(&mut next_snapshot, &previous, &identity),
            }
        }

        if !batch.is_empty() {
            events.push(WatcherEvent::RateLimitedBatch {
                paths: batch.iter().map(|r| r.path().to_path_buf()).collect(),
                dominant_source: dominant_source(&batch),
                at,
            });
        }

        // Deletions from the same (previous, current) pair
        let present: HashSet<&FileIdentity> = current.iter().map(|fp| &fp.identity).collect();
        let mut gone: Vec<&FileIdentity> = previous
            .keys()
            .filter(|identity| !present.contains(identity))
            .collect();
        gone.sort();
        let mut deleted = Vec::new();
        for identity in gone {
            if self.store.provider().materialization(identity.path())
                == Materialization::Placeholder
            {
                // Evicted to a placeholder, not deleted
                summary.deferred += 1;
                keep_previous(&mut next_snapshot, &previous, identity);
                continue;
            }
            summary.deleted += 1;
            events.push(WatcherEvent::Deleted {
                path: identity.path().to_path_buf(),
                at,
            });
            deleted.push(identity.clone());
        }

        let timings = PassTimings {
            enumeration,
            parse,
            total: started.elapsed(),
            files_seen: current.len(),
            files_parsed,
        };

        {
            let mut state = self.state();
            if state.generation == generation {
                state.snapshot = next_snapshot;
            } else {
                debug!("Baseline reset during pass; not committing snapshot");
            }
            for identity in recovered.iter().chain(&deleted) {
                state.diagnostics.remove(identity);
            }
            state.diagnostics.extend(failures);
            state.creations.record(creations, now);
            state.last_timings = Some(timings);
        }

        info!(
            ingested = summary.ingested,
            failed = summary.failed,
            deleted = summary.deleted,
            conflicted = summary.conflicted,
            suppressed = summary.suppressed,
            elapsed_ms = timings.total.as_millis(),
            "Watcher pass complete"
        );

        Ok(SyncReport {
            summary,
            events,
            records,
            timings,
        })
    }

    fn conflict_versions(&self, path: &Path) -> Vec<PathBuf> {
        match self.store.provider().conflict_versions(path) {
            Ok(versions) => versions.into_iter().map(|v| v.location).collect(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not list conflict versions");
                Vec::new()
            }
        }
    }

    /// Read and decode every unsuppressed candidate, chunk by chunk.
    fn parse_candidates(&self, candidates: &mut [Candidate]) -> usize {
        let chunk_size = self.settings.parse_chunk_size.max(1);
        let mut parsed = 0;

        for (index, chunk) in candidates.chunks_mut(chunk_size).enumerate() {
            debug!(chunk = index, files = chunk.len(), "Parsing chunk");
            for candidate in chunk {
                if matches!(candidate.outcome, Outcome::Suppressed) {
                    continue;
                }
                candidate.outcome = self.read_candidate(&candidate.fingerprint.identity);
                if matches!(candidate.outcome, Outcome::Parsed(_) | Outcome::Failed(_)) {
                    parsed += 1;
                }
            }
        }
        parsed
    }

    fn read_candidate(&self, identity: &FileIdentity) -> Outcome {
        let text = match self.store.read(identity.path()) {
            Ok(text) => text,
            Err(FileError::Unavailable(path)) => {
                debug!(path = %path.display(), "Deferring file not yet downloaded");
                return Outcome::Deferred;
            }
            Err(FileError::NotFound(path)) => {
                debug!(path = %path.display(), "File vanished before read");
                return Outcome::Vanished;
            }
            Err(e) => {
                warn!(error = %e, "Deferring unreadable file");
                return Outcome::Deferred;
            }
        };

        match self.codec.decode(&text) {
            Ok(document) => Outcome::Parsed(TaskRecord {
                identity: identity.clone(),
                document,
            }),
            Err(failure) => {
                warn!(path = %identity, reason = %failure.reason, "Unparseable task file");
                Outcome::Failed(failure.reason)
            }
        }
    }
}

impl WriteObserver for Watcher {
    fn will_write(&self, path: &Path) {
        self.mark_self_write(path);
    }
}

/// Carry the prior fingerprint forward, or drop a file never seen before.
fn keep_previous(
    next: &mut HashMap<FileIdentity, FileFingerprint>,
    previous: &HashMap<FileIdentity, FileFingerprint>,
    identity: &FileIdentity,
) {
    match previous.get(identity) {
        Some(prior) => {
            next.insert(identity.clone(), prior.clone());
        }
        None => {
            next.remove(identity);
        }
    }
}

/// Most common `source` among the records; ties go alphabetically.
fn dominant_source(records: &[TaskRecord]) -> String {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for record in records {
        if let Some(source) = record.document.source.as_deref() {
            *counts.entry(source).or_default() += 1;
        }
    }
    // max_by_key keeps the last maximum, so walk in reverse for the first
    counts
        .iter()
        .rev()
        .max_by_key(|(_, count)| **count)
        .map_or_else(|| UNKNOWN_SOURCE.to_string(), |(source, _)| (*source).to_string())
}
