//! Watcher pass output types.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::model::TaskRecord;

/// Something that happened to the folder between two passes.
///
/// Serialized with a `kind` tag:
/// `{"kind":"modified","path":"/tasks/Buy milk.md","at":"2026-03-01T10:00:00Z"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WatcherEvent {
    Created {
        path: PathBuf,
        at: DateTime<Utc>,
    },
    Modified {
        path: PathBuf,
        at: DateTime<Utc>,
    },
    Deleted {
        path: PathBuf,
        at: DateTime<Utc>,
    },
    /// The sync layer holds unreconciled versions of this file.
    Conflict {
        path: PathBuf,
        versions: Vec<PathBuf>,
        at: DateTime<Utc>,
    },
    Unparseable {
        path: PathBuf,
        reason: String,
        at: DateTime<Utc>,
    },
    /// Many creations at once, reported as one event.
    RateLimitedBatch {
        paths: Vec<PathBuf>,
        dominant_source: String,
        at: DateTime<Utc>,
    },
}

impl WatcherEvent {
    /// Short lowercase name of the variant.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Modified { .. } => "modified",
            Self::Deleted { .. } => "deleted",
            Self::Conflict { .. } => "conflict",
            Self::Unparseable { .. } => "unparseable",
            Self::RateLimitedBatch { .. } => "rate_limited_batch",
        }
    }

    /// Every path this event is about.
    #[must_use]
    pub fn paths(&self) -> Vec<&PathBuf> {
        match self {
            Self::Created { path, .. }
            | Self::Modified { path, .. }
            | Self::Deleted { path, .. }
            | Self::Conflict { path, .. }
            | Self::Unparseable { path, .. } => vec![path],
            Self::RateLimitedBatch { paths, .. } => paths.iter().collect(),
        }
    }
}

/// Counts for one pass.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    /// Records parsed successfully.
    pub ingested: usize,
    /// Files that failed to parse.
    pub failed: usize,
    pub deleted: usize,
    /// Files with unreconciled conflict versions.
    pub conflicted: usize,
    /// Modifications recognized as this process's own writes.
    pub suppressed: usize,
    /// Files skipped until the sync layer has their bytes.
    pub deferred: usize,
    /// Sidecar conflicts auto-resolved.
    pub sidecars_resolved: usize,
}

impl SyncSummary {
    /// Whether the pass saw any change at all.
    #[must_use]
    pub const fn is_quiet(&self) -> bool {
        self.ingested == 0
            && self.failed == 0
            && self.deleted == 0
            && self.conflicted == 0
            && self.suppressed == 0
            && self.deferred == 0
            && self.sidecars_resolved == 0
    }
}

/// A file that could not be parsed, kept until fixed, deleted, or dismissed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseFailureDiagnostic {
    pub path: PathBuf,
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// Where a pass spent its time.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PassTimings {
    #[serde(serialize_with = "as_millis")]
    pub enumeration: Duration,
    #[serde(serialize_with = "as_millis")]
    pub parse: Duration,
    #[serde(serialize_with = "as_millis")]
    pub total: Duration,
    pub files_seen: usize,
    pub files_parsed: usize,
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// Everything one pass produced.
///
/// `records` holds only what was parsed in this pass; callers merge it
/// into whatever they already have.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub summary: SyncSummary,
    pub events: Vec<WatcherEvent>,
    pub records: Vec<TaskRecord>,
    pub timings: PassTimings,
}

impl SyncReport {
    /// Events of one kind, e.g. `"modified"`.
    #[must_use]
    pub fn events_of(&self, kind: &str) -> Vec<&WatcherEvent> {
        self.events.iter().filter(|e| e.kind() == kind).collect()
    }
}
