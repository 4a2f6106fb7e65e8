//! Self-write echo log.
//!
//! Before this process writes a file it marks the path. A later pass that
//! sees the file modified with an mtime close to a mark knows the change is
//! its own and does not report it.

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use crate::model::{FileFingerprint, FileIdentity};

#[derive(Debug, Clone, Default)]
pub struct SelfWriteLog {
    marks: HashMap<FileIdentity, Vec<SystemTime>>,
}

impl SelfWriteLog {
    pub fn mark(&mut self, identity: FileIdentity, at: SystemTime) {
        self.marks.entry(identity).or_default().push(at);
    }

    /// Whether `fingerprint`'s mtime is within `tolerance` of a mark.
    #[must_use]
    pub fn matches(&self, fingerprint: &FileFingerprint, tolerance: Duration) -> bool {
        self.marks
            .get(&fingerprint.identity)
            .is_some_and(|marks| {
                marks
                    .iter()
                    .any(|&marked| distance(marked, fingerprint.modified) <= tolerance)
            })
    }

    /// Drop marks older than `retention`.
    pub fn prune(&mut self, now: SystemTime, retention: Duration) {
        self.marks.retain(|_, marks| {
            marks.retain(|&marked| distance(marked, now) <= retention);
            !marks.is_empty()
        });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.marks.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }
}

fn distance(a: SystemTime, b: SystemTime) -> Duration {
    a.duration_since(b)
        .or_else(|_| b.duration_since(a))
        .unwrap_or(Duration::ZERO)
}
