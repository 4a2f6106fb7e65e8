//! Folder change detection.
//!
//! The watcher polls the task folder and turns differences between two
//! fingerprint snapshots into typed events plus freshly parsed records.
//!
//! # Architecture
//!
//! One pass:
//! 1. Auto-resolve sidecar conflicts
//! 2. Enumerate and fingerprint every task file (failure is fatal)
//! 3. Classify: unseen → created, changed size/mtime → modified, same → skipped
//! 4. Report conflict versions for every candidate
//! 5. Suppress modifications that match one of our own recent writes
//! 6. Fold creations into one batch when the sliding window overflows
//! 7. Parse the rest in chunks; failures become diagnostics
//! 8. Report files missing since the last pass as deleted
//! 9. Commit the new snapshot and timings
//!
//! # Event Format
//!
//! Events serialize with a `kind` tag:
//! ```json
//! {"kind":"created","path":"/Users/me/Tasks/Buy milk.md","at":"2026-03-01T10:00:00Z"}
//! ```
//!
//! # Example
//!
//! ```ignore
//! use tf::sync::Watcher;
//!
//! let watcher = Watcher::new(store, codec, settings.watcher.clone());
//! let report = watcher.run_pass()?;
//! for event in &report.events {
//!     println!("{} {:?}", event.kind(), event.paths());
//! }
//! ```

mod echo;
mod rate_limit;
mod types;
mod watcher;

pub use echo::SelfWriteLog;
pub use rate_limit::CreationWindow;
pub use types::{ParseFailureDiagnostic, PassTimings, SyncReport, SyncSummary, WatcherEvent};
pub use watcher::{Watcher, UNKNOWN_SOURCE};
