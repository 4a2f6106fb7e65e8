//! Data models for taskfold.
//!
//! - [`record`] - File identity, fingerprints, and parsed task records
//! - [`task`] - The structured task document and its enums
//! - [`recurrence`] - Recurrence rules and next-occurrence date math

pub mod recurrence;
pub mod record;
pub mod task;

pub use recurrence::{Anchor, Frequency, NextDates, RecurrenceRule};
pub use record::{FileFingerprint, FileIdentity, TaskRecord};
pub use task::{Blocking, Priority, Status, TaskDocument};
