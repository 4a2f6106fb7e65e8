//! Task document model.
//!
//! The structured part of one task file. The engine only interprets the
//! fields it needs (status, reference id, recurrence, timestamps); everything
//! it does not know about is carried in `extra` and written back unchanged.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

/// Task status values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Todo,
    Doing,
    Waiting,
    Done,
    Cancelled,
}

impl Status {
    /// Get the string representation used on disk.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::Doing => "doing",
            Self::Waiting => "waiting",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
        }
    }

    /// Done or cancelled.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(Self::Todo),
            "doing" => Ok(Self::Doing),
            "waiting" => Ok(Self::Waiting),
            "done" => Ok(Self::Done),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Unknown status: {s}")),
        }
    }
}

/// Task priority, 0 (none) to 3 (high).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl Priority {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    #[must_use]
    pub const fn from_level(level: u8) -> Option<Self> {
        match level {
            0 => Some(Self::None),
            1 => Some(Self::Low),
            2 => Some(Self::Medium),
            3 => Some(Self::High),
            _ => None,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a task is blocked, and by what.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "refs", rename_all = "snake_case")]
pub enum Blocking {
    /// Not blocked.
    #[default]
    Clear,
    /// Blocked, without naming the blocker.
    Unspecified,
    /// Blocked by the listed reference ids.
    By(Vec<String>),
}

impl Blocking {
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        !matches!(self, Self::Clear)
    }
}

/// The structured fields plus free-form body of one task file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDocument {
    pub title: String,
    pub status: Status,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub due: Option<NaiveDate>,
    pub defer: Option<NaiveDate>,
    pub scheduled: Option<NaiveDate>,
    pub completed: Option<DateTime<Utc>>,
    pub completed_by: Option<String>,
    pub assignee: Option<String>,
    pub priority: Priority,
    pub flagged: bool,
    pub area: Option<String>,
    pub project: Option<String>,
    pub tags: Vec<String>,
    /// Raw recurrence rule text; see [`crate::model::RecurrenceRule`].
    pub recurrence: Option<String>,
    /// Short reference id, e.g. `T-1a2b`.
    pub reference: Option<String>,
    pub blocking: Blocking,
    /// Who or what created the task (an import, a device, a person).
    pub source: Option<String>,
    pub body: String,
    /// Fields this engine does not know, in file order.
    pub extra: Mapping,
}

impl TaskDocument {
    /// Create an open task with only a title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            status: Status::Todo,
            created: None,
            modified: None,
            due: None,
            defer: None,
            scheduled: None,
            completed: None,
            completed_by: None,
            assignee: None,
            priority: Priority::None,
            flagged: false,
            area: None,
            project: None,
            tags: Vec::new(),
            recurrence: None,
            reference: None,
            blocking: Blocking::Clear,
            source: None,
            body: String::new(),
            extra: Mapping::new(),
        }
    }

    #[must_use]
    pub fn is_recurring(&self) -> bool {
        self.recurrence
            .as_deref()
            .is_some_and(|r| !r.trim().is_empty())
    }

    /// Look up an unknown field by key.
    #[must_use]
    pub fn extra_field(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }
}
