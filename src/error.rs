//! Error types for taskfold.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=storage, 3=not_found, 4=validation, etc.)
//! - Retryability flags (a file the cloud layer has not materialized yet)
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;
use thiserror::Error;

use crate::store::FileError;

/// Result type alias for taskfold operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Scripts match on the string or on the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Storage (exit 2)
    IoFailure,
    Unavailable,
    JournalUnavailable,

    // Not Found (exit 3)
    NotFound,
    TaskNotFound,
    NoConflict,

    // Validation (exit 4)
    ValidationFailure,
    InvalidArgument,

    // Parse (exit 5)
    ParseFailure,

    // Recurrence (exit 6)
    RecurrenceFailure,

    // Config (exit 7)
    ConfigError,

    // Serialization (exit 8)
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::IoFailure => "IO_FAILURE",
            Self::Unavailable => "UNAVAILABLE",
            Self::JournalUnavailable => "JOURNAL_UNAVAILABLE",
            Self::NotFound => "NOT_FOUND",
            Self::TaskNotFound => "TASK_NOT_FOUND",
            Self::NoConflict => "NO_CONFLICT",
            Self::ValidationFailure => "VALIDATION_FAILURE",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::ParseFailure => "PARSE_FAILURE",
            Self::RecurrenceFailure => "RECURRENCE_FAILURE",
            Self::ConfigError => "CONFIG_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::IoFailure | Self::Unavailable | Self::JournalUnavailable => 2,
            Self::NotFound | Self::TaskNotFound | Self::NoConflict => 3,
            Self::ValidationFailure | Self::InvalidArgument => 4,
            Self::ParseFailure => 5,
            Self::RecurrenceFailure => 6,
            Self::ConfigError => 7,
            Self::JsonError => 8,
        }
    }

    /// Whether retrying the same operation later may succeed.
    ///
    /// True for files still being materialized by the cloud layer and for
    /// plain I/O failures, which are usually transient on synced folders.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable | Self::IoFailure)
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in taskfold operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("File not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("File not yet downloaded: {}", path.display())]
    Unavailable { path: PathBuf },

    #[error("IO error at {}: {source}", path.display())]
    IoAt {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Task not found: {reference}")]
    TaskNotFound {
        reference: String,
        /// Known reference ids close to the one searched.
        similar: Vec<String>,
    },

    #[error("No unresolved conflict for {}", path.display())]
    NoConflict { path: PathBuf },

    #[error("Could not parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("Invalid {field}: {constraint}")]
    Validation { field: String, constraint: String },

    #[error("Recurrence error: {0}")]
    Recurrence(String),

    #[error("Completed {} but its successor was not created: {reason}", completed.display())]
    SuccessorNotCreated { completed: PathBuf, reason: String },

    #[error("Pending write journal could not be persisted: {0}")]
    JournalUnavailable(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a validation failure on one field.
    pub fn validation(field: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            constraint: constraint.into(),
        }
    }

    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::Unavailable { .. } => ErrorCode::Unavailable,
            Self::IoAt { .. } | Self::Io(_) => ErrorCode::IoFailure,
            Self::TaskNotFound { .. } => ErrorCode::TaskNotFound,
            Self::NoConflict { .. } => ErrorCode::NoConflict,
            Self::Parse { .. } => ErrorCode::ParseFailure,
            Self::Validation { .. } => ErrorCode::ValidationFailure,
            Self::Recurrence(_) | Self::SuccessorNotCreated { .. } => {
                ErrorCode::RecurrenceFailure
            }
            Self::JournalUnavailable(_) => ErrorCode::JournalUnavailable,
            Self::Json(_) => ErrorCode::JsonError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint for humans and scripts.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::Unavailable { .. } => Some(
                "The cloud drive is downloading this file. Retry in a moment or run `tf scan`."
                    .to_string(),
            ),

            Self::TaskNotFound { similar, .. } if !similar.is_empty() => {
                Some(format!("Did you mean: {}?", similar.join(", ")))
            }
            Self::TaskNotFound { reference, .. } => Some(format!(
                "No task with reference '{reference}'. Use `tf task list` to see known tasks."
            )),

            Self::NoConflict { .. } => {
                Some("Use `tf conflicts list` to see files with unresolved versions.".to_string())
            }

            Self::Parse { path, .. } => Some(format!(
                "Fix or delete {} and run `tf scan` again.",
                path.display()
            )),

            Self::Validation { field, .. } if field == "status" => Some(
                "Valid statuses: todo, doing, waiting, done, cancelled. \
                 Synonyms: open→todo, wip→doing, complete→done"
                    .to_string(),
            ),
            Self::Validation { field, .. } if field == "priority" => {
                Some("Valid priorities: none, low, medium, high (or 0-3)".to_string())
            }

            Self::Recurrence(_) => Some(
                "Recurrence rules look like FREQ=MONTHLY;INTERVAL=1 or 'every 2 weeks'".to_string(),
            ),

            Self::SuccessorNotCreated { .. } => Some(
                "The original task is complete. Create the next occurrence with `tf task create`."
                    .to_string(),
            ),

            Self::JournalUnavailable(_) => Some(
                "The write was lost. Check free space and permissions of the config directory."
                    .to_string(),
            ),

            Self::Config(_) => Some(
                "Check settings.json in the config directory or pass --root explicitly."
                    .to_string(),
            ),

            Self::NotFound { .. }
            | Self::IoAt { .. }
            | Self::Io(_)
            | Self::Validation { .. }
            | Self::Json(_)
            | Self::InvalidArgument(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    ///
    /// Includes error code, message, retryability, exit code, and
    /// optional recovery hint.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

impl From<FileError> for Error {
    fn from(err: FileError) -> Self {
        match err {
            FileError::NotFound(path) => Self::NotFound { path },
            FileError::Unavailable(path) => Self::Unavailable { path },
            FileError::Io { path, source } => Self::IoAt { path, source },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_is_retryable() {
        let err = Error::Unavailable {
            path: PathBuf::from("/tasks/a.md"),
        };
        assert!(err.error_code().is_retryable());
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_validation_not_retryable() {
        let err = Error::validation("title", "must not be empty");
        assert!(!err.error_code().is_retryable());
        assert_eq!(err.to_string(), "Invalid title: must not be empty");
    }

    #[test]
    fn test_structured_json_contains_hint() {
        let err = Error::TaskNotFound {
            reference: "T-abcd".to_string(),
            similar: vec!["T-abce".to_string()],
        };
        let json = err.to_structured_json();
        assert_eq!(json["error"]["code"], "TASK_NOT_FOUND");
        assert_eq!(json["error"]["exit_code"], 3);
        assert!(json["error"]["hint"].as_str().unwrap().contains("T-abce"));
    }

    #[test]
    fn test_file_error_conversion() {
        let err: Error = FileError::Unavailable(PathBuf::from("x.md")).into();
        assert!(matches!(err, Error::Unavailable { .. }));

        let err: Error = FileError::NotFound(PathBuf::from("x.md")).into();
        assert_eq!(err.error_code(), ErrorCode::NotFound);
    }
}
