//! Error types for contentsync.
//!
//! Library crates use [`ContentSyncError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Only fatal conditions are errors. A single record failing to translate or
//! to be written is carried as a [`RecordFailure`] value in the run result,
//! and consistency findings (mismatches, orphans, dangling links) are plain
//! report entries.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level error type for all contentsync operations.
#[derive(Debug, thiserror::Error)]
pub enum ContentSyncError {
    /// Configuration loading or validation error (missing credentials,
    /// missing snapshot file, unparseable config).
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to the remote store or translation API.
    #[error("network error: {0}")]
    Network(String),

    /// Remote document store rejected or failed an operation.
    #[error("store error: {0}")]
    Store(String),

    /// Snapshot file could not be read, parsed, backed up or written.
    #[error("snapshot error: {0}")]
    Snapshot(String),

    /// Translation lookup failed.
    #[error("translation error: {0}")]
    Translation(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (schema mismatch, invalid format, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// JSON / wire format parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ContentSyncError>;

impl ContentSyncError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error must abort a run before any work starts.
    pub fn is_fatal_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }
}

/// A single record that could not be processed or persisted.
///
/// Counted and reported; never aborts the surrounding batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordFailure {
    pub collection: String,
    pub id: String,
    pub error: String,
}

impl RecordFailure {
    pub fn new(collection: impl Into<String>, id: impl Into<String>, error: impl ToString) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
            error: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = ContentSyncError::config("FIRESTORE_ACCESS_TOKEN is not set");
        assert_eq!(
            err.to_string(),
            "config error: FIRESTORE_ACCESS_TOKEN is not set"
        );
        assert!(err.is_fatal_config());

        let err = ContentSyncError::Translation("quota exceeded".into());
        assert!(err.to_string().contains("quota exceeded"));
        assert!(!err.is_fatal_config());
    }

    #[test]
    fn record_failure_serializes_camel_case() {
        let failure = RecordFailure::new("testimonials", "t1", "HTTP 500");
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["collection"], "testimonials");
        assert_eq!(json["id"], "t1");
        assert_eq!(json["error"], "HTTP 500");
    }
}
