//! Snapshot error types.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for snapshot operations.
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Errors that can occur during snapshot operations.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// A source tree passed to the builder does not exist.
    #[error("Source not found: {}", .0.display())]
    SourceMissing(PathBuf),

    /// Two sources share a base name, so their files would collide.
    #[error("Ambiguous sources: more than one source is named '{0}'")]
    AmbiguousSource(String),

    /// A file inside a source tree could not be read.
    #[error("Cannot read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Exclusion pattern could not be compiled.
    #[error("Invalid exclusion pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// String is neither a short ID, a full ID nor the current-state sentinel.
    #[error("Invalid snapshot ID '{0}': expected a number or a yyyyMMdd-HHmmss-SSS timestamp")]
    InvalidId(String),

    /// Short ID does not address any known snapshot.
    #[error("No snapshot #{requested}: {available} snapshot(s) available")]
    ShortIdOutOfRange { requested: usize, available: usize },

    /// Retention was requested with a disabled policy.
    #[error("Retention policy is disabled")]
    PolicyDisabled,

    /// Retention is enabled but every tier is zero.
    #[error("Retention policy is enabled but keeps nothing: set at least one of keep_last, keep_daily, keep_weekly, keep_monthly")]
    EmptyPolicy,

    /// Snapshot not found in storage.
    #[error("Snapshot not found: {0}")]
    NotFound(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A snapshot with this ID is already stored.
    #[error("Snapshot already exists: {0}")]
    AlreadyExists(String),

    /// Snapshot storage is corrupted.
    #[error("Snapshot storage corrupted: {0}")]
    Corrupted(String),
}

impl SnapshotError {
    /// Create a not found error.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn unreadable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Unreadable {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_pattern(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            message: message.into(),
        }
    }

    /// Malformed input, as opposed to I/O or range problems.
    pub fn is_format_error(&self) -> bool {
        matches!(self, Self::InvalidId(_) | Self::InvalidPattern { .. })
    }
}
