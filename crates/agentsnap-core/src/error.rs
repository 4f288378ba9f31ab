//! Error types for the core crate.

use agentsnap_snapshot::SnapshotError;
use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Snapshot engine or storage error.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// A hook that must succeed did not.
    #[error("hook error: {0}")]
    Hook(#[from] HookError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// `"0"` names the live filesystem, which cannot be restored from.
    #[error("snapshot 0 is the current state of the sources and cannot be restored")]
    RestoreCurrent,

    /// A background task panicked or was cancelled.
    #[error("task failed: {0}")]
    Task(String),
}

impl CoreError {
    /// The caller passed something malformed (as opposed to an I/O problem).
    pub fn is_usage_error(&self) -> bool {
        match self {
            CoreError::Config(_) | CoreError::RestoreCurrent => true,
            CoreError::Snapshot(e) => {
                e.is_format_error() || matches!(e, SnapshotError::ShortIdOutOfRange { .. })
            }
            _ => false,
        }
    }
}

/// Configuration-specific errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid JSON/JSONC syntax.
    #[error("invalid config at {path}: {message}")]
    InvalidJson { path: String, message: String },

    /// Config validation failed.
    #[error("config validation failed: {message}")]
    Validation { message: String },

    /// Config file not found.
    #[error("config file not found: {path} (run `agentsnap init` first)")]
    NotFound { path: String },

    /// Invalid path (e.g., could not determine config directory).
    #[error("invalid path: {0}")]
    InvalidPath(String),
}

impl ConfigError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Hook error types.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Hook timed out after {0}s")]
    Timeout(u64),
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_errors() {
        assert!(CoreError::RestoreCurrent.is_usage_error());
        assert!(CoreError::from(SnapshotError::InvalidId("x".into())).is_usage_error());
        assert!(CoreError::from(SnapshotError::ShortIdOutOfRange {
            requested: 4,
            available: 1
        })
        .is_usage_error());
        assert!(!CoreError::from(SnapshotError::not_found("20240101-000000-000")).is_usage_error());
    }

    #[test]
    fn test_snapshot_errors_are_transparent() {
        let err = CoreError::from(SnapshotError::ShortIdOutOfRange {
            requested: 5,
            available: 3,
        });
        assert_eq!(err.to_string(), "No snapshot #5: 3 snapshot(s) available");
    }
}
