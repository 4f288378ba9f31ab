//! Core orchestration for agentsnap.
//!
//! This crate provides the layer between the CLI and the snapshot engine:
//! - Configuration management (JSONC, validation, `~` expansion)
//! - Pre-capture and post-restore hooks
//! - [`BackupService`]: capture, list, compare, restore, prune and history

pub mod backup;
pub mod config;
pub mod error;
pub mod hook;

pub use backup::{
    BackupService, CaptureOutcome, Comparison, DiffMode, ListedSnapshot, PruneOutcome,
    RestoreOutcome,
};
pub use config::Config;
pub use error::{ConfigError, CoreError, CoreResult, HookError};
pub use hook::{Hook, HookContext, HookEvent, HooksConfig};
