//! Command handlers for the agentsnap CLI.

pub mod prune;
pub mod restore;
pub mod setup;
pub mod snapshot;

pub use prune::*;
pub use restore::*;
pub use setup::*;
pub use snapshot::*;

use agentsnap_core::{BackupService, Config, CoreResult, DiffMode};
use chrono::{DateTime, Local, Utc};

/// Open the configured destination, failing if the config did not load.
pub async fn open_service(config: CoreResult<Config>) -> anyhow::Result<BackupService> {
    Ok(BackupService::open(config?).await?)
}

pub fn diff_mode(content: bool, metadata: bool) -> DiffMode {
    if content {
        DiffMode::Content
    } else if metadata {
        DiffMode::Metadata
    } else {
        DiffMode::Summary
    }
}

/// Timestamps are stored in UTC and shown in local time.
pub fn local_time(timestamp: DateTime<Utc>) -> String {
    timestamp
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// Cut `text` to `max` characters, marking the cut with `...`.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}
