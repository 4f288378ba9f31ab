//! Restore command handler.

use agentsnap_core::BackupService;
use std::path::Path;

/// Handle `agentsnap restore <id> [--target dir]`.
pub async fn handle_restore(
    service: &BackupService,
    id: &str,
    target: Option<&Path>,
) -> anyhow::Result<()> {
    let outcome = service.restore(id, target).await?;
    match &outcome.target {
        Some(dir) => println!(
            "Restored {} files from {} into {}",
            outcome.file_count,
            outcome.snapshot_id,
            dir.display()
        ),
        None => println!(
            "Restored {} files from {} into the configured sources",
            outcome.file_count, outcome.snapshot_id
        ),
    }
    Ok(())
}
