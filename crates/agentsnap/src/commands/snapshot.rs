//! Capture and inspection command handlers.
//!
//! Handles `snapshot`, `list`, `show` and `diff`.

use super::{local_time, truncate};
use agentsnap_core::{BackupService, CaptureOutcome, DiffMode};
use bytesize::ByteSize;
use serde_json::json;

/// Handle `agentsnap snapshot`.
pub async fn handle_snapshot(
    service: &BackupService,
    message: Option<String>,
    force: bool,
) -> anyhow::Result<()> {
    match service.capture(message, force).await? {
        CaptureOutcome::Created { info, diff, pruned } => {
            println!(
                "Created snapshot {} ({} files: +{} -{} ~{})",
                info.id,
                info.file_count,
                diff.added.len(),
                diff.removed.len(),
                diff.modified.len()
            );
            for id in &pruned {
                println!("Pruned {id}");
            }
        }
        CaptureOutcome::Unchanged { last_id } => {
            println!("No changes since {last_id}, nothing to do (use --force to snapshot anyway).");
        }
    }
    Ok(())
}

/// Handle `agentsnap list`.
pub async fn handle_list(service: &BackupService, as_json: bool) -> anyhow::Result<()> {
    let snapshots = service.list().await?;

    if as_json {
        let items: Vec<_> = snapshots
            .iter()
            .map(|s| {
                json!({
                    "shortId": s.short_id,
                    "id": s.info.id,
                    "timestamp": s.info.timestamp,
                    "message": s.info.message,
                    "fileCount": s.info.file_count,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if snapshots.is_empty() {
        println!("No snapshots yet. Run `agentsnap snapshot` to create one.");
        return Ok(());
    }

    println!(
        "{:>4}  {:<19}  {:<19}  {:>6}  {}",
        "#", "ID", "DATE", "FILES", "MESSAGE"
    );
    println!("{}", "-".repeat(78));
    for s in &snapshots {
        println!(
            "{:>4}  {:<19}  {:<19}  {:>6}  {}",
            s.short_id,
            s.info.id,
            local_time(s.info.timestamp),
            s.info.file_count,
            truncate(s.info.message.as_deref().unwrap_or(""), 22)
        );
    }
    Ok(())
}

/// Handle `agentsnap show <id>`.
pub async fn handle_show(service: &BackupService, id: &str, as_json: bool) -> anyhow::Result<()> {
    let snapshot = service.show(id).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    println!("Snapshot: {}", snapshot.id);
    println!("Date: {}", local_time(snapshot.timestamp));
    if let Some(message) = &snapshot.message {
        println!("Message: {message}");
    }
    println!(
        "Files: {} ({})",
        snapshot.file_count(),
        ByteSize::b(snapshot.total_size())
    );
    println!();
    for record in snapshot.files().values() {
        println!(
            "  {:>10}  {}  {}",
            ByteSize::b(record.size).to_string(),
            &record.content_hash[..record.content_hash.len().min(12)],
            record.path
        );
    }
    Ok(())
}

/// Handle `agentsnap diff [from] [to]`.
pub async fn handle_diff(
    service: &BackupService,
    from: &str,
    to: &str,
    mode: DiffMode,
) -> anyhow::Result<()> {
    let comparison = service.compare(from, to, mode).await?;
    if comparison.diff.is_empty() {
        println!("No differences.");
    } else {
        print!("{}", comparison.rendered);
    }
    Ok(())
}
