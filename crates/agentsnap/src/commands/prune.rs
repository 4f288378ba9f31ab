//! Retention and audit command handlers.

use super::local_time;
use agentsnap_core::BackupService;

/// Handle `agentsnap prune [--dry-run]`.
pub async fn handle_prune(service: &BackupService, dry_run: bool) -> anyhow::Result<()> {
    let outcome = service.prune(dry_run).await?;
    let plan = &outcome.plan;

    for info in &plan.to_keep {
        let tiers: Vec<String> = plan
            .reasons_for(&info.id)
            .iter()
            .map(ToString::to_string)
            .collect();
        println!("keep    {}  ({})", info.id, tiers.join(", "));
    }

    let Some(report) = outcome.report else {
        for info in &plan.to_delete {
            println!("delete  {}", info.id);
        }
        println!(
            "Dry run: would delete {} of {} snapshots.",
            plan.to_delete.len(),
            plan.total_snapshots
        );
        return Ok(());
    };

    for id in &report.deleted {
        println!("deleted {id}");
    }
    for (id, error) in &report.failed {
        eprintln!("failed  {id}: {error}");
    }
    println!(
        "Deleted {} of {} snapshots.",
        report.deleted.len(),
        plan.total_snapshots
    );

    if !report.is_complete() {
        anyhow::bail!("{} snapshot(s) could not be deleted", report.failed.len());
    }
    Ok(())
}

/// Handle `agentsnap history`.
pub async fn handle_history(service: &BackupService, limit: usize) -> anyhow::Result<()> {
    let entries = service.history(limit).await?;
    if entries.is_empty() {
        println!("No history recorded.");
        return Ok(());
    }

    for entry in entries {
        let detail = entry.detail.as_deref().unwrap_or("");
        println!(
            "{}  {:<8}  {}  {}",
            local_time(entry.at),
            entry.event.to_string(),
            entry.snapshot_id,
            detail
        );
    }
    Ok(())
}
