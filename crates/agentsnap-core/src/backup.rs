//! Backup orchestration.
//!
//! [`BackupService`] ties configuration, hooks and a [`SnapshotStorage`]
//! together. Captures and restores against one service are serialized.

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::hook::{HookContext, HookEvent, ENV_SNAPSHOT_ID, ENV_TARGET};
use agentsnap_snapshot::{
    calculate_prune, diff, execute_prune, render_summary, render_unified_content,
    render_unified_metadata, ContentSource, DirContent, ExclusionSet, FolderStorage, IndexEntry,
    PruneReport, PruneResult, Snapshot, SnapshotBuilder, SnapshotDiff, SnapshotInfo, SnapshotRef,
    SnapshotStorage, SourceLayout,
};
use agentsnap_util::path::is_within;
use agentsnap_util::TimingGuard;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Result of a capture.
#[derive(Debug)]
pub enum CaptureOutcome {
    /// A new snapshot was stored.
    Created {
        info: SnapshotInfo,
        /// Changes relative to the previous snapshot.
        diff: SnapshotDiff,
        /// Snapshots removed by auto-prune afterwards.
        pruned: Vec<String>,
    },
    /// Nothing changed since `last_id`; no snapshot was written.
    Unchanged { last_id: String },
}

/// A stored snapshot with its position in the newest-first listing.
#[derive(Debug, Clone)]
pub struct ListedSnapshot {
    pub short_id: usize,
    pub info: SnapshotInfo,
}

/// How [`BackupService::compare`] renders a diff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DiffMode {
    /// One `A`/`D`/`M` line per path.
    #[default]
    Summary,
    /// Unified patch from stored hashes and sizes.
    Metadata,
    /// Unified patch with real line hunks.
    Content,
}

#[derive(Debug)]
pub struct Comparison {
    pub diff: SnapshotDiff,
    pub rendered: String,
}

#[derive(Debug)]
pub struct RestoreOutcome {
    pub snapshot_id: String,
    /// `None` when restored back into the configured sources.
    pub target: Option<PathBuf>,
    pub file_count: usize,
}

#[derive(Debug)]
pub struct PruneOutcome {
    pub plan: PruneResult,
    /// `None` for a dry run.
    pub report: Option<PruneReport>,
}

/// Snapshot operations over one configured destination.
pub struct BackupService {
    config: Config,
    sources: Vec<PathBuf>,
    destination: PathBuf,
    exclusions: ExclusionSet,
    storage: Arc<dyn SnapshotStorage>,
    write_lock: Mutex<()>,
}

impl BackupService {
    /// Validate `config` and open its destination as a [`FolderStorage`].
    pub async fn open(config: Config) -> CoreResult<Self> {
        config.validate()?;
        let destination = config
            .resolved_destination()
            .ok_or_else(|| crate::ConfigError::validation("no destination configured"))?;
        let storage = FolderStorage::open_with_cap(&destination, config.index_cap).await?;
        Self::with_storage(config, Arc::new(storage))
    }

    /// Use an already opened storage backend.
    pub fn with_storage(config: Config, storage: Arc<dyn SnapshotStorage>) -> CoreResult<Self> {
        config.validate()?;
        let sources = config.resolved_sources();
        let destination = config
            .resolved_destination()
            .ok_or_else(|| crate::ConfigError::validation("no destination configured"))?;
        let exclusions = ExclusionSet::new(&config.exclude)?;

        Ok(Self {
            config,
            sources,
            destination,
            exclusions,
            storage,
            write_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn storage(&self) -> &Arc<dyn SnapshotStorage> {
        &self.storage
    }

    fn builder(&self, message: Option<String>) -> CoreResult<SnapshotBuilder> {
        let mut builder = SnapshotBuilder::new(&self.sources)?
            .with_exclusions(self.exclusions.clone())
            .with_message(message);
        if self.sources.iter().any(|s| is_within(&self.destination, s)) {
            debug!(destination = %self.destination.display(), "Destination lies inside a source, skipping it");
            builder = builder.with_skipped_dir(&self.destination);
        }
        Ok(builder)
    }

    /// Hooks run inside the destination directory.
    fn hook_context(&self, event: HookEvent) -> HookContext {
        HookContext::for_operation(event, &self.sources, &self.destination)
            .with_cwd(&self.destination)
    }

    /// Walk and hash the sources off the async runtime.
    async fn build_live(&self, message: Option<String>) -> CoreResult<(Snapshot, SourceLayout)> {
        let builder = self.builder(message)?;
        let _timing = TimingGuard::capture(self.sources_label());
        tokio::task::spawn_blocking(move || {
            let snapshot = builder.build()?;
            Ok::<_, CoreError>((snapshot, builder.layout().clone()))
        })
        .await
        .map_err(|e| CoreError::Task(e.to_string()))?
    }

    fn sources_label(&self) -> String {
        self.sources
            .iter()
            .map(|s| s.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Capture the sources.
    ///
    /// Pre-capture hooks run first and abort the capture on failure. When
    /// nothing changed since the last snapshot, nothing is written unless
    /// `force` is set. The very first capture is always written.
    pub async fn capture(&self, message: Option<String>, force: bool) -> CoreResult<CaptureOutcome> {
        let _guard = self.write_lock.lock().await;

        self.config
            .hooks
            .trigger(HookEvent::PreCapture, &self.hook_context(HookEvent::PreCapture))
            .await?;

        let (snapshot, layout) = self.build_live(message).await?;
        let last = self.storage.get_last().await?;

        let changes = match &last {
            Some(last) => diff(&snapshot, last),
            None => diff(&snapshot, &Snapshot::new(snapshot.timestamp, None, [])),
        };

        if let Some(last) = &last {
            if changes.is_empty() && !force {
                info!(last_id = %last.id, "No changes since last snapshot");
                return Ok(CaptureOutcome::Unchanged {
                    last_id: last.id.clone(),
                });
            }
        }

        let info = self.storage.save(&snapshot, &layout).await?;
        info!(
            id = %info.id,
            files = info.file_count,
            added = changes.added.len(),
            removed = changes.removed.len(),
            modified = changes.modified.len(),
            "Captured snapshot"
        );

        let pruned = if self.config.auto_prune && self.config.retention.enabled {
            self.auto_prune().await
        } else {
            Vec::new()
        };

        Ok(CaptureOutcome::Created {
            info,
            diff: changes,
            pruned,
        })
    }

    /// Prune after a capture. Failures are logged; the capture already succeeded.
    async fn auto_prune(&self) -> Vec<String> {
        match self.plan_prune().await {
            Ok(plan) if plan.is_noop() => Vec::new(),
            Ok(plan) => {
                let report = execute_prune(self.storage.as_ref(), &plan).await;
                if !report.is_complete() {
                    warn!(failed = report.failed.len(), "Auto-prune left snapshots behind");
                }
                report.deleted
            }
            Err(e) => {
                warn!(error = %e, "Auto-prune skipped");
                Vec::new()
            }
        }
    }

    /// Stored snapshots, newest first, numbered from 1.
    pub async fn list(&self) -> CoreResult<Vec<ListedSnapshot>> {
        let infos = self.storage.list().await?;
        Ok(infos
            .into_iter()
            .enumerate()
            .map(|(idx, info)| ListedSnapshot {
                short_id: idx + 1,
                info,
            })
            .collect())
    }

    /// Turn user input into [`SnapshotRef::Current`] or a full ID.
    pub async fn resolve(&self, reference: &str) -> CoreResult<SnapshotRef> {
        let parsed: SnapshotRef = reference.parse()?;
        if parsed.is_current() {
            return Ok(parsed);
        }
        let infos = self.storage.list().await?;
        Ok(parsed.resolve(&infos)?)
    }

    /// The snapshot behind `reference`; `"0"` captures the sources live without storing.
    pub async fn show(&self, reference: &str) -> CoreResult<Snapshot> {
        match self.resolve(reference).await? {
            SnapshotRef::Full(id) => Ok(self.storage.get(&id).await?),
            _ => Ok(self.build_live(None).await?.0),
        }
    }

    async fn load_side(
        &self,
        reference: &SnapshotRef,
    ) -> CoreResult<(Snapshot, Box<dyn ContentSource>)> {
        match reference {
            SnapshotRef::Full(id) => {
                let snapshot = self.storage.get(id).await?;
                let content = self.storage.content(id).await?;
                Ok((snapshot, content))
            }
            _ => {
                let (snapshot, layout) = self.build_live(None).await?;
                Ok((snapshot, Box::new(layout)))
            }
        }
    }

    /// Compare two points in time. `from` is the older side of the patch.
    pub async fn compare(&self, from: &str, to: &str, mode: DiffMode) -> CoreResult<Comparison> {
        let from_ref = self.resolve(from).await?;
        let to_ref = self.resolve(to).await?;
        let _timing = TimingGuard::compare(format!("{from_ref}..{to_ref}"));

        let (from_snap, from_content) = self.load_side(&from_ref).await?;
        let (to_snap, to_content) = self.load_side(&to_ref).await?;
        let changes = diff(&to_snap, &from_snap).relabel(from_ref.to_string(), to_ref.to_string());

        let rendered = match mode {
            DiffMode::Summary => render_summary(&changes),
            DiffMode::Metadata => render_unified_metadata(&changes, &from_snap, &to_snap),
            DiffMode::Content => {
                let changes = changes.clone();
                tokio::task::spawn_blocking(move || {
                    render_unified_content(
                        &changes,
                        from_content.as_ref(),
                        to_content.as_ref(),
                        &from_snap,
                        &to_snap,
                    )
                })
                .await
                .map_err(|e| CoreError::Task(e.to_string()))??
            }
        };

        Ok(Comparison {
            diff: changes,
            rendered,
        })
    }

    /// Copy a stored snapshot into `target`, or back over the sources when
    /// `target` is `None`. Files not in the snapshot are left alone.
    ///
    /// Post-restore hooks run afterwards; their failures are only logged.
    pub async fn restore(&self, reference: &str, target: Option<&Path>) -> CoreResult<RestoreOutcome> {
        let id = match self.resolve(reference).await? {
            SnapshotRef::Full(id) => id,
            _ => return Err(CoreError::RestoreCurrent),
        };

        let _guard = self.write_lock.lock().await;

        let destination: Box<dyn ContentSource> = match target {
            Some(dir) => Box::new(DirContent::new(dir)),
            None => Box::new(SourceLayout::new(&self.sources)?),
        };
        let snapshot = self.storage.restore(&id, destination.as_ref()).await?;
        info!(id = %id, files = snapshot.file_count(), "Restored snapshot");

        let target_label = match target {
            Some(dir) => dir.display().to_string(),
            None => self.sources_label(),
        };
        let context = self
            .hook_context(HookEvent::PostRestore)
            .with_env(ENV_SNAPSHOT_ID, id.as_str())
            .with_env(ENV_TARGET, target_label);
        if let Err(e) = self.config.hooks.trigger(HookEvent::PostRestore, &context).await {
            warn!(error = %e, "Post-restore hook failed");
        }

        Ok(RestoreOutcome {
            snapshot_id: id,
            target: target.map(Path::to_path_buf),
            file_count: snapshot.file_count(),
        })
    }

    async fn plan_prune(&self) -> CoreResult<PruneResult> {
        let infos = self.storage.list().await?;
        Ok(calculate_prune(&infos, &self.config.retention)?)
    }

    /// Apply the retention policy. A dry run only reports the plan.
    pub async fn prune(&self, dry_run: bool) -> CoreResult<PruneOutcome> {
        if dry_run {
            let plan = self.plan_prune().await?;
            return Ok(PruneOutcome { plan, report: None });
        }

        let _guard = self.write_lock.lock().await;
        let plan = self.plan_prune().await?;
        let report = execute_prune(self.storage.as_ref(), &plan).await;
        info!(
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            kept = plan.to_keep.len(),
            "Pruned snapshots"
        );
        Ok(PruneOutcome {
            plan,
            report: Some(report),
        })
    }

    /// Most recent audit log entries, newest first.
    pub async fn history(&self, limit: usize) -> CoreResult<Vec<IndexEntry>> {
        Ok(self.storage.history(limit).await?)
    }
}
