//! Persistence contract for snapshot destinations, and prune execution.

use crate::content::ContentSource;
use crate::index::IndexEntry;
use crate::retention::PruneResult;
use crate::snapshot::{Snapshot, SnapshotInfo};
use crate::{SnapshotError, SnapshotResult};
use async_trait::async_trait;
use tracing::{info, warn};

/// A destination that stores snapshots together with their file payloads.
#[async_trait]
pub trait SnapshotStorage: Send + Sync {
    /// Persist `snapshot`, copying every file's bytes from `content`.
    async fn save(
        &self,
        snapshot: &Snapshot,
        content: &dyn ContentSource,
    ) -> SnapshotResult<SnapshotInfo>;

    /// The newest stored snapshot, if any.
    async fn get_last(&self) -> SnapshotResult<Option<Snapshot>>;

    async fn get(&self, id: &str) -> SnapshotResult<Snapshot>;

    /// All stored snapshots, newest first.
    async fn list(&self) -> SnapshotResult<Vec<SnapshotInfo>>;

    async fn delete(&self, id: &str) -> SnapshotResult<()>;

    /// Write every file of snapshot `id` to `target.locate(path)`. Files in
    /// the target that the snapshot does not contain are left alone.
    async fn restore(&self, id: &str, target: &dyn ContentSource) -> SnapshotResult<Snapshot>;

    /// Read access to the stored bytes of snapshot `id`.
    async fn content(&self, id: &str) -> SnapshotResult<Box<dyn ContentSource>>;

    /// Up to `limit` audit entries, newest first.
    async fn history(&self, limit: usize) -> SnapshotResult<Vec<IndexEntry>>;
}

/// Outcome of [`execute_prune`].
#[derive(Debug, Default)]
pub struct PruneReport {
    pub deleted: Vec<String>,
    /// Snapshots that could not be deleted, with the reason.
    pub failed: Vec<(String, SnapshotError)>,
}

impl PruneReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Delete every snapshot in `plan.to_delete`.
///
/// Failures are collected per ID and do not stop the remaining deletions.
/// Deletions that succeeded are not rolled back.
pub async fn execute_prune(storage: &dyn SnapshotStorage, plan: &PruneResult) -> PruneReport {
    let mut report = PruneReport::default();

    for info in &plan.to_delete {
        match storage.delete(&info.id).await {
            Ok(()) => report.deleted.push(info.id.clone()),
            Err(e) => {
                warn!(id = %info.id, error = %e, "Failed to delete snapshot");
                report.failed.push((info.id.clone(), e));
            }
        }
    }

    info!(
        deleted = report.deleted.len(),
        failed = report.failed.len(),
        kept = plan.to_keep.len(),
        "Prune finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::DirContent;
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::{BTreeMap, HashSet};
    use std::sync::Mutex;

    /// Keeps only listings; deleting an ID in `broken` fails.
    struct ListingOnly {
        infos: Mutex<BTreeMap<String, SnapshotInfo>>,
        broken: HashSet<String>,
    }

    #[async_trait]
    impl SnapshotStorage for ListingOnly {
        async fn save(
            &self,
            snapshot: &Snapshot,
            _content: &dyn ContentSource,
        ) -> SnapshotResult<SnapshotInfo> {
            let info = snapshot.info();
            self.infos.lock().unwrap().insert(info.id.clone(), info.clone());
            Ok(info)
        }

        async fn get_last(&self) -> SnapshotResult<Option<Snapshot>> {
            Ok(None)
        }

        async fn get(&self, id: &str) -> SnapshotResult<Snapshot> {
            Err(SnapshotError::not_found(id))
        }

        async fn list(&self) -> SnapshotResult<Vec<SnapshotInfo>> {
            Ok(self.infos.lock().unwrap().values().rev().cloned().collect())
        }

        async fn delete(&self, id: &str) -> SnapshotResult<()> {
            if self.broken.contains(id) {
                return Err(SnapshotError::Io(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "read-only",
                )));
            }
            self.infos
                .lock()
                .unwrap()
                .remove(id)
                .map(|_| ())
                .ok_or_else(|| SnapshotError::not_found(id))
        }

        async fn restore(&self, id: &str, _target: &dyn ContentSource) -> SnapshotResult<Snapshot> {
            Err(SnapshotError::not_found(id))
        }

        async fn content(&self, id: &str) -> SnapshotResult<Box<dyn ContentSource>> {
            Err(SnapshotError::not_found(id))
        }

        async fn history(&self, _limit: usize) -> SnapshotResult<Vec<IndexEntry>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_execute_prune_reports_partial_failure() {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let storage = ListingOnly {
            infos: Mutex::new(BTreeMap::new()),
            broken: HashSet::from(["20240101-020000-000".to_string()]),
        };
        let empty = DirContent::new("/nonexistent");
        for h in 0..4 {
            let snapshot = Snapshot::new(base + Duration::hours(h), None, Vec::new());
            storage.save(&snapshot, &empty).await.unwrap();
        }

        let all = storage.list().await.unwrap();
        let plan = PruneResult {
            to_keep: all[..1].to_vec(),
            to_delete: all[1..].to_vec(),
            total_snapshots: all.len(),
            reasons: BTreeMap::new(),
        };

        let report = execute_prune(&storage, &plan).await;
        assert!(!report.is_complete());
        assert_eq!(report.deleted.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "20240101-020000-000");

        let remaining: Vec<_> = storage.list().await.unwrap().into_iter().map(|i| i.id).collect();
        assert_eq!(remaining, vec!["20240101-030000-000", "20240101-020000-000"]);
    }

    #[tokio::test]
    async fn test_execute_empty_plan() {
        let storage = ListingOnly {
            infos: Mutex::new(BTreeMap::new()),
            broken: HashSet::new(),
        };
        let report = execute_prune(&storage, &PruneResult::default()).await;
        assert!(report.is_complete());
        assert!(report.deleted.is_empty());
    }
}
