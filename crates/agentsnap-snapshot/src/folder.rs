//! Plain-folder destination.

use crate::content::{ContentSource, DirContent};
use crate::id::{is_full_id, sort_newest_first};
use crate::index::{IndexEntry, IndexEvent, IndexLog, DEFAULT_INDEX_CAP};
use crate::snapshot::{Snapshot, SnapshotInfo};
use crate::storage::SnapshotStorage;
use crate::{SnapshotError, SnapshotResult};
use agentsnap_util::path::safe_join;
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const INDEX_FILE: &str = "index.json";
const SNAPSHOTS_DIR: &str = "snapshots";
const INFO_FILE: &str = "info.json";
const SNAPSHOT_FILE: &str = "snapshot.json";
const FILES_DIR: &str = "files";

/// Snapshots stored as plain file copies:
/// ```text
/// <root>/
///   index.json                    # audit log
///   snapshots/
///     <id>/
///       info.json                 # listing record
///       snapshot.json             # full file map
///       files/<relative path>     # payloads
/// ```
/// A snapshot is written under `snapshots/.<id>.partial` and renamed into
/// place once complete, so a crash never leaves a half-written `<id>`.
pub struct FolderStorage {
    root: PathBuf,
    index: Mutex<IndexLog>,
}

impl FolderStorage {
    /// Open (creating if needed) a destination at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> SnapshotResult<Self> {
        Self::open_with_cap(root, DEFAULT_INDEX_CAP).await
    }

    /// Like [`open`](Self::open) with a custom audit log cap.
    pub async fn open_with_cap(root: impl Into<PathBuf>, index_cap: usize) -> SnapshotResult<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(SNAPSHOTS_DIR)).await?;

        let index_path = root.join(INDEX_FILE);
        let index = match IndexLog::load(&index_path, index_cap).await {
            Ok(index) => index,
            Err(e) => {
                warn!(path = %index_path.display(), error = %e, "Unreadable index, starting a new one");
                IndexLog::new(index_cap)
            }
        };

        debug!(root = %root.display(), entries = index.len(), "Opened folder storage");
        Ok(Self {
            root,
            index: Mutex::new(index),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn snapshots_dir(&self) -> PathBuf {
        self.root.join(SNAPSHOTS_DIR)
    }

    /// IDs become directory names, so only well-formed ones are accepted.
    fn snapshot_dir(&self, id: &str) -> SnapshotResult<PathBuf> {
        if !is_full_id(id) {
            return Err(SnapshotError::InvalidId(id.to_string()));
        }
        Ok(self.snapshots_dir().join(id))
    }

    async fn record(&self, entry: IndexEntry) {
        let mut index = self.index.lock().await;
        index.append(entry);
        if let Err(e) = index.persist(&self.root.join(INDEX_FILE)).await {
            warn!(error = %e, "Failed to write index");
        }
    }

    async fn read_info(dir: &Path) -> SnapshotResult<SnapshotInfo> {
        let json = fs::read_to_string(dir.join(INFO_FILE)).await?;
        Ok(serde_json::from_str(&json)?)
    }

    async fn write_partial(
        partial: &Path,
        snapshot: &Snapshot,
        content: &dyn ContentSource,
    ) -> SnapshotResult<()> {
        let files_dir = partial.join(FILES_DIR);
        fs::create_dir_all(&files_dir).await?;

        for record in snapshot.files().values() {
            let src = content.locate(&record.path).ok_or_else(|| {
                SnapshotError::unreadable(
                    &record.path,
                    io::Error::new(io::ErrorKind::NotFound, "no source location"),
                )
            })?;
            let dst = safe_join(&files_dir, &record.path).ok_or_else(|| {
                SnapshotError::Corrupted(format!("unsafe path in snapshot: {}", record.path))
            })?;

            if let Some(parent) = dst.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::copy(&src, &dst)
                .await
                .map_err(|e| SnapshotError::unreadable(&src, e))?;
        }

        fs::write(
            partial.join(SNAPSHOT_FILE),
            serde_json::to_string_pretty(snapshot)?,
        )
        .await?;
        fs::write(
            partial.join(INFO_FILE),
            serde_json::to_string_pretty(&snapshot.info())?,
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl SnapshotStorage for FolderStorage {
    async fn save(
        &self,
        snapshot: &Snapshot,
        content: &dyn ContentSource,
    ) -> SnapshotResult<SnapshotInfo> {
        let dir = self.snapshot_dir(&snapshot.id)?;
        if fs::try_exists(&dir).await? {
            return Err(SnapshotError::AlreadyExists(snapshot.id.clone()));
        }

        let partial = self.snapshots_dir().join(format!(".{}.partial", snapshot.id));
        if fs::try_exists(&partial).await? {
            fs::remove_dir_all(&partial).await?;
        }

        if let Err(e) = Self::write_partial(&partial, snapshot, content).await {
            if let Err(cleanup) = fs::remove_dir_all(&partial).await {
                warn!(path = %partial.display(), error = %cleanup, "Failed to remove partial snapshot");
            }
            return Err(e);
        }
        fs::rename(&partial, &dir).await?;

        let info = snapshot.info();
        self.record(
            IndexEntry::new(IndexEvent::Saved, &snapshot.id)
                .with_detail(format!("{} files", info.file_count)),
        )
        .await;
        info!(id = %snapshot.id, files = info.file_count, "Saved snapshot");
        Ok(info)
    }

    async fn get_last(&self) -> SnapshotResult<Option<Snapshot>> {
        match self.list().await?.first() {
            Some(newest) => Ok(Some(self.get(&newest.id).await?)),
            None => Ok(None),
        }
    }

    async fn get(&self, id: &str) -> SnapshotResult<Snapshot> {
        let path = self.snapshot_dir(id)?.join(SNAPSHOT_FILE);
        if !fs::try_exists(&path).await? {
            return Err(SnapshotError::not_found(id));
        }

        let json = fs::read_to_string(&path).await?;
        let snapshot: Snapshot = serde_json::from_str(&json)?;
        if snapshot.id != id || !snapshot.is_consistent() {
            return Err(SnapshotError::Corrupted(format!(
                "{} does not describe snapshot {id}",
                path.display()
            )));
        }
        Ok(snapshot)
    }

    async fn list(&self) -> SnapshotResult<Vec<SnapshotInfo>> {
        let mut infos = Vec::new();
        let mut entries = fs::read_dir(self.snapshots_dir()).await?;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !is_full_id(&name) || !entry.file_type().await?.is_dir() {
                continue;
            }
            match Self::read_info(&entry.path()).await {
                Ok(info) => infos.push(info),
                Err(e) => warn!(id = %name, error = %e, "Skipping unreadable snapshot"),
            }
        }

        sort_newest_first(&mut infos);
        Ok(infos)
    }

    async fn delete(&self, id: &str) -> SnapshotResult<()> {
        let dir = self.snapshot_dir(id)?;
        if !fs::try_exists(&dir).await? {
            return Err(SnapshotError::not_found(id));
        }

        fs::remove_dir_all(&dir).await?;
        self.record(IndexEntry::new(IndexEvent::Deleted, id)).await;
        info!(id, "Deleted snapshot");
        Ok(())
    }

    async fn restore(&self, id: &str, target: &dyn ContentSource) -> SnapshotResult<Snapshot> {
        let snapshot = self.get(id).await?;
        let files_dir = self.snapshot_dir(id)?.join(FILES_DIR);

        for record in snapshot.files().values() {
            let src = safe_join(&files_dir, &record.path)
                .filter(|p| p.is_file())
                .ok_or_else(|| {
                    SnapshotError::Corrupted(format!("payload of {} missing from {id}", record.path))
                })?;
            let dst = target.locate(&record.path).ok_or_else(|| {
                SnapshotError::Corrupted(format!("no restore location for {}", record.path))
            })?;

            if let Some(parent) = dst.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::copy(&src, &dst).await?;
            debug!(path = %record.path, "Restored file");
        }

        self.record(
            IndexEntry::new(IndexEvent::Restored, id)
                .with_detail(format!("{} files", snapshot.file_count())),
        )
        .await;
        info!(id, files = snapshot.file_count(), "Restored snapshot");
        Ok(snapshot)
    }

    async fn content(&self, id: &str) -> SnapshotResult<Box<dyn ContentSource>> {
        let dir = self.snapshot_dir(id)?;
        if !fs::try_exists(&dir).await? {
            return Err(SnapshotError::not_found(id));
        }
        Ok(Box::new(DirContent::new(dir.join(FILES_DIR))))
    }

    async fn history(&self, limit: usize) -> SnapshotResult<Vec<IndexEntry>> {
        Ok(self.index.lock().await.recent(limit))
    }
}
