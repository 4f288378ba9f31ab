//! Append-only audit log of storage events.
//!
//! The log is bounded: once it holds more than its cap, the oldest entries
//! are dropped. It is informational only; stored snapshot directories stay
//! the source of truth for listing.

use crate::SnapshotResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::path::Path;
use tokio::fs;

/// Default number of retained entries.
pub const DEFAULT_INDEX_CAP: usize = 500;

const INDEX_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexEvent {
    Saved,
    Deleted,
    Restored,
}

impl fmt::Display for IndexEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IndexEvent::Saved => "saved",
            IndexEvent::Deleted => "deleted",
            IndexEvent::Restored => "restored",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub event: IndexEvent,
    pub snapshot_id: String,
    pub at: DateTime<Utc>,
    /// Free-form context, e.g. the restore target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl IndexEntry {
    pub fn new(event: IndexEvent, snapshot_id: impl Into<String>) -> Self {
        Self {
            event,
            snapshot_id: snapshot_id.into(),
            at: Utc::now(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[derive(Serialize, Deserialize)]
struct IndexFile {
    version: u32,
    entries: Vec<IndexEntry>,
}

/// Bounded, ordered event log (oldest first).
#[derive(Debug, Clone)]
pub struct IndexLog {
    entries: VecDeque<IndexEntry>,
    cap: usize,
}

impl Default for IndexLog {
    fn default() -> Self {
        Self::new(DEFAULT_INDEX_CAP)
    }
}

impl IndexLog {
    /// An empty log. A cap of zero is raised to one.
    pub fn new(cap: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            cap: cap.max(1),
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append, evicting from the front while over the cap.
    pub fn append(&mut self, entry: IndexEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > self.cap {
            self.entries.pop_front();
        }
    }

    /// Oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.iter()
    }

    /// Up to `limit` entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<IndexEntry> {
        self.entries.iter().rev().take(limit).cloned().collect()
    }

    /// Load from `path`; a missing file yields an empty log. Entries beyond
    /// `cap` are trimmed from the oldest end.
    pub async fn load(path: &Path, cap: usize) -> SnapshotResult<Self> {
        let mut log = Self::new(cap);
        if !fs::try_exists(path).await? {
            return Ok(log);
        }
        let content = fs::read_to_string(path).await?;
        let file: IndexFile = serde_json::from_str(&content)?;
        for entry in file.entries {
            log.append(entry);
        }
        Ok(log)
    }

    /// Write to `path` through a temporary sibling file.
    pub async fn persist(&self, path: &Path) -> SnapshotResult<()> {
        let file = IndexFile {
            version: INDEX_VERSION,
            entries: self.entries.iter().cloned().collect(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cap_drops_oldest() {
        let mut log = IndexLog::new(3);
        for i in 0..5 {
            log.append(IndexEntry::new(IndexEvent::Saved, format!("id-{i}")));
        }
        assert_eq!(log.len(), 3);
        let ids: Vec<_> = log.entries().map(|e| e.snapshot_id.as_str()).collect();
        assert_eq!(ids, vec!["id-2", "id-3", "id-4"]);
    }

    #[test]
    fn test_recent_is_newest_first() {
        let mut log = IndexLog::new(10);
        log.append(IndexEntry::new(IndexEvent::Saved, "a"));
        log.append(IndexEntry::new(IndexEvent::Deleted, "a"));
        log.append(IndexEntry::new(IndexEvent::Saved, "b"));

        let recent = log.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].snapshot_id, "b");
        assert_eq!(recent[1].event, IndexEvent::Deleted);
    }

    #[test]
    fn test_zero_cap_is_raised() {
        assert_eq!(IndexLog::new(0).cap(), 1);
    }

    #[tokio::test]
    async fn test_persist_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");

        let mut log = IndexLog::new(10);
        log.append(IndexEntry::new(IndexEvent::Saved, "x").with_detail("3 files"));
        log.append(IndexEntry::new(IndexEvent::Restored, "x"));
        log.persist(&path).await.unwrap();

        let loaded = IndexLog::load(&path, 10).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.recent(1)[0].event, IndexEvent::Restored);
        assert_eq!(
            loaded.entries().next().unwrap().detail.as_deref(),
            Some("3 files")
        );

        // A smaller cap trims on load.
        let trimmed = IndexLog::load(&path, 1).await.unwrap();
        assert_eq!(trimmed.len(), 1);
        assert_eq!(trimmed.recent(1)[0].event, IndexEvent::Restored);
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = IndexLog::load(&dir.path().join("none.json"), 5).await.unwrap();
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn test_garbage_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(&path, "[not json").unwrap();
        assert!(IndexLog::load(&path, 5).await.is_err());
    }
}
