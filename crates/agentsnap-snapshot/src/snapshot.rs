//! Snapshot data structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `chrono` format of a snapshot ID: `yyyyMMdd-HHmmss-SSS`.
pub const SNAPSHOT_ID_FORMAT: &str = "%Y%m%d-%H%M%S-%3f";

/// Derive a snapshot ID from its capture instant (UTC).
pub fn format_snapshot_id(timestamp: DateTime<Utc>) -> String {
    timestamp.format(SNAPSHOT_ID_FORMAT).to_string()
}

/// One captured file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Snapshot-relative path with forward slashes.
    pub path: String,

    /// Lowercase hex SHA-256 of the file's bytes.
    #[serde(rename = "hash")]
    pub content_hash: String,

    /// Size in bytes.
    pub size: u64,

    /// Modification time of the source file at capture.
    #[serde(rename = "modified")]
    pub modified_at: DateTime<Utc>,
}

/// A capture of every tracked file at one instant.
///
/// Files are keyed by their relative path; iteration is in path order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Timestamp-derived identifier, see [`format_snapshot_id`].
    pub id: String,

    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,

    /// Optional user-provided description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    files: BTreeMap<String, FileRecord>,
}

impl Snapshot {
    /// Create a snapshot from its records.
    ///
    /// Records are keyed by their own `path`; a later record with the same
    /// path replaces an earlier one.
    pub fn new(
        timestamp: DateTime<Utc>,
        message: Option<String>,
        records: impl IntoIterator<Item = FileRecord>,
    ) -> Self {
        let files = records
            .into_iter()
            .map(|record| (record.path.clone(), record))
            .collect();
        Self {
            id: format_snapshot_id(timestamp),
            timestamp,
            message,
            files,
        }
    }

    /// All captured files, in path order.
    pub fn files(&self) -> &BTreeMap<String, FileRecord> {
        &self.files
    }

    pub fn get(&self, path: &str) -> Option<&FileRecord> {
        self.files.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Sum of all file sizes.
    pub fn total_size(&self) -> u64 {
        self.files.values().map(|f| f.size).sum()
    }

    /// Lightweight projection used for listing and pruning.
    pub fn info(&self) -> SnapshotInfo {
        SnapshotInfo {
            id: self.id.clone(),
            timestamp: self.timestamp,
            message: self.message.clone(),
            file_count: self.files.len(),
        }
    }

    /// Check that every key matches its record's own path.
    pub fn is_consistent(&self) -> bool {
        self.files.iter().all(|(key, record)| *key == record.path)
    }
}

/// Listing record for a stored snapshot; carries no file hashes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub file_count: usize,
}

impl SnapshotInfo {
    pub fn new(id: impl Into<String>, timestamp: DateTime<Utc>, file_count: usize) -> Self {
        Self {
            id: id.into(),
            timestamp,
            message: None,
            file_count,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(path: &str, hash: &str) -> FileRecord {
        FileRecord {
            path: path.to_string(),
            content_hash: hash.to_string(),
            size: 3,
            modified_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_snapshot_id_format() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 4).unwrap()
            + chrono::Duration::milliseconds(42);
        assert_eq!(format_snapshot_id(ts), "20240309-070504-042");
    }

    #[test]
    fn test_new_keys_by_path() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 4).unwrap();
        let snapshot = Snapshot::new(ts, None, vec![record("b.txt", "2"), record("a.txt", "1")]);

        assert_eq!(snapshot.id, "20240309-070504-000");
        assert_eq!(snapshot.file_count(), 2);
        assert!(snapshot.is_consistent());
        let keys: Vec<_> = snapshot.files().keys().cloned().collect();
        assert_eq!(keys, vec!["a.txt", "b.txt"]);
        assert_eq!(snapshot.total_size(), 6);
    }

    #[test]
    fn test_info_projection() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 4).unwrap();
        let snapshot = Snapshot::new(ts, Some("before upgrade".into()), vec![record("a", "1")]);
        let info = snapshot.info();
        assert_eq!(info.id, snapshot.id);
        assert_eq!(info.file_count, 1);
        assert_eq!(info.message.as_deref(), Some("before upgrade"));
    }

    #[test]
    fn test_serialized_shape() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 4).unwrap();
        let snapshot = Snapshot::new(ts, None, vec![record("a.txt", "abc")]);
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["files"]["a.txt"]["hash"], "abc");
        assert_eq!(json["files"]["a.txt"]["size"], 3);
        assert!(json.get("message").is_none());

        let back: Snapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, snapshot);
    }
}
