//! Hash-based comparison of two snapshots.

use crate::snapshot::Snapshot;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Paths that differ between two points in time.
///
/// A path appears in at most one of the three sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDiff {
    /// ID of the older side (`"0"` for the live filesystem).
    pub from: String,
    /// ID of the newer side (`"0"` for the live filesystem).
    pub to: String,
    /// In `to`, absent from `from`.
    pub added: BTreeSet<String>,
    /// In `from`, absent from `to`.
    pub removed: BTreeSet<String>,
    /// In both, with different content hashes.
    pub modified: BTreeSet<String>,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    /// Number of changed paths.
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len()
    }

    /// Replace the side labels, e.g. to show `"0"` for a live capture.
    pub fn relabel(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.from = from.into();
        self.to = to.into();
        self
    }
}

/// Compare `from` (older) against `to` (newer).
///
/// Only content hashes decide whether a file changed; size and mtime are
/// ignored. Both file maps are walked once in path order.
pub fn diff(to: &Snapshot, from: &Snapshot) -> SnapshotDiff {
    let mut result = SnapshotDiff {
        from: from.id.clone(),
        to: to.id.clone(),
        ..Default::default()
    };

    let mut new_iter = to.files().iter().peekable();
    let mut old_iter = from.files().iter().peekable();

    loop {
        match (new_iter.peek(), old_iter.peek()) {
            (Some((new_path, new_rec)), Some((old_path, old_rec))) => {
                match new_path.cmp(old_path) {
                    Ordering::Less => {
                        result.added.insert((*new_path).clone());
                        new_iter.next();
                    }
                    Ordering::Greater => {
                        result.removed.insert((*old_path).clone());
                        old_iter.next();
                    }
                    Ordering::Equal => {
                        if new_rec.content_hash != old_rec.content_hash {
                            result.modified.insert((*new_path).clone());
                        }
                        new_iter.next();
                        old_iter.next();
                    }
                }
            }
            (Some((new_path, _)), None) => {
                result.added.insert((*new_path).clone());
                new_iter.next();
            }
            (None, Some((old_path, _))) => {
                result.removed.insert((*old_path).clone());
                old_iter.next();
            }
            (None, None) => break,
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::FileRecord;
    use chrono::{TimeZone, Utc};

    fn snap(secs: u32, files: &[(&str, &str)]) -> Snapshot {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, secs).unwrap();
        Snapshot::new(
            ts,
            None,
            files.iter().map(|(path, hash)| FileRecord {
                path: path.to_string(),
                content_hash: hash.to_string(),
                size: 1,
                modified_at: ts,
            }),
        )
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_added_removed_modified() {
        let old = snap(0, &[("a", "1"), ("b", "2"), ("c", "3")]);
        let new = snap(1, &[("b", "2"), ("c", "33"), ("d", "4")]);
        let d = diff(&new, &old);

        assert_eq!(d.from, old.id);
        assert_eq!(d.to, new.id);
        assert_eq!(d.added, set(&["d"]));
        assert_eq!(d.removed, set(&["a"]));
        assert_eq!(d.modified, set(&["c"]));
        assert_eq!(d.len(), 3);
    }

    #[test]
    fn test_self_diff_is_empty() {
        let s = snap(0, &[("a", "1"), ("dir/b", "2")]);
        assert!(diff(&s, &s).is_empty());
        let empty = snap(0, &[]);
        assert!(diff(&empty, &empty).is_empty());
    }

    #[test]
    fn test_directions_are_symmetric() {
        let s1 = snap(0, &[("a", "1"), ("b", "2"), ("x", "9")]);
        let s2 = snap(1, &[("b", "2"), ("c", "3"), ("x", "8")]);
        let forward = diff(&s2, &s1);
        let backward = diff(&s1, &s2);

        assert_eq!(forward.added, backward.removed);
        assert_eq!(forward.removed, backward.added);
        assert_eq!(forward.modified, backward.modified);
    }

    #[test]
    fn test_sets_are_disjoint() {
        let s1 = snap(0, &[("a", "1"), ("b", "2"), ("c", "3"), ("e", "5")]);
        let s2 = snap(1, &[("a", "1"), ("b", "x"), ("d", "4"), ("e", "y")]);
        let d = diff(&s2, &s1);

        assert!(d.added.is_disjoint(&d.removed));
        assert!(d.added.is_disjoint(&d.modified));
        assert!(d.removed.is_disjoint(&d.modified));
        assert_eq!(d.len(), 4);
    }

    #[test]
    fn test_identical_bytes_are_not_modified_despite_mtime() {
        let old = snap(0, &[("same.txt", "abc")]);
        let later = snap(5, &[("same.txt", "abc")]);
        let new = Snapshot::new(
            later.timestamp,
            None,
            later.files().values().map(|r| FileRecord {
                modified_at: r.modified_at + chrono::Duration::hours(3),
                ..r.clone()
            }),
        );
        assert!(diff(&new, &old).modified.is_empty());
    }

    #[test]
    fn test_relabel() {
        let s = snap(0, &[]);
        let d = diff(&s, &s).relabel("20240101-000000-000", "0");
        assert_eq!(d.to, "0");
    }
}
