//! Short and full snapshot identifiers.
//!
//! A full ID is the durable `yyyyMMdd-HHmmss-SSS` timestamp string. A short
//! ID is a 1-based position in the current listing, newest first, and shifts
//! whenever snapshots are added or pruned. `"0"` stands for the live
//! filesystem and is never stored.

use crate::snapshot::SnapshotInfo;
use crate::{SnapshotError, SnapshotResult};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Sentinel for the current, uncaptured state of the sources.
pub const CURRENT_STATE: &str = "0";

const FULL_ID_SHAPE: &str = "dddddddd-dddddd-ddd";
const LEGACY_ID_SHAPE: &str = "dddddddd-dddddd";

fn has_shape(s: &str, shape: &str) -> bool {
    s.len() == shape.len()
        && s.bytes().zip(shape.bytes()).all(|(c, p)| match p {
            b'd' => c.is_ascii_digit(),
            literal => c == literal,
        })
}

/// `s` is a non-empty run of ASCII digits.
pub fn is_short_id(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// `s` has the timestamp shape of a stored snapshot ID, including the older
/// form without milliseconds.
pub fn is_full_id(s: &str) -> bool {
    has_shape(s, FULL_ID_SHAPE) || has_shape(s, LEGACY_ID_SHAPE)
}

/// Newest first; equal timestamps fall back to the ID, also descending.
fn newest_first(a: &SnapshotInfo, b: &SnapshotInfo) -> Ordering {
    b.timestamp
        .cmp(&a.timestamp)
        .then_with(|| b.id.cmp(&a.id))
}

/// Sort in the order short IDs are assigned.
pub fn sort_newest_first(snapshots: &mut [SnapshotInfo]) {
    snapshots.sort_by(newest_first);
}

fn ordered(snapshots: &[SnapshotInfo]) -> Vec<&SnapshotInfo> {
    let mut sorted: Vec<&SnapshotInfo> = snapshots.iter().collect();
    sorted.sort_by(|a, b| newest_first(a, b));
    sorted
}

/// A parsed reference to a snapshot as typed by a user.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SnapshotRef {
    /// The live filesystem (`"0"`).
    Current,
    /// Position in the newest-first listing.
    Short(usize),
    /// A durable timestamp ID.
    Full(String),
}

impl SnapshotRef {
    pub fn is_current(&self) -> bool {
        matches!(self, SnapshotRef::Current)
    }

    /// The durable ID, if this reference already carries one.
    pub fn full_id(&self) -> Option<&str> {
        match self {
            SnapshotRef::Full(id) => Some(id),
            _ => None,
        }
    }

    /// Turn a short reference into the full ID it currently denotes.
    ///
    /// `Current` and `Full` are returned unchanged; a full ID is not checked
    /// against `snapshots`.
    pub fn resolve(&self, snapshots: &[SnapshotInfo]) -> SnapshotResult<SnapshotRef> {
        match self {
            SnapshotRef::Current => Ok(SnapshotRef::Current),
            SnapshotRef::Full(id) => Ok(SnapshotRef::Full(id.clone())),
            SnapshotRef::Short(n) => {
                let sorted = ordered(snapshots);
                n.checked_sub(1)
                    .and_then(|idx| sorted.get(idx))
                    .map(|info| SnapshotRef::Full(info.id.clone()))
                    .ok_or(SnapshotError::ShortIdOutOfRange {
                        requested: *n,
                        available: sorted.len(),
                    })
            }
        }
    }
}

impl FromStr for SnapshotRef {
    type Err = SnapshotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == CURRENT_STATE {
            return Ok(SnapshotRef::Current);
        }
        if is_full_id(s) {
            return Ok(SnapshotRef::Full(s.to_string()));
        }
        if is_short_id(s) {
            return s
                .parse()
                .map(SnapshotRef::Short)
                .map_err(|_| SnapshotError::InvalidId(s.to_string()));
        }
        Err(SnapshotError::InvalidId(s.to_string()))
    }
}

impl fmt::Display for SnapshotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotRef::Current => f.write_str(CURRENT_STATE),
            SnapshotRef::Short(n) => write!(f, "{n}"),
            SnapshotRef::Full(id) => f.write_str(id),
        }
    }
}

/// Resolve a user-supplied ID to its canonical form: `"0"`, or a full ID.
pub fn resolve_id(id: &str, snapshots: &[SnapshotInfo]) -> SnapshotResult<String> {
    let reference: SnapshotRef = id.parse()?;
    Ok(reference.resolve(snapshots)?.to_string())
}

/// Map each full ID to its current short ID (newest is 1).
pub fn assign_short_ids(snapshots: &[SnapshotInfo]) -> HashMap<String, usize> {
    ordered(snapshots)
        .into_iter()
        .enumerate()
        .map(|(idx, info)| (info.id.clone(), idx + 1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::format_snapshot_id;
    use chrono::{Duration, TimeZone, Utc};

    fn infos(count: i64) -> Vec<SnapshotInfo> {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        // Oldest first, so resolution has to sort.
        (0..count)
            .map(|i| {
                let ts = base + Duration::hours(i);
                SnapshotInfo::new(format_snapshot_id(ts), ts, 1)
            })
            .collect()
    }

    #[test]
    fn test_id_shapes() {
        assert!(is_short_id("1"));
        assert!(is_short_id("0042"));
        assert!(!is_short_id(""));
        assert!(!is_short_id("-1"));
        assert!(!is_short_id("١"));

        assert!(is_full_id("20240501-090000-000"));
        assert!(is_full_id("20240501-090000"));
        assert!(!is_full_id("20240501-0900"));
        assert!(!is_full_id("2024050a-090000-000"));
        assert!(!is_full_id("20240501_090000_000"));
    }

    #[test]
    fn test_parse_refs() {
        assert_eq!("0".parse::<SnapshotRef>().unwrap(), SnapshotRef::Current);
        assert_eq!("3".parse::<SnapshotRef>().unwrap(), SnapshotRef::Short(3));
        assert_eq!("00".parse::<SnapshotRef>().unwrap(), SnapshotRef::Short(0));
        assert_eq!(
            "20240501-090000-000".parse::<SnapshotRef>().unwrap(),
            SnapshotRef::Full("20240501-090000-000".into())
        );

        let err = "latest".parse::<SnapshotRef>().unwrap_err();
        assert!(err.is_format_error());
        assert!("99999999999999999999999".parse::<SnapshotRef>().is_err());
    }

    #[test]
    fn test_display_matches_input() {
        for s in ["0", "7", "20240501-090000-000"] {
            assert_eq!(s.parse::<SnapshotRef>().unwrap().to_string(), s);
        }
    }

    #[test]
    fn test_newest_is_one() {
        let list = infos(3);
        assert_eq!(resolve_id("1", &list).unwrap(), list[2].id);
        assert_eq!(resolve_id("3", &list).unwrap(), list[0].id);
    }

    #[test]
    fn test_current_sentinel_always_resolves() {
        assert_eq!(resolve_id("0", &[]).unwrap(), "0");
        assert_eq!(resolve_id("0", &infos(4)).unwrap(), "0");
    }

    #[test]
    fn test_full_id_is_fixed_point() {
        let list = infos(2);
        assert_eq!(resolve_id(&list[1].id, &list).unwrap(), list[1].id);
        // Not in the list, still passed through.
        assert_eq!(
            resolve_id("20991231-235959-999", &list).unwrap(),
            "20991231-235959-999"
        );
    }

    #[test]
    fn test_out_of_range() {
        let list = infos(3);
        let err = resolve_id("5", &list).unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::ShortIdOutOfRange {
                requested: 5,
                available: 3
            }
        ));
        assert!(!err.is_format_error());

        assert!(matches!(
            resolve_id("00", &list),
            Err(SnapshotError::ShortIdOutOfRange { requested: 0, .. })
        ));
        assert!(resolve_id("1", &[]).is_err());
    }

    #[test]
    fn test_malformed_is_format_error() {
        let err = resolve_id("yesterday", &infos(3)).unwrap_err();
        assert!(matches!(err, SnapshotError::InvalidId(_)));
    }

    #[test]
    fn test_assign_and_resolve_round_trip() {
        let list = infos(7);
        let short = assign_short_ids(&list);
        assert_eq!(short.len(), 7);
        for n in 1..=list.len() {
            let full = resolve_id(&n.to_string(), &list).unwrap();
            assert_eq!(short[&full], n);
        }
    }

    #[test]
    fn test_equal_timestamps_break_ties_by_id() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let list = vec![
            SnapshotInfo::new("20240501-090000", ts, 1),
            SnapshotInfo::new("20240501-090000-000", ts, 1),
        ];
        let short = assign_short_ids(&list);
        assert_eq!(short["20240501-090000-000"], 1);
        assert_eq!(short["20240501-090000"], 2);
        assert_eq!(resolve_id("1", &list).unwrap(), "20240501-090000-000");
    }

    #[test]
    fn test_sort_newest_first() {
        let mut list = infos(3);
        sort_newest_first(&mut list);
        assert!(list.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
    }
}
