//! Multi-tier retention: decide which snapshots survive a prune.
//!
//! Each tier keeps snapshots independently and a snapshot survives if any
//! tier keeps it. This module only computes the plan; deleting is done by
//! [`execute_prune`](crate::storage::execute_prune).

use crate::id::sort_newest_first;
use crate::snapshot::SnapshotInfo;
use crate::{SnapshotError, SnapshotResult};
use chrono::{DateTime, Datelike, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::hash::Hash;
use tracing::debug;

/// Slack below the weekly and monthly cutoffs, for snapshots taken right on
/// the boundary.
const BOUNDARY_GRACE_MINUTES: i64 = 60;

/// Retention configuration. A zero count disables that tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetentionPolicy {
    pub enabled: bool,
    pub keep_last: usize,
    pub keep_daily: usize,
    pub keep_weekly: usize,
    pub keep_monthly: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            keep_last: 10,
            keep_daily: 7,
            keep_weekly: 4,
            keep_monthly: 6,
        }
    }
}

impl RetentionPolicy {
    /// Reject a disabled policy, or an enabled one that would keep nothing.
    pub fn validate(&self) -> SnapshotResult<()> {
        if !self.enabled {
            return Err(SnapshotError::PolicyDisabled);
        }
        if self.keep_last == 0
            && self.keep_daily == 0
            && self.keep_weekly == 0
            && self.keep_monthly == 0
        {
            return Err(SnapshotError::EmptyPolicy);
        }
        Ok(())
    }
}

/// The rule that kept a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionTier {
    Last,
    Daily,
    Weekly,
    Monthly,
}

impl fmt::Display for RetentionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RetentionTier::Last => "last",
            RetentionTier::Daily => "daily",
            RetentionTier::Weekly => "weekly",
            RetentionTier::Monthly => "monthly",
        };
        f.write_str(name)
    }
}

/// Outcome of a retention calculation.
///
/// `to_keep` and `to_delete` partition the input and are both newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneResult {
    pub to_keep: Vec<SnapshotInfo>,
    pub to_delete: Vec<SnapshotInfo>,
    pub total_snapshots: usize,
    /// Tiers that kept each surviving snapshot, by ID.
    pub reasons: BTreeMap<String, Vec<RetentionTier>>,
}

impl PruneResult {
    /// Nothing would be deleted.
    pub fn is_noop(&self) -> bool {
        self.to_delete.is_empty()
    }

    pub fn reasons_for(&self, id: &str) -> &[RetentionTier] {
        self.reasons.get(id).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// [`calculate_prune_at`] evaluated at the current instant.
pub fn calculate_prune(
    snapshots: &[SnapshotInfo],
    policy: &RetentionPolicy,
) -> SnapshotResult<PruneResult> {
    calculate_prune_at(snapshots, policy, Utc::now())
}

/// Partition `snapshots` into keep and delete sets as of `now`.
///
/// - `keep_last`: the newest N.
/// - `keep_daily`: newest per UTC day, for days within N days of `now`, at most N days.
/// - `keep_weekly`: newest per ISO week within N weeks (plus grace), at most N weeks.
/// - `keep_monthly`: newest per month within N months (plus grace), at most N months.
pub fn calculate_prune_at(
    snapshots: &[SnapshotInfo],
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
) -> SnapshotResult<PruneResult> {
    policy.validate()?;
    if snapshots.is_empty() {
        return Ok(PruneResult::default());
    }

    let mut sorted = snapshots.to_vec();
    sort_newest_first(&mut sorted);

    let mut reasons: BTreeMap<String, Vec<RetentionTier>> = BTreeMap::new();
    let mut mark = |ids: Vec<&str>, tier: RetentionTier| {
        for id in ids {
            reasons.entry(id.to_string()).or_default().push(tier);
        }
    };

    mark(
        sorted.iter().take(policy.keep_last).map(|s| s.id.as_str()).collect(),
        RetentionTier::Last,
    );

    if policy.keep_daily > 0 {
        let cutoff = days_before(now, to_i64(policy.keep_daily), 0);
        mark(
            newest_per_bucket(&sorted, cutoff, policy.keep_daily, |t| t.date_naive()),
            RetentionTier::Daily,
        );
    }

    if policy.keep_weekly > 0 {
        let days = to_i64(policy.keep_weekly).saturating_mul(7);
        let cutoff = days_before(now, days, BOUNDARY_GRACE_MINUTES);
        mark(
            newest_per_bucket(&sorted, cutoff, policy.keep_weekly, |t| {
                let week = t.iso_week();
                (week.year(), week.week())
            }),
            RetentionTier::Weekly,
        );
    }

    if policy.keep_monthly > 0 {
        let months = u32::try_from(policy.keep_monthly).unwrap_or(u32::MAX);
        let cutoff = now
            .checked_sub_months(Months::new(months))
            .and_then(|t| t.checked_sub_signed(Duration::minutes(BOUNDARY_GRACE_MINUTES)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        mark(
            newest_per_bucket(&sorted, cutoff, policy.keep_monthly, |t| (t.year(), t.month())),
            RetentionTier::Monthly,
        );
    }

    let total_snapshots = sorted.len();
    let (to_keep, to_delete): (Vec<_>, Vec<_>) = sorted
        .into_iter()
        .partition(|s| reasons.contains_key(&s.id));

    debug!(
        total = total_snapshots,
        keep = to_keep.len(),
        delete = to_delete.len(),
        "Calculated prune plan"
    );

    Ok(PruneResult {
        to_keep,
        to_delete,
        total_snapshots,
        reasons,
    })
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// `now` minus `days` and `grace_minutes`, saturating at the earliest instant
/// for counts too large to represent.
fn days_before(now: DateTime<Utc>, days: i64, grace_minutes: i64) -> DateTime<Utc> {
    Duration::try_days(days)
        .and_then(|d| d.checked_add(&Duration::minutes(grace_minutes)))
        .and_then(|d| now.checked_sub_signed(d))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// First (newest) snapshot of each bucket at or after `cutoff`, stopping once
/// `max_buckets` buckets are filled. `sorted` must be newest first.
fn newest_per_bucket<K, F>(
    sorted: &[SnapshotInfo],
    cutoff: DateTime<Utc>,
    max_buckets: usize,
    key: F,
) -> Vec<&str>
where
    K: Eq + Hash,
    F: Fn(&DateTime<Utc>) -> K,
{
    let mut seen = HashSet::new();
    let mut kept = Vec::new();
    for snapshot in sorted.iter().take_while(|s| s.timestamp >= cutoff) {
        if seen.len() == max_buckets {
            break;
        }
        if seen.insert(key(&snapshot.timestamp)) {
            kept.push(snapshot.id.as_str());
        }
    }
    kept
}
