//! Snapshot and diff engine for agentsnap.
//!
//! This crate provides:
//! - Content-addressed snapshots of one or more source trees
//! - Hash-based diffs and git-style unified patches
//! - Short (`1` = newest) and full (`yyyyMMdd-HHmmss-SSS`) snapshot IDs
//! - Multi-tier retention planning
//! - The [`SnapshotStorage`] persistence contract and a plain-folder backend
//!
//! # Example
//!
//! ```no_run
//! use agentsnap_snapshot::{diff, ExclusionSet, FolderStorage, SnapshotBuilder, SnapshotStorage};
//! use std::path::PathBuf;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = FolderStorage::open("/backups/agent").await?;
//! let builder = SnapshotBuilder::new(&[PathBuf::from("/home/me/.agent")])?
//!     .with_exclusions(ExclusionSet::new(&["*.log", "cache/"])?);
//!
//! let snapshot = builder.build()?;
//! if let Some(last) = storage.get_last().await? {
//!     println!("{} files changed", diff(&snapshot, &last).len());
//! }
//! storage.save(&snapshot, builder.layout()).await?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod content;
pub mod diff;
mod error;
pub mod exclude;
pub mod folder;
pub mod hash;
pub mod id;
pub mod index;
pub mod render;
pub mod retention;
mod snapshot;
pub mod storage;

pub use builder::{build_snapshot, SnapshotBuilder, SourceLayout};
pub use content::{ContentSource, DirContent};
pub use diff::{diff, SnapshotDiff};
pub use error::{SnapshotError, SnapshotResult};
pub use exclude::ExclusionSet;
pub use folder::FolderStorage;
pub use id::{assign_short_ids, is_full_id, is_short_id, resolve_id, SnapshotRef, CURRENT_STATE};
pub use index::{IndexEntry, IndexEvent, IndexLog};
pub use render::{render_summary, render_unified_content, render_unified_metadata};
pub use retention::{calculate_prune, calculate_prune_at, PruneResult, RetentionPolicy, RetentionTier};
pub use snapshot::{format_snapshot_id, FileRecord, Snapshot, SnapshotInfo, SNAPSHOT_ID_FORMAT};
pub use storage::{execute_prune, PruneReport, SnapshotStorage};
