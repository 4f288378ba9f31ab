//! Walks source trees and assembles a [`Snapshot`].
//!
//! A single source is captured with tree-relative paths. With several
//! sources, each one is namespaced under its base name
//! (`workspace/AGENTS.md`, `config/settings.json`).
//!
//! Capture policy:
//! - symbolic links are never followed and are skipped, so link cycles are harmless;
//! - any unreadable file or directory aborts the build with the offending path,
//!   and so does a file name that is not valid UTF-8;
//! - excluded directories are not descended into.
//!
//! Roots and skipped directories are resolved before walking, so a source
//! spelled with `..` or through a symlink still recognises a skipped
//! directory inside it.

use crate::content::ContentSource;
use crate::exclude::ExclusionSet;
use crate::hash::hash_file;
use crate::snapshot::{FileRecord, Snapshot};
use crate::{SnapshotError, SnapshotResult};
use agentsnap_util::path::{resolve, safe_join, to_slash};
use chrono::{DateTime, Utc};
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, info, trace};
use walkdir::WalkDir;

/// How snapshot-relative keys map back onto source directories.
#[derive(Debug, Clone)]
pub enum SourceLayout {
    /// Keys are relative to the one root.
    Single(PathBuf),
    /// Keys start with the base name of the root they came from.
    Namespaced(Vec<(String, PathBuf)>),
}

impl SourceLayout {
    /// Fails when no source is given or two sources share a base name.
    pub fn new(sources: &[PathBuf]) -> SnapshotResult<Self> {
        match sources {
            [] => Err(SnapshotError::SourceMissing(PathBuf::new())),
            [single] => Ok(SourceLayout::Single(single.clone())),
            many => {
                let mut roots: Vec<(String, PathBuf)> = Vec::with_capacity(many.len());
                for source in many {
                    let name = base_name(source)?;
                    if roots.iter().any(|(existing, _)| *existing == name) {
                        return Err(SnapshotError::AmbiguousSource(name));
                    }
                    roots.push((name, source.clone()));
                }
                Ok(SourceLayout::Namespaced(roots))
            }
        }
    }

    /// Each root with the key prefix its files receive (empty for a single source).
    pub fn roots(&self) -> Vec<(&str, &Path)> {
        match self {
            SourceLayout::Single(root) => vec![("", root.as_path())],
            SourceLayout::Namespaced(roots) => roots
                .iter()
                .map(|(name, root)| (name.as_str(), root.as_path()))
                .collect(),
        }
    }

    /// Split a snapshot key into its source root and root-relative path.
    pub fn split<'a>(&'a self, key: &'a str) -> Option<(&'a Path, &'a str)> {
        match self {
            SourceLayout::Single(root) => Some((root.as_path(), key)),
            SourceLayout::Namespaced(roots) => {
                let (head, rest) = key.split_once('/')?;
                roots
                    .iter()
                    .find(|(name, _)| name == head)
                    .map(|(_, root)| (root.as_path(), rest))
            }
        }
    }
}

impl ContentSource for SourceLayout {
    fn locate(&self, path: &str) -> Option<PathBuf> {
        let (root, rel) = self.split(path)?;
        safe_join(root, rel)
    }
}

fn base_name(source: &Path) -> SnapshotResult<String> {
    agentsnap_util::path::normalize(source)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| SnapshotError::AmbiguousSource(source.display().to_string()))
}

/// Builder for a single capture.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    layout: SourceLayout,
    exclusions: ExclusionSet,
    skipped: Vec<PathBuf>,
    message: Option<String>,
    timestamp: Option<DateTime<Utc>>,
}

impl SnapshotBuilder {
    pub fn new(sources: &[PathBuf]) -> SnapshotResult<Self> {
        Ok(Self {
            layout: SourceLayout::new(sources)?,
            exclusions: ExclusionSet::empty(),
            skipped: Vec::new(),
            message: None,
            timestamp: None,
        })
    }

    pub fn with_exclusions(mut self, exclusions: ExclusionSet) -> Self {
        self.exclusions = exclusions;
        self
    }

    /// Never descend into `dir` (e.g. a backup destination inside a source
    /// tree). Any spelling of the path works.
    pub fn with_skipped_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.skipped.push(dir.into());
        self
    }

    pub fn with_message(mut self, message: Option<String>) -> Self {
        self.message = message;
        self
    }

    /// Capture instant; defaults to the moment [`build`](Self::build) runs.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn layout(&self) -> &SourceLayout {
        &self.layout
    }

    pub fn build(&self) -> SnapshotResult<Snapshot> {
        let timestamp = self.timestamp.unwrap_or_else(Utc::now);
        let mut records = Vec::new();

        for (prefix, root) in self.layout.roots() {
            if !root.exists() {
                return Err(SnapshotError::SourceMissing(root.to_path_buf()));
            }
            let before = records.len();
            self.walk(prefix, root, &mut records)?;
            debug!(
                source = %root.display(),
                files = records.len() - before,
                "Walked source"
            );
        }

        let snapshot = Snapshot::new(timestamp, self.message.clone(), records);
        info!(
            id = %snapshot.id,
            files = snapshot.file_count(),
            bytes = snapshot.total_size(),
            "Built snapshot"
        );
        Ok(snapshot)
    }

    fn walk(&self, prefix: &str, source: &Path, records: &mut Vec<FileRecord>) -> SnapshotResult<()> {
        let root = source
            .canonicalize()
            .map_err(|e| SnapshotError::unreadable(source, e))?;
        let root = root.as_path();
        let exclusions = &self.exclusions;
        let skipped: Vec<PathBuf> = self.skipped.iter().map(|dir| resolve(dir)).collect();
        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 {
                    return true;
                }
                if skipped.iter().any(|dir| entry.path().starts_with(dir)) {
                    trace!(path = %entry.path().display(), "Skipped directory");
                    return false;
                }
                // Undecodable names are reported by the loop below.
                let Ok(rel) = relative_key(root, entry.path()) else {
                    return true;
                };
                let excluded = exclusions.is_excluded(&rel);
                if excluded {
                    trace!(path = %rel, "Excluded");
                }
                !excluded
            });

        for entry in walker {
            let entry = entry.map_err(|e| walk_error(root, e))?;
            let file_type = entry.file_type();

            if file_type.is_symlink() {
                debug!(path = %entry.path().display(), "Skipping symlink");
                continue;
            }
            if !file_type.is_file() {
                continue;
            }

            let rel = if entry.depth() == 0 {
                base_name(source)?
            } else {
                relative_key(root, entry.path())?
            };
            let key = if prefix.is_empty() {
                rel
            } else {
                format!("{prefix}/{rel}")
            };

            let metadata = entry
                .metadata()
                .map_err(|e| walk_error(root, e))?;
            let content_hash = hash_file(entry.path())
                .map_err(|e| SnapshotError::unreadable(entry.path(), e))?;
            let modified_at = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| DateTime::<Utc>::from(UNIX_EPOCH));

            records.push(FileRecord {
                path: key,
                content_hash,
                size: metadata.len(),
                modified_at,
            });
        }
        Ok(())
    }
}

fn relative_key(root: &Path, path: &Path) -> SnapshotResult<String> {
    to_slash(path.strip_prefix(root).unwrap_or(path)).ok_or_else(|| {
        SnapshotError::unreadable(
            path,
            io::Error::new(io::ErrorKind::InvalidData, "file name is not valid UTF-8"),
        )
    })
}

fn walk_error(root: &Path, err: walkdir::Error) -> SnapshotError {
    let path = err.path().unwrap_or(root).to_path_buf();
    let message = err.to_string();
    let source = err
        .into_io_error()
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, message));
    SnapshotError::unreadable(path, source)
}

/// Build a snapshot in one call.
pub fn build_snapshot<S: AsRef<str>>(
    sources: &[PathBuf],
    exclusions: &[S],
    message: Option<String>,
    timestamp: DateTime<Utc>,
) -> SnapshotResult<Snapshot> {
    SnapshotBuilder::new(sources)?
        .with_exclusions(ExclusionSet::new(exclusions)?)
        .with_message(message)
        .with_timestamp(timestamp)
        .build()
}
