//! Read access to the bytes behind a snapshot's relative paths.

use agentsnap_util::path::safe_join;
use std::io;
use std::path::{Path, PathBuf};

/// Something that can locate the bytes of a snapshot-relative path: a live
/// source layout or a directory of stored payloads.
pub trait ContentSource: Send + Sync {
    /// Absolute location of `path`, or `None` if it cannot be addressed.
    fn locate(&self, path: &str) -> Option<PathBuf>;

    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        let full = self.locate(path).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no location for '{path}'"),
            )
        })?;
        std::fs::read(full)
    }
}

/// A plain directory whose layout mirrors snapshot-relative paths.
#[derive(Debug, Clone)]
pub struct DirContent {
    root: PathBuf,
}

impl DirContent {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ContentSource for DirContent {
    fn locate(&self, path: &str) -> Option<PathBuf> {
        safe_join(&self.root, path)
    }
}
