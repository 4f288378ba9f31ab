//! Temporary source trees for tests.
//!
//! A [`TestTree`] collects files and directories, then [`TestTree::build`]
//! writes them into a fresh temporary directory that is removed when the
//! returned [`BuiltTestTree`] is dropped.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Builder for a temporary directory tree.
pub struct TestTree {
    temp_dir: TempDir,
    /// Files to create (path relative to root -> bytes).
    files: BTreeMap<PathBuf, Vec<u8>>,
    /// Empty directories to create.
    dirs: Vec<PathBuf>,
    /// Optional subdirectory of the temp dir that acts as the tree root.
    root_name: Option<String>,
}

impl TestTree {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
            files: BTreeMap::new(),
            dirs: Vec::new(),
            root_name: None,
        }
    }

    /// Place the tree under `<tempdir>/<name>` so its base name is known.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.root_name = Some(name.into());
        self
    }

    /// Add a text file. Parent directories are created automatically.
    pub fn with_file(self, path: impl AsRef<Path>, contents: impl Into<String>) -> Self {
        self.with_bytes(path, contents.into().into_bytes())
    }

    /// Add a file with arbitrary bytes.
    pub fn with_bytes(mut self, path: impl AsRef<Path>, contents: impl Into<Vec<u8>>) -> Self {
        self.files
            .insert(path.as_ref().to_path_buf(), contents.into());
        self
    }

    /// Add an empty directory.
    pub fn with_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.dirs.push(path.as_ref().to_path_buf());
        self
    }

    /// A small agent workspace: instructions, memory notes, settings and logs.
    pub fn with_agent_workspace(self) -> Self {
        self.with_file("AGENTS.md", "# Agent\n\nBe helpful.\n")
            .with_file("SOUL.md", "calm\ncurious\n")
            .with_file("memory/2024-01-01.md", "- met the user\n")
            .with_file("memory/2024-01-02.md", "- wrote a script\n")
            .with_file("config/settings.json", "{\"model\": \"default\"}\n")
            .with_file("logs/agent.log", "started\n")
    }

    pub fn build(self) -> BuiltTestTree {
        let root = match &self.root_name {
            Some(name) => self.temp_dir.path().join(name),
            None => self.temp_dir.path().to_path_buf(),
        };
        fs::create_dir_all(&root)
            .unwrap_or_else(|e| panic!("Failed to create root {}: {}", root.display(), e));

        for dir in &self.dirs {
            let full_path = root.join(dir);
            fs::create_dir_all(&full_path).unwrap_or_else(|e| {
                panic!("Failed to create directory {}: {}", full_path.display(), e)
            });
        }

        for (path, contents) in &self.files {
            write_all(&root.join(path), contents);
        }

        BuiltTestTree {
            _temp_dir: self.temp_dir,
            root,
        }
    }
}

impl Default for TestTree {
    fn default() -> Self {
        Self::new()
    }
}

fn write_all(full_path: &Path, contents: &[u8]) {
    if let Some(parent) = full_path.parent() {
        fs::create_dir_all(parent).unwrap_or_else(|e| {
            panic!(
                "Failed to create parent directory for {}: {}",
                full_path.display(),
                e
            )
        });
    }
    fs::write(full_path, contents)
        .unwrap_or_else(|e| panic!("Failed to write file {}: {}", full_path.display(), e));
}

/// A tree that exists on disk until dropped.
pub struct BuiltTestTree {
    _temp_dir: TempDir,
    root: PathBuf,
}

impl BuiltTestTree {
    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn read_file(&self, path: impl AsRef<Path>) -> String {
        let full_path = self.root.join(path.as_ref());
        fs::read_to_string(&full_path)
            .unwrap_or_else(|e| panic!("Failed to read file {}: {}", full_path.display(), e))
    }

    pub fn file_exists(&self, path: impl AsRef<Path>) -> bool {
        self.root.join(path.as_ref()).exists()
    }

    /// Overwrite (or create) a file while a test is running.
    pub fn write_file(&self, path: impl AsRef<Path>, contents: impl AsRef<[u8]>) {
        write_all(&self.root.join(path.as_ref()), contents.as_ref());
    }

    pub fn delete_file(&self, path: impl AsRef<Path>) {
        let full_path = self.root.join(path.as_ref());
        fs::remove_file(&full_path)
            .unwrap_or_else(|e| panic!("Failed to delete file {}: {}", full_path.display(), e));
    }
}
