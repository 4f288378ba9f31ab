//! Testing utilities for agentsnap.
//!
//! - **Fixtures**: temporary source trees shaped like an agent workspace
//! - **Content**: generators for line-oriented file bodies
//!
//! ```rust,ignore
//! use agentsnap_test_utils::fixtures::TestTree;
//!
//! let tree = TestTree::new()
//!     .with_file("AGENTS.md", "# agent\n")
//!     .with_file("memory/2024-01-01.md", "notes\n")
//!     .build();
//! assert!(tree.path().join("memory/2024-01-01.md").exists());
//! ```

pub mod content;
pub mod fixtures;

pub use fixtures::{BuiltTestTree, TestTree};
