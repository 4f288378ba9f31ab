//! Exclusion rules applied while walking a source tree.
//!
//! Supported pattern shapes:
//! - `cache/` - a directory name, matched as a leading segment or anywhere in the path
//! - `*.log` - an extension, matched as a suffix
//! - `**/tmp/*.json`, `session-?.md` - globs; `**` may span directories
//! - `credentials.json` - an exact relative path or a basename
//!
//! Paths are matched relative to the source root they were found under. With
//! several sources the namespace prefix is not part of the matched path, so
//! `secret.json` applies to every source and `workspace/secret.json` only
//! matches a `workspace` directory inside a source.

use crate::{SnapshotError, SnapshotResult};
use regex::Regex;

#[derive(Debug, Clone)]
enum Rule {
    /// Segment run, without the trailing slash (`node_modules`, `a/b`).
    Directory(String),
    /// Suffix including the dot (`.log`).
    Extension(String),
    /// Anchored path regex; `basename` when the pattern had no `/`.
    Glob { regex: Regex, basename: bool },
    Exact(String),
}

impl Rule {
    fn parse(pattern: &str) -> SnapshotResult<Self> {
        let trimmed = pattern.trim();
        if trimmed.is_empty() {
            return Err(SnapshotError::invalid_pattern(pattern, "pattern is empty"));
        }

        if let Some(dir) = trimmed.strip_suffix('/') {
            let dir = dir.trim_matches('/');
            if dir.is_empty() {
                return Err(SnapshotError::invalid_pattern(
                    pattern,
                    "directory pattern has no name",
                ));
            }
            if has_wildcard(dir) {
                return glob_rule(pattern, &format!("{dir}/**"));
            }
            return Ok(Rule::Directory(dir.to_string()));
        }

        if let Some(ext) = trimmed.strip_prefix("*.") {
            if !ext.is_empty() && !has_wildcard(ext) && !ext.contains('/') {
                return Ok(Rule::Extension(format!(".{ext}")));
            }
        }

        if has_wildcard(trimmed) {
            return glob_rule(pattern, trimmed);
        }

        Ok(Rule::Exact(trimmed.trim_start_matches("./").to_string()))
    }

    fn matches(&self, path: &str) -> bool {
        match self {
            Rule::Directory(dir) => {
                path == dir
                    || path.starts_with(&format!("{dir}/"))
                    || path.ends_with(&format!("/{dir}"))
                    || path.contains(&format!("/{dir}/"))
            }
            Rule::Extension(ext) => path.ends_with(ext.as_str()),
            Rule::Glob { regex, basename } => {
                regex.is_match(path) || (*basename && regex.is_match(basename_of(path)))
            }
            Rule::Exact(name) => path == name || basename_of(path) == name,
        }
    }
}

fn has_wildcard(s: &str) -> bool {
    s.contains('*') || s.contains('?')
}

fn basename_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn glob_rule(original: &str, glob: &str) -> SnapshotResult<Rule> {
    let regex = Regex::new(&glob_to_regex(glob))
        .map_err(|e| SnapshotError::invalid_pattern(original, e.to_string()))?;
    Ok(Rule::Glob {
        regex,
        basename: !glob.contains('/'),
    })
}

/// Translate a glob to an anchored regex where `**` spans directories and
/// `*`/`?` stay within one segment.
fn glob_to_regex(glob: &str) -> String {
    let mut out = String::from("^");
    let chars: Vec<char> = glob.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    out.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    out.push_str(".*");
                    i += 2;
                }
                continue;
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            c => out.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }
    out.push('$');
    out
}

/// Compiled set of exclusion patterns. A path matching any rule is excluded.
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    patterns: Vec<String>,
    rules: Vec<Rule>,
}

impl ExclusionSet {
    /// Compile `patterns`; the first malformed pattern is reported.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> SnapshotResult<Self> {
        let mut rules = Vec::with_capacity(patterns.len());
        let mut originals = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let pattern = pattern.as_ref();
            rules.push(Rule::parse(pattern)?);
            originals.push(pattern.to_string());
        }
        Ok(Self {
            patterns: originals,
            rules,
        })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// `path` is tree-relative with forward slashes.
    pub fn is_excluded(&self, path: &str) -> bool {
        self.matching_pattern(path).is_some()
    }

    /// The first pattern that excludes `path`, for diagnostics.
    pub fn matching_pattern(&self, path: &str) -> Option<&str> {
        self.rules
            .iter()
            .position(|rule| rule.matches(path))
            .map(|idx| self.patterns[idx].as_str())
    }
}
