//! Configuration for agentsnap.
//!
//! Config is stored as JSON (comments allowed) at
//! `~/.config/agentsnap/config.json`, or wherever `AGENTSNAP_CONFIG` points.

use crate::error::{ConfigError, CoreResult};
use crate::hook::HooksConfig;
use agentsnap_snapshot::index::DEFAULT_INDEX_CAP;
use agentsnap_snapshot::{ExclusionSet, RetentionPolicy, SourceLayout};
use agentsnap_util::path::{config_dir, expand_home, normalize};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "AGENTSNAP_CONFIG";

const CONFIG_FILE: &str = "config.json";

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Directories to back up. `~` is expanded.
    pub sources: Vec<PathBuf>,

    /// Where snapshots are stored. `~` is expanded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,

    /// Exclusion patterns (`dir/`, `*.ext`, globs, exact names).
    pub exclude: Vec<String>,

    pub retention: RetentionPolicy,

    /// Prune with the retention policy after every new snapshot.
    pub auto_prune: bool,

    pub hooks: HooksConfig,

    /// Default log level (trace, debug, info, warn, error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Entries kept in the destination's audit log.
    pub index_cap: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            destination: None,
            exclude: default_excludes(),
            retention: RetentionPolicy::default(),
            auto_prune: true,
            hooks: HooksConfig::default(),
            log_level: None,
            index_cap: DEFAULT_INDEX_CAP,
        }
    }
}

fn default_excludes() -> Vec<String> {
    [".git/", "node_modules/", ".DS_Store", "*.tmp", "*.swp"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Config {
    /// `AGENTSNAP_CONFIG` if set, otherwise `<config dir>/agentsnap/config.json`.
    pub fn default_path() -> CoreResult<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
            return Ok(expand_home(Path::new(&path)));
        }
        config_dir()
            .map(|dir| dir.join(CONFIG_FILE))
            .ok_or_else(|| {
                ConfigError::InvalidPath("Could not determine config directory".to_string()).into()
            })
    }

    /// Load configuration from a file.
    pub async fn load(path: &Path) -> CoreResult<Self> {
        if !tokio::fs::try_exists(path).await? {
            return Err(ConfigError::NotFound {
                path: path.display().to_string(),
            }
            .into());
        }
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse_jsonc(&content, &path.display().to_string())
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults.
    pub async fn load_or_default(path: &Path) -> CoreResult<Self> {
        match Self::load(path).await {
            Err(crate::CoreError::Config(ConfigError::NotFound { .. })) => Ok(Self::default()),
            other => other,
        }
    }

    /// Write as pretty JSON, creating the parent directory.
    pub async fn save(&self, path: &Path) -> CoreResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self).map_err(|e| ConfigError::InvalidJson {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        tokio::fs::write(path, content).await?;
        tracing::info!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Parse JSONC (JSON with comments).
    pub fn parse_jsonc(content: &str, source: &str) -> CoreResult<Self> {
        let stripped = strip_comments(content);

        serde_json::from_str(&stripped).map_err(|e| {
            ConfigError::InvalidJson {
                path: source.to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Sources with `~` expanded.
    pub fn resolved_sources(&self) -> Vec<PathBuf> {
        self.sources.iter().map(|s| expand_home(s)).collect()
    }

    /// Destination with `~` expanded.
    pub fn resolved_destination(&self) -> Option<PathBuf> {
        self.destination.as_deref().map(expand_home)
    }

    /// Check everything that can be checked without touching the disk.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::validation("no sources configured"));
        }
        let Some(destination) = self.resolved_destination() else {
            return Err(ConfigError::validation("no destination configured"));
        };
        let sources = self.resolved_sources();
        let destination = normalize(&destination);
        if sources.iter().any(|s| destination == normalize(s)) {
            return Err(ConfigError::validation(
                "destination must not be one of the sources",
            ));
        }

        SourceLayout::new(&sources).map_err(|e| ConfigError::validation(e.to_string()))?;
        ExclusionSet::new(&self.exclude).map_err(|e| ConfigError::validation(e.to_string()))?;

        if self.retention.enabled {
            self.retention
                .validate()
                .map_err(|e| ConfigError::validation(e.to_string()))?;
        }
        Ok(())
    }
}

/// Strip `//` and `/* */` comments outside of strings.
fn strip_comments(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    let mut escape_next = false;

    while let Some(c) = chars.next() {
        if escape_next {
            result.push(c);
            escape_next = false;
            continue;
        }

        if in_string {
            match c {
                '\\' => escape_next = true,
                '"' => in_string = false,
                _ => {}
            }
            result.push(c);
            continue;
        }

        match (c, chars.peek()) {
            ('"', _) => {
                in_string = true;
                result.push(c);
            }
            ('/', Some('/')) => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        result.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = ' ';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    // Keep line numbers stable for parse errors.
                    if c == '\n' {
                        result.push('\n');
                    }
                    prev = c;
                }
            }
            _ => result.push(c),
        }
    }

    result
}
