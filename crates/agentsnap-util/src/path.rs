//! Path utilities.

use std::path::{Component, Path, PathBuf};

/// Get the agentsnap configuration directory.
///
/// This follows XDG conventions on Linux/macOS:
/// - `$XDG_CONFIG_HOME/agentsnap` if set
/// - `~/.config/agentsnap` otherwise
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("agentsnap"))
}

/// Get the agentsnap data directory.
pub fn data_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|p| p.join("agentsnap"))
}

/// Get the agentsnap logs directory.
pub fn logs_dir() -> Option<PathBuf> {
    data_dir().map(|p| p.join("logs"))
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    let mut components = path.components();
    match components.next() {
        Some(Component::Normal(first)) if first == "~" => match dirs::home_dir() {
            Some(home) => home.join(components.as_path()),
            None => path.to_path_buf(),
        },
        _ => path.to_path_buf(),
    }
}

/// Render a relative path with forward slashes regardless of platform.
///
/// Returns `None` when any component is not valid UTF-8.
pub fn to_slash(path: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in path.components() {
        if let Component::Normal(part) = component {
            parts.push(part.to_str()?);
        }
    }
    Some(parts.join("/"))
}

/// Canonical form of `path`, or its lexical normalization when it cannot be
/// resolved (e.g. it does not exist yet).
pub fn resolve(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| normalize(path))
}

/// Check if a path is within a base directory, however either is spelled.
pub fn is_within(path: &Path, base: &Path) -> bool {
    resolve(path).starts_with(resolve(base))
}

/// Normalize a path by removing `.` and `..` components.
///
/// Unlike `canonicalize`, this doesn't require the path to exist.
pub fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();

    for component in path.components() {
        match component {
            Component::ParentDir => {
                result.pop();
            }
            Component::CurDir => {}
            _ => result.push(component),
        }
    }

    result
}

/// Join a forward-slash relative key onto `base`, refusing anything that
/// would escape it (absolute keys, `..` segments).
pub fn safe_join(base: &Path, relative: &str) -> Option<PathBuf> {
    let mut result = base.to_path_buf();
    for segment in relative.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return None,
            s if Path::new(s).is_absolute() || s.contains('\\') => return None,
            s => result.push(s),
        }
    }
    if result == base {
        return None;
    }
    Some(result)
}
