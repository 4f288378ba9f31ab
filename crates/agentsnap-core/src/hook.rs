//! External commands run around backup operations.
//!
//! - `pre_capture`: before a snapshot is built; a failure aborts the capture
//! - `post_restore`: after files are restored; a failure is only logged
//!
//! Hooks receive the operation context as `AGENTSNAP_*` environment
//! variables, and `$VAR` / `${VAR}` in their arguments are substituted from
//! the same set.

use crate::error::HookError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, error, info};

pub const ENV_OPERATION: &str = "AGENTSNAP_OPERATION";
pub const ENV_SNAPSHOT_ID: &str = "AGENTSNAP_SNAPSHOT_ID";
pub const ENV_SOURCES: &str = "AGENTSNAP_SOURCES";
pub const ENV_DESTINATION: &str = "AGENTSNAP_DESTINATION";
pub const ENV_TARGET: &str = "AGENTSNAP_TARGET";

/// A hook definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hook {
    /// Program followed by its arguments.
    pub command: Vec<String>,
    /// Extra environment variables.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub environment: HashMap<String, String>,
    /// Kill the command after this many seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Hook {
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            environment: HashMap::new(),
            timeout_secs: None,
        }
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.environment = env;
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Run the hook; a non-zero exit status is an error.
    pub async fn execute(&self, context: &HookContext) -> Result<HookResult, HookError> {
        let args: Vec<String> = self
            .command
            .iter()
            .map(|arg| substitute_variables(arg, context))
            .collect();

        let (program, args) = args
            .split_first()
            .ok_or_else(|| HookError::InvalidCommand("Empty command".into()))?;

        debug!(program = %program, "Executing hook");

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        for (key, value) in &self.environment {
            cmd.env(key, substitute_variables(value, context));
        }
        for (key, value) in &context.env {
            cmd.env(key, value);
        }
        if let Some(cwd) = &context.cwd {
            cmd.current_dir(cwd);
        }

        let output = cmd.output();
        let output = match self.timeout_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), output)
                .await
                .map_err(|_| HookError::Timeout(secs))?,
            None => output.await,
        }
        .map_err(|e| HookError::ExecutionFailed(format!("Failed to execute {program}: {e}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if output.status.success() {
            Ok(HookResult {
                stdout,
                stderr,
                exit_code: output.status.code(),
            })
        } else {
            Err(HookError::ExecutionFailed(format!(
                "Hook failed with exit code {:?}: {}",
                output.status.code(),
                stderr.trim()
            )))
        }
    }
}

/// Output of a successful hook.
#[derive(Debug)]
pub struct HookResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

/// Context passed to hooks.
#[derive(Debug, Default)]
pub struct HookContext {
    /// Environment variables to set.
    pub env: HashMap<String, String>,
    /// Working directory.
    pub cwd: Option<PathBuf>,
}

impl HookContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for `operation`, with the configured sources and destination.
    pub fn for_operation(operation: HookEvent, sources: &[PathBuf], destination: &Path) -> Self {
        let joined = std::env::join_paths(sources)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| {
                sources
                    .iter()
                    .map(|s| s.display().to_string())
                    .collect::<Vec<_>>()
                    .join(":")
            });
        Self::new()
            .with_env(ENV_OPERATION, operation.as_str())
            .with_env(ENV_SOURCES, joined)
            .with_env(ENV_DESTINATION, destination.display().to_string())
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}

/// Substitute context variables in a string.
fn substitute_variables(input: &str, context: &HookContext) -> String {
    let mut result = input.to_string();
    for (key, value) in &context.env {
        result = result.replace(&format!("${{{key}}}"), value);
        result = result.replace(&format!("${key}"), value);
    }
    result
}

/// Hook event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    /// Before a snapshot is captured.
    PreCapture,
    /// After a snapshot was restored.
    PostRestore,
}

impl HookEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookEvent::PreCapture => "pre_capture",
            HookEvent::PostRestore => "post_restore",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pre_capture" => Some(HookEvent::PreCapture),
            "post_restore" => Some(HookEvent::PostRestore),
            _ => None,
        }
    }

    /// Whether a failing hook stops the operation.
    pub fn is_blocking(&self) -> bool {
        matches!(self, HookEvent::PreCapture)
    }
}

/// Hooks grouped by event, as stored in the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HooksConfig {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pre_capture: Vec<Hook>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub post_restore: Vec<Hook>,
}

impl HooksConfig {
    pub fn hooks(&self, event: HookEvent) -> &[Hook] {
        match event {
            HookEvent::PreCapture => &self.pre_capture,
            HookEvent::PostRestore => &self.post_restore,
        }
    }

    /// Run every hook for `event` in order.
    ///
    /// For blocking events the first failure is returned and later hooks do
    /// not run. Otherwise failures are logged and the rest still run.
    pub async fn trigger(&self, event: HookEvent, context: &HookContext) -> Result<(), HookError> {
        for hook in self.hooks(event) {
            match hook.execute(context).await {
                Ok(result) => {
                    info!(event = event.as_str(), exit_code = ?result.exit_code, "Hook executed");
                    if !result.stdout.trim().is_empty() {
                        debug!(event = event.as_str(), stdout = %result.stdout.trim(), "Hook output");
                    }
                }
                Err(e) if event.is_blocking() => {
                    error!(event = event.as_str(), error = %e, "Hook failed, aborting");
                    return Err(e);
                }
                Err(e) => {
                    error!(event = event.as_str(), error = %e, "Hook failed");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Hook {
        Hook::new(vec!["sh".into(), "-c".into(), script.into()])
    }

    #[test]
    fn test_substitute_variables() {
        let context = HookContext::new()
            .with_env("AGENTSNAP_SNAPSHOT_ID", "20240101-000000-000")
            .with_env("AGENTSNAP_OPERATION", "capture");

        assert_eq!(
            substitute_variables("id=$AGENTSNAP_SNAPSHOT_ID", &context),
            "id=20240101-000000-000"
        );
        assert_eq!(
            substitute_variables("op=${AGENTSNAP_OPERATION}!", &context),
            "op=capture!"
        );
    }

    #[test]
    fn test_hook_event_conversion() {
        assert_eq!(HookEvent::PreCapture.as_str(), "pre_capture");
        assert_eq!(HookEvent::parse("post_restore"), Some(HookEvent::PostRestore));
        assert_eq!(HookEvent::parse("unknown"), None);
        assert!(HookEvent::PreCapture.is_blocking());
        assert!(!HookEvent::PostRestore.is_blocking());
    }

    #[test]
    fn test_context_for_operation() {
        let context = HookContext::for_operation(
            HookEvent::PreCapture,
            &[PathBuf::from("/a"), PathBuf::from("/b")],
            Path::new("/backups"),
        );
        assert_eq!(context.env[ENV_OPERATION], "pre_capture");
        assert_eq!(context.env[ENV_DESTINATION], "/backups");
        assert!(context.env[ENV_SOURCES].contains("/a"));
        assert!(context.env[ENV_SOURCES].contains("/b"));
    }

    #[test]
    fn test_hooks_config_serialization() {
        let json = r#"{"preCapture":[{"command":["echo","hi"],"timeoutSecs":5}]}"#;
        let config: HooksConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.pre_capture[0].command, vec!["echo", "hi"]);
        assert_eq!(config.pre_capture[0].timeout_secs, Some(5));
        assert!(config.post_restore.is_empty());

        let back = serde_json::to_value(&config).unwrap();
        assert!(back.get("postRestore").is_none());
    }

    #[tokio::test]
    async fn test_execute_empty_command() {
        let result = Hook::new(vec![]).execute(&HookContext::new()).await;
        assert!(matches!(result, Err(HookError::InvalidCommand(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_receives_environment() {
        let context = HookContext::new().with_env(ENV_SNAPSHOT_ID, "abc");
        let result = sh("printf %s \"$AGENTSNAP_SNAPSHOT_ID\"")
            .execute(&context)
            .await
            .unwrap();
        assert_eq!(result.stdout, "abc");
        assert_eq!(result.exit_code, Some(0));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_failure_reports_stderr() {
        let err = sh("echo broken >&2; exit 3")
            .execute(&HookContext::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("broken"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout() {
        let err = sh("sleep 5")
            .with_timeout(1)
            .execute(&HookContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, HookError::Timeout(1)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_blocking_event_stops_at_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("ran");
        let hooks = HooksConfig {
            pre_capture: vec![
                sh("exit 1"),
                sh(&format!("touch {}", marker.display())),
            ],
            post_restore: Vec::new(),
        };
        assert!(hooks
            .trigger(HookEvent::PreCapture, &HookContext::new())
            .await
            .is_err());
        assert!(!marker.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_blocking_event_continues() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("ran");
        let hooks = HooksConfig {
            pre_capture: Vec::new(),
            post_restore: vec![
                sh("exit 1"),
                sh(&format!("touch {}", marker.display())),
            ],
        };
        hooks
            .trigger(HookEvent::PostRestore, &HookContext::new())
            .await
            .unwrap();
        assert!(marker.exists());
    }
}
