//! Shell command action handler.
//!
//! Runs an external program, e.g. a macro tool that sends inputs to the game.
//! The program and its arguments come from configuration only; nothing from
//! chat is ever passed to the process.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use crate::handler::{parse_params, ActionParams, ChatAction};
use crate::types::{ErrorOutcome, FailureFlag};

const DEFAULT_TIMEOUT_MS: u64 = 10_000;

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

#[derive(Debug, Deserialize)]
struct ShellParams {
    program: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default = "default_timeout_ms")]
    timeout_ms: u64,
    #[serde(default)]
    requires_force: bool,
}

/// Handler for configured external commands.
pub struct ShellCommandAction {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    /// Only run for superuser invocations.
    requires_force: bool,
}

impl ShellCommandAction {
    pub const KIND: &'static str = "shell";

    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            requires_force: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn requiring_force(mut self) -> Self {
        self.requires_force = true;
        self
    }

    pub fn from_params(params: &ActionParams) -> Result<Self, String> {
        let parsed: ShellParams = parse_params(params)?;
        if parsed.program.trim().is_empty() {
            return Err("program must not be empty".to_string());
        }
        let mut action = Self::new(parsed.program, parsed.args)
            .with_timeout(Duration::from_millis(parsed.timeout_ms));
        action.requires_force = parsed.requires_force;
        Ok(action)
    }
}

#[async_trait]
impl ChatAction for ShellCommandAction {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    async fn run(&self, force: bool) -> ErrorOutcome {
        if self.requires_force && !force {
            return ErrorOutcome::failure(FailureFlag::NotPermitted);
        }

        let mut child = match Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(program = %self.program, error = %e, "Failed to start command");
                return ErrorOutcome::failure(FailureFlag::SpawnFailed);
            }
        };

        match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) if status.success() => ErrorOutcome::success(),
            Ok(Ok(status)) => {
                tracing::warn!(program = %self.program, %status, "Command exited unsuccessfully");
                ErrorOutcome::failure(FailureFlag::ProcessFailed)
            }
            Ok(Err(e)) => {
                tracing::warn!(program = %self.program, error = %e, "Failed to wait for command");
                ErrorOutcome::failure(FailureFlag::ProcessFailed)
            }
            Err(_) => {
                tracing::warn!(
                    program = %self.program,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Command timed out"
                );
                // kill_on_drop reaps the child when it goes out of scope.
                ErrorOutcome::failure(FailureFlag::TimedOut)
            }
        }
    }

    fn describe(&self) -> String {
        if self.args.is_empty() {
            format!("Run {}", self.program)
        } else {
            format!("Run {} {}", self.program, self.args.join(" "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(value: serde_json::Value) -> ActionParams {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_from_params_defaults() {
        let action =
            ShellCommandAction::from_params(&params(serde_json::json!({"program": "xdotool"})))
                .unwrap();
        assert_eq!(action.timeout, Duration::from_millis(DEFAULT_TIMEOUT_MS));
        assert!(!action.requires_force);
        assert_eq!(action.describe(), "Run xdotool");
    }

    #[test]
    fn test_from_params_full() {
        let action = ShellCommandAction::from_params(&params(serde_json::json!({
            "program": "xdotool",
            "args": ["key", "space"],
            "timeout_ms": 500,
            "requires_force": true,
        })))
        .unwrap();
        assert_eq!(action.timeout, Duration::from_millis(500));
        assert!(action.requires_force);
        assert_eq!(action.describe(), "Run xdotool key space");
    }

    #[test]
    fn test_empty_program_rejected() {
        assert!(
            ShellCommandAction::from_params(&params(serde_json::json!({"program": ""}))).is_err()
        );
    }

    #[tokio::test]
    async fn test_requires_force() {
        let action = ShellCommandAction::new("definitely-not-a-real-program-xyz", vec![])
            .requiring_force();
        let outcome = action.run(false).await;
        assert!(outcome.contains(&FailureFlag::NotPermitted));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_failure() {
        let action = ShellCommandAction::new("definitely-not-a-real-program-xyz", vec![]);
        let outcome = action.run(false).await;
        assert!(outcome.contains(&FailureFlag::SpawnFailed));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_command() {
        let action = ShellCommandAction::new("true", vec![]);
        assert!(action.run(false).await.is_success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_command() {
        let action = ShellCommandAction::new("false", vec![]);
        let outcome = action.run(false).await;
        assert!(outcome.contains(&FailureFlag::ProcessFailed));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_timeout() {
        let action = ShellCommandAction::new("sleep", vec!["5".to_string()])
            .with_timeout(Duration::from_millis(50));
        let outcome = action.run(false).await;
        assert!(outcome.contains(&FailureFlag::TimedOut));
    }
}
