//! Command execution against the host shell
//!
//! Every data point shown by the monitor comes from an external command. This
//! module is the only place processes are spawned; callers receive a
//! [`CommandResult`] and never an error.

use std::fmt;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::{Error, Result};

/// Outcome classification of a command or check.
///
/// The executor itself only produces `Success` and `Error`; `Warning` and
/// `Info` are assigned by the analyzers layered on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Success,
    Warning,
    Error,
    Info,
}

impl CommandStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandStatus::Success => "success",
            CommandStatus::Warning => "warning",
            CommandStatus::Error => "error",
            CommandStatus::Info => "info",
        }
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one external invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub name: String,
    pub status: CommandStatus,
    pub message: String,
    pub error: String,
    pub timestamp: DateTime<Local>,
}

impl CommandResult {
    pub fn success(name: impl Into<String>, stdout: &str) -> Self {
        Self {
            name: name.into(),
            status: CommandStatus::Success,
            message: stdout.trim().to_string(),
            error: String::new(),
            timestamp: Local::now(),
        }
    }

    pub fn failure(name: impl Into<String>, command: &str, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CommandStatus::Error,
            message: format!("Command failed: {}", command),
            error: error.into(),
            timestamp: Local::now(),
        }
    }

    /// A synthesized result that did not come from a process, e.g. a progress note.
    pub fn note(name: impl Into<String>, status: CommandStatus, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status,
            message: message.into(),
            error: String::new(),
            timestamp: Local::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == CommandStatus::Success
    }

    /// Trimmed stdout for a successful run, `None` otherwise.
    pub fn output(&self) -> Option<&str> {
        self.is_success().then_some(self.message.as_str())
    }
}

/// Runs a shell command and captures its outcome.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, name: &str, command: &str) -> CommandResult;
}

/// Executes commands through `sh -c`.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    shell: String,
    deadline: Option<Duration>,
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellExecutor {
    pub fn new() -> Self {
        Self {
            shell: "sh".to_string(),
            deadline: None,
        }
    }

    /// Kill commands still running after `deadline`.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    async fn run(&self, command: &str) -> Result<std::process::Output> {
        let child = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::execution(format!("failed to start '{}': {}", self.shell, e)))?;

        let output = match self.deadline {
            Some(deadline) => tokio::time::timeout(deadline, child.wait_with_output())
                .await
                .map_err(|_| Error::timeout(format!("timed out after {:?}", deadline)))?,
            None => child.wait_with_output().await,
        };

        Ok(output?)
    }
}

#[async_trait]
impl CommandExecutor for ShellExecutor {
    async fn execute(&self, name: &str, command: &str) -> CommandResult {
        debug!(name, command, "executing command");

        match self.run(command).await {
            Ok(output) if output.status.success() => {
                CommandResult::success(name, &String::from_utf8_lossy(&output.stdout))
            }
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                let detail = if stderr.is_empty() {
                    match output.status.code() {
                        Some(code) => format!("exit status {}", code),
                        None => "terminated by signal".to_string(),
                    }
                } else {
                    stderr
                };
                debug!(name, command, %detail, "command exited unsuccessfully");
                CommandResult::failure(name, command, detail)
            }
            Err(Error::Timeout(detail)) => {
                warn!(name, command, "command exceeded its deadline");
                CommandResult::failure(name, command, detail)
            }
            Err(e) => {
                warn!(name, command, error = %e, "command could not be run");
                CommandResult::failure(name, command, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_successful_command_is_trimmed() {
        let executor = ShellExecutor::new();
        let result = executor.execute("Echo", "echo '  hello  '").await;

        assert_eq!(result.status, CommandStatus::Success);
        assert_eq!(result.message, "hello");
        assert!(result.error.is_empty());
        assert_eq!(result.output(), Some("hello"));
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_an_error_result() {
        let executor = ShellExecutor::new();
        let result = executor.execute("Fail", "exit 3").await;

        assert_eq!(result.status, CommandStatus::Error);
        assert_eq!(result.message, "Command failed: exit 3");
        assert_eq!(result.error, "exit status 3");
        assert_eq!(result.output(), None);
    }

    #[tokio::test]
    async fn test_stderr_becomes_error_detail() {
        let executor = ShellExecutor::new();
        let result = executor.execute("Stderr", "echo boom >&2; exit 1").await;

        assert_eq!(result.status, CommandStatus::Error);
        assert_eq!(result.error, "boom");
    }

    #[tokio::test]
    async fn test_fallback_chain_succeeds() {
        let executor = ShellExecutor::new();
        let result = executor
            .execute("Fallback", "false || echo 'No firewall detected'")
            .await;

        assert!(result.is_success());
        assert_eq!(result.message, "No firewall detected");
    }

    #[tokio::test]
    async fn test_missing_shell_is_an_error_result() {
        let executor = ShellExecutor::new().with_shell("/nonexistent/shell");
        let result = executor.execute("Spawn", "echo hi").await;

        assert_eq!(result.status, CommandStatus::Error);
        assert!(result.error.contains("failed to start"));
    }

    #[tokio::test]
    async fn test_deadline_kills_slow_command() {
        let executor = ShellExecutor::new().with_deadline(Duration::from_millis(100));
        let result = executor.execute("Slow", "sleep 5").await;

        assert_eq!(result.status, CommandStatus::Error);
        assert!(result.error.starts_with("timed out"));
    }
}
