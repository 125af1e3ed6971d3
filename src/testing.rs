//! Test doubles for the command execution boundary

use std::sync::Mutex;

use async_trait::async_trait;

use crate::services::executor::{CommandExecutor, CommandResult};

#[derive(Debug, Clone)]
enum Scripted {
    Output(String),
    Failure(String),
}

/// A [`CommandExecutor`] that answers from a script instead of spawning processes.
///
/// Rules are matched in insertion order by substring; the first rule whose
/// pattern occurs in the command wins. Unmatched commands fail with
/// `exit status 127`. Every executed command is recorded.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    rules: Vec<(String, Scripted)>,
    executed: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands containing `pattern` succeed with `stdout`.
    pub fn respond(mut self, pattern: &str, stdout: &str) -> Self {
        self.rules
            .push((pattern.to_string(), Scripted::Output(stdout.to_string())));
        self
    }

    /// Commands containing `pattern` fail with `error`.
    pub fn fail(mut self, pattern: &str, error: &str) -> Self {
        self.rules
            .push((pattern.to_string(), Scripted::Failure(error.to_string())));
        self
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn was_executed(&self, pattern: &str) -> bool {
        self.executed().iter().any(|c| c.contains(pattern))
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn execute(&self, name: &str, command: &str) -> CommandResult {
        if let Ok(mut executed) = self.executed.lock() {
            executed.push(command.to_string());
        }

        let rule = self
            .rules
            .iter()
            .find(|(pattern, _)| command.contains(pattern.as_str()));

        match rule {
            Some((_, Scripted::Output(stdout))) => CommandResult::success(name, stdout),
            Some((_, Scripted::Failure(error))) => CommandResult::failure(name, command, error.clone()),
            None => CommandResult::failure(name, command, "exit status 127"),
        }
    }
}
