//! PBX log viewer queries

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::services::backup::shell_quote;
use crate::services::classifier::{self, LogLevel};
use crate::services::event_log::DEFAULT_TAIL_LINES;
use crate::services::executor::CommandExecutor;

pub const MAX_TAIL_LINES: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogQuery {
    pub lines: usize,
    pub level: LogLevel,
    /// `|`-separated keywords; empty means no keyword filter
    pub filter: String,
}

impl Default for LogQuery {
    fn default() -> Self {
        Self {
            lines: DEFAULT_TAIL_LINES,
            level: LogLevel::Error,
            filter: String::new(),
        }
    }
}

impl LogQuery {
    /// Parse a user-entered line count, keeping the current value on bad input.
    pub fn set_lines(&mut self, input: &str) {
        if let Ok(lines) = input.trim().parse::<usize>() {
            if lines > 0 {
                self.lines = lines.min(MAX_TAIL_LINES);
            }
        }
    }
}

pub struct LogViewer {
    executor: Arc<dyn CommandExecutor>,
    path: PathBuf,
}

impl LogViewer {
    pub fn new(executor: Arc<dyn CommandExecutor>, path: impl Into<PathBuf>) -> Self {
        Self {
            executor,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Tail the log and apply the level and keyword filters in order.
    pub async fn fetch(&self, query: &LogQuery) -> String {
        let path = self.path.display().to_string();
        let command = format!("tail -n {} {}", query.lines, shell_quote(&path));
        let result = self.executor.execute("Read Logs", &command).await;

        let Some(output) = result.output() else {
            return format!("Unable to read {}: {}", path, result.error);
        };
        let lines: Vec<&str> = output.lines().collect();
        if lines.is_empty() {
            return format!("Log file {} is empty", path);
        }

        let mut matched = classifier::filter_level(&lines, query.level);
        let keywords = classifier::parse_keywords(&query.filter);
        if !keywords.is_empty() {
            matched = classifier::filter(&matched, &keywords);
        }
        debug!(
            read = lines.len(),
            matched = matched.len(),
            level = query.level.as_str(),
            "log query"
        );

        if matched.is_empty() {
            let mut reason = format!(
                "No entries matching level {} in the last {} lines",
                query.level.as_str(),
                query.lines
            );
            if !keywords.is_empty() {
                reason.push_str(&format!(" with filter '{}'", query.filter.trim()));
            }
            return reason;
        }
        matched.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedExecutor;

    const LOG: &str = "[Jan 1] NOTICE[1] chan_sip.c: Registered 100\n\
                       [Jan 1] ERROR[2] chan_sip.c: SIP/100-0001 failed\n\
                       [Jan 1] WARNING[3] rtp.c: jitter on SIP/101-0002\n\
                       [Jan 1] ERROR[4] pbx.c: no such extension";

    fn log_viewer(executor: ScriptedExecutor) -> LogViewer {
        LogViewer::new(Arc::new(executor), "/var/log/asterisk/messages")
    }

    #[test]
    fn test_query_lines() {
        let mut query = LogQuery::default();
        assert_eq!(query.lines, 50);
        query.set_lines("abc");
        assert_eq!(query.lines, 50);
        query.set_lines("0");
        assert_eq!(query.lines, 50);
        query.set_lines(" 200 ");
        assert_eq!(query.lines, 200);
    }

    #[tokio::test]
    async fn test_level_and_keyword_filters() {
        let executor = ScriptedExecutor::new().respond("tail -n 50 '/var/log/asterisk/messages'", LOG);
        let viewer = log_viewer(executor);

        let errors = viewer.fetch(&LogQuery::default()).await;
        assert_eq!(errors.lines().count(), 2);

        let query = LogQuery {
            filter: "SIP/100".to_string(),
            ..LogQuery::default()
        };
        let filtered = viewer.fetch(&query).await;
        assert_eq!(filtered, "[Jan 1] ERROR[2] chan_sip.c: SIP/100-0001 failed");

        let query = LogQuery {
            level: LogLevel::All,
            ..LogQuery::default()
        };
        assert_eq!(viewer.fetch(&query).await.lines().count(), 4);
    }

    #[tokio::test]
    async fn test_empty_results_are_explained() {
        let executor = ScriptedExecutor::new().respond("tail", LOG);
        let viewer = log_viewer(executor);
        let query = LogQuery {
            level: LogLevel::Debug,
            filter: "nothing".to_string(),
            ..LogQuery::default()
        };
        assert_eq!(
            viewer.fetch(&query).await,
            "No entries matching level DEBUG in the last 50 lines with filter 'nothing'"
        );

        let missing = log_viewer(ScriptedExecutor::new().fail("tail", "No such file or directory"));
        assert_eq!(
            missing.fetch(&LogQuery::default()).await,
            "Unable to read /var/log/asterisk/messages: No such file or directory"
        );
    }
}
