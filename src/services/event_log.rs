//! Bounded most-recent-first event buffers and the problem-call log file

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use tracing::{debug, warn};

use crate::protocols::asterisk_cli::{extract_channel_name, UNKNOWN};
use crate::services::classifier::{classify, Severity};
use crate::Result;

/// Capacity of the live debug feed.
pub const DEBUG_FEED_CAPACITY: usize = 100;
/// Capacity of the in-memory problem-call history.
pub const PROBLEM_HISTORY_CAPACITY: usize = 50;
/// Lines returned by [`ProblemLog::tail`] when no count is given.
pub const DEFAULT_TAIL_LINES: usize = 50;

pub const NO_PROBLEM_LOGS: &str = "No problem call logs found";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Durable append-only destination for events.
pub trait EventSink: Send + Sync {
    fn append(&self, line: &str, severity: Severity) -> Result<()>;
}

/// Capped, most-recent-first sequence of event lines.
///
/// Entries are never modified after insertion. When a sink is attached every
/// pushed line is also appended to it; truncating the buffer never touches the
/// sink.
pub struct BoundedEventBuffer {
    entries: VecDeque<String>,
    capacity: usize,
    sink: Option<Arc<dyn EventSink>>,
}

impl std::fmt::Debug for BoundedEventBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedEventBuffer")
            .field("len", &self.entries.len())
            .field("capacity", &self.capacity)
            .field("persisted", &self.sink.is_some())
            .finish()
    }
}

impl BoundedEventBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            sink: None,
        }
    }

    /// Mirror every pushed line to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Prepend `entries` in order, so the last one ends up at the head.
    pub fn push<I, S>(&mut self, entries: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for entry in entries {
            let entry = entry.into();
            if let Some(sink) = &self.sink {
                if let Err(e) = sink.append(&entry, classify(&entry)) {
                    warn!("Failed to persist event: {}", e);
                }
            }
            self.entries.push_front(entry);
        }
        self.entries.truncate(self.capacity);
    }

    /// The `limit` most recent entries, newest first, one per line.
    pub fn render(&self, limit: usize) -> String {
        self.entries
            .iter()
            .take(limit)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Empty the buffer. A persisted mirror is left untouched.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}

/// Append-only problem-call log file.
#[derive(Debug, Clone)]
pub struct ProblemLog {
    path: PathBuf,
}

impl ProblemLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Format one persisted line for `line` observed at `at`.
    pub fn format_entry(line: &str, severity: Severity, at: DateTime<Local>) -> String {
        format!(
            "[{}] [{}] Channel: {} | Problem: {} | Details: {}",
            at.format(TIMESTAMP_FORMAT),
            severity,
            extract_channel_name(line).unwrap_or(UNKNOWN),
            severity.description(),
            line.trim()
        )
    }

    /// Persist one classified line.
    pub fn record(&self, line: &str, severity: Severity) -> Result<()> {
        let mut entry = Self::format_entry(line, severity, Local::now());
        entry.push('\n');
        self.write(&entry)
    }

    /// Write the header block marking the start of a logging session.
    pub fn write_banner(&self, mode: &str, filter: &str) -> Result<()> {
        let banner = format!(
            "=== PROBLEM CALL LOGGING STARTED ===\nTime: {}\nDebug Mode: {}\nFilter: {}\n====================================\n\n",
            Local::now().format(TIMESTAMP_FORMAT),
            mode,
            filter
        );
        self.write(&banner)
    }

    /// The last `lines` lines of the file, or a notice when there are none.
    pub fn tail(&self, lines: usize) -> Result<String> {
        if !self.path.exists() {
            return Ok(NO_PROBLEM_LOGS.to_string());
        }

        let content = std::fs::read_to_string(&self.path)?;
        let all: Vec<&str> = content.lines().collect();
        if all.iter().all(|l| l.trim().is_empty()) {
            return Ok(NO_PROBLEM_LOGS.to_string());
        }

        let start = all.len().saturating_sub(lines);
        Ok(all[start..].join("\n"))
    }

    /// Empty the file. Only done on explicit request.
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::write(&self.path, b"")?;
        }
        debug!("Cleared problem log {}", self.path.display());
        Ok(())
    }

    fn write(&self, text: &str) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(text.as_bytes())?;
        Ok(())
    }
}

impl EventSink for ProblemLog {
    fn append(&self, line: &str, severity: Severity) -> Result<()> {
        self.record(line, severity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemorySink {
        lines: Mutex<Vec<(String, Severity)>>,
    }

    impl EventSink for MemorySink {
        fn append(&self, line: &str, severity: Severity) -> Result<()> {
            self.lines.lock().unwrap().push((line.to_string(), severity));
            Ok(())
        }
    }

    #[test]
    fn test_push_is_most_recent_first() {
        let mut buffer = BoundedEventBuffer::new(10);
        buffer.push(["one", "two"]);
        buffer.push(["three"]);

        let entries: Vec<&str> = buffer.iter().collect();
        assert_eq!(entries, vec!["three", "two", "one"]);
        assert_eq!(buffer.render(2), "three\ntwo");
    }

    #[test]
    fn test_overflow_keeps_most_recent() {
        let mut buffer = BoundedEventBuffer::new(DEBUG_FEED_CAPACITY);
        buffer.push((1..=105).map(|i| format!("line {}", i)));

        assert_eq!(buffer.len(), 100);
        let entries: Vec<&str> = buffer.iter().collect();
        assert_eq!(entries.first(), Some(&"line 105"));
        assert_eq!(entries.last(), Some(&"line 6"));
    }

    #[test]
    fn test_sink_sees_every_line_and_survives_clear() {
        let sink = Arc::new(MemorySink::default());
        let mut buffer = BoundedEventBuffer::new(2).with_sink(sink.clone());

        buffer.push(["WARNING: jitter", "call failed", "jitter 40ms"]);
        assert_eq!(buffer.len(), 2);
        buffer.clear();
        assert!(buffer.is_empty());

        let persisted = sink.lines.lock().unwrap();
        assert_eq!(persisted.len(), 3);
        assert_eq!(persisted[1].1, Severity::Error);
        assert_eq!(persisted[2].1, Severity::AudioIssue);
    }

    #[test]
    fn test_format_entry() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();
        let entry = ProblemLog::format_entry(
            "  jitter on SIP/trunk-0001 above threshold ",
            Severity::AudioIssue,
            at,
        );
        assert_eq!(
            entry,
            "[2024-03-09 14:05:00] [AUDIO_ISSUE] Channel: SIP/trunk-0001 | Problem: Audio quality degradation | Details: jitter on SIP/trunk-0001 above threshold"
        );

        let entry = ProblemLog::format_entry("timeout", Severity::Warning, at);
        assert!(entry.contains("Channel: unknown"));
    }

    #[test]
    fn test_problem_log_append_tail_clear() {
        let dir = tempfile::tempdir().unwrap();
        let log = ProblemLog::new(dir.path().join("logs").join("problem-calls.log"));

        assert_eq!(log.tail(DEFAULT_TAIL_LINES).unwrap(), NO_PROBLEM_LOGS);

        log.write_banner("audio", "jitter|packet loss").unwrap();
        for i in 0..5 {
            log.record(&format!("call {} failed", i), Severity::Error).unwrap();
        }

        let tail = log.tail(2).unwrap();
        let lines: Vec<&str> = tail.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("Details: call 3 failed"));
        assert!(lines[1].ends_with("Details: call 4 failed"));

        let full = std::fs::read_to_string(log.path()).unwrap();
        assert!(full.starts_with("=== PROBLEM CALL LOGGING STARTED ==="));
        assert!(full.contains("Debug Mode: audio"));

        log.clear().unwrap();
        assert_eq!(log.tail(DEFAULT_TAIL_LINES).unwrap(), NO_PROBLEM_LOGS);
    }

    #[test]
    fn test_buffer_clear_leaves_file_intact() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(ProblemLog::new(dir.path().join("problem-calls.log")));
        let mut buffer = BoundedEventBuffer::new(PROBLEM_HISTORY_CAPACITY).with_sink(log.clone());

        buffer.push(["ERROR: reject"]);
        buffer.clear();

        let tail = log.tail(DEFAULT_TAIL_LINES).unwrap();
        assert!(tail.contains("[ERROR]"));
        assert!(tail.ends_with("Details: ERROR: reject"));
    }

    proptest! {
        #[test]
        fn prop_buffer_retains_most_recent(
            capacity in 1usize..64,
            batches in prop::collection::vec(1usize..20, 1..20),
        ) {
            let mut buffer = BoundedEventBuffer::new(capacity);
            let mut pushed = Vec::new();
            let mut counter = 0;
            for size in batches {
                let batch: Vec<String> = (0..size)
                    .map(|_| {
                        counter += 1;
                        counter.to_string()
                    })
                    .collect();
                pushed.extend(batch.clone());
                buffer.push(batch);
            }

            prop_assert!(buffer.len() <= capacity);
            let expected: Vec<String> = pushed.iter().rev().take(capacity).cloned().collect();
            let actual: Vec<String> = buffer.iter().map(str::to_string).collect();
            prop_assert_eq!(actual, expected);
        }
    }
}
