//! Line classification, keyword filtering and highlighting
//!
//! Classification and filtering operate on the raw text. Highlighting only
//! splits a line into tagged segments for display and never changes its text.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Severity tag derived from a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Error,
    Warning,
    AudioIssue,
    NetworkIssue,
    Notice,
    Debug,
    Verbose,
    /// Unclassified
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::AudioIssue => "AUDIO_ISSUE",
            Severity::NetworkIssue => "NETWORK_ISSUE",
            Severity::Notice => "NOTICE",
            Severity::Debug => "DEBUG",
            Severity::Verbose => "VERBOSE",
            Severity::Info => "INFO",
        }
    }

    /// Human readable problem description used in the persisted log.
    pub fn description(&self) -> &'static str {
        match self {
            Severity::Error => "Call error",
            Severity::Warning => "Call warning",
            Severity::AudioIssue => "Audio quality degradation",
            Severity::NetworkIssue => "Network packet loss",
            Severity::Notice => "Notice",
            Severity::Debug => "Debug event",
            Severity::Verbose => "Verbose event",
            Severity::Info => "Informational",
        }
    }

    /// Severities that count as a problem call.
    pub fn is_problem(&self) -> bool {
        matches!(
            self,
            Severity::Error | Severity::Warning | Severity::AudioIssue | Severity::NetworkIssue
        )
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a lowercase keyword to a severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassificationRule {
    pub keyword: &'static str,
    pub severity: Severity,
}

const fn rule(keyword: &'static str, severity: Severity) -> ClassificationRule {
    ClassificationRule { keyword, severity }
}

/// Rules in priority order; the first matching rule decides the severity.
pub const CLASSIFICATION_RULES: &[ClassificationRule] = &[
    rule("error", Severity::Error),
    rule("failed", Severity::Error),
    rule("reject", Severity::Error),
    rule("warning", Severity::Warning),
    rule("deprecated", Severity::Warning),
    rule("jitter", Severity::AudioIssue),
    rule("underrun", Severity::AudioIssue),
    rule("out of order", Severity::AudioIssue),
    rule("packet loss", Severity::NetworkIssue),
    rule("unreachable", Severity::NetworkIssue),
    rule("notice", Severity::Notice),
    rule("debug", Severity::Debug),
    rule("verbose", Severity::Verbose),
];

/// Classify one line. Matching is case-insensitive.
pub fn classify(line: &str) -> Severity {
    let lowered = line.to_lowercase();
    CLASSIFICATION_RULES
        .iter()
        .find(|rule| lowered.contains(rule.keyword))
        .map(|rule| rule.severity)
        .unwrap_or(Severity::Info)
}

/// True when `line` contains any of `keywords`, ignoring case.
pub fn contains_any<S: AsRef<str>>(line: &str, keywords: &[S]) -> bool {
    let lowered = line.to_lowercase();
    keywords
        .iter()
        .any(|keyword| lowered.contains(&keyword.as_ref().to_lowercase()))
}

/// Keep the lines containing at least one keyword. No keywords keeps everything.
pub fn filter<L: AsRef<str>, K: AsRef<str>>(lines: &[L], keywords: &[K]) -> Vec<String> {
    lines
        .iter()
        .filter(|line| keywords.is_empty() || contains_any(line.as_ref(), keywords))
        .map(|line| line.as_ref().to_string())
        .collect()
}

/// Split a `|` separated filter expression into keywords.
pub fn parse_keywords(expression: &str) -> Vec<String> {
    expression
        .split('|')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

/// Level selector of the log viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    All,
    Error,
    Warning,
    Notice,
    Debug,
    Verbose,
}

impl LogLevel {
    pub const ALL_LEVELS: [LogLevel; 6] = [
        LogLevel::All,
        LogLevel::Error,
        LogLevel::Warning,
        LogLevel::Notice,
        LogLevel::Debug,
        LogLevel::Verbose,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::All => "ALL",
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARNING",
            LogLevel::Notice => "NOTICE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Verbose => "VERBOSE",
        }
    }

    /// Keyword group a line must match to pass this level. Empty for `All`.
    pub fn keywords(&self) -> Vec<&'static str> {
        let severity = match self {
            LogLevel::All => return Vec::new(),
            LogLevel::Error => Severity::Error,
            LogLevel::Warning => Severity::Warning,
            LogLevel::Notice => Severity::Notice,
            LogLevel::Debug => Severity::Debug,
            LogLevel::Verbose => Severity::Verbose,
        };
        CLASSIFICATION_RULES
            .iter()
            .filter(|rule| rule.severity == severity)
            .map(|rule| rule.keyword)
            .collect()
    }

    pub fn matches(&self, line: &str) -> bool {
        let keywords = self.keywords();
        keywords.is_empty() || contains_any(line, &keywords)
    }

    pub fn next(&self) -> LogLevel {
        let index = Self::ALL_LEVELS.iter().position(|l| l == self).unwrap_or(0);
        Self::ALL_LEVELS[(index + 1) % Self::ALL_LEVELS.len()]
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL_LEVELS
            .iter()
            .copied()
            .find(|level| level.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::parse(format!("Unknown log level: {}", s)))
    }
}

/// Keep the lines passing `level`.
pub fn filter_level<L: AsRef<str>>(lines: &[L], level: LogLevel) -> Vec<String> {
    lines
        .iter()
        .filter(|line| level.matches(line.as_ref()))
        .map(|line| line.as_ref().to_string())
        .collect()
}

/// Filter presets of the live debug feed, cycled with one key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterPreset {
    #[default]
    Problems,
    Audio,
    None,
}

impl FilterPreset {
    pub fn expression(&self) -> &'static str {
        match self {
            FilterPreset::Problems => {
                "ERROR|WARNING|failed|reject|timeout|busy|congestion|jitter|packet loss"
            }
            FilterPreset::Audio => "jitter|packet loss|dropped|out of order|buffer",
            FilterPreset::None => "",
        }
    }

    pub fn keywords(&self) -> Vec<String> {
        parse_keywords(self.expression())
    }

    pub fn label(&self) -> &'static str {
        match self {
            FilterPreset::Problems => "problems",
            FilterPreset::Audio => "audio",
            FilterPreset::None => "none",
        }
    }

    pub fn next(&self) -> FilterPreset {
        match self {
            FilterPreset::Problems => FilterPreset::Audio,
            FilterPreset::Audio => FilterPreset::None,
            FilterPreset::None => FilterPreset::Problems,
        }
    }
}

/// Display category of a highlighted fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Highlight {
    Critical,
    Warning,
    Info,
}

/// A fragment of a line, optionally tagged for emphasis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub highlight: Option<Highlight>,
}

impl Segment {
    fn plain(text: &str) -> Self {
        Self {
            text: text.to_string(),
            highlight: None,
        }
    }
}

pub const CRITICAL_KEYWORDS: &[&str] = &[
    "jitter",
    "packet loss",
    "dropped",
    "out of order",
    "buffer over",
    "underrun",
];
pub const WARNING_KEYWORDS: &[&str] = &["WARNING", "failed", "reject", "timeout", "busy", "congestion"];
pub const INFO_KEYWORDS: &[&str] = &["RTCP", "RTP", "JitterBuffer", "Codec"];

static HIGHLIGHTER: Lazy<Regex> = Lazy::new(|| {
    let group = |keywords: &[&str]| {
        keywords
            .iter()
            .map(|k| regex::escape(k))
            .collect::<Vec<_>>()
            .join("|")
    };
    let pattern = format!(
        "(?i)(?P<critical>{})|(?P<warning>{})|(?P<info>{})",
        group(CRITICAL_KEYWORDS),
        group(WARNING_KEYWORDS),
        group(INFO_KEYWORDS)
    );
    Regex::new(&pattern).expect("highlight keywords are escaped")
});

/// Split a line into segments, tagging keyword occurrences.
///
/// At one position critical keywords win over warnings, and warnings over
/// info. Joining the segment texts yields the input unchanged.
pub fn highlight(line: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut cursor = 0;

    for caps in HIGHLIGHTER.captures_iter(line) {
        let (m, tag) = if let Some(m) = caps.name("critical") {
            (m, Highlight::Critical)
        } else if let Some(m) = caps.name("warning") {
            (m, Highlight::Warning)
        } else if let Some(m) = caps.name("info") {
            (m, Highlight::Info)
        } else {
            continue;
        };

        if m.start() > cursor {
            segments.push(Segment::plain(&line[cursor..m.start()]));
        }
        segments.push(Segment {
            text: m.as_str().to_string(),
            highlight: Some(tag),
        });
        cursor = m.end();
    }

    if cursor < line.len() || segments.is_empty() {
        segments.push(Segment::plain(&line[cursor..]));
    }
    segments
}
