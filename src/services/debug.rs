//! Live PBX debug capture
//!
//! A [`DebugSession`] is either stopped or running in one [`DebugMode`].
//! Starting enables PBX debug output and spawns a single poller task; the
//! poller never touches session state and only sends [`DebugEvent`]s, which
//! the owning loop applies with [`DebugSession::apply`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::services::classifier::{self, classify, FilterPreset};
use crate::services::event_log::{
    BoundedEventBuffer, ProblemLog, DEBUG_FEED_CAPACITY, PROBLEM_HISTORY_CAPACITY,
};
use crate::services::executor::{CommandExecutor, CommandResult};
use crate::Result;

pub const LOG_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const AUDIO_POLL_INTERVAL: Duration = Duration::from_secs(3);
const FIRST_POLL_DELAY: Duration = Duration::from_secs(1);

pub const WAITING_PLACEHOLDER: &str = "... waiting for debug events ...";

/// PBX CLI commands that turn every debug facility off.
pub const DISABLE_COMMANDS: &[&str] = &[
    "sip set debug off",
    "rtp set debug off",
    "rtcp set debug off",
    "core set debug 0",
    "jitterbuffer set debug off",
];

const AUDIO_STAT_COMMANDS: &[(&str, &str)] = &[
    (
        "RTP Statistics",
        "asterisk -rx 'rtp show stats' 2>/dev/null | head -10",
    ),
    (
        "RTP Sessions",
        "asterisk -rx 'rtp show peers' 2>/dev/null | head -10",
    ),
    (
        "Codec Status",
        "asterisk -rx 'core show translation' 2>/dev/null | grep -E '(ulaw|alaw|gsm|g729)'",
    ),
    (
        "Jitter Buffers",
        "asterisk -rx 'jitterbuffer show' 2>/dev/null | head -5",
    ),
    (
        "Network",
        "ping -c 2 8.8.8.8 2>/dev/null | grep 'packet loss' || echo 'Network check failed'",
    ),
    (
        "CPU Load",
        "top -bn1 | grep 'Cpu(s)' | awk '{print $2}' | cut -d'%' -f1",
    ),
];

fn pbx_cli(command: &str) -> String {
    format!("asterisk -rx '{}'", command)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebugMode {
    /// SIP/RTP errors and general issues
    Basic,
    /// Audio quality: adds RTCP, jitter buffer and periodic audio statistics
    Audio,
}

impl DebugMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DebugMode::Basic => "basic",
            DebugMode::Audio => "audio",
        }
    }

    /// PBX CLI commands issued when entering this mode.
    pub fn enable_commands(&self) -> &'static [&'static str] {
        match self {
            DebugMode::Basic => &["sip set debug on", "rtp set debug on", "core set debug 1"],
            DebugMode::Audio => &[
                "sip set debug on",
                "rtp set debug on",
                "rtcp set debug on",
                "core set debug 3",
                "jitterbuffer set debug on",
            ],
        }
    }

    fn banner(&self, preset: FilterPreset, logging: bool, log_file: &str) -> String {
        let state = if logging { "ENABLED" } else { "DISABLED" };
        match self {
            DebugMode::Basic => format!(
                "=== BASIC DEBUG MODE STARTED ===\nSIP Debug: ON\nRTP Debug: ON\nCore Debug: Level 1\nFilter: {}\nLogging: {}",
                preset.expression(),
                state
            ),
            DebugMode::Audio => format!(
                "=== AUDIO DEBUG MODE STARTED ===\nSIP Debug: ON\nRTP Debug: ON\nRTCP Debug: ON\nJitterbuffer Debug: ON\nCore Debug: Level 3\nFilter: {}\nLogging: {}\nLog File: {}",
                preset.expression(),
                state,
                log_file
            ),
        }
    }
}

impl std::fmt::Display for DebugMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Stopped,
    Running(DebugMode),
}

/// Output of the poller task.
#[derive(Debug, Clone, PartialEq)]
pub enum DebugEvent {
    Logs(Vec<String>),
    AudioStats(String),
}

#[derive(Debug, Clone, Copy)]
struct PollTiming {
    first: Duration,
    logs: Duration,
    audio: Duration,
}

impl Default for PollTiming {
    fn default() -> Self {
        Self {
            first: FIRST_POLL_DELAY,
            logs: LOG_POLL_INTERVAL,
            audio: AUDIO_POLL_INTERVAL,
        }
    }
}

struct Poller {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Debug capture state machine with its live feed and problem-call history.
pub struct DebugSession {
    executor: Arc<dyn CommandExecutor>,
    state: SessionState,
    logging: bool,
    preset_tx: watch::Sender<FilterPreset>,
    feed: BoundedEventBuffer,
    problems: BoundedEventBuffer,
    problem_log: Arc<ProblemLog>,
    audio_stats: String,
    event_tx: mpsc::UnboundedSender<DebugEvent>,
    event_rx: Option<mpsc::UnboundedReceiver<DebugEvent>>,
    poller: Option<Poller>,
    timing: PollTiming,
}

impl DebugSession {
    pub fn new(executor: Arc<dyn CommandExecutor>, problem_log: ProblemLog) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (preset_tx, _) = watch::channel(FilterPreset::default());
        let problem_log = Arc::new(problem_log);

        Self {
            executor,
            state: SessionState::Stopped,
            logging: false,
            preset_tx,
            feed: BoundedEventBuffer::new(DEBUG_FEED_CAPACITY),
            problems: BoundedEventBuffer::new(PROBLEM_HISTORY_CAPACITY)
                .with_sink(problem_log.clone()),
            problem_log,
            audio_stats: String::new(),
            event_tx,
            event_rx: Some(event_rx),
            poller: None,
            timing: PollTiming::default(),
        }
    }

    /// Override the poll cadence.
    pub fn with_poll_intervals(mut self, first: Duration, logs: Duration, audio: Duration) -> Self {
        self.timing = PollTiming { first, logs, audio };
        self
    }

    /// Receiver of poller events. Can be taken once.
    pub fn take_event_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<DebugEvent>> {
        self.event_rx.take()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, SessionState::Running(_))
    }

    pub fn mode(&self) -> Option<DebugMode> {
        match self.state {
            SessionState::Running(mode) => Some(mode),
            SessionState::Stopped => None,
        }
    }

    pub fn preset(&self) -> FilterPreset {
        *self.preset_tx.borrow()
    }

    pub fn logging_enabled(&self) -> bool {
        self.logging
    }

    pub fn feed(&self) -> &BoundedEventBuffer {
        &self.feed
    }

    pub fn problems(&self) -> &BoundedEventBuffer {
        &self.problems
    }

    pub fn problem_log(&self) -> &ProblemLog {
        &self.problem_log
    }

    pub fn audio_stats(&self) -> &str {
        &self.audio_stats
    }

    /// Enter `mode`, issuing its enable commands.
    ///
    /// Starting the mode that is already running does nothing. Starting a
    /// different mode stops the current one first.
    pub async fn start(&mut self, mode: DebugMode) -> Vec<CommandResult> {
        let mut results = Vec::new();
        match self.state {
            SessionState::Running(current) if current == mode => {
                debug!("Debug capture already running in {} mode", mode);
                return results;
            }
            SessionState::Running(_) => results.extend(self.stop().await),
            SessionState::Stopped => {}
        }

        info!("Starting {} debug capture", mode);
        for command in mode.enable_commands() {
            let result = self.executor.execute("Enable Debug", &pbx_cli(command)).await;
            if !result.is_success() {
                warn!("Failed to enable '{}': {}", command, result.error);
            }
            results.push(result);
        }

        let banner = mode.banner(
            self.preset(),
            self.logging,
            &self.problem_log.path().display().to_string(),
        );
        self.feed.clear();
        self.audio_stats.clear();
        self.feed.push([banner]);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(poll_loop(
            self.executor.clone(),
            mode,
            self.preset_tx.subscribe(),
            self.event_tx.clone(),
            cancel.clone(),
            self.timing,
        ));
        self.poller = Some(Poller { cancel, handle });
        self.state = SessionState::Running(mode);
        results
    }

    /// Stop capturing and issue every disable command.
    ///
    /// The disable set is sent even when stopped or when enabling failed, so
    /// the PBX is never left with debug output on.
    pub async fn stop(&mut self) -> Vec<CommandResult> {
        if let Some(poller) = self.poller.take() {
            poller.cancel.cancel();
            if let Err(e) = poller.handle.await {
                warn!("Debug poller ended abnormally: {}", e);
            }
        }

        let mut results = Vec::with_capacity(DISABLE_COMMANDS.len());
        for command in DISABLE_COMMANDS {
            let result = self.executor.execute("Disable Debug", &pbx_cli(command)).await;
            if !result.is_success() {
                warn!("Failed to disable '{}': {}", command, result.error);
            }
            results.push(result);
        }

        if self.is_running() {
            info!("Debug capture stopped");
            self.feed.push(["=== DEBUG MODE STOPPED ==="]);
        }
        self.state = SessionState::Stopped;
        self.audio_stats.clear();
        results
    }

    /// Fold one poller event into the session. Events arriving after a stop
    /// are dropped.
    pub fn apply(&mut self, event: DebugEvent) {
        match (self.state, event) {
            (SessionState::Running(_), DebugEvent::Logs(lines)) => self.apply_logs(lines),
            (SessionState::Running(DebugMode::Audio), DebugEvent::AudioStats(stats)) => {
                self.audio_stats = stats;
            }
            _ => {}
        }
    }

    fn apply_logs(&mut self, lines: Vec<String>) {
        let lines: Vec<String> = lines
            .into_iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        let kept = classifier::filter(&lines, &self.preset().keywords());
        if kept.is_empty() {
            return;
        }

        if self.logging {
            let problems: Vec<&String> = kept.iter().filter(|l| classify(l).is_problem()).collect();
            self.problems.push(problems.into_iter().cloned());
        }
        self.feed.push(kept);
    }

    /// Toggle problem-call logging, writing a banner to the log file when enabled.
    pub fn toggle_logging(&mut self) -> Result<bool> {
        if !self.logging {
            let mode = self.mode().map_or("none", |m| m.as_str());
            self.problem_log
                .write_banner(mode, self.preset().expression())?;
        }
        self.logging = !self.logging;
        info!("Problem call logging {}", if self.logging { "enabled" } else { "disabled" });
        Ok(self.logging)
    }

    /// Advance to the next filter preset; a running poller picks it up.
    pub fn cycle_filter(&mut self) -> FilterPreset {
        let next = self.preset().next();
        self.preset_tx.send_replace(next);
        next
    }

    /// Clear the live feed and audio statistics. The problem log is kept.
    pub fn clear(&mut self) {
        self.feed.clear();
        self.audio_stats.clear();
    }

    /// Poll once immediately, outside the regular cadence.
    ///
    /// The capture runs on a spawned task and its results arrive on the event
    /// receiver like any poller output. Returns false when no capture is running.
    pub fn refresh(&self) -> bool {
        let Some(mode) = self.mode() else {
            return false;
        };
        let executor = self.executor.clone();
        let tx = self.event_tx.clone();
        let preset = self.preset();
        tokio::spawn(async move {
            let lines = capture_logs(executor.as_ref(), preset).await;
            if tx.send(DebugEvent::Logs(lines)).is_err() {
                return;
            }
            if mode == DebugMode::Audio {
                let stats = audio_stats_report(executor.as_ref()).await;
                if tx.send(DebugEvent::AudioStats(stats)).is_err() {
                    debug!("Debug event receiver dropped before audio refresh");
                }
            }
        });
        true
    }

    /// Numbered problem-call history, newest first.
    pub fn problem_history_report(&self) -> String {
        if self.problems.is_empty() {
            return "No problem calls recorded yet.".to_string();
        }

        let mut report = String::from("=== PROBLEM CALLS HISTORY ===\n\n");
        for (i, entry) in self.problems.iter().enumerate() {
            report.push_str(&format!("{}. {}\n", i + 1, entry));
        }
        report.push_str(&format!(
            "\nTotal: {} problem calls logged",
            self.problems.len()
        ));
        report
    }
}

fn log_capture_command(preset: FilterPreset) -> String {
    match preset.expression() {
        "" => "timeout 5 asterisk -rvvv 2>&1 | head -20 || echo 'No debug output'".to_string(),
        expression => format!(
            "timeout 5 asterisk -rvvv 2>&1 | grep -iE '{}' | head -20 || echo 'No debug output'",
            expression
        ),
    }
}

async fn capture_logs(executor: &dyn CommandExecutor, preset: FilterPreset) -> Vec<String> {
    let result = executor
        .execute("Debug Logs", &log_capture_command(preset))
        .await;
    match result.output() {
        Some(out) if !out.is_empty() => out.lines().map(str::to_string).collect(),
        _ => vec![WAITING_PLACEHOLDER.to_string()],
    }
}

/// Audio quality report; sections whose command failed or printed nothing are omitted.
pub async fn audio_stats_report(executor: &dyn CommandExecutor) -> String {
    let mut report = String::from("=== AUDIO QUALITY STATS ===\n");
    for (name, command) in AUDIO_STAT_COMMANDS {
        let result = executor.execute(name, command).await;
        let Some(out) = result.output().filter(|o| !o.is_empty()) else {
            continue;
        };
        if *name == "CPU Load" {
            report.push_str(&format!("\nCPU Load: {}%\n", out));
        } else {
            report.push_str(&format!("\n{}:\n{}\n", name, out));
        }
    }
    report
}

async fn until_cancelled<F: Future>(cancel: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        _ = cancel.cancelled() => None,
        out = fut => Some(out),
    }
}

async fn poll_loop(
    executor: Arc<dyn CommandExecutor>,
    mode: DebugMode,
    preset_rx: watch::Receiver<FilterPreset>,
    tx: mpsc::UnboundedSender<DebugEvent>,
    cancel: CancellationToken,
    timing: PollTiming,
) {
    let start = Instant::now() + timing.first;
    let mut log_tick = interval_at(start, timing.logs);
    let mut audio_tick = interval_at(start, timing.audio);
    log_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    audio_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    debug!("Debug poller started in {} mode", mode);
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            _ = log_tick.tick() => {
                let preset = *preset_rx.borrow();
                until_cancelled(&cancel, capture_logs(executor.as_ref(), preset))
                    .await
                    .map(DebugEvent::Logs)
            }
            _ = audio_tick.tick(), if mode == DebugMode::Audio => {
                until_cancelled(&cancel, audio_stats_report(executor.as_ref()))
                    .await
                    .map(DebugEvent::AudioStats)
            }
        };

        match event {
            Some(event) => {
                if tx.send(event).is_err() {
                    break;
                }
            }
            None => break,
        }
    }
    debug!("Debug poller finished at {}", Local::now().format("%H:%M:%S"));
}
