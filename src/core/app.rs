//! Application state and input dispatch for the dashboard

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::state::{
    BackupState, ChannelsState, DashboardState, DebugState, DebugView, LogsState, Notice,
    RunState, SecurityState, SettingsForm,
};
use crate::config::{ConfigManager, MonitorConfig};
use crate::protocols::asterisk_cli::ChannelRecord;
use crate::services::backup::BackupManager;
use crate::services::collector::{SnapshotSource, SystemSnapshot};
use crate::services::debug::{DebugMode, DebugSession};
use crate::services::diagnostics::{DiagnosticKind, DiagnosticPlan, DiagnosticsRunner};
use crate::services::event_log::{ProblemLog, DEFAULT_TAIL_LINES};
use crate::services::executor::{CommandExecutor, CommandResult};
use crate::services::logs::LogViewer;
use crate::services::security::{ScanKind, SecurityScanner, SecurityScore};

/// Top-level screens, reachable with the digit keys 1 to 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Dashboard,
    Diagnostics,
    Channels,
    Logs,
    Security,
    Backup,
    Settings,
    Debug,
}

impl Screen {
    pub const ALL: [Screen; 8] = [
        Screen::Dashboard,
        Screen::Diagnostics,
        Screen::Channels,
        Screen::Logs,
        Screen::Security,
        Screen::Backup,
        Screen::Settings,
        Screen::Debug,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Screen::Dashboard => "Dashboard",
            Screen::Diagnostics => "Diagnostics",
            Screen::Channels => "Channels",
            Screen::Logs => "Logs",
            Screen::Security => "Security",
            Screen::Backup => "Backup",
            Screen::Settings => "Settings",
            Screen::Debug => "Debug",
        }
    }

    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).unwrap_or(0)
    }

    pub fn from_digit(c: char) -> Option<Screen> {
        let index = c.to_digit(10)? as usize;
        index.checked_sub(1).and_then(|i| Self::ALL.get(i)).copied()
    }
}

/// Long-running work whose results stream back step by step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Diagnostics,
    Security,
    Backup,
    Restore,
}

/// Completions sent by spawned work to the event loop.
#[derive(Debug, Clone)]
pub enum AppMessage {
    Snapshot(Box<SystemSnapshot>),
    Channels(Vec<ChannelRecord>),
    TaskStep(Task, CommandResult),
    TaskFinished(Task),
    BackupCreated(PathBuf),
    Logs(String),
    BackupListing { listing: String, stats: String },
}

pub struct App {
    screen: Screen,
    should_quit: bool,
    config: ConfigManager,
    executor: Arc<dyn CommandExecutor>,
    source: Arc<dyn SnapshotSource>,
    message_tx: mpsc::UnboundedSender<AppMessage>,
    message_rx: Option<mpsc::UnboundedReceiver<AppMessage>>,

    pub dashboard: DashboardState,
    pub diagnostics: RunState,
    pub channels: ChannelsState,
    pub logs: LogsState,
    pub security: SecurityState,
    pub backup: BackupState,
    pub settings: SettingsForm,
    pub debug: DebugState,
}

impl App {
    pub fn new(
        config: ConfigManager,
        executor: Arc<dyn CommandExecutor>,
        source: Arc<dyn SnapshotSource>,
    ) -> Self {
        let (message_tx, message_rx) = mpsc::unbounded_channel();
        let current = config.get().clone();
        let session = DebugSession::new(executor.clone(), ProblemLog::new(&current.paths.problem_log));

        Self {
            screen: Screen::Dashboard,
            should_quit: false,
            executor,
            source,
            message_tx,
            message_rx: Some(message_rx),
            dashboard: DashboardState::new(current.monitoring.enable_alerts),
            diagnostics: RunState::default(),
            channels: ChannelsState::default(),
            logs: LogsState::default(),
            security: SecurityState::default(),
            backup: BackupState::new(&current.paths.backup_dir),
            settings: SettingsForm::from_config(&current),
            debug: DebugState::new(session),
            config,
        }
    }

    pub fn take_message_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<AppMessage>> {
        self.message_rx.take()
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn config(&self) -> &MonitorConfig {
        self.config.get()
    }

    pub fn config_path(&self) -> &std::path::Path {
        self.config.path()
    }

    /// True while keystrokes go to a text field instead of commands.
    pub fn is_editing(&self) -> bool {
        match self.screen {
            Screen::Logs => self.logs.editing,
            Screen::Backup => self.backup.editing,
            Screen::Settings => self.settings.editing,
            _ => false,
        }
    }

    fn step_delay(&self) -> Duration {
        Duration::from_millis(self.config.get().monitoring.step_delay_ms)
    }

    fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.config.get().monitoring.refresh_interval)
    }

    fn send(tx: &mpsc::UnboundedSender<AppMessage>, message: AppMessage) {
        if tx.send(message).is_err() {
            debug!("Event loop gone, dropping message");
        }
    }

    /// Kick off the first refresh.
    pub fn start(&mut self) {
        self.request_refresh();
    }

    /// Periodic refresh driven by the one-second tick.
    pub fn on_tick(&mut self) {
        let due = self
            .dashboard
            .last_refresh
            .map_or(true, |at| at.elapsed() >= self.refresh_interval());
        if due {
            self.request_refresh();
        }
    }

    pub fn request_refresh(&mut self) {
        if self.dashboard.refreshing {
            return;
        }
        self.dashboard.refreshing = true;
        self.dashboard.last_refresh = Some(Instant::now());

        let source = self.source.clone();
        let tx = self.message_tx.clone();
        let with_channels = self.screen == Screen::Channels;
        tokio::spawn(async move {
            let snapshot = source.collect().await;
            Self::send(&tx, AppMessage::Snapshot(Box::new(snapshot)));
            if with_channels {
                Self::send(&tx, AppMessage::Channels(source.channels().await));
            }
        });
    }

    fn refresh_channels(&self) {
        let source = self.source.clone();
        let tx = self.message_tx.clone();
        tokio::spawn(async move {
            Self::send(&tx, AppMessage::Channels(source.channels().await));
        });
    }

    fn run_diagnostics(&mut self, kind: DiagnosticKind) {
        let label = match kind {
            DiagnosticKind::Quick => "Quick diagnostics",
            DiagnosticKind::Full => "Full diagnostics",
        };
        if !self.diagnostics.begin(label) {
            return;
        }

        let runner = DiagnosticsRunner::new(self.executor.clone(), self.source.clone(), self.step_delay());
        let tx = self.message_tx.clone();
        tokio::spawn(async move {
            let plan = DiagnosticPlan::for_kind(kind);
            runner
                .run(&plan, |result| {
                    Self::send(&tx, AppMessage::TaskStep(Task::Diagnostics, result.clone()))
                })
                .await;
            Self::send(&tx, AppMessage::TaskFinished(Task::Diagnostics));
        });
    }

    fn run_security(&mut self, kind: ScanKind) {
        let label = match kind {
            ScanKind::Quick => "Quick security scan",
            ScanKind::Full => "Full security audit",
        };
        if !self.security.run.begin(label) {
            return;
        }
        self.security.score = None;

        let scanner = SecurityScanner::new(
            self.executor.clone(),
            self.config.get().security.clone(),
            self.step_delay(),
        );
        let tx = self.message_tx.clone();
        tokio::spawn(async move {
            scanner
                .scan(kind, |result| {
                    Self::send(&tx, AppMessage::TaskStep(Task::Security, result.clone()))
                })
                .await;
            Self::send(&tx, AppMessage::TaskFinished(Task::Security));
        });
    }

    fn create_backup(&mut self) {
        if !self.backup.run.begin("Backup") {
            return;
        }
        let destination = self.backup.destination.value().to_string();
        let manager = BackupManager::new(self.executor.clone(), self.step_delay());
        let tx = self.message_tx.clone();
        tokio::spawn(async move {
            let report = manager
                .create_backup(&destination, |result| {
                    Self::send(&tx, AppMessage::TaskStep(Task::Backup, result.clone()))
                })
                .await;
            if let Some(archive) = report.archive.filter(|_| report.succeeded) {
                Self::send(&tx, AppMessage::BackupCreated(archive));
            }
            Self::send(&tx, AppMessage::TaskFinished(Task::Backup));
        });
    }

    fn restore_backup(&mut self) {
        let archive = self.backup.restore_path.value().trim().to_string();
        if archive.is_empty() {
            self.backup.notice = Some(Notice::error("Enter a backup file to restore first"));
            return;
        }
        if !self.backup.run.begin("Restore") {
            return;
        }
        warn!("Restoring PBX configuration from {}", archive);

        let manager = BackupManager::new(self.executor.clone(), self.step_delay());
        let tx = self.message_tx.clone();
        tokio::spawn(async move {
            manager
                .restore_backup(&archive, |result| {
                    Self::send(&tx, AppMessage::TaskStep(Task::Restore, result.clone()))
                })
                .await;
            Self::send(&tx, AppMessage::TaskFinished(Task::Restore));
        });
    }

    fn list_backups(&self) {
        let dir = match self.backup.destination.value().trim() {
            "" => self.config.get().paths.backup_dir.clone(),
            dir => dir.to_string(),
        };
        let manager = BackupManager::new(self.executor.clone(), Duration::ZERO);
        let tx = self.message_tx.clone();
        tokio::spawn(async move {
            let listing = manager.list_backups(&dir).await;
            let stats = manager.backup_stats(&dir).await;
            Self::send(&tx, AppMessage::BackupListing { listing, stats });
        });
    }

    fn load_logs(&mut self) {
        let query = self.logs.commit();
        self.logs.loading = true;
        let viewer = LogViewer::new(self.executor.clone(), &self.config.get().paths.pbx_log);
        let tx = self.message_tx.clone();
        tokio::spawn(async move {
            Self::send(&tx, AppMessage::Logs(viewer.fetch(&query).await));
        });
    }

    /// Fold a completion into the screen state.
    pub fn apply(&mut self, message: AppMessage) {
        match message {
            AppMessage::Snapshot(snapshot) => {
                self.dashboard.refreshing = false;
                let raised = self.dashboard.alerts.observe(&snapshot);
                if raised > 0 {
                    warn!(raised, "Threshold alerts raised");
                }
                self.dashboard.snapshot = Some(*snapshot);
            }
            AppMessage::Channels(channels) => self.channels.replace(channels),
            AppMessage::TaskStep(task, result) => self.run_state(task).push(result),
            AppMessage::TaskFinished(task) => {
                self.run_state(task).finish();
                match task {
                    Task::Security => {
                        self.security.score = SecurityScore::from_results(&self.security.run.results);
                    }
                    Task::Backup | Task::Restore => self.list_backups(),
                    Task::Diagnostics => {}
                }
                info!("{:?} run finished", task);
            }
            AppMessage::BackupCreated(archive) => {
                self.backup.restore_path.set_value(archive.display().to_string());
                self.backup.last_archive = Some(archive);
            }
            AppMessage::Logs(output) => {
                self.logs.loading = false;
                self.logs.output = output;
            }
            AppMessage::BackupListing { listing, stats } => {
                self.backup.listing = listing;
                self.backup.stats = stats;
            }
        }
    }

    fn run_state(&mut self, task: Task) -> &mut RunState {
        match task {
            Task::Diagnostics => &mut self.diagnostics,
            Task::Security => &mut self.security.run,
            Task::Backup | Task::Restore => &mut self.backup.run,
        }
    }

    pub fn switch_to(&mut self, screen: Screen) {
        if self.screen == screen {
            return;
        }
        debug!("Switching to {} screen", screen.title());
        self.screen = screen;
        match screen {
            Screen::Channels => self.refresh_channels(),
            Screen::Logs if self.logs.output.is_empty() && !self.logs.loading => self.load_logs(),
            Screen::Backup if self.backup.listing.is_empty() => self.list_backups(),
            Screen::Settings => {
                self.settings.reload(self.config.get());
                self.settings.notice = None;
            }
            _ => {}
        }
    }

    pub async fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }
        if self.is_editing() {
            self.handle_edit_key(key);
            return;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => {
                self.should_quit = true;
                return;
            }
            KeyCode::Char(c) => {
                if let Some(screen) = Screen::from_digit(c) {
                    self.switch_to(screen);
                    return;
                }
            }
            _ => {}
        }

        match self.screen {
            Screen::Dashboard => self.dashboard_key(key),
            Screen::Diagnostics => self.diagnostics_key(key),
            Screen::Channels => self.channels_key(key),
            Screen::Logs => self.logs_key(key),
            Screen::Security => self.security_key(key),
            Screen::Backup => self.backup_key(key),
            Screen::Settings => self.settings_key(key),
            Screen::Debug => self.debug_key(key).await,
        }
    }

    fn handle_edit_key(&mut self, key: KeyEvent) {
        let submit = key.code == KeyCode::Enter;
        match key.code {
            KeyCode::Esc | KeyCode::Enter => match self.screen {
                Screen::Logs => self.logs.editing = false,
                Screen::Backup => self.backup.editing = false,
                Screen::Settings => self.settings.editing = false,
                _ => {}
            },
            KeyCode::Tab => match self.screen {
                Screen::Logs => self.logs.toggle_focus(),
                Screen::Backup => self.backup.toggle_focus(),
                Screen::Settings => self.settings.focus_next(),
                _ => {}
            },
            _ => {
                let input = match self.screen {
                    Screen::Logs => self.logs.focused_input(),
                    Screen::Backup => self.backup.focused_input(),
                    Screen::Settings => self.settings.focused_input(),
                    _ => return,
                };
                input.handle_key(key);
            }
        }
        if submit && self.screen == Screen::Logs {
            self.load_logs();
        }
    }

    fn dashboard_key(&mut self, key: KeyEvent) {
        if matches!(key.code, KeyCode::Char('r') | KeyCode::Char('R')) {
            self.request_refresh();
        }
    }

    fn diagnostics_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('r') | KeyCode::Char('R') => self.run_diagnostics(DiagnosticKind::Quick),
            KeyCode::Char('f') | KeyCode::Char('F') => self.run_diagnostics(DiagnosticKind::Full),
            KeyCode::Char('c') | KeyCode::Char('C') => self.diagnostics.clear(),
            _ => {}
        }
    }

    fn channels_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('r') | KeyCode::Char('R') => self.refresh_channels(),
            KeyCode::Down | KeyCode::Char('j') => self.channels.select_next(),
            KeyCode::Up | KeyCode::Char('k') => self.channels.select_previous(),
            _ => {}
        }
    }

    fn logs_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('e') | KeyCode::Char('i') => self.logs.editing = true,
            KeyCode::Tab => self.logs.toggle_focus(),
            KeyCode::Char('v') | KeyCode::Char('V') => {
                self.logs.query.level = self.logs.query.level.next();
                self.load_logs();
            }
            KeyCode::Enter | KeyCode::Char('r') | KeyCode::Char('R') => self.load_logs(),
            _ => {}
        }
    }

    fn security_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('r') | KeyCode::Char('R') => self.run_security(ScanKind::Quick),
            KeyCode::Char('f') | KeyCode::Char('F') => self.run_security(ScanKind::Full),
            KeyCode::Char('c') | KeyCode::Char('C') => {
                self.security.run.clear();
                if !self.security.run.running {
                    self.security.score = None;
                }
            }
            _ => {}
        }
    }

    fn backup_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('e') | KeyCode::Char('i') => self.backup.editing = true,
            KeyCode::Tab => self.backup.toggle_focus(),
            KeyCode::Char('b') | KeyCode::Char('B') => self.create_backup(),
            KeyCode::Char('r') | KeyCode::Char('R') => self.restore_backup(),
            KeyCode::Char('l') | KeyCode::Char('L') => self.list_backups(),
            KeyCode::Char('c') | KeyCode::Char('C') => self.backup.clear(),
            _ => {}
        }
    }

    fn settings_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('e') | KeyCode::Char('i') | KeyCode::Enter => {
                self.settings.editing = true;
            }
            KeyCode::Tab | KeyCode::Down | KeyCode::Char('j') => self.settings.focus_next(),
            KeyCode::BackTab | KeyCode::Up | KeyCode::Char('k') => self.settings.focus_previous(),
            KeyCode::Char('s') | KeyCode::Char('S') => self.save_settings(),
            KeyCode::Char('r') | KeyCode::Char('R') => self.reset_settings(),
            _ => {}
        }
    }

    pub fn save_settings(&mut self) {
        let updated = match self.settings.to_config(self.config.get()) {
            Ok(config) => config,
            Err(e) => {
                self.settings.notice = Some(Notice::error(e.to_string()));
                return;
            }
        };

        match self.config.update(updated) {
            Ok(()) => {
                info!("Settings saved to {}", self.config.path().display());
                self.dashboard
                    .alerts
                    .set_enabled(self.config.get().monitoring.enable_alerts);
                self.settings.notice = Some(Notice::ok("Settings saved successfully"));
            }
            Err(e) => {
                error!("Failed to save settings: {}", e);
                self.settings.notice = Some(Notice::error(format!("Failed to save settings: {}", e)));
            }
        }
    }

    pub fn reset_settings(&mut self) {
        match self.config.create_default() {
            Ok(()) => {
                self.settings.reload(self.config.get());
                self.settings.notice = Some(Notice::ok("Settings reset to defaults"));
            }
            Err(e) => {
                self.settings.notice = Some(Notice::error(format!("Failed to reset settings: {}", e)));
            }
        }
    }

    async fn debug_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('s') | KeyCode::Char('S') => return self.start_debug(DebugMode::Basic).await,
            KeyCode::Char('a') | KeyCode::Char('A') => return self.start_debug(DebugMode::Audio).await,
            _ => {}
        }

        let state = &mut self.debug;
        match key.code {
            KeyCode::Char('x') | KeyCode::Char('X') => {
                let failed = failures(&state.session.stop().await);
                state.notice = Some(if failed == 0 {
                    Notice::ok("Debug output disabled")
                } else {
                    Notice::error(format!("{} disable commands failed", failed))
                });
            }
            KeyCode::Char('l') | KeyCode::Char('L') => {
                state.notice = Some(match state.session.toggle_logging() {
                    Ok(true) => Notice::ok(format!(
                        "Problem call logging enabled: {}",
                        state.session.problem_log().path().display()
                    )),
                    Ok(false) => Notice::ok("Problem call logging disabled"),
                    Err(e) => Notice::error(format!("Cannot write problem log: {}", e)),
                });
            }
            KeyCode::Char('c') | KeyCode::Char('C') => state.session.clear(),
            KeyCode::Char('f') | KeyCode::Char('F') => {
                let preset = state.session.cycle_filter();
                state.notice = Some(Notice::ok(format!("Filter: {}", preset.label())));
            }
            KeyCode::Char('p') | KeyCode::Char('P') => {
                state.view = state.view.next();
                if state.view == DebugView::ProblemFile {
                    state.problem_file = match state.session.problem_log().tail(DEFAULT_TAIL_LINES) {
                        Ok(text) => text,
                        Err(e) => format!("Cannot read problem log: {}", e),
                    };
                }
            }
            KeyCode::Char('r') | KeyCode::Char('R') => {
                if !state.session.refresh() {
                    state.notice = Some(Notice::error("No debug capture running"));
                }
            }
            _ => {}
        }
    }

    async fn start_debug(&mut self, mode: DebugMode) {
        let failed = failures(&self.debug.session.start(mode).await);
        self.debug.view = DebugView::Feed;
        self.debug.notice = Some(if failed == 0 {
            Notice::ok(format!("{} debug capture running", mode))
        } else {
            Notice::error(format!("{} debug started, {} commands failed", mode, failed))
        });
    }

    /// Leave the PBX without debug output enabled.
    pub async fn shutdown(&mut self) {
        if self.debug.session.is_running() {
            info!("Disabling debug output before exit");
            self.debug.session.stop().await;
        }
    }
}

fn failures(results: &[CommandResult]) -> usize {
    results.iter().filter(|r| !r.is_success()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::collector::SnapshotCollector;
    use crate::services::executor::CommandStatus;
    use crate::testing::ScriptedExecutor;

    fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    fn app(executor: ScriptedExecutor, dir: &tempfile::TempDir) -> App {
        let mut config = ConfigManager::new(dir.path().join("config.toml"));
        let mut defaults = MonitorConfig::default_config();
        defaults.monitoring.step_delay_ms = 0;
        defaults.paths.problem_log = dir.path().join("problems.log").display().to_string();
        config.update(defaults).unwrap();

        let executor: Arc<dyn CommandExecutor> = Arc::new(executor);
        let source = Arc::new(SnapshotCollector::new(executor.clone()));
        App::new(config, executor, source)
    }

    async fn drain_until(
        app: &mut App,
        rx: &mut mpsc::UnboundedReceiver<AppMessage>,
        done: impl Fn(&AppMessage) -> bool,
    ) {
        while let Some(message) = rx.recv().await {
            let finished = done(&message);
            app.apply(message);
            if finished {
                break;
            }
        }
    }

    #[test]
    fn test_screen_digits() {
        assert_eq!(Screen::from_digit('1'), Some(Screen::Dashboard));
        assert_eq!(Screen::from_digit('8'), Some(Screen::Debug));
        assert_eq!(Screen::from_digit('0'), None);
        assert_eq!(Screen::from_digit('9'), None);
        assert_eq!(Screen::Settings.index(), 6);
    }

    #[tokio::test]
    async fn test_refresh_raises_alerts() {
        let dir = tempfile::tempdir().unwrap();
        let executor = ScriptedExecutor::new()
            .respond("Cpu(s)", "91.0")
            .respond("core show channels", "12 active channels");
        let mut app = app(executor, &dir);
        let mut rx = app.take_message_receiver().unwrap();

        app.start();
        app.on_tick();
        drain_until(&mut app, &mut rx, |m| matches!(m, AppMessage::Snapshot(_))).await;

        assert!(!app.dashboard.refreshing);
        assert_eq!(app.dashboard.snapshot.as_ref().map(|s| s.active_calls), Some(12));
        let alerts = app.dashboard.alerts.recent();
        assert_eq!(alerts.len(), 2);
        assert!(alerts[0].ends_with("High CPU usage: 91.0%"));
    }

    #[tokio::test]
    async fn test_diagnostics_stream_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(ScriptedExecutor::new().respond("", "ok"), &dir);
        let mut rx = app.take_message_receiver().unwrap();

        app.handle_key(key('2')).await;
        assert_eq!(app.screen(), Screen::Diagnostics);
        app.handle_key(key('f')).await;
        assert!(app.diagnostics.running);
        app.handle_key(key('r')).await;
        assert_eq!(app.diagnostics.label, "Full diagnostics");

        drain_until(&mut app, &mut rx, |m| {
            matches!(m, AppMessage::TaskFinished(Task::Diagnostics))
        })
        .await;
        assert!(!app.diagnostics.running);
        assert_eq!(app.diagnostics.results.len(), 11);
        assert_eq!(app.diagnostics.results[0].name, "Service Status");
    }

    #[tokio::test]
    async fn test_security_scan_scores_on_finish() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(ScriptedExecutor::new().respond("", ""), &dir);
        let mut rx = app.take_message_receiver().unwrap();

        app.handle_key(key('5')).await;
        app.handle_key(key('r')).await;
        drain_until(&mut app, &mut rx, |m| matches!(m, AppMessage::TaskFinished(Task::Security))).await;

        assert_eq!(app.security.run.results.len(), 5);
        assert!(app.security.score.is_some());
    }

    #[tokio::test]
    async fn test_restore_requires_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(ScriptedExecutor::new().respond("", ""), &dir);

        app.handle_key(key('6')).await;
        app.handle_key(key('r')).await;
        assert!(!app.backup.run.running);
        assert_eq!(
            app.backup.notice,
            Some(Notice::error("Enter a backup file to restore first"))
        );
    }

    #[tokio::test]
    async fn test_logs_edit_mode_swallows_commands() {
        let dir = tempfile::tempdir().unwrap();
        let executor = ScriptedExecutor::new().respond("tail", "ERROR one\nNOTICE two");
        let mut app = app(executor, &dir);
        let mut rx = app.take_message_receiver().unwrap();

        app.handle_key(key('4')).await;
        drain_until(&mut app, &mut rx, |m| matches!(m, AppMessage::Logs(_))).await;
        assert_eq!(app.logs.output, "ERROR one");

        app.handle_key(key('e')).await;
        assert!(app.is_editing());
        app.handle_key(key('q')).await;
        assert!(!app.should_quit());
        assert_eq!(app.logs.lines_input.value(), "50q");

        app.handle_key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)).await;
        assert!(!app.is_editing());
        app.handle_key(key('q')).await;
        assert!(app.should_quit());
    }

    #[tokio::test]
    async fn test_settings_save_and_reset() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(ScriptedExecutor::new(), &dir);

        app.handle_key(key('7')).await;
        app.settings.inputs[4].set_value("3");
        app.handle_key(key('s')).await;
        assert!(!app.settings.notice.as_ref().unwrap().ok);
        assert_eq!(app.config().monitoring.refresh_interval, 5);

        app.settings.inputs[4].set_value("15");
        app.handle_key(key('s')).await;
        assert_eq!(app.settings.notice, Some(Notice::ok("Settings saved successfully")));
        assert_eq!(app.config().monitoring.refresh_interval, 15);
        let saved = MonitorConfig::load_from_file(app.config_path()).unwrap();
        assert_eq!(saved.monitoring.refresh_interval, 15);

        app.handle_key(key('r')).await;
        assert_eq!(app.config().monitoring.refresh_interval, 5);
        assert_eq!(app.settings.inputs[4].value(), "5");
    }

    #[tokio::test]
    async fn test_debug_keys_drive_session() {
        let dir = tempfile::tempdir().unwrap();
        let executor = ScriptedExecutor::new().respond("asterisk -r", "");
        let mut app = app(executor, &dir);

        app.handle_key(key('8')).await;
        app.handle_key(key('s')).await;
        assert_eq!(app.debug.session.mode(), Some(DebugMode::Basic));

        app.handle_key(key('l')).await;
        assert!(app.debug.session.logging_enabled());
        assert!(app.debug.notice.as_ref().unwrap().ok);

        app.handle_key(key('p')).await;
        app.handle_key(key('p')).await;
        assert_eq!(app.debug.view, DebugView::ProblemFile);
        assert!(app.debug.problem_file.contains("PROBLEM CALL LOGGING STARTED"));

        app.shutdown().await;
        assert!(!app.debug.session.is_running());
    }

    #[tokio::test]
    async fn test_debug_refresh_does_not_block_input() {
        let dir = tempfile::tempdir().unwrap();
        let executor = ScriptedExecutor::new().respond("asterisk -r", "");
        let mut app = app(executor, &dir);
        let mut events = app.debug.session.take_event_receiver().unwrap();

        app.handle_key(key('8')).await;
        app.handle_key(key('r')).await;
        assert!(!app.debug.notice.as_ref().unwrap().ok);

        app.handle_key(key('s')).await;
        app.handle_key(key('r')).await;
        assert!(app.debug.notice.as_ref().unwrap().ok);
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap();
        assert!(event.is_some());

        app.shutdown().await;
    }

    #[test]
    fn test_failures_count() {
        let results = vec![
            CommandResult::success("a", ""),
            CommandResult::note("b", CommandStatus::Error, "x"),
        ];
        assert_eq!(failures(&results), 1);
    }
}
