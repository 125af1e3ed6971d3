//! Per-screen state owned by [`App`](super::App)

use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Local};

use crate::config::MonitorConfig;
use crate::protocols::asterisk_cli::ChannelRecord;
use crate::services::alerts::AlertBuffer;
use crate::services::collector::SystemSnapshot;
use crate::services::debug::DebugSession;
use crate::services::diagnostics::CheckSummary;
use crate::services::executor::CommandResult;
use crate::services::logs::LogQuery;
use crate::services::security::SecurityScore;
use crate::ui::widgets::TextInput;
use crate::{Error, Result};

/// One-line feedback shown under a screen's controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub ok: bool,
    pub text: String,
}

impl Notice {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            ok: true,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            ok: false,
            text: text.into(),
        }
    }
}

/// Results of a sequential run that streams one result per step.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    pub results: Vec<CommandResult>,
    pub running: bool,
    pub label: String,
}

impl RunState {
    /// Start a new run. Refused while one is in progress.
    pub fn begin(&mut self, label: impl Into<String>) -> bool {
        if self.running {
            return false;
        }
        self.results.clear();
        self.label = label.into();
        self.running = true;
        true
    }

    pub fn push(&mut self, result: CommandResult) {
        self.results.push(result);
    }

    pub fn finish(&mut self) {
        self.running = false;
    }

    pub fn clear(&mut self) {
        if !self.running {
            self.results.clear();
            self.label.clear();
        }
    }

    pub fn summary(&self) -> CheckSummary {
        CheckSummary::from_results(&self.results)
    }
}

#[derive(Debug)]
pub struct DashboardState {
    pub snapshot: Option<SystemSnapshot>,
    pub alerts: AlertBuffer,
    pub refreshing: bool,
    pub last_refresh: Option<Instant>,
}

impl DashboardState {
    pub fn new(enable_alerts: bool) -> Self {
        Self {
            snapshot: None,
            alerts: AlertBuffer::new(enable_alerts),
            refreshing: false,
            last_refresh: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChannelsState {
    pub channels: Vec<ChannelRecord>,
    pub selected: usize,
    pub updated: Option<DateTime<Local>>,
}

impl ChannelsState {
    /// Replace the table, keeping the selection in range.
    pub fn replace(&mut self, channels: Vec<ChannelRecord>) {
        self.channels = channels;
        self.selected = self.selected.min(self.channels.len().saturating_sub(1));
        self.updated = Some(Local::now());
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.channels.len() {
            self.selected += 1;
        }
    }

    pub fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogField {
    Lines,
    Filter,
}

#[derive(Debug, Clone)]
pub struct LogsState {
    pub query: LogQuery,
    pub lines_input: TextInput,
    pub filter_input: TextInput,
    pub focus: LogField,
    pub editing: bool,
    pub output: String,
    pub loading: bool,
}

impl Default for LogsState {
    fn default() -> Self {
        let query = LogQuery::default();
        Self {
            lines_input: TextInput::new(query.lines.to_string()).placeholder("50"),
            filter_input: TextInput::new(query.filter.clone()).placeholder("keyword|keyword"),
            query,
            focus: LogField::Lines,
            editing: false,
            output: String::new(),
            loading: false,
        }
    }
}

impl LogsState {
    pub fn focused_input(&mut self) -> &mut TextInput {
        match self.focus {
            LogField::Lines => &mut self.lines_input,
            LogField::Filter => &mut self.filter_input,
        }
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            LogField::Lines => LogField::Filter,
            LogField::Filter => LogField::Lines,
        };
    }

    /// Copy the inputs into the query; an invalid count snaps back.
    pub fn commit(&mut self) -> LogQuery {
        self.query.set_lines(self.lines_input.value());
        self.query.filter = self.filter_input.value().trim().to_string();
        self.lines_input.set_value(self.query.lines.to_string());
        self.query.clone()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SecurityState {
    pub run: RunState,
    pub score: Option<SecurityScore>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupField {
    Destination,
    RestorePath,
}

#[derive(Debug, Clone)]
pub struct BackupState {
    pub run: RunState,
    pub destination: TextInput,
    pub restore_path: TextInput,
    pub focus: BackupField,
    pub editing: bool,
    pub listing: String,
    pub stats: String,
    pub last_archive: Option<PathBuf>,
    pub notice: Option<Notice>,
}

impl BackupState {
    pub fn new(backup_dir: &str) -> Self {
        Self {
            run: RunState::default(),
            destination: TextInput::new(backup_dir).placeholder(backup_dir),
            restore_path: TextInput::new("").placeholder("/path/to/asterisk-backup-....tar.gz"),
            focus: BackupField::Destination,
            editing: false,
            listing: String::new(),
            stats: String::new(),
            last_archive: None,
            notice: None,
        }
    }

    pub fn focused_input(&mut self) -> &mut TextInput {
        match self.focus {
            BackupField::Destination => &mut self.destination,
            BackupField::RestorePath => &mut self.restore_path,
        }
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            BackupField::Destination => BackupField::RestorePath,
            BackupField::RestorePath => BackupField::Destination,
        };
    }

    pub fn clear(&mut self) {
        self.run.clear();
        self.listing.clear();
        self.stats.clear();
        self.notice = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingField {
    Host,
    AmiPort,
    Username,
    Password,
    RefreshInterval,
    LogRetention,
    CheckFirewall,
    CheckPasswords,
    CheckSsl,
}

impl SettingField {
    pub const ALL: [SettingField; 9] = [
        SettingField::Host,
        SettingField::AmiPort,
        SettingField::Username,
        SettingField::Password,
        SettingField::RefreshInterval,
        SettingField::LogRetention,
        SettingField::CheckFirewall,
        SettingField::CheckPasswords,
        SettingField::CheckSsl,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SettingField::Host => "Asterisk Host",
            SettingField::AmiPort => "AMI Port",
            SettingField::Username => "Username",
            SettingField::Password => "Password",
            SettingField::RefreshInterval => "Refresh Interval (sec)",
            SettingField::LogRetention => "Log Retention (days)",
            SettingField::CheckFirewall => "Check Firewall",
            SettingField::CheckPasswords => "Check Passwords",
            SettingField::CheckSsl => "Check SSL",
        }
    }

    pub fn section(&self) -> &'static str {
        match self {
            SettingField::Host
            | SettingField::AmiPort
            | SettingField::Username
            | SettingField::Password => "Asterisk",
            SettingField::RefreshInterval | SettingField::LogRetention => "Monitoring",
            SettingField::CheckFirewall | SettingField::CheckPasswords | SettingField::CheckSsl => {
                "Security"
            }
        }
    }

    fn current(&self, config: &MonitorConfig) -> String {
        match self {
            SettingField::Host => config.asterisk.host.clone(),
            SettingField::AmiPort => config.asterisk.ami_port.to_string(),
            SettingField::Username => config.asterisk.username.clone(),
            SettingField::Password => config.asterisk.password.clone(),
            SettingField::RefreshInterval => config.monitoring.refresh_interval.to_string(),
            SettingField::LogRetention => config.monitoring.log_retention.to_string(),
            SettingField::CheckFirewall => config.security.check_firewall.to_string(),
            SettingField::CheckPasswords => config.security.check_passwords.to_string(),
            SettingField::CheckSsl => config.security.check_ssl.to_string(),
        }
    }
}

fn parse_flag(field: SettingField, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(Error::parse(format!(
            "{} must be 'true' or 'false'",
            field.label()
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(field: SettingField, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::parse(format!("{} must be a number", field.label())))
}

/// The nine editable settings fields.
#[derive(Debug, Clone)]
pub struct SettingsForm {
    pub inputs: Vec<TextInput>,
    pub focus: usize,
    pub editing: bool,
    pub notice: Option<Notice>,
}

impl SettingsForm {
    pub fn from_config(config: &MonitorConfig) -> Self {
        let inputs = SettingField::ALL
            .iter()
            .map(|field| {
                let input = TextInput::new(field.current(config));
                if *field == SettingField::Password {
                    input.masked()
                } else {
                    input
                }
            })
            .collect();
        Self {
            inputs,
            focus: 0,
            editing: false,
            notice: None,
        }
    }

    /// Overwrite every input from `config`, keeping focus.
    pub fn reload(&mut self, config: &MonitorConfig) {
        for (field, input) in SettingField::ALL.iter().zip(self.inputs.iter_mut()) {
            input.set_value(field.current(config));
        }
    }

    pub fn focused_field(&self) -> SettingField {
        SettingField::ALL[self.focus.min(SettingField::ALL.len() - 1)]
    }

    pub fn focused_input(&mut self) -> &mut TextInput {
        let index = self.focus.min(self.inputs.len() - 1);
        &mut self.inputs[index]
    }

    pub fn focus_next(&mut self) {
        self.focus = (self.focus + 1) % SettingField::ALL.len();
    }

    pub fn focus_previous(&mut self) {
        self.focus = (self.focus + SettingField::ALL.len() - 1) % SettingField::ALL.len();
    }

    fn value(&self, field: SettingField) -> &str {
        SettingField::ALL
            .iter()
            .position(|f| *f == field)
            .and_then(|i| self.inputs.get(i))
            .map_or("", |input| input.value())
    }

    /// Build a new configuration from `base` and the form values.
    pub fn to_config(&self, base: &MonitorConfig) -> Result<MonitorConfig> {
        let mut config = base.clone();

        config.asterisk.host = self.value(SettingField::Host).trim().to_string();
        config.asterisk.ami_port = parse_number(SettingField::AmiPort, self.value(SettingField::AmiPort))?;
        config.asterisk.username = self.value(SettingField::Username).trim().to_string();
        config.asterisk.password = self.value(SettingField::Password).to_string();
        config.monitoring.refresh_interval = parse_number(
            SettingField::RefreshInterval,
            self.value(SettingField::RefreshInterval),
        )?;
        config.monitoring.log_retention = parse_number(
            SettingField::LogRetention,
            self.value(SettingField::LogRetention),
        )?;
        config.security.check_firewall = parse_flag(
            SettingField::CheckFirewall,
            self.value(SettingField::CheckFirewall),
        )?;
        config.security.check_passwords = parse_flag(
            SettingField::CheckPasswords,
            self.value(SettingField::CheckPasswords),
        )?;
        config.security.check_ssl =
            parse_flag(SettingField::CheckSsl, self.value(SettingField::CheckSsl))?;

        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugView {
    Feed,
    Problems,
    ProblemFile,
}

impl DebugView {
    pub fn next(&self) -> DebugView {
        match self {
            DebugView::Feed => DebugView::Problems,
            DebugView::Problems => DebugView::ProblemFile,
            DebugView::ProblemFile => DebugView::Feed,
        }
    }
}

pub struct DebugState {
    pub session: DebugSession,
    pub view: DebugView,
    pub problem_file: String,
    pub notice: Option<Notice>,
}

impl DebugState {
    pub fn new(session: DebugSession) -> Self {
        Self {
            session,
            view: DebugView::Feed,
            problem_file: String::new(),
            notice: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_state_refuses_overlap() {
        let mut run = RunState::default();
        assert!(run.begin("Quick"));
        assert!(!run.begin("Full"));
        run.push(CommandResult::success("a", "ok"));
        run.clear();
        assert_eq!(run.results.len(), 1);
        run.finish();
        run.clear();
        assert!(run.results.is_empty());
    }

    #[test]
    fn test_channel_selection_stays_in_range() {
        let record = |name: &str| ChannelRecord {
            channel_name: name.to_string(),
            state: "Up".to_string(),
            duration: "00:00:01".to_string(),
            caller_id: "x".to_string(),
            application: "unknown".to_string(),
        };
        let mut channels = ChannelsState::default();
        channels.replace(vec![record("SIP/1"), record("SIP/2"), record("SIP/3")]);
        channels.select_next();
        channels.select_next();
        channels.select_next();
        assert_eq!(channels.selected, 2);

        channels.replace(vec![record("SIP/1")]);
        assert_eq!(channels.selected, 0);
        channels.select_previous();
        assert_eq!(channels.selected, 0);
    }

    #[test]
    fn test_logs_commit_snaps_back_invalid_count() {
        let mut logs = LogsState::default();
        logs.lines_input.set_value("lots");
        logs.filter_input.set_value(" SIP/100 ");
        let query = logs.commit();
        assert_eq!(query.lines, 50);
        assert_eq!(query.filter, "SIP/100");
        assert_eq!(logs.lines_input.value(), "50");
    }

    #[test]
    fn test_settings_form_round_trip() {
        let config = MonitorConfig::default_config();
        let form = SettingsForm::from_config(&config);
        assert_eq!(form.inputs.len(), 9);
        assert_eq!(form.inputs[3].display(), "••••••");
        assert_eq!(form.to_config(&config).unwrap(), config);
    }

    #[test]
    fn test_settings_form_rejects_bad_values() {
        let config = MonitorConfig::default_config();
        let mut form = SettingsForm::from_config(&config);

        form.inputs[1].set_value("not-a-port");
        let err = form.to_config(&config).unwrap_err();
        assert!(err.to_string().contains("AMI Port must be a number"));

        form.inputs[1].set_value("5038");
        form.inputs[4].set_value("2");
        assert!(form.to_config(&config).is_err());

        form.inputs[4].set_value("10");
        form.inputs[8].set_value("maybe");
        let err = form.to_config(&config).unwrap_err();
        assert!(err.to_string().contains("Check SSL"));

        form.inputs[8].set_value("no");
        let updated = form.to_config(&config).unwrap();
        assert!(!updated.security.check_ssl);
        assert_eq!(updated.monitoring.refresh_interval, 10);
    }
}
