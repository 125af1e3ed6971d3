//! Configuration management for the Asterisk monitor

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{Error, Result};

/// Lowest accepted dashboard refresh interval, in seconds.
pub const MIN_REFRESH_INTERVAL: u64 = 5;

const CONFIG_DIR_NAME: &str = ".asterisk-monitor";
const CONFIG_FILE_NAME: &str = "config.toml";
const ENV_PREFIX: &str = "ASTERISK_MONITOR";

/// Sections or keys missing from the file take their default values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub asterisk: AsteriskConfig,
    pub monitoring: MonitoringConfig,
    pub security: SecurityConfig,
    pub logging: LoggingConfig,
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AsteriskConfig {
    pub host: String,
    pub ami_port: u16,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub refresh_interval: u64,
    pub enable_alerts: bool,
    pub log_retention: u32,
    /// Pause between the steps of a diagnostic, scan or backup run
    pub step_delay_ms: u64,
    /// Per-command deadline enforced by the shell executor
    pub command_timeout_secs: u64,
}

impl Default for AsteriskConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            ami_port: 5038,
            username: "admin".to_string(),
            password: "amp111".to_string(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            refresh_interval: MIN_REFRESH_INTERVAL,
            enable_alerts: true,
            log_retention: 30,
            step_delay_ms: 300,
            command_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub check_firewall: bool,
    pub check_passwords: bool,
    pub check_ssl: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            check_firewall: true,
            check_passwords: true,
            check_ssl: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            format: LogFormat::Full,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub problem_log: String,
    pub pbx_log: String,
    pub backup_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            problem_log: "/var/log/asterisk-monitor/problem-calls.log".to_string(),
            pbx_log: "/var/log/asterisk/messages".to_string(),
            backup_dir: "/tmp/asterisk-backups".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogFormat {
    #[serde(rename = "json")]
    Json,
    #[serde(rename = "compact")]
    Compact,
    #[serde(rename = "full")]
    Full,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl MonitorConfig {
    pub fn default_config() -> Self {
        Self {
            asterisk: AsteriskConfig::default(),
            monitoring: MonitoringConfig::default(),
            security: SecurityConfig::default(),
            logging: LoggingConfig::default(),
            paths: PathsConfig::default(),
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).format(config::FileFormat::Toml))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: MonitorConfig = settings.try_deserialize()?;
        Ok(config)
    }

    /// Raise values below their enforced minimums.
    pub fn normalize(&mut self) {
        if self.monitoring.refresh_interval < MIN_REFRESH_INTERVAL {
            warn!(
                "refresh_interval {}s is below the {}s minimum, clamping",
                self.monitoring.refresh_interval, MIN_REFRESH_INTERVAL
            );
            self.monitoring.refresh_interval = MIN_REFRESH_INTERVAL;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.asterisk.host.trim().is_empty() {
            return Err(Error::parse("Host cannot be empty"));
        }

        if self.asterisk.ami_port == 0 {
            return Err(Error::parse("AMI port cannot be zero"));
        }

        if self.monitoring.refresh_interval < MIN_REFRESH_INTERVAL {
            return Err(Error::parse(format!(
                "Refresh interval must be at least {} seconds",
                MIN_REFRESH_INTERVAL
            )));
        }

        crate::utils::logger::parse_log_level(&self.logging.level)?;

        let paths = [
            &self.paths.problem_log,
            &self.paths.pbx_log,
            &self.paths.backup_dir,
        ];
        if paths.iter().any(|p| p.trim().is_empty()) {
            return Err(Error::parse("Configured paths cannot be empty"));
        }

        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// What [`ConfigManager::load`] found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    /// No file existed; defaults were written.
    Created,
    /// The file was unusable and has been overwritten with defaults.
    Regenerated { reason: String },
}

/// Owns the configuration record and its backing file.
pub struct ConfigManager {
    config: MonitorConfig,
    path: PathBuf,
}

impl ConfigManager {
    pub fn new(path: PathBuf) -> Self {
        Self {
            config: MonitorConfig::default_config(),
            path,
        }
    }

    /// `~/.asterisk-monitor/config.toml`, falling back to the working directory.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config_dir(&self) -> PathBuf {
        self.path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Load the file, creating it with defaults when missing.
    ///
    /// A file that cannot be parsed is replaced by defaults. Only a failure to
    /// write the regenerated file is reported as an error.
    pub fn load(&mut self) -> Result<LoadOutcome> {
        if !self.path.exists() {
            info!("No configuration at {}, writing defaults", self.path.display());
            self.create_default()?;
            return Ok(LoadOutcome::Created);
        }

        match MonitorConfig::load_from_file(&self.path) {
            Ok(mut config) => {
                config.normalize();
                self.config = config;
                info!("Configuration loaded from {}", self.path.display());
                Ok(LoadOutcome::Loaded)
            }
            Err(e) => {
                warn!(
                    "Configuration at {} is unusable ({}), regenerating defaults",
                    self.path.display(),
                    e
                );
                self.create_default()?;
                Ok(LoadOutcome::Regenerated {
                    reason: e.to_string(),
                })
            }
        }
    }

    pub fn save(&self) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&self.path, self.config.to_toml()?)?;
        Ok(())
    }

    pub fn create_default(&mut self) -> Result<()> {
        self.config = MonitorConfig::default_config();
        self.save()
    }

    pub fn get(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn update(&mut self, mut config: MonitorConfig) -> Result<()> {
        config.validate()?;
        config.normalize();
        self.config = config;
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = MonitorConfig::default_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.asterisk.ami_port, 5038);
        assert_eq!(config.monitoring.refresh_interval, 5);
        assert!(config.security.check_ssl);
    }

    #[test]
    fn test_save_defaults_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut manager = ConfigManager::new(path.clone());
        manager.create_default().unwrap();
        assert!(path.exists());

        let mut reloaded = ConfigManager::new(path);
        reloaded.load().unwrap();
        assert_eq!(reloaded.get(), &MonitorConfig::default_config());
    }

    #[test]
    fn test_missing_file_creates_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut manager = ConfigManager::new(path.clone());
        assert_eq!(manager.load().unwrap(), LoadOutcome::Created);

        assert!(path.exists());
        assert_eq!(manager.get(), &MonitorConfig::default_config());
    }

    #[test]
    fn test_malformed_file_is_regenerated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[asterisk\nhost = ").unwrap();

        let mut manager = ConfigManager::new(path.clone());
        assert!(matches!(manager.load().unwrap(), LoadOutcome::Regenerated { .. }));

        assert_eq!(manager.get(), &MonitorConfig::default_config());
        let rewritten = std::fs::read_to_string(&path).unwrap();
        assert!(rewritten.contains("[asterisk]"));
    }

    #[test]
    fn test_partial_file_keeps_user_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let partial = "[asterisk]\n\
                       host = \"pbx.example\"\n\
                       ami_port = 5038\n\
                       username = \"admin\"\n\
                       password = \"s3cret\"\n\
                       \n\
                       [monitoring]\n\
                       refresh_interval = 30\n\
                       enable_alerts = false\n\
                       log_retention = 7\n\
                       \n\
                       [security]\n\
                       check_firewall = true\n\
                       check_passwords = false\n\
                       check_ssl = true\n";
        std::fs::write(&path, partial).unwrap();

        let mut manager = ConfigManager::new(path.clone());
        assert_eq!(manager.load().unwrap(), LoadOutcome::Loaded);

        let config = manager.get();
        assert_eq!(config.asterisk.host, "pbx.example");
        assert_eq!(config.asterisk.password, "s3cret");
        assert_eq!(config.monitoring.refresh_interval, 30);
        assert!(!config.monitoring.enable_alerts);
        assert!(!config.security.check_passwords);
        assert_eq!(config.monitoring.step_delay_ms, 300);
        assert_eq!(config.logging, LoggingConfig::default());
        assert_eq!(config.paths, PathsConfig::default());
        assert!(std::fs::read_to_string(&path).unwrap().contains("pbx.example"));
    }

    #[test]
    fn test_low_refresh_interval_is_clamped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = MonitorConfig::default_config();
        config.monitoring.refresh_interval = 1;
        std::fs::write(&path, config.to_toml().unwrap()).unwrap();

        let mut manager = ConfigManager::new(path);
        manager.load().unwrap();
        assert_eq!(manager.get().monitoring.refresh_interval, MIN_REFRESH_INTERVAL);
    }

    #[test]
    fn test_update_rejects_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = ConfigManager::new(dir.path().join("config.toml"));

        let mut config = MonitorConfig::default_config();
        config.asterisk.host = String::new();
        assert!(manager.update(config).is_err());

        let mut config = MonitorConfig::default_config();
        config.monitoring.refresh_interval = 2;
        assert!(manager.update(config).is_err());

        let mut config = MonitorConfig::default_config();
        config.monitoring.enable_alerts = false;
        manager.update(config).unwrap();
        assert!(!manager.get().monitoring.enable_alerts);
    }
}
