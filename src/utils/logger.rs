//! Logging configuration for the Asterisk monitor

use std::path::{Path, PathBuf};

use tracing::{info, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::{LogFormat, LoggingConfig};
use crate::Result;

/// Where log records are written.
#[derive(Debug, Clone)]
pub enum LogTarget {
    /// stderr, for one-shot commands
    Console,
    /// Daily-rotated file only; used while the dashboard owns the terminal
    File(PathBuf),
}

/// Setup logging based on configuration.
///
/// The returned guard flushes the file writer when dropped and must be held
/// for the lifetime of the process.
pub fn setup_logging(
    config: &LoggingConfig,
    retention_days: u32,
    target: LogTarget,
) -> Result<Option<WorkerGuard>> {
    let level = parse_log_level(&config.level)?;

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let registry = tracing_subscriber::registry().with(env_filter);

    let guard = match target {
        LogTarget::File(file_path) => {
            let (directory, prefix) = split_log_path(&file_path)?;
            std::fs::create_dir_all(&directory)?;

            let file_appender = rolling::RollingFileAppender::builder()
                .rotation(rolling::Rotation::DAILY)
                .filename_prefix(prefix)
                .filename_suffix("log")
                .max_log_files(retention_days.max(1) as usize)
                .build(&directory)
                .map_err(|e| crate::Error::internal(format!("Failed to create file appender: {}", e)))?;

            let (file_writer, file_guard) = non_blocking(file_appender);

            let file_layer = match config.format {
                LogFormat::Json => fmt::layer()
                    .json()
                    .with_writer(file_writer)
                    .boxed(),
                LogFormat::Compact => fmt::layer()
                    .compact()
                    .with_ansi(false)
                    .with_writer(file_writer)
                    .boxed(),
                LogFormat::Full => fmt::layer()
                    .with_ansi(false)
                    .with_writer(file_writer)
                    .boxed(),
            };

            registry.with(file_layer).init();
            Some(file_guard)
        }
        LogTarget::Console => {
            let console_layer = match config.format {
                LogFormat::Json => fmt::layer().json().with_writer(std::io::stderr).boxed(),
                LogFormat::Compact => fmt::layer().compact().with_writer(std::io::stderr).boxed(),
                LogFormat::Full => fmt::layer().with_writer(std::io::stderr).boxed(),
            };

            registry.with(console_layer).init();
            None
        }
    };

    info!("Logging initialized with level: {}", config.level);
    Ok(guard)
}

pub fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(crate::Error::parse(format!("Invalid log level: {}", level))),
    }
}

fn split_log_path(path: &Path) -> Result<(PathBuf, String)> {
    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let prefix = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| crate::Error::parse("Invalid log filename"))?;
    Ok((directory, prefix.to_string()))
}
