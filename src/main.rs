//! Asterisk Monitor main application

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use colored::*;
use rustyline::DefaultEditor;
use tracing::{info, warn};

use asterisk_monitor::{
    config::{ConfigManager, LoadOutcome, MonitorConfig},
    core::{self, App},
    services::{
        event_log::DEFAULT_TAIL_LINES, CheckSummary, CommandExecutor, CommandResult,
        CommandStatus, DiagnosticKind, DiagnosticPlan, DiagnosticsRunner, ProblemLog, ScanKind,
        SecurityScanner, SecurityScore, ShellExecutor, SnapshotCollector, SnapshotSource,
    },
    utils::{setup_logging, LogTarget},
};

#[derive(Parser, Debug)]
#[command(name = "asterisk-monitor")]
#[command(about = "Terminal dashboard for Asterisk PBX hosts")]
#[command(version = asterisk_monitor::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "ASTERISK_MONITOR_CONFIG")]
    config: Option<PathBuf>,

    /// Skip the Asterisk availability checks
    #[arg(long)]
    skip_checks: bool,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Start the interactive dashboard
    Tui,
    /// Print one metrics snapshot
    Snapshot {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// List active channels
    Channels,
    /// Run system diagnostics
    Diagnose {
        /// Run the full diagnostic plan
        #[arg(long)]
        full: bool,
    },
    /// Run a security scan
    Security {
        /// Run the full security audit
        #[arg(long)]
        full: bool,
    },
    /// Show or clear the problem call log
    Problems {
        /// Number of trailing lines to show
        #[arg(short, long, default_value_t = DEFAULT_TAIL_LINES)]
        lines: usize,

        /// Empty the log instead of showing it
        #[arg(long)]
        clear: bool,
    },
    /// Generate default configuration
    GenerateConfig {
        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate configuration
    ValidateConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let path = cli.config.clone().unwrap_or_else(ConfigManager::default_path);
    let command = cli.command.unwrap_or(Commands::Tui);

    // These two must not create or rewrite the file as a side effect of loading it
    match &command {
        Commands::GenerateConfig { output } => return generate_default_config(output.as_ref()),
        Commands::ValidateConfig => return validate_configuration(&path),
        _ => {}
    }

    let mut manager = ConfigManager::new(path);
    let outcome = manager
        .load()
        .with_context(|| format!("Failed to write configuration to {}", manager.path().display()))?;
    let config = manager.get().clone();

    let target = match command {
        Commands::Tui => LogTarget::File(log_file_path(&manager, &config)),
        _ => LogTarget::Console,
    };
    let _guard = setup_logging(&config.logging, config.monitoring.log_retention, target)
        .context("Failed to initialize logging")?;

    info!("Starting {} v{}", asterisk_monitor::NAME, asterisk_monitor::VERSION);
    report_config_outcome(&manager, &outcome);

    let executor: Arc<dyn CommandExecutor> = Arc::new(
        ShellExecutor::new().with_deadline(Duration::from_secs(config.monitoring.command_timeout_secs)),
    );
    let source: Arc<dyn SnapshotSource> = Arc::new(SnapshotCollector::new(executor.clone()));

    if !cli.skip_checks {
        preflight(executor.as_ref()).await?;
    }

    match command {
        Commands::Tui => {
            let app = App::new(manager, executor, source);
            core::run(app).await.context("Terminal session failed")
        }
        Commands::Snapshot { json } => show_snapshot(source.as_ref(), json).await,
        Commands::Channels => show_channels(source.as_ref()).await,
        Commands::Diagnose { full } => run_diagnostics(executor, source, full).await,
        Commands::Security { full } => run_security(executor, &config, full).await,
        Commands::Problems { lines, clear } => show_problems(&config, lines, clear),
        Commands::GenerateConfig { .. } | Commands::ValidateConfig => Ok(()),
    }
}

/// Report what loading the file did, once logging is up. A replaced file is
/// also printed to stderr.
fn report_config_outcome(manager: &ConfigManager, outcome: &LoadOutcome) {
    let path = manager.path().display();
    match outcome {
        LoadOutcome::Loaded => info!("Configuration loaded from {}", path),
        LoadOutcome::Created => info!("Default configuration written to {}", path),
        LoadOutcome::Regenerated { reason } => {
            warn!("Configuration at {} was unusable ({}), replaced with defaults", path, reason);
            eprintln!(
                "{} configuration at {} was unusable ({}); it has been replaced with defaults",
                "Warning:".yellow().bold(),
                path,
                reason
            );
        }
    }
}

fn log_file_path(manager: &ConfigManager, config: &MonitorConfig) -> PathBuf {
    match &config.logging.file {
        Some(file) if !file.is_empty() => PathBuf::from(file),
        _ => manager.config_dir().join("logs").join("asterisk-monitor.log"),
    }
}

/// Refuse to start without an `asterisk` binary; offer to continue when the
/// daemon does not answer.
async fn preflight(executor: &dyn CommandExecutor) -> anyhow::Result<()> {
    let binary = executor.execute("Asterisk Binary", "which asterisk").await;
    if !binary.is_success() {
        bail!("Asterisk not found. Please install Asterisk first.");
    }

    let version = executor
        .execute("Asterisk Version", "asterisk -rx 'core show version'")
        .await;
    if version.is_success() {
        info!("Connected to {}", version.message);
        return Ok(());
    }

    warn!("Asterisk is installed but not responding: {}", version.error);
    println!("{}", "Warning: Asterisk may not be running".yellow());
    let mut editor = DefaultEditor::new().context("Failed to open prompt")?;
    let answer = editor
        .readline("Continue anyway? [y/N] ")
        .context("Failed to read answer")?;
    if !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
        bail!("Aborted: Asterisk is not responding");
    }
    Ok(())
}

async fn show_snapshot(source: &dyn SnapshotSource, json: bool) -> anyhow::Result<()> {
    let snapshot = source.collect().await;
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    println!("{}", "Asterisk System Status".bold().blue());
    println!("{}", snapshot.collected_at.format("%Y-%m-%d %H:%M:%S").to_string().dimmed());
    println!();

    let service = snapshot.service_state.to_string();
    let service = if snapshot.process_running {
        service.green()
    } else {
        service.red()
    };
    println!("{}: {}", "Service".bold(), service);
    println!("{}: {}", "PID".bold(), snapshot.process_id);
    println!("{}: {}", "Uptime".bold(), snapshot.uptime);
    println!("{}: {}", "Load".bold(), snapshot.load_average);
    println!();

    println!("{}", "Resources:".bold());
    println!("  CPU:    {}", usage(snapshot.cpu_percent));
    println!("  Memory: {}", usage(snapshot.memory_percent));
    println!("  Disk:   {}", usage(snapshot.disk_percent));
    println!();

    println!("{}", "Telephony:".bold());
    println!("  Active Calls: {}", snapshot.active_calls.to_string().bold());
    println!(
        "  SIP Peers:    {}/{}",
        snapshot.online_peers.to_string().bold(),
        snapshot.total_peers
    );
    Ok(())
}

fn usage(percent: f64) -> ColoredString {
    let text = format!("{:.1}%", percent);
    if percent >= 90.0 {
        text.red()
    } else if percent >= 70.0 {
        text.yellow()
    } else {
        text.green()
    }
}

async fn show_channels(source: &dyn SnapshotSource) -> anyhow::Result<()> {
    let channels = source.channels().await;
    println!("{}", "Active Channels".bold().blue());
    println!();

    if channels.is_empty() {
        println!("{}", "No active channels".dimmed());
        return Ok(());
    }

    println!(
        "{:<30} {:<10} {:<10} {:<20} {:<15}",
        "Channel".bold(),
        "State".bold(),
        "Duration".bold(),
        "Caller ID".bold(),
        "Application".bold()
    );
    println!("{}", "─".repeat(90));
    for channel in &channels {
        println!(
            "{:<30} {:<10} {:<10} {:<20} {:<15}",
            channel.channel_name, channel.state, channel.duration, channel.caller_id, channel.application
        );
    }
    println!();
    println!("{} channel(s)", channels.len());
    Ok(())
}

fn print_result(result: &CommandResult) {
    let status = match result.status {
        CommandStatus::Success => "OK".green(),
        CommandStatus::Warning => "WARN".yellow(),
        CommandStatus::Error => "FAIL".red(),
        CommandStatus::Info => "INFO".blue(),
    };
    println!("[{:^4}] {}", status, result.name.bold());
    for line in result.message.lines() {
        println!("       {}", line);
    }
    if !result.error.is_empty() {
        println!("       {}", result.error.dimmed());
    }
}

fn print_summary(summary: &CheckSummary) {
    println!();
    println!(
        "{}: {} passed, {} warnings, {} failed",
        "Summary".bold(),
        summary.success.to_string().green(),
        summary.warning.to_string().yellow(),
        summary.error.to_string().red()
    );
}

async fn run_diagnostics(
    executor: Arc<dyn CommandExecutor>,
    source: Arc<dyn SnapshotSource>,
    full: bool,
) -> anyhow::Result<()> {
    let kind = if full {
        DiagnosticKind::Full
    } else {
        DiagnosticKind::Quick
    };
    println!("{}", format!("{:?} Diagnostics", kind).bold().blue());
    println!();

    let runner = DiagnosticsRunner::new(executor, source, Duration::ZERO);
    let results = runner.run(&DiagnosticPlan::for_kind(kind), print_result).await;
    print_summary(&CheckSummary::from_results(&results));
    Ok(())
}

async fn run_security(
    executor: Arc<dyn CommandExecutor>,
    config: &MonitorConfig,
    full: bool,
) -> anyhow::Result<()> {
    let kind = if full { ScanKind::Full } else { ScanKind::Quick };
    println!("{}", format!("{:?} Security Scan", kind).bold().blue());
    println!();

    let scanner = SecurityScanner::new(executor, config.security.clone(), Duration::ZERO);
    let results = scanner.scan(kind, print_result).await;
    print_summary(&CheckSummary::from_results(&results));

    if let Some(score) = SecurityScore::from_results(&results) {
        println!("{}: {}% ({})", "Security Score".bold(), score.percent, score.posture);
    }
    Ok(())
}

fn show_problems(config: &MonitorConfig, lines: usize, clear: bool) -> anyhow::Result<()> {
    let log = ProblemLog::new(&config.paths.problem_log);
    if clear {
        log.clear()
            .with_context(|| format!("Failed to clear {}", log.path().display()))?;
        println!("{} {}", "Cleared".green(), log.path().display());
        return Ok(());
    }

    println!("{}", "Problem Calls".bold().blue());
    println!("{}", log.path().display().to_string().dimmed());
    println!();
    let text = log
        .tail(lines)
        .with_context(|| format!("Failed to read {}", log.path().display()))?;
    println!("{}", text);
    Ok(())
}

fn generate_default_config(output: Option<&PathBuf>) -> anyhow::Result<()> {
    let toml = MonitorConfig::default_config().to_toml()?;
    match output {
        Some(path) => {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)?;
            }
            std::fs::write(path, toml)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Default configuration written to: {}", path.display());
        }
        None => println!("{}", toml),
    }
    Ok(())
}

fn validate_configuration(path: &std::path::Path) -> anyhow::Result<()> {
    let config = MonitorConfig::load_from_file(path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;
    println!("{} {}", "Configuration is valid:".green(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults_to_dashboard() {
        let cli = Cli::try_parse_from(["asterisk-monitor"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.skip_checks);
    }

    #[test]
    fn test_subcommand_flags() {
        let cli = Cli::try_parse_from(["asterisk-monitor", "--skip-checks", "diagnose", "--full"]).unwrap();
        assert!(cli.skip_checks);
        assert_eq!(cli.command, Some(Commands::Diagnose { full: true }));

        let cli = Cli::try_parse_from(["asterisk-monitor", "problems", "--lines", "20"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Problems {
                lines: 20,
                clear: false
            })
        );

        let cli = Cli::try_parse_from(["asterisk-monitor", "problems"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Problems {
                lines: DEFAULT_TAIL_LINES,
                clear: false
            })
        );
    }

    #[test]
    fn test_rejects_bad_line_count() {
        assert!(Cli::try_parse_from(["asterisk-monitor", "problems", "--lines", "many"]).is_err());
    }

    #[test]
    fn test_generate_config_writes_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        generate_default_config(Some(&path)).unwrap();
        validate_configuration(&path).unwrap();
    }
}
