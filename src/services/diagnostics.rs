//! Quick and full PBX health checks
//!
//! A plan is an ordered list of steps. The runner executes them strictly in
//! order and reports each result as soon as it is available.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::services::collector::SnapshotSource;
use crate::services::executor::{CommandExecutor, CommandResult, CommandStatus};

/// Active channel count above which the channel check warns.
pub const HIGH_CHANNEL_COUNT: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticStep {
    /// Run a command; its result is reported as-is.
    Command { name: String, command: String },
    /// Peer registration check through the snapshot source.
    SipPeers,
    /// Active channel check through the snapshot source.
    ActiveChannels,
}

impl DiagnosticStep {
    fn command(name: &str, command: &str) -> Self {
        DiagnosticStep::Command {
            name: name.to_string(),
            command: command.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            DiagnosticStep::Command { name, .. } => name,
            DiagnosticStep::SipPeers => "SIP Peers",
            DiagnosticStep::ActiveChannels => "Active Channels",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    Quick,
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticPlan {
    pub kind: DiagnosticKind,
    pub steps: Vec<DiagnosticStep>,
}

impl DiagnosticPlan {
    pub fn quick() -> Self {
        Self {
            kind: DiagnosticKind::Quick,
            steps: vec![
                DiagnosticStep::command("Service Status", "systemctl is-active asterisk"),
                DiagnosticStep::command(
                    "Asterisk Process",
                    "ps aux | grep -v grep | grep asterisk | head -1",
                ),
                DiagnosticStep::SipPeers,
                DiagnosticStep::ActiveChannels,
                DiagnosticStep::command(
                    "Version Info",
                    "asterisk -rx 'core show version' | head -1",
                ),
            ],
        }
    }

    pub fn full() -> Self {
        let mut steps = Self::quick().steps;
        steps.extend([
            DiagnosticStep::command("Codecs", "asterisk -rx 'core show translation' | head -5"),
            DiagnosticStep::command("Dialplan", "asterisk -rx 'dialplan show' | grep -c 'Context'"),
            DiagnosticStep::command("Modules", "asterisk -rx 'module show' | grep -c 'Loaded'"),
            DiagnosticStep::command(
                "Network",
                "ping -c 2 8.8.8.8 | grep 'packet loss' || echo 'Network test failed'",
            ),
            DiagnosticStep::command(
                "Ports",
                "netstat -tlnp | grep -E ':(5060|5038)' | grep LISTEN || echo 'No SIP/AMI ports found'",
            ),
            DiagnosticStep::command("System Load", "uptime"),
        ]);
        Self {
            kind: DiagnosticKind::Full,
            steps,
        }
    }

    pub fn for_kind(kind: DiagnosticKind) -> Self {
        match kind {
            DiagnosticKind::Quick => Self::quick(),
            DiagnosticKind::Full => Self::full(),
        }
    }
}

/// Per-status tally of a result list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckSummary {
    pub success: usize,
    pub warning: usize,
    pub error: usize,
    pub info: usize,
}

impl CheckSummary {
    pub fn from_results(results: &[CommandResult]) -> Self {
        results.iter().fold(Self::default(), |mut summary, result| {
            match result.status {
                CommandStatus::Success => summary.success += 1,
                CommandStatus::Warning => summary.warning += 1,
                CommandStatus::Error => summary.error += 1,
                CommandStatus::Info => summary.info += 1,
            }
            summary
        })
    }

    /// Results that carry a verdict, i.e. everything but `Info`.
    pub fn graded(&self) -> usize {
        self.success + self.warning + self.error
    }
}

pub fn sip_peers_result(online: u32, total: u32) -> CommandResult {
    if online == 0 && total > 0 {
        CommandResult::note(
            "SIP Peers",
            CommandStatus::Warning,
            format!("No peers online (total: {})", total),
        )
    } else {
        CommandResult::note(
            "SIP Peers",
            CommandStatus::Success,
            format!("{} online out of {} total", online, total),
        )
    }
}

pub fn active_channels_result(count: u32) -> CommandResult {
    if count > HIGH_CHANNEL_COUNT {
        CommandResult::note(
            "Active Channels",
            CommandStatus::Warning,
            format!("High channel count: {}", count),
        )
    } else {
        CommandResult::note(
            "Active Channels",
            CommandStatus::Success,
            format!("{} active channels", count),
        )
    }
}

pub struct DiagnosticsRunner {
    executor: Arc<dyn CommandExecutor>,
    source: Arc<dyn SnapshotSource>,
    step_delay: Duration,
}

impl DiagnosticsRunner {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        source: Arc<dyn SnapshotSource>,
        step_delay: Duration,
    ) -> Self {
        Self {
            executor,
            source,
            step_delay,
        }
    }

    pub async fn run_step(&self, step: &DiagnosticStep) -> CommandResult {
        match step {
            DiagnosticStep::Command { name, command } => self.executor.execute(name, command).await,
            DiagnosticStep::SipPeers => {
                let counts = self.source.peer_counts().await;
                sip_peers_result(counts.online, counts.total)
            }
            DiagnosticStep::ActiveChannels => {
                active_channels_result(self.source.active_calls().await)
            }
        }
    }

    /// Run every step in order, calling `on_result` after each one.
    pub async fn run<F>(&self, plan: &DiagnosticPlan, mut on_result: F) -> Vec<CommandResult>
    where
        F: FnMut(&CommandResult) + Send,
    {
        info!("Running {:?} diagnostics ({} steps)", plan.kind, plan.steps.len());
        let mut results = Vec::with_capacity(plan.steps.len());

        for (i, step) in plan.steps.iter().enumerate() {
            if i > 0 && !self.step_delay.is_zero() {
                tokio::time::sleep(self.step_delay).await;
            }
            let result = self.run_step(step).await;
            on_result(&result);
            results.push(result);
        }

        let summary = CheckSummary::from_results(&results);
        info!(
            success = summary.success,
            warning = summary.warning,
            error = summary.error,
            "Diagnostics finished"
        );
        results
    }
}
