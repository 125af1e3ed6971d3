//! Point-in-time system snapshot collection
//!
//! A snapshot is always fully populated. Each field falls back to its zero or
//! sentinel value when its command fails or its output cannot be parsed.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::protocols::asterisk_cli::{
    self, ChannelRecord, PeerCounts, ServiceState, PID_NOT_AVAILABLE, UNKNOWN,
};
use crate::services::executor::{CommandExecutor, CommandResult};

/// Point-in-time aggregate of PBX and host metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
    pub active_calls: u32,
    pub online_peers: u32,
    pub total_peers: u32,
    pub uptime: String,
    pub load_average: String,
    pub process_id: String,
    pub service_state: ServiceState,
    pub process_running: bool,
    pub collected_at: DateTime<Local>,
}

impl SystemSnapshot {
    /// A snapshot with every field at its fallback value.
    pub fn empty() -> Self {
        Self {
            cpu_percent: 0.0,
            memory_percent: 0.0,
            disk_percent: 0.0,
            active_calls: 0,
            online_peers: 0,
            total_peers: 0,
            uptime: UNKNOWN.to_string(),
            load_average: UNKNOWN.to_string(),
            process_id: PID_NOT_AVAILABLE.to_string(),
            service_state: ServiceState::Unknown,
            process_running: false,
            collected_at: Local::now(),
        }
    }
}

/// Shell commands feeding each snapshot field.
#[derive(Debug, Clone)]
pub struct CollectorCommands {
    pub process_check: String,
    pub service_state: String,
    pub process_id: String,
    pub cpu: String,
    pub memory: String,
    pub disk: String,
    pub peers: String,
    pub channels: String,
    pub uptime: String,
    pub load_average: String,
}

impl Default for CollectorCommands {
    fn default() -> Self {
        Self {
            process_check: "ps aux | grep -v grep | grep asterisk".to_string(),
            service_state: "systemctl is-active asterisk 2>/dev/null || echo 'unknown'".to_string(),
            process_id: "ps aux | grep asterisk | grep -v grep | grep -v safe_asterisk | awk '{print $2}' | head -1"
                .to_string(),
            cpu: "top -bn1 | grep 'Cpu(s)' | awk '{print $2}' | cut -d'%' -f1".to_string(),
            memory: "free | grep Mem | awk '{printf \"%.1f\", $3/$2 * 100.0}'".to_string(),
            disk: "df / | awk 'NR==2 {print $5}' | sed 's/%//'".to_string(),
            peers: "asterisk -rx 'sip show peers'".to_string(),
            channels: "asterisk -rx 'core show channels'".to_string(),
            uptime: "asterisk -rx 'core show uptime'".to_string(),
            load_average: "uptime | awk -F'load average:' '{print $2}'".to_string(),
        }
    }
}

/// What screens and runners need from the monitored system.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Never fails; unavailable fields hold their fallback values.
    async fn collect(&self) -> SystemSnapshot;

    async fn channels(&self) -> Vec<ChannelRecord>;

    async fn peer_counts(&self) -> PeerCounts;

    async fn active_calls(&self) -> u32;

    async fn process_running(&self) -> bool;
}

/// [`SnapshotSource`] backed by a [`CommandExecutor`].
pub struct SnapshotCollector {
    executor: Arc<dyn CommandExecutor>,
    commands: CollectorCommands,
}

impl SnapshotCollector {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self::with_commands(executor, CollectorCommands::default())
    }

    pub fn with_commands(executor: Arc<dyn CommandExecutor>, commands: CollectorCommands) -> Self {
        Self { executor, commands }
    }

    pub fn executor(&self) -> Arc<dyn CommandExecutor> {
        Arc::clone(&self.executor)
    }

    async fn run(&self, name: &str, command: &str) -> CommandResult {
        self.executor.execute(name, command).await
    }
}

fn output_or_empty(result: &CommandResult) -> &str {
    result.output().unwrap_or_default()
}

fn is_asterisk_running(result: &CommandResult) -> bool {
    result.output().map_or(false, |out| out.contains("asterisk"))
}

#[async_trait]
impl SnapshotSource for SnapshotCollector {
    async fn collect(&self) -> SystemSnapshot {
        let c = &self.commands;
        let (process, service, pid, cpu, memory, disk, peers, channels, uptime, load) = tokio::join!(
            self.run("Process Check", &c.process_check),
            self.run("Service State", &c.service_state),
            self.run("Process ID", &c.process_id),
            self.run("CPU Usage", &c.cpu),
            self.run("Memory Usage", &c.memory),
            self.run("Disk Usage", &c.disk),
            self.run("SIP Peers", &c.peers),
            self.run("Active Channels", &c.channels),
            self.run("Uptime", &c.uptime),
            self.run("Load Average", &c.load_average),
        );

        let peer_counts = asterisk_cli::parse_peer_counts(output_or_empty(&peers));
        let service_state = match service.output() {
            Some(out) => asterisk_cli::parse_service_state(out),
            None => ServiceState::Unknown,
        };

        let snapshot = SystemSnapshot {
            cpu_percent: asterisk_cli::parse_percent(output_or_empty(&cpu)),
            memory_percent: asterisk_cli::parse_percent(output_or_empty(&memory)),
            disk_percent: asterisk_cli::parse_percent(output_or_empty(&disk)),
            active_calls: asterisk_cli::parse_active_channels(output_or_empty(&channels)),
            online_peers: peer_counts.online,
            total_peers: peer_counts.total,
            uptime: asterisk_cli::parse_uptime(output_or_empty(&uptime)),
            load_average: asterisk_cli::non_empty_or(output_or_empty(&load), UNKNOWN),
            process_id: asterisk_cli::non_empty_or(output_or_empty(&pid), PID_NOT_AVAILABLE),
            service_state,
            process_running: is_asterisk_running(&process),
            collected_at: Local::now(),
        };

        debug!(
            cpu = snapshot.cpu_percent,
            calls = snapshot.active_calls,
            peers_online = snapshot.online_peers,
            peers_total = snapshot.total_peers,
            "snapshot collected"
        );
        snapshot
    }

    async fn channels(&self) -> Vec<ChannelRecord> {
        let result = self.run("Channels", &self.commands.channels).await;
        asterisk_cli::parse_channels(output_or_empty(&result))
    }

    async fn peer_counts(&self) -> PeerCounts {
        let result = self.run("SIP Peers", &self.commands.peers).await;
        asterisk_cli::parse_peer_counts(output_or_empty(&result))
    }

    async fn active_calls(&self) -> u32 {
        let result = self.run("Active Channels", &self.commands.channels).await;
        asterisk_cli::parse_active_channels(output_or_empty(&result))
    }

    async fn process_running(&self) -> bool {
        let result = self.run("Process Check", &self.commands.process_check).await;
        is_asterisk_running(&result)
    }
}
