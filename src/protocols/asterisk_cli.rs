//! Parsers for Asterisk CLI and host command output
//!
//! All parsers are total: text that does not match the expected shape yields
//! the documented zero or sentinel value instead of an error.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Placeholder shown when a PID cannot be determined.
pub const PID_NOT_AVAILABLE: &str = "N/A";
/// Placeholder for free-text fields whose command failed.
pub const UNKNOWN: &str = "unknown";

static PEER_SUMMARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(\d+)\s+sip peers\s*\[\s*Monitored:\s*(\d+)\s+online,\s*(\d+)\s+offline\s+Unmonitored:\s*(\d+)\s+online,\s*(\d+)\s+offline\s*\]",
    )
    .expect("peer summary pattern is valid")
});

static CHANNEL_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:PJSIP|SIP|IAX2|DAHDI|Local|Motif|UnicastRTP|Console)/[A-Za-z0-9_.@\-]+")
        .expect("channel name pattern is valid")
});

/// Online/total counts of registered SIP peers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerCounts {
    pub online: u32,
    pub total: u32,
}

/// One active call/channel as listed by `core show channels`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub channel_name: String,
    pub state: String,
    pub duration: String,
    pub caller_id: String,
    pub application: String,
}

/// Systemd view of the PBX unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceState {
    Running,
    Stopped,
    Unknown,
    NotFound,
}

impl ServiceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceState::Running => "running",
            ServiceState::Stopped => "stopped",
            ServiceState::Unknown => "unknown",
            ServiceState::NotFound => "not-found",
        }
    }
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse `sip show peers` output.
///
/// The summary line is authoritative when present. Otherwise peer rows are
/// counted: a row contains `/` and has at least six fields, and is online when
/// its second-to-last field is `OK` or `Unmonitored`.
pub fn parse_peer_counts(output: &str) -> PeerCounts {
    if let Some(counts) = parse_peer_summary(output) {
        return counts;
    }

    let mut counts = PeerCounts::default();
    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty()
            || trimmed.contains("Name/username")
            || trimmed.to_lowercase().contains("sip peers")
            || !trimmed.contains('/')
        {
            continue;
        }

        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        if fields.len() < 6 {
            continue;
        }

        counts.total += 1;
        let status = fields[fields.len() - 2];
        if status == "OK" || status == "Unmonitored" {
            counts.online += 1;
        }
    }
    counts
}

fn parse_peer_summary(output: &str) -> Option<PeerCounts> {
    output.lines().find_map(|line| {
        let caps = PEER_SUMMARY.captures(line)?;
        let number = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

        let total = number(1)?;
        let online = number(2)?.saturating_add(number(4)?);
        Some(PeerCounts {
            online,
            total: total.max(online),
        })
    })
}

/// Leading integer of the line mentioning "active channel", or 0.
pub fn parse_active_channels(output: &str) -> u32 {
    output
        .lines()
        .find(|line| line.contains("active channel"))
        .and_then(|line| line.split_whitespace().next())
        .and_then(|token| token.parse().ok())
        .unwrap_or(0)
}

/// Channel rows of `core show channels`; the summary lines are skipped.
pub fn parse_channels(output: &str) -> Vec<ChannelRecord> {
    output
        .lines()
        .filter(|line| line.contains('/') && !line.contains("active channel"))
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 4 {
                return None;
            }
            Some(ChannelRecord {
                channel_name: parts[0].to_string(),
                state: parts[1].to_string(),
                duration: parts[2].to_string(),
                caller_id: parts[3..].join(" "),
                application: UNKNOWN.to_string(),
            })
        })
        .collect()
}

/// Text following `System uptime:` in `core show uptime`.
pub fn parse_uptime(output: &str) -> String {
    output
        .lines()
        .find(|line| line.contains("System uptime"))
        .map(|line| {
            line.trim()
                .trim_start_matches("System uptime:")
                .trim()
                .to_string()
        })
        .filter(|uptime| !uptime.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// A percentage from command output, clamped to [0, 100]; 0.0 when unparseable.
pub fn parse_percent(output: &str) -> f64 {
    output
        .split_whitespace()
        .next()
        .map(|token| token.trim_end_matches('%').replace(',', "."))
        .and_then(|token| token.parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .map(|value| value.clamp(0.0, 100.0))
        .unwrap_or(0.0)
}

/// Trimmed text, or `fallback` when empty.
pub fn non_empty_or(output: &str, fallback: &str) -> String {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Map `systemctl is-active` output to a service state.
pub fn parse_service_state(output: &str) -> ServiceState {
    let lowered = output.trim().to_lowercase();
    if lowered.contains("could not be found") || lowered.contains("not-found") {
        return ServiceState::NotFound;
    }
    match lowered.lines().next().unwrap_or_default() {
        "active" | "running" => ServiceState::Running,
        "inactive" | "failed" | "dead" => ServiceState::Stopped,
        _ => ServiceState::Unknown,
    }
}

/// First channel identifier (`TECH/resource`) mentioned in a log line.
pub fn extract_channel_name(line: &str) -> Option<&str> {
    CHANNEL_NAME.find(line).map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const PEERS_WITH_SUMMARY: &str = "\
Name/username             Host                                    Dyn Forcerport Comedia    ACL Port     Status      Description
100/100                   192.168.1.10                             D  Auto (No)  No             5060     OK (12 ms)
101/101                   (Unspecified)                            D  Auto (No)  No             0        UNKNOWN
5 sip peers [Monitored: 2 online, 1 offline Unmonitored: 1 online, 1 offline]";

    #[test]
    fn test_peer_summary_is_authoritative() {
        let counts = parse_peer_counts(PEERS_WITH_SUMMARY);
        assert_eq!(counts, PeerCounts { online: 3, total: 5 });
    }

    #[test]
    fn test_peer_rows_without_summary() {
        let output = "\
Name/username  Host        Dyn Nat ACL Port Status Latency
200/200        10.0.0.1    D   N   A   5060 OK 1
201/201        10.0.0.2    D   N   A   5060 FAILED 0
202/202        10.0.0.3    D   N   A   5060 Unmonitored -";

        let counts = parse_peer_counts(output);
        assert_eq!(counts, PeerCounts { online: 2, total: 3 });
    }

    #[test]
    fn test_peer_rows_with_too_few_fields_are_ignored() {
        let output = "300/300 10.0.0.1 OK\nrandom noise";
        assert_eq!(parse_peer_counts(output), PeerCounts::default());
    }

    #[test]
    fn test_peer_summary_never_reports_more_online_than_total() {
        let output = "1 sip peers [Monitored: 2 online, 0 offline Unmonitored: 1 online, 0 offline]";
        let counts = parse_peer_counts(output);
        assert_eq!(counts.online, 3);
        assert!(counts.online <= counts.total);
    }

    #[test]
    fn test_active_channels() {
        let output = "\
Channel              Location             State   Application(Data)
SIP/100-00000001     s@default:1          Up      Dial(SIP/101)
2 active channels
1 active call
15 calls processed";
        assert_eq!(parse_active_channels(output), 2);
        assert_eq!(parse_active_channels("0 active channels"), 0);
        assert_eq!(parse_active_channels("no channel data"), 0);
        assert_eq!(parse_active_channels("many active channels"), 0);
    }

    #[test]
    fn test_parse_channels() {
        let output = "\
Channel              Location             State   Application(Data)
SIP/100-00000001     Up                   00:01:12 John Doe <100>
SIP/101-00000002     Ringing              00:00:03 101
2 active channels";

        let channels = parse_channels(output);
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].channel_name, "SIP/100-00000001");
        assert_eq!(channels[0].state, "Up");
        assert_eq!(channels[0].duration, "00:01:12");
        assert_eq!(channels[0].caller_id, "John Doe <100>");
        assert_eq!(channels[0].application, "unknown");
        assert_eq!(channels[1].caller_id, "101");
    }

    #[test]
    fn test_parse_uptime() {
        let output = "System uptime: 2 days, 3 hours, 4 minutes\nLast reload: 1 hour";
        assert_eq!(parse_uptime(output), "2 days, 3 hours, 4 minutes");
        assert_eq!(parse_uptime(""), "unknown");
    }

    #[test]
    fn test_parse_percent() {
        assert_eq!(parse_percent("12.5"), 12.5);
        assert_eq!(parse_percent("87%"), 87.0);
        assert_eq!(parse_percent("3,7"), 3.7);
        assert_eq!(parse_percent("140"), 100.0);
        assert_eq!(parse_percent("-4"), 0.0);
        assert_eq!(parse_percent("n/a"), 0.0);
        assert_eq!(parse_percent(""), 0.0);
    }

    #[test]
    fn test_parse_service_state() {
        assert_eq!(parse_service_state("active\n"), ServiceState::Running);
        assert_eq!(parse_service_state("inactive"), ServiceState::Stopped);
        assert_eq!(parse_service_state("failed"), ServiceState::Stopped);
        assert_eq!(parse_service_state("unknown"), ServiceState::Unknown);
        assert_eq!(
            parse_service_state("Unit asterisk.service could not be found."),
            ServiceState::NotFound
        );
    }

    #[test]
    fn test_extract_channel_name() {
        let line = "WARNING[1234]: chan_sip.c:4000 jitter on SIP/trunk-0000001a exceeded";
        assert_eq!(extract_channel_name(line), Some("SIP/trunk-0000001a"));
        assert_eq!(extract_channel_name("no channel here"), None);
    }

    proptest! {
        #[test]
        fn prop_peer_summary_counts(
            a in 0u32..500,
            b in 0u32..500,
            c in 0u32..500,
            d in 0u32..500,
        ) {
            let total = a + b + c + d;
            let line = format!(
                "{} sip peers [Monitored: {} online, {} offline Unmonitored: {} online, {} offline]",
                total, a, b, c, d
            );
            let counts = parse_peer_counts(&line);
            prop_assert_eq!(counts.online, a + c);
            prop_assert_eq!(counts.total, total);
        }

        #[test]
        fn prop_percent_is_clamped(value in -1000.0f64..1000.0) {
            let parsed = parse_percent(&format!("{:.2}", value));
            prop_assert!((0.0..=100.0).contains(&parsed));
        }
    }
}
