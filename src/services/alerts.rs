//! Dashboard threshold alerts

use chrono::{DateTime, Local};

use crate::services::collector::SystemSnapshot;
use crate::services::event_log::BoundedEventBuffer;

pub const ALERT_CAPACITY: usize = 10;
pub const ALERTS_SHOWN: usize = 5;
pub const CALL_VOLUME_THRESHOLD: u32 = 10;
pub const CPU_THRESHOLD: f64 = 80.0;

/// Threshold breaches found in `snapshot`.
pub fn evaluate(snapshot: &SystemSnapshot) -> Vec<String> {
    let mut alerts = Vec::new();
    if snapshot.active_calls > CALL_VOLUME_THRESHOLD {
        alerts.push(format!("High call volume: {} active calls", snapshot.active_calls));
    }
    if snapshot.cpu_percent > CPU_THRESHOLD {
        alerts.push(format!("High CPU usage: {:.1}%", snapshot.cpu_percent));
    }
    alerts
}

/// Most-recent-first alert history.
#[derive(Debug)]
pub struct AlertBuffer {
    enabled: bool,
    entries: BoundedEventBuffer,
}

impl AlertBuffer {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            entries: BoundedEventBuffer::new(ALERT_CAPACITY),
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record the breaches of a fresh snapshot. Returns how many were raised.
    pub fn observe(&mut self, snapshot: &SystemSnapshot) -> usize {
        if !self.enabled {
            return 0;
        }
        self.raise_at(evaluate(snapshot), snapshot.collected_at)
    }

    fn raise_at(&mut self, alerts: Vec<String>, at: DateTime<Local>) -> usize {
        let count = alerts.len();
        let stamp = at.format("%H:%M:%S");
        self.entries
            .push(alerts.into_iter().map(|alert| format!("{} - {}", stamp, alert)));
        count
    }

    /// The entries shown on the dashboard, newest first.
    pub fn recent(&self) -> Vec<&str> {
        self.entries.iter().take(ALERTS_SHOWN).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn snapshot(calls: u32, cpu: f64) -> SystemSnapshot {
        SystemSnapshot {
            active_calls: calls,
            cpu_percent: cpu,
            collected_at: Local.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(),
            ..SystemSnapshot::empty()
        }
    }

    #[test]
    fn test_thresholds_are_exclusive() {
        assert!(evaluate(&snapshot(10, 80.0)).is_empty());
        assert_eq!(
            evaluate(&snapshot(11, 80.5)),
            vec!["High call volume: 11 active calls", "High CPU usage: 80.5%"]
        );
    }

    #[test]
    fn test_buffer_is_bounded_and_newest_first() {
        let mut alerts = AlertBuffer::new(true);
        for calls in 11..=22 {
            alerts.observe(&snapshot(calls, 0.0));
        }
        assert_eq!(alerts.len(), ALERT_CAPACITY);
        let recent = alerts.recent();
        assert_eq!(recent.len(), ALERTS_SHOWN);
        assert_eq!(recent[0], "09:30:00 - High call volume: 22 active calls");
    }

    #[test]
    fn test_disabled_raises_nothing() {
        let mut alerts = AlertBuffer::new(false);
        assert_eq!(alerts.observe(&snapshot(50, 99.0)), 0);
        assert!(alerts.is_empty());
    }
}
