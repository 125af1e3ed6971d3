//! Security posture scans

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::SecurityConfig;
use crate::services::diagnostics::CheckSummary;
use crate::services::executor::{CommandExecutor, CommandResult, CommandStatus};

const FIREWALL_STATUS: &str = "systemctl is-active ufw 2>/dev/null || systemctl is-active firewalld 2>/dev/null || echo 'No firewall detected'";
const PROCESS_USER: &str = "ps aux | grep asterisk | grep -v grep | awk '{print $1}' | head -1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckCategory {
    Network,
    Service,
    Permissions,
    Process,
    Tls,
    Authentication,
    Logging,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityCheck {
    pub name: &'static str,
    pub command: &'static str,
    pub category: CheckCategory,
}

const fn check(name: &'static str, command: &'static str, category: CheckCategory) -> SecurityCheck {
    SecurityCheck {
        name,
        command,
        category,
    }
}

// Port and service probes end in `|| true`: an empty grep or an inactive unit
// is a finding for the analyzer, not a failed command.
const QUICK_CHECKS: &[SecurityCheck] = &[
    check(
        "Open SIP Ports",
        "netstat -tlnp | grep -E ':(5060|5061|5062)' | grep LISTEN || true",
        CheckCategory::Network,
    ),
    check(
        "Open AMI Port",
        "netstat -tlnp | grep ':5038' | grep LISTEN || true",
        CheckCategory::Network,
    ),
    check(
        "Fail2Ban Status",
        "systemctl is-active fail2ban || true",
        CheckCategory::Service,
    ),
    check("Firewall Status", FIREWALL_STATUS, CheckCategory::Service),
    check("Asterisk Process User", PROCESS_USER, CheckCategory::Process),
];

const FULL_CHECKS: &[SecurityCheck] = &[
    check(
        "Open Network Ports",
        "netstat -tlnp | grep -E ':(5060|5061|5062|5038|10000)' || true",
        CheckCategory::Network,
    ),
    check(
        "SIP Port Exposure",
        "ss -tlnp | grep -E ':(5060|5061)' | awk '{print $4}'",
        CheckCategory::Network,
    ),
    check(
        "AMI Port Exposure",
        "ss -tlnp | grep ':5038' | awk '{print $4}'",
        CheckCategory::Network,
    ),
    check(
        "Fail2Ban Status",
        "systemctl is-active fail2ban || true",
        CheckCategory::Service,
    ),
    check("Firewall Status", FIREWALL_STATUS, CheckCategory::Service),
    check(
        "SELinux Status",
        "getenforce 2>/dev/null || echo 'SELinux not available'",
        CheckCategory::Service,
    ),
    check(
        "Asterisk Config Permissions",
        "find /etc/asterisk -type f -perm /o+rw -ls | wc -l",
        CheckCategory::Permissions,
    ),
    check(
        "Asterisk Directory Permissions",
        "find /etc/asterisk -type d -perm /o+rwx -ls | wc -l",
        CheckCategory::Permissions,
    ),
    check(
        "Asterisk File Ownership",
        "find /etc/asterisk ! -user asterisk -type f | wc -l",
        CheckCategory::Permissions,
    ),
    check("Asterisk Process User", PROCESS_USER, CheckCategory::Process),
    check(
        "Asterisk Running as Root",
        "ps aux | grep asterisk | grep -v grep | grep root | wc -l",
        CheckCategory::Process,
    ),
    check(
        "SSL Certificate Check",
        "find /etc/asterisk -name '*.pem' -exec openssl x509 -checkend 86400 -in {} \\; 2>/dev/null | grep -c 'will expire' || echo 'No SSL certificates found'",
        CheckCategory::Tls,
    ),
    check(
        "TLS Configuration",
        "grep -r 'tls' /etc/asterisk/*.conf 2>/dev/null | grep -v '^#' | wc -l",
        CheckCategory::Tls,
    ),
    check(
        "Default Passwords Check",
        "grep -r 'password' /etc/asterisk/sip.conf 2>/dev/null | grep -v '^#' | grep -v '^;' | head -5",
        CheckCategory::Authentication,
    ),
    check(
        "AMI Authentication",
        "grep -r 'secret\\|password' /etc/asterisk/manager.conf 2>/dev/null | grep -v '^#' | grep -v '^;' | head -3",
        CheckCategory::Authentication,
    ),
    check(
        "Log File Permissions",
        "ls -la /var/log/asterisk/ 2>/dev/null | head -5",
        CheckCategory::Logging,
    ),
    check(
        "Debug Mode Check",
        "grep -r 'debug' /etc/asterisk/logger.conf 2>/dev/null | grep -v '^#' | grep -v 'off' | wc -l",
        CheckCategory::Logging,
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    Quick,
    Full,
}

/// Checks of a scan, minus the categories disabled in `config`.
pub fn checks_for(kind: ScanKind, config: &SecurityConfig) -> Vec<SecurityCheck> {
    let all = match kind {
        ScanKind::Quick => QUICK_CHECKS,
        ScanKind::Full => FULL_CHECKS,
    };
    all.iter()
        .copied()
        .filter(|c| config.check_firewall || c.name != "Firewall Status")
        .filter(|c| config.check_ssl || c.category != CheckCategory::Tls)
        .filter(|c| config.check_passwords || c.category != CheckCategory::Authentication)
        .collect()
}

fn exposed_to_all_interfaces(output: &str) -> bool {
    output.contains("0.0.0.0") || output.contains(":::")
}

fn flag(result: &mut CommandResult, status: CommandStatus, note: &str) {
    result.status = status;
    if result.message.is_empty() {
        result.message = note.to_string();
    } else {
        result.message = format!("{} - {}", result.message, note);
    }
}

/// Grade a raw check result by the rules of its check name.
///
/// A result carrying an error is always graded `Error`.
pub fn analyze(mut result: CommandResult) -> CommandResult {
    if !result.error.is_empty() {
        result.status = CommandStatus::Error;
        return result;
    }

    match result.name.as_str() {
        "Open SIP Ports" => {
            if exposed_to_all_interfaces(&result.message) {
                flag(&mut result, CommandStatus::Warning, "SIP ports exposed to all interfaces");
            } else if result.message.is_empty() {
                result.message = "No SIP ports open to public".to_string();
            }
        }
        "Open AMI Port" => {
            if exposed_to_all_interfaces(&result.message) {
                flag(
                    &mut result,
                    CommandStatus::Error,
                    "AMI port exposed to all interfaces - SECURITY RISK",
                );
            } else if result.message.is_empty() {
                result.message = "AMI port not exposed to public".to_string();
            }
        }
        "Fail2Ban Status" => {
            if result.message != "active" {
                flag(&mut result, CommandStatus::Warning, "Fail2Ban not active");
            }
        }
        "Firewall Status" => {
            if result.message.contains("inactive") || result.message.contains("No firewall") {
                flag(&mut result, CommandStatus::Warning, "Firewall not active");
            }
        }
        "Asterisk Config Permissions" => {
            if result.message != "0" {
                flag(&mut result, CommandStatus::Error, "World-writable config files found");
            }
        }
        "Asterisk Process User" => {
            if result.message == "root" {
                flag(&mut result, CommandStatus::Warning, "Running as root - not recommended");
            }
        }
        "Asterisk Running as Root" => {
            if result.message != "0" {
                flag(&mut result, CommandStatus::Error, "Asterisk should not run as root");
            }
        }
        "SSL Certificate Check" => {
            if result.message != "No SSL certificates found" && result.message != "0" {
                flag(&mut result, CommandStatus::Warning, "SSL certificates expiring soon");
            }
        }
        "Default Passwords Check" => {
            if !result.message.is_empty() {
                flag(&mut result, CommandStatus::Warning, "Check for default passwords");
            }
        }
        _ => {}
    }
    result
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Posture {
    Good,
    NeedsImprovement,
    Poor,
}

impl fmt::Display for Posture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Posture::Good => "Good security posture",
            Posture::NeedsImprovement => "Needs improvement",
            Posture::Poor => "Poor security posture",
        })
    }
}

/// Overall grade of a finished scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityScore {
    pub summary: CheckSummary,
    /// Passed checks as a percentage of graded checks
    pub percent: usize,
    pub posture: Posture,
}

impl SecurityScore {
    /// `None` when no result carries a verdict.
    pub fn from_results(results: &[CommandResult]) -> Option<Self> {
        let summary = CheckSummary::from_results(results);
        let total = summary.graded();
        if total == 0 {
            return None;
        }

        let percent = summary.success * 100 / total;
        let posture = match percent {
            80.. => Posture::Good,
            60..=79 => Posture::NeedsImprovement,
            _ => Posture::Poor,
        };
        Some(Self {
            summary,
            percent,
            posture,
        })
    }
}

pub struct SecurityScanner {
    executor: Arc<dyn CommandExecutor>,
    config: SecurityConfig,
    step_delay: Duration,
}

impl SecurityScanner {
    pub fn new(executor: Arc<dyn CommandExecutor>, config: SecurityConfig, step_delay: Duration) -> Self {
        Self {
            executor,
            config,
            step_delay,
        }
    }

    /// Run a scan in order, calling `on_result` with each graded result.
    pub async fn scan<F>(&self, kind: ScanKind, mut on_result: F) -> Vec<CommandResult>
    where
        F: FnMut(&CommandResult) + Send,
    {
        let checks = checks_for(kind, &self.config);
        info!("Running {:?} security scan ({} checks)", kind, checks.len());

        let mut results = Vec::with_capacity(checks.len());
        for (i, check) in checks.iter().enumerate() {
            if i > 0 && !self.step_delay.is_zero() {
                tokio::time::sleep(self.step_delay).await;
            }
            let result = analyze(self.executor.execute(check.name, check.command).await);
            on_result(&result);
            results.push(result);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedExecutor;

    fn result(name: &str, message: &str) -> CommandResult {
        CommandResult::success(name, message)
    }

    #[test]
    fn test_check_lists() {
        let all = SecurityConfig::default();
        assert_eq!(checks_for(ScanKind::Quick, &all).len(), 5);
        assert_eq!(checks_for(ScanKind::Full, &all).len(), 17);

        let relaxed = SecurityConfig {
            check_firewall: false,
            check_passwords: false,
            check_ssl: false,
        };
        let full = checks_for(ScanKind::Full, &relaxed);
        assert_eq!(full.len(), 12);
        assert!(full.iter().all(|c| c.name != "Firewall Status"));
        assert!(full.iter().all(|c| c.category != CheckCategory::Tls));
        assert_eq!(checks_for(ScanKind::Quick, &relaxed).len(), 4);
    }

    #[test]
    fn test_port_rules() {
        let exposed = analyze(result("Open SIP Ports", "tcp 0 0 0.0.0.0:5060 0.0.0.0:* LISTEN"));
        assert_eq!(exposed.status, CommandStatus::Warning);
        assert!(exposed.message.ends_with("SIP ports exposed to all interfaces"));

        let closed = analyze(result("Open SIP Ports", ""));
        assert_eq!(closed.status, CommandStatus::Success);
        assert_eq!(closed.message, "No SIP ports open to public");

        let ami = analyze(result("Open AMI Port", "tcp6 0 0 :::5038 :::* LISTEN"));
        assert_eq!(ami.status, CommandStatus::Error);
    }

    #[test]
    fn test_service_and_process_rules() {
        assert_eq!(analyze(result("Fail2Ban Status", "active")).status, CommandStatus::Success);
        assert_eq!(analyze(result("Fail2Ban Status", "inactive")).status, CommandStatus::Warning);
        assert_eq!(
            analyze(result("Firewall Status", "No firewall detected")).status,
            CommandStatus::Warning
        );
        assert_eq!(analyze(result("Firewall Status", "active")).status, CommandStatus::Success);
        assert_eq!(analyze(result("Asterisk Process User", "root")).status, CommandStatus::Warning);
        assert_eq!(analyze(result("Asterisk Running as Root", "1")).status, CommandStatus::Error);
        assert_eq!(analyze(result("Asterisk Running as Root", "0")).status, CommandStatus::Success);
        assert_eq!(
            analyze(result("Asterisk Config Permissions", "3")).status,
            CommandStatus::Error
        );
    }

    #[test]
    fn test_tls_and_password_rules() {
        assert_eq!(
            analyze(result("SSL Certificate Check", "No SSL certificates found")).status,
            CommandStatus::Success
        );
        assert_eq!(analyze(result("SSL Certificate Check", "2")).status, CommandStatus::Warning);
        assert_eq!(
            analyze(result("Default Passwords Check", "secret=1234")).status,
            CommandStatus::Warning
        );
        assert_eq!(analyze(result("Default Passwords Check", "")).status, CommandStatus::Success);
    }

    #[test]
    fn test_error_forces_error() {
        let failed = CommandResult::failure("Fail2Ban Status", "systemctl", "exit status 3");
        assert_eq!(analyze(failed).status, CommandStatus::Error);
    }

    #[test]
    fn test_score() {
        let mut results = vec![
            result("a", ""),
            result("b", ""),
            result("c", ""),
            result("d", ""),
            CommandResult::note("e", CommandStatus::Warning, ""),
        ];
        let score = SecurityScore::from_results(&results).unwrap();
        assert_eq!(score.percent, 80);
        assert_eq!(score.posture, Posture::Good);

        results.push(CommandResult::note("f", CommandStatus::Error, ""));
        let score = SecurityScore::from_results(&results).unwrap();
        assert_eq!(score.percent, 66);
        assert_eq!(score.posture, Posture::NeedsImprovement);

        results.push(CommandResult::note("g", CommandStatus::Error, ""));
        let score = SecurityScore::from_results(&results).unwrap();
        assert_eq!(score.posture, Posture::Poor);

        assert!(SecurityScore::from_results(&[]).is_none());
    }

    #[tokio::test]
    async fn test_quick_scan() {
        let executor = ScriptedExecutor::new()
            .respond("grep ':5038'", "")
            .respond("5060|5061|5062", "tcp 0 0 0.0.0.0:5060 0.0.0.0:* LISTEN")
            .respond("fail2ban", "active")
            .respond("ufw", "inactive")
            .respond("awk '{print $1}'", "asterisk");
        let scanner = SecurityScanner::new(Arc::new(executor), SecurityConfig::default(), Duration::ZERO);

        let mut seen = 0;
        let results = scanner.scan(ScanKind::Quick, |_| seen += 1).await;
        assert_eq!(seen, 5);

        let statuses: Vec<CommandStatus> = results.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![
                CommandStatus::Warning,
                CommandStatus::Success,
                CommandStatus::Success,
                CommandStatus::Warning,
                CommandStatus::Success,
            ]
        );
        let score = SecurityScore::from_results(&results).unwrap();
        assert_eq!(score.percent, 60);
    }
}
