//! Backup and restore of the PBX configuration and data directories
//!
//! Both operations are ordered shell pipelines. The first failing step aborts
//! the run and triggers a compensating action: cleanup of partial artifacts
//! for a backup, an emergency restore of the configuration snapshot for a
//! restore.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use tracing::{info, warn};

use crate::services::executor::{CommandExecutor, CommandResult, CommandStatus};

pub const DEFAULT_BACKUP_DIR: &str = "/tmp/asterisk-backups";
const ARCHIVE_PREFIX: &str = "asterisk-backup-";
const ARCHIVE_SUFFIX: &str = ".tar.gz";

/// Directories captured in every archive.
pub const BACKUP_SOURCES: &[&str] = &[
    "/etc/asterisk",
    "/var/lib/asterisk",
    "/var/spool/asterisk",
    "/var/log/asterisk",
];

/// Quote `value` for safe interpolation into a `sh -c` command line.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Archive file name for a backup taken at `at`.
pub fn archive_name(at: DateTime<Local>) -> String {
    format!("{}{}{}", ARCHIVE_PREFIX, at.format("%Y-%m-%d-%H%M%S"), ARCHIVE_SUFFIX)
}

/// Copy `source` into `staging` under its full path, so `/etc/asterisk`
/// lands at `<staging>/etc/asterisk` and restore finds it there.
pub fn stage_command(source: &str, staging: &str) -> String {
    let parent = Path::new(source)
        .parent()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    let target = shell_quote(&format!("{}{}", staging, parent));
    format!(
        "mkdir -p {target} && cp -r {source} {target}/ 2>/dev/null || echo 'No {raw} access'",
        target = target,
        source = shell_quote(source),
        raw = source,
    )
}

/// Copy the extracted copy of `target` from `restore_dir` back over `target`.
pub fn restore_copy_command(restore_dir: &str, target: &str, label: &str) -> String {
    format!(
        "cp -r {}/* {}/ 2>/dev/null || echo 'No {} files to restore'",
        shell_quote(&format!("{}{}", restore_dir, target)),
        shell_quote(target),
        label
    )
}

fn archive_glob(dir: &str) -> String {
    format!("{}/{}*{}", shell_quote(dir), ARCHIVE_PREFIX, ARCHIVE_SUFFIX)
}

/// Outcome of a backup or restore run.
#[derive(Debug, Clone)]
pub struct OperationReport {
    pub steps: Vec<CommandResult>,
    pub succeeded: bool,
    /// Archive written by a backup run
    pub archive: Option<PathBuf>,
}

impl OperationReport {
    fn failed(steps: Vec<CommandResult>) -> Self {
        Self {
            steps,
            succeeded: false,
            archive: None,
        }
    }
}

pub struct BackupManager {
    executor: Arc<dyn CommandExecutor>,
    step_delay: Duration,
}

impl BackupManager {
    pub fn new(executor: Arc<dyn CommandExecutor>, step_delay: Duration) -> Self {
        Self {
            executor,
            step_delay,
        }
    }

    async fn pause(&self) {
        if !self.step_delay.is_zero() {
            tokio::time::sleep(self.step_delay).await;
        }
    }

    /// Ordered steps of a backup into `dest_dir`, staged in `staging`.
    pub fn backup_plan(dest_dir: &str, staging: &str, archive: &str) -> Vec<String> {
        let mut steps = vec![
            format!("mkdir -p {}", shell_quote(dest_dir)),
            format!("mkdir -p {}", shell_quote(staging)),
        ];
        steps.extend(BACKUP_SOURCES.iter().map(|source| stage_command(source, staging)));
        steps.push(format!(
            "tar -czf {} -C {} .",
            shell_quote(archive),
            shell_quote(staging)
        ));
        steps.push(format!("rm -rf {}", shell_quote(staging)));
        steps.push(format!("chmod 644 {} 2>/dev/null || true", shell_quote(archive)));
        steps
    }

    /// Create a timestamped archive in `dest_dir` (default directory when empty).
    pub async fn create_backup<F>(&self, dest_dir: &str, mut on_step: F) -> OperationReport
    where
        F: FnMut(&CommandResult) + Send,
    {
        let dest_dir = if dest_dir.trim().is_empty() {
            DEFAULT_BACKUP_DIR
        } else {
            dest_dir.trim()
        };
        let now = Local::now();
        let name = archive_name(now);
        let archive = Path::new(dest_dir).join(&name);
        let archive_str = archive.display().to_string();
        let staging = format!("/tmp/{}", name.trim_end_matches(ARCHIVE_SUFFIX));

        let mut steps = Vec::new();
        let started = CommandResult::note(
            "Backup Started",
            CommandStatus::Info,
            format!("Creating backup to: {}", archive_str),
        );
        on_step(&started);
        steps.push(started);

        info!("Creating backup {}", archive_str);
        for (i, command) in Self::backup_plan(dest_dir, &staging, &archive_str).iter().enumerate() {
            let result = self
                .executor
                .execute(&format!("Backup Step {}", i + 1), command)
                .await;
            on_step(&result);
            let failed = !result.is_success();
            steps.push(result);
            self.pause().await;

            if failed {
                warn!("Backup step {} failed, cleaning up", i + 1);
                let cleanup = self
                    .executor
                    .execute(
                        "Cleanup",
                        &format!("rm -rf {} {}", shell_quote(&staging), shell_quote(&archive_str)),
                    )
                    .await;
                on_step(&cleanup);
                steps.push(cleanup);
                return OperationReport::failed(steps);
            }
        }

        let quoted = shell_quote(&archive_str);
        let verify = self
            .executor
            .execute(
                "Verify Backup",
                &format!("test -f {} && tar -tzf {} | wc -l || echo '0'", quoted, quoted),
            )
            .await;

        let completed = match verify.output() {
            Some(count) if count != "0" && !count.is_empty() => CommandResult::note(
                "Backup Completed",
                CommandStatus::Success,
                format!("Backup created successfully: {} ({} files)", archive_str, count),
            ),
            _ => CommandResult::note(
                "Backup Completed",
                CommandStatus::Warning,
                format!("Backup created but verification failed: {}", archive_str),
            ),
        };
        let succeeded = completed.is_success();
        on_step(&completed);
        steps.push(completed);

        OperationReport {
            steps,
            succeeded,
            archive: Some(archive),
        }
    }

    /// Ordered steps restoring `archive` through `restore_dir`, snapshotting
    /// the live configuration into `snapshot_dir` first.
    pub fn restore_plan(archive: &str, restore_dir: &str, snapshot_dir: &str) -> Vec<String> {
        let restore = shell_quote(restore_dir);
        vec![
            format!("mkdir -p {}", restore),
            format!("tar -xzf {} -C {}", shell_quote(archive), restore),
            "systemctl stop asterisk".to_string(),
            format!("cp -r /etc/asterisk {}", shell_quote(snapshot_dir)),
            restore_copy_command(restore_dir, "/etc/asterisk", "config"),
            restore_copy_command(restore_dir, "/var/lib/asterisk", "lib"),
            restore_copy_command(restore_dir, "/var/spool/asterisk", "spool"),
            "chown -R asterisk:asterisk /etc/asterisk/ 2>/dev/null || true".to_string(),
            "chown -R asterisk:asterisk /var/lib/asterisk/ 2>/dev/null || true".to_string(),
            "chown -R asterisk:asterisk /var/spool/asterisk/ 2>/dev/null || true".to_string(),
            "systemctl start asterisk".to_string(),
            format!("rm -rf {}", restore),
        ]
    }

    /// Restore `archive` over the live installation.
    pub async fn restore_backup<F>(&self, archive: &str, mut on_step: F) -> OperationReport
    where
        F: FnMut(&CommandResult) + Send,
    {
        let archive = archive.trim();
        let mut steps = Vec::new();
        let mut record = |result: CommandResult, steps: &mut Vec<CommandResult>| {
            on_step(&result);
            steps.push(result);
        };

        if archive.is_empty() {
            record(
                CommandResult::note("Restore Error", CommandStatus::Error, "No backup file specified"),
                &mut steps,
            );
            return OperationReport::failed(steps);
        }

        record(
            CommandResult::note(
                "Restore Started",
                CommandStatus::Info,
                format!("Starting restore from: {}", archive),
            ),
            &mut steps,
        );

        let exists = self
            .executor
            .execute(
                "Check Backup",
                &format!("test -f {} && echo 'exists' || echo 'not found'", shell_quote(archive)),
            )
            .await;
        if !exists.output().map_or(false, |out| out.contains("exists")) {
            record(
                CommandResult::note(
                    "Restore Error",
                    CommandStatus::Error,
                    format!("Backup file not found: {}", archive),
                ),
                &mut steps,
            );
            return OperationReport::failed(steps);
        }

        // One stamp names both the scratch dir and the config snapshot.
        let stamp = Local::now().timestamp();
        let restore_dir = format!("/tmp/asterisk-restore-{}", stamp);
        let snapshot_dir = format!("/etc/asterisk.backup.{}", stamp);

        info!("Restoring {} (configuration snapshot {})", archive, snapshot_dir);
        for (i, command) in Self::restore_plan(archive, &restore_dir, &snapshot_dir)
            .iter()
            .enumerate()
        {
            let result = self
                .executor
                .execute(&format!("Restore Step {}", i + 1), command)
                .await;
            let failed = !result.is_success();
            record(result, &mut steps);
            self.pause().await;

            if failed {
                warn!("Restore step {} failed, running emergency restore", i + 1);
                let emergency = self
                    .executor
                    .execute(
                        "Emergency Restore",
                        &format!(
                            "cp -r {}/* /etc/asterisk/ && systemctl start asterisk",
                            shell_quote(&snapshot_dir)
                        ),
                    )
                    .await;
                record(emergency, &mut steps);
                return OperationReport::failed(steps);
            }
        }

        record(
            CommandResult::note(
                "Restore Completed",
                CommandStatus::Success,
                format!("Backup restored successfully from: {}", archive),
            ),
            &mut steps,
        );
        OperationReport {
            steps,
            succeeded: true,
            archive: None,
        }
    }

    /// Archive listing with sizes, or a notice when none exist.
    pub async fn list_backups(&self, dir: &str) -> String {
        let dir = if dir.trim().is_empty() {
            DEFAULT_BACKUP_DIR
        } else {
            dir.trim()
        };
        let glob = archive_glob(dir);
        let listing = self
            .executor
            .execute(
                "List Backups",
                &format!("ls -la {} 2>/dev/null | head -20", glob),
            )
            .await;

        match listing.output() {
            Some(out) if !out.is_empty() => {
                let mut report = format!("Available Backups:\n{}", out);
                let sizes = self
                    .executor
                    .execute("Backup Sizes", &format!("du -h {} 2>/dev/null | sort -hr", glob))
                    .await;
                if let Some(sizes) = sizes.output().filter(|s| !s.is_empty()) {
                    report.push_str(&format!("\n\nSizes:\n{}", sizes));
                }
                report
            }
            _ => format!("No backups found in {}", dir),
        }
    }

    /// One-line count, total size and latest date of the archives in `dir`.
    pub async fn backup_stats(&self, dir: &str) -> String {
        let quoted = shell_quote(dir);
        let glob = archive_glob(dir);
        let script = format!(
            "count=$(find {quoted} -name '{prefix}*{suffix}' -type f 2>/dev/null | wc -l); \
             total_size=$(du -ch {glob} 2>/dev/null | grep total | cut -f1); \
             latest=$(ls -t {glob} 2>/dev/null | head -1); \
             if [ -n \"$latest\" ]; then latest_date=$(stat -c %y \"$latest\" 2>/dev/null | cut -d' ' -f1); else latest_date='N/A'; fi; \
             echo \"Backups: $count | Total Size: ${{total_size:-0}} | Latest: $latest_date\"",
            quoted = quoted,
            prefix = ARCHIVE_PREFIX,
            suffix = ARCHIVE_SUFFIX,
            glob = glob,
        );
        let result = self.executor.execute("Backup Stats", &script).await;
        result
            .output()
            .map(str::to_string)
            .unwrap_or_else(|| "Backup statistics unavailable".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::executor::ShellExecutor;
    use crate::testing::ScriptedExecutor;
    use chrono::TimeZone;

    #[test]
    fn test_archive_name() {
        let at = Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(archive_name(at), "asterisk-backup-2024-01-02-030405.tar.gz");
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("/tmp/a b"), "'/tmp/a b'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn test_backup_plan_order() {
        let plan = BackupManager::backup_plan("/backups", "/tmp/stage", "/backups/a.tar.gz");
        assert_eq!(plan.len(), 9);
        assert_eq!(plan[0], "mkdir -p '/backups'");
        assert_eq!(
            plan[2],
            "mkdir -p '/tmp/stage/etc' && cp -r '/etc/asterisk' '/tmp/stage/etc'/ 2>/dev/null \
             || echo 'No /etc/asterisk access'"
        );
        assert!(plan[3].starts_with("mkdir -p '/tmp/stage/var/lib' && cp -r '/var/lib/asterisk'"));
        assert_eq!(plan[6], "tar -czf '/backups/a.tar.gz' -C '/tmp/stage' .");
        assert_eq!(plan[7], "rm -rf '/tmp/stage'");
    }

    #[tokio::test]
    async fn test_backup_success_is_verified() {
        let executor = Arc::new(ScriptedExecutor::new().respond("tar -tzf", "42").respond("", ""));
        let manager = BackupManager::new(executor.clone(), Duration::ZERO);

        let mut streamed = 0;
        let report = manager.create_backup("/backups", |_| streamed += 1).await;

        assert!(report.succeeded);
        assert_eq!(streamed, report.steps.len());
        let last = report.steps.last().unwrap();
        assert_eq!(last.status, CommandStatus::Success);
        assert!(last.message.ends_with("(42 files)"));
        assert!(report
            .archive
            .unwrap()
            .display()
            .to_string()
            .starts_with("/backups/asterisk-backup-"));
        assert!(!executor.was_executed("Cleanup"));
    }

    #[tokio::test]
    async fn test_backup_failure_runs_cleanup() {
        let executor = Arc::new(
            ScriptedExecutor::new()
                .fail("tar -czf", "tar: write error")
                .respond("", ""),
        );
        let manager = BackupManager::new(executor.clone(), Duration::ZERO);

        let report = manager.create_backup("", |_| {}).await;

        assert!(!report.succeeded);
        assert!(report.archive.is_none());
        assert_eq!(report.steps.last().unwrap().name, "Cleanup");
        let executed = executor.executed();
        assert!(executed.last().unwrap().starts_with("rm -rf '/tmp/asterisk-backup-"));
        assert!(!executed.iter().any(|c| c.starts_with("chmod")));
        assert!(executed[0].contains(DEFAULT_BACKUP_DIR));
    }

    #[tokio::test]
    async fn test_restore_missing_archive() {
        let executor = Arc::new(ScriptedExecutor::new().respond("test -f", "not found"));
        let manager = BackupManager::new(executor.clone(), Duration::ZERO);

        let report = manager.restore_backup("/nope.tar.gz", |_| {}).await;
        assert!(!report.succeeded);
        assert_eq!(report.steps.len(), 2);
        assert_eq!(report.steps[1].message, "Backup file not found: /nope.tar.gz");
        assert!(!executor.was_executed("systemctl stop"));

        let report = manager.restore_backup("  ", |_| {}).await;
        assert_eq!(report.steps[0].message, "No backup file specified");
    }

    #[tokio::test]
    async fn test_restore_failure_triggers_emergency_restore() {
        let executor = Arc::new(
            ScriptedExecutor::new()
                .respond("test -f", "exists")
                .fail("systemctl start asterisk", "Job failed")
                .respond("", ""),
        );
        let manager = BackupManager::new(executor.clone(), Duration::ZERO);

        let report = manager.restore_backup("/backups/a.tar.gz", |_| {}).await;
        assert!(!report.succeeded);

        let last = report.steps.last().unwrap();
        assert_eq!(last.name, "Emergency Restore");
        let executed = executor.executed();
        let snapshot = executed
            .iter()
            .find(|c| c.starts_with("cp -r /etc/asterisk '/etc/asterisk.backup."))
            .unwrap();
        let stamp = snapshot.trim_start_matches("cp -r /etc/asterisk ");
        assert!(executed.last().unwrap().contains(stamp));
    }

    #[tokio::test]
    async fn test_restore_success() {
        let executor = Arc::new(ScriptedExecutor::new().respond("test -f", "exists").respond("", ""));
        let manager = BackupManager::new(executor.clone(), Duration::ZERO);

        let report = manager.restore_backup("/backups/a.tar.gz", |_| {}).await;
        assert!(report.succeeded);
        assert_eq!(report.steps.len(), 1 + 12 + 1);
        assert_eq!(report.steps.last().unwrap().name, "Restore Completed");
        assert!(executor.was_executed("chown -R asterisk:asterisk /etc/asterisk/"));
    }

    #[test]
    fn test_restore_reads_where_backup_stages() {
        let staged: Vec<String> = BACKUP_SOURCES
            .iter()
            .map(|source| stage_command(source, "/tmp/stage"))
            .collect();
        let restore = BackupManager::restore_plan("/b/a.tar.gz", "/tmp/r", "/etc/asterisk.backup.1");

        for source in ["/etc/asterisk", "/var/lib/asterisk", "/var/spool/asterisk"] {
            assert!(staged
                .iter()
                .any(|c| c.contains(&format!("'/tmp/stage{}'", Path::new(source).parent().unwrap().display()))));
            assert!(restore
                .iter()
                .any(|c| c.starts_with(&format!("cp -r '/tmp/r{}'/* '{}'/", source, source))));
        }
    }

    #[tokio::test]
    async fn test_staged_archive_restores_every_source() {
        let root = tempfile::tempdir().unwrap();
        let root_path = root.path().display().to_string();
        let sources: Vec<String> = ["etc", "lib", "spool"]
            .iter()
            .map(|name| format!("{}/{}/asterisk", root_path, name))
            .collect();
        for (source, name) in sources.iter().zip(["etc", "lib", "spool"]) {
            std::fs::create_dir_all(source).unwrap();
            std::fs::write(format!("{}/marker.conf", source), name).unwrap();
        }

        let executor = ShellExecutor::new();
        let staging = format!("{}/stage", root_path);
        let archive = format!("{}/backup.tar.gz", root_path);
        let restore_dir = format!("{}/restore", root_path);
        for source in &sources {
            assert!(executor.execute("Stage", &stage_command(source, &staging)).await.is_success());
        }
        let pack = format!("tar -czf {} -C {} .", shell_quote(&archive), shell_quote(&staging));
        assert!(executor.execute("Archive", &pack).await.is_success());
        let unpack = format!(
            "mkdir -p {r} && tar -xzf {} -C {r}",
            shell_quote(&archive),
            r = shell_quote(&restore_dir)
        );
        assert!(executor.execute("Extract", &unpack).await.is_success());

        for (source, name) in sources.iter().zip(["etc", "lib", "spool"]) {
            std::fs::remove_file(format!("{}/marker.conf", source)).unwrap();
            let copy = restore_copy_command(&restore_dir, source, name);
            assert!(executor.execute("Restore", &copy).await.is_success());
            assert_eq!(std::fs::read_to_string(format!("{}/marker.conf", source)).unwrap(), name);
        }
    }

    #[tokio::test]
    async fn test_list_backups() {
        let executor = ScriptedExecutor::new()
            .respond("ls -la", "-rw-r--r-- 1 root root 1024 asterisk-backup-2024.tar.gz")
            .respond("du -h", "1.0K asterisk-backup-2024.tar.gz");
        let manager = BackupManager::new(Arc::new(executor), Duration::ZERO);

        let listing = manager.list_backups("/backups").await;
        assert!(listing.starts_with("Available Backups:"));
        assert!(listing.contains("Sizes:\n1.0K"));

        let empty = BackupManager::new(Arc::new(ScriptedExecutor::new().respond("ls -la", "")), Duration::ZERO);
        assert_eq!(empty.list_backups("/backups").await, "No backups found in /backups");
    }
}
