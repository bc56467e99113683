//! Backup manager - orchestrates one backup run
//!
//! `BackupManager` owns a run: it takes the run-wide lock, builds the
//! timestamped destination directory and drives every configured instance
//! through the dump-and-transfer sequence, collecting exactly one outcome
//! per instance. Per-instance failures never abort the run.

use crate::config::{Config, Instance};
use crate::utils::locker::RunLock;
use crate::utils::store::{Role, StoreClient, StoreError};
use crate::utils::transfer::SnapshotTransfer;
use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Local, Timelike};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

/// Final outcome of one instance's backup attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupOutcome {
    /// Snapshot triggered, completed and transferred
    Success,
    /// Instance did not answer a store request
    SkippedUnreachable,
    /// Instance is not a replica; dumping it would load a primary
    SkippedNotReplica,
    /// A pre-existing dump outlasted the bounded wait
    SkippedBusyTimeout,
    /// The triggered dump outlasted the bounded wait
    SkippedDumpTimeout,
    /// Dump completed but the copy to local storage failed
    SkippedTransferFailed,
}

impl BackupOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, BackupOutcome::Success)
    }
}

impl std::fmt::Display for BackupOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BackupOutcome::Success => "success",
            BackupOutcome::SkippedUnreachable => "unreachable",
            BackupOutcome::SkippedNotReplica => "not a replica",
            BackupOutcome::SkippedBusyTimeout => "prior dump never finished",
            BackupOutcome::SkippedDumpTimeout => "dump took too long",
            BackupOutcome::SkippedTransferFailed => "transfer failed",
        };
        f.write_str(s)
    }
}

/// Record of one instance's attempt, created exactly once per run
#[derive(Debug, Clone)]
pub struct BackupAttempt {
    pub instance: Instance,
    pub outcome: BackupOutcome,
    /// Local path the snapshot was written to (Success only)
    pub destination: Option<PathBuf>,
}

fn skip(instance: &Instance, outcome: BackupOutcome) -> BackupAttempt {
    BackupAttempt {
        instance: instance.clone(),
        outcome,
        destination: None,
    }
}

/// Aggregated result of a whole run
#[derive(Debug)]
pub struct RunReport {
    pub started_at: DateTime<Local>,
    pub backup_directory: PathBuf,
    pub attempts: Vec<BackupAttempt>,
}

impl RunReport {
    /// Attempts that did not produce a backup
    pub fn failures(&self) -> impl Iterator<Item = &BackupAttempt> {
        self.attempts.iter().filter(|a| !a.outcome.is_success())
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    /// True when every configured instance was backed up (or none was configured)
    pub fn all_succeeded(&self) -> bool {
        self.failure_count() == 0
    }
}

/// Destination directory for a run started at `now`
///
/// Components are not zero-padded: `root/2024/3/5/14/22`.
pub fn backup_directory_for(root: &Path, now: DateTime<Local>) -> PathBuf {
    root.join(format!(
        "{}/{}/{}/{}/{}",
        now.year(),
        now.month(),
        now.day(),
        now.hour(),
        now.minute()
    ))
}

/// Local filename for an instance's snapshot: `{address}_{port}.{ext}`
fn destination_path(backup_directory: &Path, instance: &Instance, snapshot_path: &Path) -> PathBuf {
    let ext = snapshot_path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("rdb");
    backup_directory.join(format!("{}_{}.{}", instance.address, instance.port, ext))
}

pub struct BackupManager {
    config: Config,
    client: Arc<dyn StoreClient>,
    transfer: Arc<dyn SnapshotTransfer>,
}

impl BackupManager {
    /// Create new backup manager
    pub fn new(
        config: Config,
        client: Arc<dyn StoreClient>,
        transfer: Arc<dyn SnapshotTransfer>,
    ) -> Self {
        Self {
            config,
            client,
            transfer,
        }
    }

    /// Run one full backup pass over the configured instances
    ///
    /// Fails without touching any instance when the run lock is already
    /// held. The lock is released on every exit path, including errors
    /// raised inside the instance loop.
    pub fn run(&self) -> Result<RunReport> {
        let _lock = RunLock::acquire(&self.config.global.lock_file)?;

        let started_at = Local::now();
        let root = crate::config::expand_tilde(&self.config.global.root_backup_dir);
        let backup_directory = backup_directory_for(&root, started_at);
        fs::create_dir_all(&backup_directory)
            .with_context(|| format!("Failed to create backup directory: {:?}", backup_directory))?;

        info!(
            "Starting backup run for {} instance(s) into {}",
            self.config.instances.len(),
            backup_directory.display()
        );

        let mut attempts = Vec::with_capacity(self.config.instances.len());
        for instance in &self.config.instances {
            let attempt = self.backup_instance(instance, &backup_directory);
            match attempt.outcome {
                BackupOutcome::Success => info!("[{}] backup complete", instance),
                outcome => warn!("[{}] skipped: {}", instance, outcome),
            }
            attempts.push(attempt);
        }

        let report = RunReport {
            started_at,
            backup_directory,
            attempts,
        };
        info!(
            "Backup run finished: {} succeeded, {} skipped",
            report.attempts.len() - report.failure_count(),
            report.failure_count()
        );
        Ok(report)
    }

    /// Drive a single instance through availability check, dump and transfer
    fn backup_instance(&self, instance: &Instance, backup_directory: &Path) -> BackupAttempt {
        let timeout = self.config.global.command_timeout();
        let polling = &self.config.polling;

        // Availability gate: only reachable replicas are eligible
        match self.client.role(instance, timeout) {
            Ok(Role::Replica) => {}
            Ok(_) => {
                warn!("[{}] not a replica, skipping instance", instance);
                return skip(instance, BackupOutcome::SkippedNotReplica);
            }
            Err(e) => {
                warn!("[{}] unable to connect, skipping instance: {}", instance, e);
                return skip(instance, BackupOutcome::SkippedUnreachable);
            }
        }

        // Wait out a dump some other client may have started
        match self.wait_until_idle(
            instance,
            polling.busy_poll_interval(),
            polling.busy_poll_attempts,
            "another dump is already in progress",
        ) {
            Ok(true) => {}
            Ok(false) => {
                warn!(
                    "[{}] another dump is already in progress, too many retries, skipping",
                    instance
                );
                return skip(instance, BackupOutcome::SkippedBusyTimeout);
            }
            Err(e) => {
                warn!("[{}] unable to connect, skipping instance: {}", instance, e);
                return skip(instance, BackupOutcome::SkippedUnreachable);
            }
        }

        info!("[{}] starting background dump", instance);
        if let Err(e) = self.client.trigger_snapshot(instance, timeout) {
            warn!("[{}] failed to trigger dump: {}", instance, e);
            return skip(instance, BackupOutcome::SkippedUnreachable);
        }
        // Give the asynchronous trigger time to register as in-progress,
        // otherwise the first poll below can observe the pre-trigger state
        thread::sleep(polling.post_trigger_delay());

        match self.wait_until_idle(
            instance,
            polling.dump_poll_interval(),
            polling.dump_poll_attempts,
            "dump in progress",
        ) {
            Ok(true) => info!("[{}] dump done", instance),
            Ok(false) => {
                warn!("[{}] dump took too long, skipping", instance);
                return skip(instance, BackupOutcome::SkippedDumpTimeout);
            }
            Err(e) => {
                warn!("[{}] unable to connect, skipping instance: {}", instance, e);
                return skip(instance, BackupOutcome::SkippedUnreachable);
            }
        }

        let snapshot_path = match self.client.snapshot_file_path(instance, timeout) {
            Ok(path) => path,
            Err(e) => {
                warn!("[{}] unable to resolve dump path: {}", instance, e);
                return skip(instance, BackupOutcome::SkippedUnreachable);
            }
        };
        let snapshot_filename = snapshot_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dump.rdb".to_string());
        let destination = destination_path(backup_directory, instance, &snapshot_path);

        if let Err(e) = self.transfer.fetch_snapshot(
            instance,
            &self.config.global.rsync_module,
            &snapshot_filename,
            &destination,
            timeout,
        ) {
            warn!("[{}] transfer failed: {}", instance, e);
            return skip(instance, BackupOutcome::SkippedTransferFailed);
        }

        BackupAttempt {
            instance: instance.clone(),
            outcome: BackupOutcome::Success,
            destination: Some(destination),
        }
    }

    /// Poll the busy flag up to `attempts` times, sleeping `interval`
    /// between checks
    ///
    /// Returns Ok(true) once the instance reports idle, Ok(false) when
    /// every check saw a dump still running. Exhausting the attempts is an
    /// unconditional exit from the loop.
    fn wait_until_idle(
        &self,
        instance: &Instance,
        interval: Duration,
        attempts: u32,
        what: &str,
    ) -> Result<bool, StoreError> {
        let timeout = self.config.global.command_timeout();
        for attempt in 0..attempts {
            if !self.client.snapshot_in_progress(instance, timeout)? {
                return Ok(true);
            }
            info!(
                "[{}] {}, please wait {}/{}",
                instance,
                what,
                attempt,
                attempts.saturating_sub(1)
            );
            thread::sleep(interval);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_backup_directory_not_zero_padded() {
        let now = Local.with_ymd_and_hms(2024, 3, 5, 14, 22, 7).unwrap();
        let dir = backup_directory_for(Path::new("/data/redis/backups"), now);
        assert_eq!(dir, PathBuf::from("/data/redis/backups/2024/3/5/14/22"));
    }

    #[test]
    fn test_backup_directory_double_digit_components() {
        let now = Local.with_ymd_and_hms(2025, 11, 30, 3, 5, 0).unwrap();
        let dir = backup_directory_for(Path::new("/b"), now);
        assert_eq!(dir, PathBuf::from("/b/2025/11/30/3/5"));
    }

    #[test]
    fn test_destination_path_uses_snapshot_extension() {
        let instance = Instance {
            address: "10.0.0.1".to_string(),
            port: 6379,
        };
        let dest = destination_path(
            Path::new("/b/2024/3/5/14/22"),
            &instance,
            Path::new("/var/lib/redis/dump.rdb"),
        );
        assert_eq!(dest, PathBuf::from("/b/2024/3/5/14/22/10.0.0.1_6379.rdb"));
    }

    #[test]
    fn test_destination_path_defaults_to_rdb() {
        let instance = Instance {
            address: "10.0.0.1".to_string(),
            port: 6379,
        };
        let dest = destination_path(Path::new("/b"), &instance, Path::new("/var/lib/redis/dump"));
        assert_eq!(dest, PathBuf::from("/b/10.0.0.1_6379.rdb"));
    }

    #[test]
    fn test_outcome_success_check() {
        assert!(BackupOutcome::Success.is_success());
        assert!(!BackupOutcome::SkippedBusyTimeout.is_success());
    }
}
