use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub global: GlobalConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub instances: Vec<Instance>,
}

/// Global configuration settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GlobalConfig {
    /// Root directory of the timestamped backup tree
    pub root_backup_dir: PathBuf,

    /// Marker file enforcing single-run exclusivity
    #[serde(default = "default_lock_file")]
    pub lock_file: PathBuf,

    /// rsync daemon module exporting the instances' dump directories
    pub rsync_module: String,

    /// Timeout for individual redis-cli and rsync invocations
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    /// Logging configuration
    #[serde(default = "default_log_directory")]
    pub log_directory: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_max_files")]
    pub log_max_files: u32,
}

impl GlobalConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// Poll intervals and bounds for the per-instance dump sequence
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PollingConfig {
    /// Interval between checks while waiting out a pre-existing dump
    #[serde(default = "default_busy_poll_interval")]
    pub busy_poll_interval_secs: u64,

    /// Checks before giving up on a pre-existing dump
    #[serde(default = "default_poll_attempts")]
    pub busy_poll_attempts: u32,

    /// Delay after the trigger so the dump registers as in-progress
    #[serde(default = "default_post_trigger_delay")]
    pub post_trigger_delay_secs: u64,

    /// Interval between checks while the triggered dump runs
    #[serde(default = "default_dump_poll_interval")]
    pub dump_poll_interval_secs: u64,

    /// Checks before giving up on the triggered dump
    #[serde(default = "default_poll_attempts")]
    pub dump_poll_attempts: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            busy_poll_interval_secs: default_busy_poll_interval(),
            busy_poll_attempts: default_poll_attempts(),
            post_trigger_delay_secs: default_post_trigger_delay(),
            dump_poll_interval_secs: default_dump_poll_interval(),
            dump_poll_attempts: default_poll_attempts(),
        }
    }
}

impl PollingConfig {
    pub fn busy_poll_interval(&self) -> Duration {
        Duration::from_secs(self.busy_poll_interval_secs)
    }

    pub fn post_trigger_delay(&self) -> Duration {
        Duration::from_secs(self.post_trigger_delay_secs)
    }

    pub fn dump_poll_interval(&self) -> Duration {
        Duration::from_secs(self.dump_poll_interval_secs)
    }
}

/// One replicated store instance, identified by (address, port)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Instance {
    pub address: String,
    pub port: u16,
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

// Default value functions

fn default_lock_file() -> PathBuf {
    PathBuf::from("/var/run/redis-backup.lock")
}
fn default_command_timeout() -> u64 {
    30
}
fn default_log_directory() -> PathBuf {
    PathBuf::from("~/logs")
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_max_files() -> u32 {
    10
}
fn default_busy_poll_interval() -> u64 {
    1
}
fn default_dump_poll_interval() -> u64 {
    5
}
fn default_post_trigger_delay() -> u64 {
    1
}
fn default_poll_attempts() -> u32 {
    31
}
