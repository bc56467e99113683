//! Configuration module for redis-backup
//!
//! This module handles loading and validating configuration from TOML files.
//! The whole runtime surface is an explicit configuration record handed to
//! the backup manager; there are no process-wide mutable settings.

mod loader;
mod types;

pub use loader::{load_config, ConfigError, Result};
pub use types::*;

/// Expand tilde (~) in path
pub fn expand_tilde(path: &std::path::Path) -> std::path::PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_expand_tilde() {
        let path = PathBuf::from("~/backups");
        let expanded = expand_tilde(&path);
        assert!(!expanded.starts_with("~"));

        // Non-tilde path should be unchanged
        let path = PathBuf::from("/absolute/path");
        let expanded = expand_tilde(&path);
        assert_eq!(expanded, path);
    }

    #[test]
    fn test_polling_defaults() {
        let polling = PollingConfig::default();
        assert_eq!(polling.busy_poll_interval_secs, 1);
        assert_eq!(polling.busy_poll_attempts, 31);
        assert_eq!(polling.post_trigger_delay_secs, 1);
        assert_eq!(polling.dump_poll_interval_secs, 5);
        assert_eq!(polling.dump_poll_attempts, 31);
    }

    #[test]
    fn test_instance_display() {
        let instance = Instance {
            address: "10.0.0.1".to_string(),
            port: 6379,
        };
        assert_eq!(instance.to_string(), "10.0.0.1:6379");
    }
}
