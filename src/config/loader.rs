use super::types::*;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Load and validate configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate the configuration
///
/// An empty instance list is allowed: a run with nothing to do succeeds.
fn validate_config(config: &Config) -> Result<()> {
    if config.global.rsync_module.is_empty() {
        return Err(ConfigError::ValidationError(
            "rsync_module must not be empty".to_string(),
        ));
    }

    if config.global.command_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "command_timeout_secs must be greater than zero".to_string(),
        ));
    }

    if config.polling.busy_poll_attempts == 0 || config.polling.dump_poll_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "poll attempt counts must be greater than zero".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for instance in &config.instances {
        if instance.address.is_empty() {
            return Err(ConfigError::ValidationError(
                "instance address must not be empty".to_string(),
            ));
        }
        if instance.port == 0 {
            return Err(ConfigError::ValidationError(format!(
                "instance {} has an invalid port",
                instance.address
            )));
        }
        if !seen.insert((instance.address.as_str(), instance.port)) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate instance: {}",
                instance
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config(instances: Vec<Instance>) -> Config {
        Config {
            global: GlobalConfig {
                root_backup_dir: "/data/redis/backups".into(),
                lock_file: "/var/run/redis-backup.lock".into(),
                rsync_module: "redis_backups".to_string(),
                command_timeout_secs: 30,
                log_directory: "/tmp/logs".into(),
                log_level: "info".to_string(),
                log_max_files: 10,
            },
            polling: PollingConfig::default(),
            instances,
        }
    }

    #[test]
    fn test_empty_instance_list_is_valid() {
        let config = base_config(vec![]);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_duplicate_instances_rejected() {
        let instance = Instance {
            address: "10.0.0.1".to_string(),
            port: 6379,
        };
        let config = base_config(vec![instance.clone(), instance]);
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate instance"));
    }

    #[test]
    fn test_zero_port_rejected() {
        let config = base_config(vec![Instance {
            address: "10.0.0.1".to_string(),
            port: 0,
        }]);
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_empty_rsync_module_rejected() {
        let mut config = base_config(vec![]);
        config.global.rsync_module.clear();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_poll_attempts_rejected() {
        let mut config = base_config(vec![]);
        config.polling.dump_poll_attempts = 0;
        assert!(validate_config(&config).is_err());
    }
}
