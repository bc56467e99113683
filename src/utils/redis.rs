//! redis-cli subprocess utilities
//!
//! Every management operation against an instance goes through `redis-cli`
//! with a per-call timeout; the store's wire protocol is never spoken
//! directly.

use super::command;
use crate::config::Instance;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Replication role reported by an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Primary,
    Replica,
    Unknown,
}

fn redis_cli(instance: &Instance, args: &[&str], timeout: Duration) -> Result<String> {
    let port = instance.port.to_string();
    let mut full_args = vec!["-h", instance.address.as_str(), "-p", port.as_str()];
    full_args.extend_from_slice(args);
    command::run_command_stdout("redis-cli", &full_args, Some(timeout))
}

/// Extract a `key:value` field from INFO output
pub fn parse_info_field<'a>(info: &'a str, field: &str) -> Option<&'a str> {
    info.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        (key == field).then(|| value.trim_end_matches('\r'))
    })
}

fn parse_role(info: &str) -> Role {
    match parse_info_field(info, "role") {
        Some("master") => Role::Primary,
        Some("slave") | Some("replica") => Role::Replica,
        _ => Role::Unknown,
    }
}

/// Query the replication role via INFO
pub fn query_role(instance: &Instance, timeout: Duration) -> Result<Role> {
    let info = redis_cli(instance, &["info", "replication"], timeout)?;
    let role = parse_role(&info);
    debug!("Instance {} reports role {:?}", instance, role);
    Ok(role)
}

/// Check whether a background RDB save is currently running
pub fn bgsave_in_progress(instance: &Instance, timeout: Duration) -> Result<bool> {
    let info = redis_cli(instance, &["info", "persistence"], timeout)?;
    let value = parse_info_field(&info, "rdb_bgsave_in_progress")
        .context("INFO persistence did not report rdb_bgsave_in_progress")?;
    Ok(value != "0")
}

/// Start a background RDB save without waiting for it to finish
pub fn trigger_bgsave(instance: &Instance, timeout: Duration) -> Result<()> {
    redis_cli(instance, &["bgsave"], timeout)?;
    Ok(())
}

/// Read a single CONFIG GET value
///
/// redis-cli prints the key on one line and the value on the next.
fn config_get(instance: &Instance, key: &str, timeout: Duration) -> Result<Option<String>> {
    let output = redis_cli(instance, &["config", "get", key], timeout)?;
    let mut lines = output.lines().map(|l| l.trim_end_matches('\r'));
    match (lines.next(), lines.next()) {
        (Some(k), Some(v)) if k == key && !v.is_empty() => Ok(Some(v.to_string())),
        _ => Ok(None),
    }
}

/// Resolve the remote dump file path from the instance's own configuration
pub fn snapshot_file_path(instance: &Instance, timeout: Duration) -> Result<PathBuf> {
    let dir = config_get(instance, "dir", timeout)?.context("CONFIG GET dir returned no value")?;
    let filename =
        config_get(instance, "dbfilename", timeout)?.unwrap_or_else(|| "dump.rdb".to_string());
    Ok(PathBuf::from(dir).join(filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPLICATION_INFO: &str = "# Replication\r\nrole:slave\r\nmaster_host:10.0.0.9\r\n";

    #[test]
    fn test_parse_info_field() {
        assert_eq!(parse_info_field(REPLICATION_INFO, "role"), Some("slave"));
        assert_eq!(
            parse_info_field(REPLICATION_INFO, "master_host"),
            Some("10.0.0.9")
        );
        assert_eq!(parse_info_field(REPLICATION_INFO, "missing"), None);
    }

    #[test]
    fn test_parse_info_field_ignores_section_headers() {
        assert_eq!(parse_info_field("# Persistence\nloading:0\n", "loading"), Some("0"));
    }

    #[test]
    fn test_parse_role_replica() {
        assert_eq!(parse_role("role:slave\n"), Role::Replica);
        assert_eq!(parse_role("role:replica\n"), Role::Replica);
    }

    #[test]
    fn test_parse_role_primary() {
        assert_eq!(parse_role("role:master\n"), Role::Primary);
    }

    #[test]
    fn test_parse_role_unknown() {
        assert_eq!(parse_role("role:sentinel\n"), Role::Unknown);
        assert_eq!(parse_role("# Replication\n"), Role::Unknown);
    }
}
