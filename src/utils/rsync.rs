//! rsync subprocess utilities

use super::command;
use crate::config::Instance;
use anyhow::Result;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Build the daemon-mode source spec `host::module/port/filename`
///
/// The module is expected to export one directory per instance port.
pub fn module_source(instance: &Instance, module: &str, snapshot_filename: &str) -> String {
    format!(
        "{}::{}/{}/{}",
        instance.address, module, instance.port, snapshot_filename
    )
}

/// Pull a remote snapshot file to a local destination, preserving times
pub fn fetch(source: &str, destination: &Path, timeout: Duration) -> Result<()> {
    info!("Transferring {} -> {}", source, destination.display());

    let dest = destination.display().to_string();
    command::run_command("rsync", &["-t", source, dest.as_str()], Some(timeout))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_source_format() {
        let instance = Instance {
            address: "10.0.0.1".to_string(),
            port: 6379,
        };
        assert_eq!(
            module_source(&instance, "redis_backups", "dump.rdb"),
            "10.0.0.1::redis_backups/6379/dump.rdb"
        );
    }
}
