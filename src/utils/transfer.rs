//! Snapshot transfer abstraction for testability
//!
//! The transfer is an opaque "copy snapshot to destination" collaborator;
//! the default implementation pulls over an rsync daemon module.

use crate::config::Instance;
use crate::utils::rsync;
use anyhow::Result;
use std::path::Path;
use std::time::Duration;

/// Abstraction over the snapshot file transfer
pub trait SnapshotTransfer: Send + Sync {
    /// Copy an instance's snapshot file to the local destination path
    fn fetch_snapshot(
        &self,
        instance: &Instance,
        module: &str,
        snapshot_filename: &str,
        destination: &Path,
        timeout: Duration,
    ) -> Result<()>;
}

/// Default implementation using rsync
#[derive(Debug, Clone, Default)]
pub struct RsyncTransfer;

impl RsyncTransfer {
    pub fn new() -> Self {
        Self
    }
}

impl SnapshotTransfer for RsyncTransfer {
    fn fetch_snapshot(
        &self,
        instance: &Instance,
        module: &str,
        snapshot_filename: &str,
        destination: &Path,
        timeout: Duration,
    ) -> Result<()> {
        let source = rsync::module_source(instance, module, snapshot_filename);
        rsync::fetch(&source, destination, timeout)
    }
}

/// Mock implementation for testing
/// Available for use in external test crates
#[allow(dead_code)]
pub mod mock {
    use super::*;
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    /// Recorded transfer invocation
    #[derive(Clone, Debug)]
    pub struct TransferCall {
        pub instance: Instance,
        pub source: String,
        pub destination: PathBuf,
    }

    /// Mock transfer for testing
    #[derive(Clone, Default)]
    pub struct MockTransfer {
        /// Recorded transfer invocations
        pub calls: Arc<Mutex<Vec<TransferCall>>>,
        failing: Arc<Mutex<HashSet<Instance>>>,
    }

    impl MockTransfer {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make transfers for an instance fail
        pub fn with_failing_instance(self, instance: &Instance) -> Self {
            self.failing.lock().unwrap().insert(instance.clone());
            self
        }

        /// Get all recorded calls
        pub fn get_calls(&self) -> Vec<TransferCall> {
            self.calls.lock().unwrap().clone()
        }

        /// Number of transfer invocations
        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl SnapshotTransfer for MockTransfer {
        fn fetch_snapshot(
            &self,
            instance: &Instance,
            module: &str,
            snapshot_filename: &str,
            destination: &Path,
            _timeout: Duration,
        ) -> Result<()> {
            self.calls.lock().unwrap().push(TransferCall {
                instance: instance.clone(),
                source: rsync::module_source(instance, module, snapshot_filename),
                destination: destination.to_path_buf(),
            });
            if self.failing.lock().unwrap().contains(instance) {
                anyhow::bail!("rsync failed (mock)");
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::*;
    use super::*;
    use std::path::PathBuf;

    fn instance() -> Instance {
        Instance {
            address: "10.0.0.1".to_string(),
            port: 6379,
        }
    }

    #[test]
    fn test_mock_transfer_records_source_and_destination() {
        let inst = instance();
        let mock = MockTransfer::new();
        let destination = PathBuf::from("/backups/10.0.0.1_6379.rdb");

        mock.fetch_snapshot(
            &inst,
            "redis_backups",
            "dump.rdb",
            &destination,
            Duration::from_secs(5),
        )
        .unwrap();

        let calls = mock.get_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].source, "10.0.0.1::redis_backups/6379/dump.rdb");
        assert_eq!(calls[0].destination, destination);
    }

    #[test]
    fn test_mock_transfer_failure() {
        let inst = instance();
        let mock = MockTransfer::new().with_failing_instance(&inst);

        let result = mock.fetch_snapshot(
            &inst,
            "redis_backups",
            "dump.rdb",
            Path::new("/backups/out.rdb"),
            Duration::from_secs(5),
        );
        assert!(result.is_err());
        assert_eq!(mock.call_count(), 1);
    }
}
