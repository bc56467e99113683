//! Store client abstraction for testability
//!
//! This module provides a trait-based abstraction over the per-instance
//! store operations, enabling dependency injection and mocking for tests.

use crate::config::Instance;
use crate::utils::redis;
use std::path::PathBuf;
use std::time::Duration;

// Re-export the role type from the redis module
pub use super::redis::Role;

/// Error raised by store client operations
///
/// Connectivity and protocol failures are not distinguished further; any
/// of them makes the instance unusable for the current run.
#[derive(Debug, thiserror::Error)]
#[error("store request to {instance} failed: {message}")]
pub struct StoreError {
    pub instance: Instance,
    pub message: String,
}

impl StoreError {
    fn new(instance: &Instance, err: anyhow::Error) -> Self {
        Self {
            instance: instance.clone(),
            message: format!("{:#}", err),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Abstraction over one store technology's management operations
pub trait StoreClient: Send + Sync {
    /// Query the replication role
    fn role(&self, instance: &Instance, timeout: Duration) -> StoreResult<Role>;

    /// Check whether a background snapshot is currently running
    fn snapshot_in_progress(&self, instance: &Instance, timeout: Duration) -> StoreResult<bool>;

    /// Start a background snapshot; returns before the snapshot completes
    fn trigger_snapshot(&self, instance: &Instance, timeout: Duration) -> StoreResult<()>;

    /// Resolve the snapshot file path on the remote instance
    fn snapshot_file_path(&self, instance: &Instance, timeout: Duration) -> StoreResult<PathBuf>;
}

/// Default implementation shelling out to redis-cli
#[derive(Debug, Clone, Default)]
pub struct RedisCliClient;

impl RedisCliClient {
    pub fn new() -> Self {
        Self
    }
}

impl StoreClient for RedisCliClient {
    fn role(&self, instance: &Instance, timeout: Duration) -> StoreResult<Role> {
        redis::query_role(instance, timeout).map_err(|e| StoreError::new(instance, e))
    }

    fn snapshot_in_progress(&self, instance: &Instance, timeout: Duration) -> StoreResult<bool> {
        redis::bgsave_in_progress(instance, timeout).map_err(|e| StoreError::new(instance, e))
    }

    fn trigger_snapshot(&self, instance: &Instance, timeout: Duration) -> StoreResult<()> {
        redis::trigger_bgsave(instance, timeout).map_err(|e| StoreError::new(instance, e))
    }

    fn snapshot_file_path(&self, instance: &Instance, timeout: Duration) -> StoreResult<PathBuf> {
        redis::snapshot_file_path(instance, timeout).map_err(|e| StoreError::new(instance, e))
    }
}

/// Mock implementation for testing
/// Available for use in external test crates
#[allow(dead_code)]
pub mod mock {
    use super::*;
    use std::collections::{HashMap, HashSet, VecDeque};
    use std::sync::{Arc, Mutex};

    /// Recorded operation call
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum StoreCall {
        Role(Instance),
        SnapshotInProgress(Instance),
        TriggerSnapshot(Instance),
        SnapshotFilePath(Instance),
    }

    /// Mock store client for testing
    ///
    /// Busy responses can be scripted per instance; an exhausted script
    /// reports idle. Instances marked unreachable fail every operation.
    #[derive(Clone, Default)]
    pub struct MockStoreClient {
        /// Recorded operation calls
        pub calls: Arc<Mutex<Vec<StoreCall>>>,
        roles: Arc<Mutex<HashMap<Instance, Role>>>,
        unreachable: Arc<Mutex<HashSet<Instance>>>,
        busy_scripts: Arc<Mutex<HashMap<Instance, VecDeque<bool>>>>,
        always_busy: Arc<Mutex<HashSet<Instance>>>,
        never_finishing: Arc<Mutex<HashSet<Instance>>>,
        triggered: Arc<Mutex<HashSet<Instance>>>,
        snapshot_paths: Arc<Mutex<HashMap<Instance, PathBuf>>>,
    }

    impl MockStoreClient {
        pub fn new() -> Self {
            Self::default()
        }

        /// Configure the role reported by an instance (default: Replica)
        pub fn with_role(self, instance: &Instance, role: Role) -> Self {
            self.roles.lock().unwrap().insert(instance.clone(), role);
            self
        }

        /// Make every operation against an instance fail
        pub fn with_unreachable(self, instance: &Instance) -> Self {
            self.unreachable.lock().unwrap().insert(instance.clone());
            self
        }

        /// Script the next busy responses for an instance
        pub fn with_busy_sequence(self, instance: &Instance, responses: &[bool]) -> Self {
            self.busy_scripts
                .lock()
                .unwrap()
                .insert(instance.clone(), responses.iter().copied().collect());
            self
        }

        /// Report a dump in progress on every check
        pub fn with_always_busy(self, instance: &Instance) -> Self {
            self.always_busy.lock().unwrap().insert(instance.clone());
            self
        }

        /// Report busy on every check after the trigger was accepted
        pub fn with_never_finishing_dump(self, instance: &Instance) -> Self {
            self.never_finishing
                .lock()
                .unwrap()
                .insert(instance.clone());
            self
        }

        /// Configure the remote snapshot path for an instance
        pub fn with_snapshot_path(self, instance: &Instance, path: &str) -> Self {
            self.snapshot_paths
                .lock()
                .unwrap()
                .insert(instance.clone(), PathBuf::from(path));
            self
        }

        /// Get all recorded calls
        pub fn get_calls(&self) -> Vec<StoreCall> {
            self.calls.lock().unwrap().clone()
        }

        /// Check if a snapshot trigger was issued to an instance
        pub fn trigger_called(&self, instance: &Instance) -> bool {
            self.trigger_count(instance) > 0
        }

        /// Number of snapshot triggers issued to an instance
        pub fn trigger_count(&self, instance: &Instance) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| matches!(c, StoreCall::TriggerSnapshot(i) if i == instance))
                .count()
        }

        /// Number of busy checks issued to an instance
        pub fn busy_poll_count(&self, instance: &Instance) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| matches!(c, StoreCall::SnapshotInProgress(i) if i == instance))
                .count()
        }

        fn record_call(&self, call: StoreCall) {
            self.calls.lock().unwrap().push(call);
        }

        fn refuse(&self, instance: &Instance) -> StoreError {
            StoreError {
                instance: instance.clone(),
                message: "connection refused (mock)".to_string(),
            }
        }

        fn is_unreachable(&self, instance: &Instance) -> bool {
            self.unreachable.lock().unwrap().contains(instance)
        }
    }

    impl StoreClient for MockStoreClient {
        fn role(&self, instance: &Instance, _timeout: Duration) -> StoreResult<Role> {
            self.record_call(StoreCall::Role(instance.clone()));
            if self.is_unreachable(instance) {
                return Err(self.refuse(instance));
            }
            Ok(self
                .roles
                .lock()
                .unwrap()
                .get(instance)
                .copied()
                .unwrap_or(Role::Replica))
        }

        fn snapshot_in_progress(
            &self,
            instance: &Instance,
            _timeout: Duration,
        ) -> StoreResult<bool> {
            self.record_call(StoreCall::SnapshotInProgress(instance.clone()));
            if self.is_unreachable(instance) {
                return Err(self.refuse(instance));
            }
            if self.always_busy.lock().unwrap().contains(instance) {
                return Ok(true);
            }
            if self.never_finishing.lock().unwrap().contains(instance)
                && self.triggered.lock().unwrap().contains(instance)
            {
                return Ok(true);
            }
            Ok(self
                .busy_scripts
                .lock()
                .unwrap()
                .get_mut(instance)
                .and_then(|script| script.pop_front())
                .unwrap_or(false))
        }

        fn trigger_snapshot(&self, instance: &Instance, _timeout: Duration) -> StoreResult<()> {
            self.record_call(StoreCall::TriggerSnapshot(instance.clone()));
            if self.is_unreachable(instance) {
                return Err(self.refuse(instance));
            }
            self.triggered.lock().unwrap().insert(instance.clone());
            Ok(())
        }

        fn snapshot_file_path(
            &self,
            instance: &Instance,
            _timeout: Duration,
        ) -> StoreResult<PathBuf> {
            self.record_call(StoreCall::SnapshotFilePath(instance.clone()));
            if self.is_unreachable(instance) {
                return Err(self.refuse(instance));
            }
            Ok(self
                .snapshot_paths
                .lock()
                .unwrap()
                .get(instance)
                .cloned()
                .unwrap_or_else(|| PathBuf::from("/var/lib/redis/dump.rdb")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::*;
    use super::*;

    fn instance() -> Instance {
        Instance {
            address: "10.0.0.1".to_string(),
            port: 6379,
        }
    }

    #[test]
    fn test_mock_records_calls() {
        let inst = instance();
        let mock = MockStoreClient::new();
        let timeout = Duration::from_secs(5);

        mock.role(&inst, timeout).unwrap();
        mock.trigger_snapshot(&inst, timeout).unwrap();

        let calls = mock.get_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], StoreCall::Role(inst.clone()));
        assert!(mock.trigger_called(&inst));
    }

    #[test]
    fn test_mock_busy_script_drains_to_idle() {
        let inst = instance();
        let mock = MockStoreClient::new().with_busy_sequence(&inst, &[true, true]);
        let timeout = Duration::from_secs(5);

        assert!(mock.snapshot_in_progress(&inst, timeout).unwrap());
        assert!(mock.snapshot_in_progress(&inst, timeout).unwrap());
        assert!(!mock.snapshot_in_progress(&inst, timeout).unwrap());
        assert_eq!(mock.busy_poll_count(&inst), 3);
    }

    #[test]
    fn test_mock_unreachable_fails_everything() {
        let inst = instance();
        let mock = MockStoreClient::new().with_unreachable(&inst);
        let timeout = Duration::from_secs(5);

        assert!(mock.role(&inst, timeout).is_err());
        assert!(mock.snapshot_in_progress(&inst, timeout).is_err());
        assert!(mock.trigger_snapshot(&inst, timeout).is_err());
        assert!(mock.snapshot_file_path(&inst, timeout).is_err());
    }

    #[test]
    fn test_mock_never_finishing_dump_turns_busy_after_trigger() {
        let inst = instance();
        let mock = MockStoreClient::new().with_never_finishing_dump(&inst);
        let timeout = Duration::from_secs(5);

        assert!(!mock.snapshot_in_progress(&inst, timeout).unwrap());
        mock.trigger_snapshot(&inst, timeout).unwrap();
        assert!(mock.snapshot_in_progress(&inst, timeout).unwrap());
    }
}
