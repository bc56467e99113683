//! File-based locking to prevent concurrent backup runs

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("lock file already present: {0}")]
    AlreadyHeld(PathBuf),

    #[error("failed to create lock file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Guard for the run-wide lock marker
///
/// The marker file exists for the full duration of the run; dropping the
/// guard removes it. Existence of the file means another run is active,
/// so acquisition never blocks.
pub struct RunLock {
    lock_path: PathBuf,
}

impl RunLock {
    /// Create the lock marker, failing immediately if it already exists
    pub fn acquire(path: &Path) -> Result<Self, LockError> {
        debug!("Attempting to acquire lock: {:?}", path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| LockError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
            }
        }

        // create_new makes the existence check and the creation atomic
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(_) => {
                info!("Acquired run lock: {:?}", path);
                Ok(Self {
                    lock_path: path.to_path_buf(),
                })
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(LockError::AlreadyHeld(path.to_path_buf()))
            }
            Err(source) => Err(LockError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Get the lock file path (for cleanup or inspection)
    pub fn path(&self) -> &Path {
        &self.lock_path
    }

    /// Remove a lock marker outside the guard's lifetime
    ///
    /// Used by the signal handler, where the guard lives on another thread
    /// and will never be dropped.
    pub fn force_release(path: &Path) {
        match std::fs::remove_file(path) {
            Ok(()) => info!("Removed run lock: {:?}", path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove run lock {:?}: {}", path, e),
        }
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        info!("Released run lock: {:?}", self.lock_path);

        if let Err(e) = std::fs::remove_file(&self.lock_path) {
            debug!("Failed to remove lock file: {}", e);
        }
    }
}
