//! Advisory lock over the backup directory
//!
//! Every mutating operation holds an exclusive lock on `<backup_dir>/.lock`
//! for its whole duration; listing holds a shared one. `flock`-style locks
//! belong to the open file description, so the same lock serializes threads
//! of one process as well as separate processes sharing the directory.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, warn};

use crate::error::{BackupError, BackupResult};

/// Name of the lock file inside the backup directory
pub const LOCK_FILE_NAME: &str = ".lock";

/// Held lock; released when dropped
#[derive(Debug)]
pub struct BackupLock {
    file: File,
    path: PathBuf,
}

impl BackupLock {
    /// Block until an exclusive lock on the directory is held
    pub fn exclusive(dir: &Path) -> BackupResult<Self> {
        let (file, path) = open_lock_file(dir)?;
        FileExt::lock_exclusive(&file).map_err(|e| {
            BackupError::Lock(format!("Failed to lock {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), "Acquired exclusive backup lock");
        Ok(Self { file, path })
    }

    /// Block until a shared lock on the directory is held
    pub fn shared(dir: &Path) -> BackupResult<Self> {
        let (file, path) = open_lock_file(dir)?;
        FileExt::lock_shared(&file).map_err(|e| {
            BackupError::Lock(format!("Failed to lock {}: {}", path.display(), e))
        })?;
        Ok(Self { file, path })
    }
}

impl Drop for BackupLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), error = %e, "Failed to release backup lock");
        }
    }
}

fn open_lock_file(dir: &Path) -> BackupResult<(File, PathBuf)> {
    let path = dir.join(LOCK_FILE_NAME);
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&path)
        .map_err(|e| BackupError::Lock(format!("Failed to open {}: {}", path.display(), e)))?;
    Ok((file, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn probe(dir: &Path) -> File {
        OpenOptions::new()
            .read(true)
            .write(true)
            .open(dir.join(LOCK_FILE_NAME))
            .unwrap()
    }

    #[test]
    fn test_exclusive_lock_blocks_other_handles() {
        let temp_dir = TempDir::new().unwrap();

        let lock = BackupLock::exclusive(temp_dir.path()).unwrap();
        let other = probe(temp_dir.path());
        assert!(FileExt::try_lock_exclusive(&other).is_err());
        assert!(FileExt::try_lock_shared(&other).is_err());

        drop(lock);
        assert!(FileExt::try_lock_exclusive(&other).is_ok());
        FileExt::unlock(&other).unwrap();
    }

    #[test]
    fn test_shared_locks_coexist() {
        let temp_dir = TempDir::new().unwrap();

        let _first = BackupLock::shared(temp_dir.path()).unwrap();
        let _second = BackupLock::shared(temp_dir.path()).unwrap();

        let other = probe(temp_dir.path());
        assert!(FileExt::try_lock_exclusive(&other).is_err());
    }

    #[test]
    fn test_waiter_proceeds_after_release() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().to_path_buf();

        let lock = BackupLock::exclusive(&dir).unwrap();
        let (tx, rx) = mpsc::channel();

        let waiter = std::thread::spawn(move || {
            let _lock = BackupLock::exclusive(&dir).unwrap();
            tx.send(()).unwrap();
        });

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        drop(lock);
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        waiter.join().unwrap();
    }

    #[test]
    fn test_missing_directory_is_lock_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = BackupLock::exclusive(&temp_dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, BackupError::Lock(_)));
    }
}
