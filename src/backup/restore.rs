//! Backup restoration for cms-backup
//!
//! Restoring overwrites the live database with a snapshot. Before anything
//! is touched the current live state is captured as a pre-restore snapshot.
//! The snapshot files are then staged next to the live database and renamed
//! into place, and the live write-ahead log is made to match the snapshot:
//! replaced when the snapshot carries one, deleted when it doesn't. A main
//! file paired with a foreign WAL corrupts the database on next open.
//!
//! If anything fails after the live database was modified, the pre-restore
//! snapshot is applied the same way to roll back.
//!
//! The application must not hold the database open while a restore runs.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::error::{BackupError, BackupResult, RollbackOutcome};
use crate::storage::file_io::{copy_synced, remove_if_exists};

use super::lock::BackupLock;
use super::manager::BackupManager;
use super::store::{companion_path, validate_filename, SnapshotInfo, SnapshotKind, SHM_SUFFIX};

/// Suffix of staging files written next to the live database
const STAGING_SUFFIX: &str = ".restore-tmp";

/// What happened to the live write-ahead log during a restore
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalChange {
    /// Replaced with the snapshot's WAL
    Restored,
    /// Deleted because the snapshot had none
    Removed,
    /// Neither side had a WAL
    Unchanged,
}

/// Result of a restore operation
#[derive(Debug)]
pub struct RestoreResult {
    /// Snapshot that is now live
    pub restored: SnapshotInfo,
    /// Safety snapshot of the state that was replaced
    pub pre_restore: Option<SnapshotInfo>,
    /// How the live write-ahead log was reconciled
    pub wal: WalChange,
}

impl RestoreResult {
    /// Get a summary of what was restored
    pub fn summary(&self) -> String {
        let mut parts = vec![format!("Restored {}", self.restored.filename)];
        match self.wal {
            WalChange::Restored => parts.push("write-ahead log restored".to_string()),
            WalChange::Removed => parts.push("stale write-ahead log removed".to_string()),
            WalChange::Unchanged => {}
        }
        match &self.pre_restore {
            Some(snapshot) => parts.push(format!("previous state saved as {}", snapshot.filename)),
            None => parts.push("no previous database to save".to_string()),
        }
        parts.join("; ")
    }
}

/// Failure while applying a snapshot to the live path
struct ApplyError {
    /// Whether the live database had already been replaced
    live_modified: bool,
    error: BackupError,
}

impl ApplyError {
    fn untouched(error: BackupError) -> Self {
        Self {
            live_modified: false,
            error,
        }
    }

    fn modified(error: BackupError) -> Self {
        Self {
            live_modified: true,
            error,
        }
    }
}

impl BackupManager {
    /// Restore the live database from a snapshot
    ///
    /// Fails with a not-found error, without writing anything, when the
    /// snapshot does not exist.
    pub fn restore_backup(&self, filename: &str) -> BackupResult<RestoreResult> {
        validate_filename(filename)?;
        if !self.store.path(filename).is_file() {
            return Err(BackupError::backup_not_found(filename));
        }

        let _lock = BackupLock::exclusive(self.store.dir())?;

        // Re-check under the lock; retention may have removed it meanwhile
        let target = self
            .store
            .get(filename)?
            .ok_or_else(|| BackupError::backup_not_found(filename))?;

        let pre_restore = self.take_safety_snapshot(filename)?;

        match self.apply_snapshot(&target) {
            Ok(wal) => {
                info!(
                    filename = %target.filename,
                    pre_restore = pre_restore.as_ref().map(|s| s.filename.as_str()),
                    ?wal,
                    "Restored backup"
                );
                Ok(RestoreResult {
                    restored: target,
                    pre_restore,
                    wal,
                })
            }
            Err(ApplyError {
                live_modified: false,
                error,
            }) => Err(error),
            Err(ApplyError { error: cause, .. }) => {
                let rollback = match &pre_restore {
                    Some(safety) => self.roll_back(safety),
                    None => RollbackOutcome::Unavailable,
                };
                Err(BackupError::Restore {
                    filename: filename.to_string(),
                    reason: cause.to_string(),
                    rollback,
                })
            }
        }
    }

    /// Capture the current live state before a restore overwrites it
    ///
    /// Returns `None` when there is no live database to protect.
    fn take_safety_snapshot(&self, restoring: &str) -> BackupResult<Option<SnapshotInfo>> {
        if !self.database_path.is_file() {
            warn!(
                path = %self.database_path.display(),
                "No live database; restoring without a pre-restore snapshot"
            );
            return Ok(None);
        }

        let description = format!("Automatic snapshot before restoring {}", restoring);
        let snapshot = self.capture(SnapshotKind::PreRestore, Some(&description))?;
        debug!(filename = %snapshot.filename, "Saved pre-restore snapshot");
        Ok(Some(snapshot))
    }

    fn roll_back(&self, safety: &SnapshotInfo) -> RollbackOutcome {
        match self.apply_snapshot(safety) {
            Ok(_) => {
                warn!(filename = %safety.filename, "Rolled back to pre-restore snapshot");
                RollbackOutcome::Complete
            }
            Err(ApplyError {
                live_modified,
                error,
            }) => {
                let outcome = if live_modified {
                    RollbackOutcome::MainOnly
                } else {
                    RollbackOutcome::Failed
                };
                error!(
                    filename = %safety.filename,
                    error = %error,
                    %outcome,
                    "Rollback incomplete; restore manually from the pre-restore snapshot"
                );
                outcome
            }
        }
    }

    /// Make a snapshot's main file and WAL the live pair
    fn apply_snapshot(&self, snapshot: &SnapshotInfo) -> Result<WalChange, ApplyError> {
        let live = &self.database_path;
        let live_wal = self.database_wal_path();
        let source_wal = self.store.wal_path(&snapshot.filename);
        let has_wal = source_wal.is_file();

        let staged_main = companion_path(live, STAGING_SUFFIX);
        let staged_wal = companion_path(&live_wal, STAGING_SUFFIX);

        if let Some(parent) = live.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ApplyError::untouched(BackupError::Io(format!(
                    "Failed to create database directory: {}",
                    e
                )))
            })?;
        }

        let staging = stage(&snapshot.path, &staged_main)
            .and_then(|()| if has_wal { stage(&source_wal, &staged_wal) } else { Ok(()) });
        if let Err(e) = staging {
            discard_staging(&[&staged_main, &staged_wal]);
            return Err(ApplyError::untouched(BackupError::Io(format!(
                "Failed to stage {}: {}",
                snapshot.filename, e
            ))));
        }

        if let Err(e) = fs::rename(&staged_main, live) {
            discard_staging(&[&staged_main, &staged_wal]);
            return Err(ApplyError::untouched(BackupError::Io(format!(
                "Failed to replace live database: {}",
                e
            ))));
        }

        let wal = if has_wal {
            fs::rename(&staged_wal, &live_wal).map(|()| WalChange::Restored)
        } else {
            remove_if_exists(&live_wal).map(|removed| {
                if removed {
                    WalChange::Removed
                } else {
                    WalChange::Unchanged
                }
            })
        };
        let wal = wal.map_err(|e| {
            discard_staging(&[&staged_wal]);
            ApplyError::modified(BackupError::Io(format!(
                "Failed to reconcile write-ahead log: {}",
                e
            )))
        })?;

        // The shared-memory index describes the WAL that was just replaced
        let live_shm = companion_path(live, SHM_SUFFIX);
        if let Err(e) = remove_if_exists(&live_shm) {
            warn!(path = %live_shm.display(), error = %e, "Failed to remove stale shared-memory file");
        }

        Ok(wal)
    }
}

fn stage(from: &Path, to: &Path) -> io::Result<()> {
    copy_synced(from, to).map(|_| ())
}

fn discard_staging(paths: &[&PathBuf]) {
    for path in paths {
        if let Err(e) = remove_if_exists(path) {
            warn!(path = %path.display(), error = %e, "Failed to remove staging file");
        }
    }
}
