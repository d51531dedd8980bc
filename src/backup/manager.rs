//! Backup manager for cms-backup
//!
//! Creates snapshots of the live database, deletes them, and enforces the
//! retention cap after every successful backup.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::settings::{BackupConfig, BackupRetention};
use crate::error::{BackupError, BackupResult};
use crate::storage::file_io::{copy_synced, remove_if_exists};

use super::lock::BackupLock;
use super::store::{
    companion_path, validate_filename, SnapshotInfo, SnapshotKind, SnapshotStore, WAL_SUFFIX,
};

/// Manages backup creation, deletion and retention
///
/// All public operations serialize on the backup directory lock. Callers
/// that need a timeout should impose one themselves; copy time grows with
/// the database size.
pub struct BackupManager {
    /// Snapshot directory
    pub(super) store: SnapshotStore,
    /// Live database file
    pub(super) database_path: PathBuf,
    /// Retention policy
    retention: BackupRetention,
}

impl BackupManager {
    /// Create a new BackupManager
    pub fn new(config: BackupConfig) -> Self {
        Self {
            store: SnapshotStore::new(config.backup_dir),
            database_path: config.database_path,
            retention: config.retention,
        }
    }

    /// Get backup directory path
    pub fn backup_dir(&self) -> &Path {
        self.store.dir()
    }

    /// Get the live database path
    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    /// Get the retention policy
    pub fn retention(&self) -> &BackupRetention {
        &self.retention
    }

    /// Path of the live database's write-ahead log
    pub fn database_wal_path(&self) -> PathBuf {
        companion_path(&self.database_path, WAL_SUFFIX)
    }

    /// Snapshot the live database and enforce retention
    ///
    /// A whitespace-only description is treated as none; any other
    /// description is stored exactly as given.
    pub fn create_backup(&self, description: Option<&str>) -> BackupResult<SnapshotInfo> {
        if !self.database_path.is_file() {
            return Err(BackupError::database_not_found(
                self.database_path.display().to_string(),
            ));
        }

        self.store.ensure_directory()?;
        let _lock = BackupLock::exclusive(self.store.dir())?;

        let description = description.filter(|d| !d.trim().is_empty());
        let snapshot = self.capture(SnapshotKind::Standard, description)?;

        info!(
            filename = %snapshot.filename,
            size_bytes = snapshot.size_bytes,
            has_wal = snapshot.has_wal,
            "Created backup"
        );

        let deleted = self.enforce_retention_locked(Some(&snapshot.filename));
        if !deleted.is_empty() {
            info!(count = deleted.len(), "Retention removed old backups");
        }

        Ok(snapshot)
    }

    /// Copy the live database (and its WAL) into a new snapshot
    ///
    /// Must be called with the directory lock held. On failure every file
    /// written for the new snapshot is removed again.
    pub(super) fn capture(
        &self,
        kind: SnapshotKind,
        description: Option<&str>,
    ) -> BackupResult<SnapshotInfo> {
        let now = Utc::now();
        let filename = self.store.generate_name(kind, now);
        self.capture_as(&filename, description, now)
    }

    /// Write a snapshot under a name chosen by the caller
    fn capture_as(
        &self,
        filename: &str,
        description: Option<&str>,
        now: chrono::DateTime<Utc>,
    ) -> BackupResult<SnapshotInfo> {
        if let Err(e) = self.copy_live_files(filename, description, now) {
            self.discard_partial(filename);
            return Err(e);
        }

        self.store
            .read_info(filename)
            .map_err(|e| BackupError::Io(format!("Failed to read new backup {}: {}", filename, e)))
    }

    fn copy_live_files(
        &self,
        filename: &str,
        description: Option<&str>,
        now: chrono::DateTime<Utc>,
    ) -> BackupResult<()> {
        let target = self.store.path(filename);
        let bytes = copy_synced(&self.database_path, &target).map_err(|e| {
            BackupError::Io(format!("Failed to copy database to {}: {}", filename, e))
        })?;
        debug!(filename = %filename, bytes, "Copied database file");

        // A missing WAL just means nothing was pending at this instant
        let live_wal = self.database_wal_path();
        if live_wal.is_file() {
            let bytes = copy_synced(&live_wal, &self.store.wal_path(filename)).map_err(|e| {
                BackupError::Io(format!(
                    "Failed to copy write-ahead log to {}: {}",
                    filename, e
                ))
            })?;
            debug!(filename = %filename, bytes, "Copied write-ahead log");
        }

        if let Some(description) = description {
            self.store.write_metadata(filename, description, now)?;
        }

        Ok(())
    }

    fn discard_partial(&self, filename: &str) {
        for path in [
            self.store.path(filename),
            self.store.wal_path(filename),
            self.store.metadata_path(filename),
        ] {
            if let Err(e) = remove_if_exists(&path) {
                warn!(path = %path.display(), error = %e, "Failed to remove partial backup file");
            }
        }
    }

    /// List all snapshots, newest first
    ///
    /// Returns an empty list if the backup directory does not exist yet.
    pub fn list_backups(&self) -> BackupResult<Vec<SnapshotInfo>> {
        if !self.store.exists() {
            return Ok(Vec::new());
        }

        // Listing still works where the lock file cannot be created
        let _lock = match BackupLock::shared(self.store.dir()) {
            Ok(lock) => Some(lock),
            Err(e) => {
                warn!(error = %e, "Listing backups without the directory lock");
                None
            }
        };
        self.store.list()
    }

    /// Get a specific backup by filename
    pub fn get_backup(&self, filename: &str) -> BackupResult<Option<SnapshotInfo>> {
        validate_filename(filename)?;
        self.store.get(filename)
    }

    /// Get the most recent snapshot of any kind
    pub fn get_latest_backup(&self) -> BackupResult<Option<SnapshotInfo>> {
        let backups = self.list_backups()?;
        Ok(backups.into_iter().next())
    }

    /// Delete a snapshot and its companions
    pub fn delete_backup(&self, filename: &str) -> BackupResult<()> {
        validate_filename(filename)?;
        if !self.store.exists() {
            return Err(BackupError::backup_not_found(filename));
        }

        let _lock = BackupLock::exclusive(self.store.dir())?;
        self.delete_locked(filename)?;

        info!(filename = %filename, "Deleted backup");
        Ok(())
    }

    /// Delete with the directory lock already held
    ///
    /// The main file must exist and its removal must succeed; the WAL and
    /// sidecar are removed best-effort.
    fn delete_locked(&self, filename: &str) -> BackupResult<()> {
        if self.store.get(filename)?.is_none() {
            return Err(BackupError::backup_not_found(filename));
        }

        fs::remove_file(self.store.path(filename)).map_err(|e| {
            BackupError::Io(format!("Failed to delete backup {}: {}", filename, e))
        })?;

        for companion in [self.store.wal_path(filename), self.store.metadata_path(filename)] {
            match remove_if_exists(&companion) {
                Ok(true) => debug!(path = %companion.display(), "Removed companion file"),
                Ok(false) => {}
                Err(e) => {
                    warn!(path = %companion.display(), error = %e, "Failed to remove companion file")
                }
            }
        }

        Ok(())
    }

    /// Enforce the retention policy by deleting the oldest excess backups
    ///
    /// Returns the names of the snapshots that were deleted.
    pub fn enforce_retention(&self) -> BackupResult<Vec<String>> {
        if !self.store.exists() {
            return Ok(Vec::new());
        }

        let _lock = BackupLock::exclusive(self.store.dir())?;
        Ok(self.enforce_retention_locked(None))
    }

    /// Retention with the directory lock already held
    ///
    /// Failures are logged and never propagated: a failed deletion leaves
    /// that snapshot in place and moves on to the next. `keep` names a
    /// snapshot that is never deleted, even when the cap is zero.
    fn enforce_retention_locked(&self, keep: Option<&str>) -> Vec<String> {
        let backups = match self.store.list() {
            Ok(backups) => backups,
            Err(e) => {
                warn!(error = %e, "Skipping retention: could not list backups");
                return Vec::new();
            }
        };

        let mut excess: Vec<SnapshotInfo> = backups
            .into_iter()
            .filter(|b| self.counts_toward_cap(b))
            .skip(self.retention.max_backups)
            .filter(|b| keep != Some(b.filename.as_str()))
            .collect();
        // Oldest first
        excess.reverse();

        let mut deleted = Vec::new();
        for backup in excess {
            match self.delete_locked(&backup.filename) {
                Ok(()) => {
                    debug!(filename = %backup.filename, "Retention deleted backup");
                    deleted.push(backup.filename);
                }
                Err(e) => {
                    warn!(filename = %backup.filename, error = %e, "Retention failed to delete backup")
                }
            }
        }

        deleted
    }

    /// Whether a snapshot occupies one of the retention slots
    pub fn counts_toward_cap(&self, snapshot: &SnapshotInfo) -> bool {
        match snapshot.kind {
            SnapshotKind::Standard => true,
            SnapshotKind::PreRestore => !self.retention.exempt_pre_restore,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_manager(max_backups: usize) -> (BackupManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let database_path = temp_dir.path().join("data").join("cms.db");
        fs::create_dir_all(database_path.parent().unwrap()).unwrap();
        fs::write(&database_path, b"SQLite format 3\0initial").unwrap();

        let manager = BackupManager::new(BackupConfig {
            database_path,
            backup_dir: temp_dir.path().join("backups"),
            retention: BackupRetention {
                max_backups,
                exempt_pre_restore: true,
            },
        });
        (manager, temp_dir)
    }

    #[test]
    fn test_create_backup() {
        let (manager, _temp) = create_test_manager(5);

        let snapshot = manager.create_backup(None).unwrap();
        assert!(snapshot.path.exists());
        assert!(snapshot.filename.starts_with("backup_"));
        assert_eq!(snapshot.kind, SnapshotKind::Standard);
        assert_eq!(snapshot.size_bytes, 23);
        assert!(!snapshot.has_wal);
        assert!(snapshot.description.is_none());
        assert!(!manager.store.metadata_path(&snapshot.filename).exists());
    }

    #[test]
    fn test_create_backup_copies_wal_and_description() {
        let (manager, _temp) = create_test_manager(5);
        fs::write(manager.database_wal_path(), b"pending frames").unwrap();

        let snapshot = manager.create_backup(Some("  before migration ")).unwrap();

        assert!(snapshot.has_wal);
        assert_eq!(
            fs::read(manager.store.wal_path(&snapshot.filename)).unwrap(),
            b"pending frames"
        );
        assert_eq!(snapshot.description.as_deref(), Some("  before migration "));

        let reread = manager.get_backup(&snapshot.filename).unwrap().unwrap();
        assert_eq!(reread.description.as_deref(), Some("  before migration "));
    }

    #[test]
    fn test_blank_description_writes_no_sidecar() {
        let (manager, _temp) = create_test_manager(5);

        let snapshot = manager.create_backup(Some("   ")).unwrap();
        assert!(!manager.store.metadata_path(&snapshot.filename).exists());
    }

    #[test]
    fn test_create_backup_without_database() {
        let (manager, _temp) = create_test_manager(5);
        fs::remove_file(manager.database_path()).unwrap();

        let err = manager.create_backup(None).unwrap_err();
        assert!(err.is_not_found());
        assert!(!manager.backup_dir().exists());
    }

    #[test]
    fn test_list_backups() {
        let (manager, _temp) = create_test_manager(5);

        let first = manager.create_backup(None).unwrap();
        let second = manager.create_backup(None).unwrap();

        let backups = manager.list_backups().unwrap();
        assert_eq!(backups.len(), 2);
        assert_eq!(backups[0].filename, second.filename);
        assert_eq!(backups[1].filename, first.filename);
        assert!(backups[0].created_at > backups[1].created_at);
    }

    #[test]
    fn test_empty_backup_dir() {
        let (manager, _temp) = create_test_manager(5);

        assert!(manager.list_backups().unwrap().is_empty());
        assert!(manager.get_latest_backup().unwrap().is_none());
    }

    #[test]
    fn test_retention_policy() {
        let (manager, _temp) = create_test_manager(3);

        let created: Vec<_> = (0..5)
            .map(|_| manager.create_backup(None).unwrap().filename)
            .collect();

        let remaining: Vec<_> = manager
            .list_backups()
            .unwrap()
            .into_iter()
            .map(|b| b.filename)
            .collect();
        assert_eq!(remaining, vec![
            created[4].clone(),
            created[3].clone(),
            created[2].clone()
        ]);
    }

    #[test]
    fn test_retention_exempts_pre_restore() {
        let (manager, _temp) = create_test_manager(1);

        manager.store.ensure_directory().unwrap();
        let safety = manager
            .store
            .generate_name(SnapshotKind::PreRestore, Utc::now() - chrono::Duration::hours(1));
        fs::write(manager.store.path(&safety), b"old state").unwrap();

        manager.create_backup(None).unwrap();
        let latest = manager.create_backup(None).unwrap();

        let remaining: Vec<_> = manager
            .list_backups()
            .unwrap()
            .into_iter()
            .map(|b| b.filename)
            .collect();
        assert_eq!(remaining, vec![latest.filename, safety]);
    }

    #[test]
    fn test_retention_counts_pre_restore_when_not_exempt() {
        let (mut manager, _temp) = create_test_manager(1);
        manager.retention.exempt_pre_restore = false;

        manager.store.ensure_directory().unwrap();
        let safety = manager
            .store
            .generate_name(SnapshotKind::PreRestore, Utc::now() - chrono::Duration::hours(1));
        fs::write(manager.store.path(&safety), b"old state").unwrap();

        let latest = manager.create_backup(None).unwrap();

        let remaining = manager.list_backups().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].filename, latest.filename);
    }

    #[test]
    fn test_enforce_retention_returns_deleted_oldest_first() {
        let (mut manager, _temp) = create_test_manager(10);

        let created: Vec<_> = (0..4)
            .map(|_| manager.create_backup(None).unwrap().filename)
            .collect();

        manager.retention.max_backups = 1;
        let deleted = manager.enforce_retention().unwrap();
        assert_eq!(deleted, created[..3].to_vec());
    }

    #[test]
    fn test_retention_never_deletes_the_new_backup() {
        let (manager, _temp) = create_test_manager(0);

        let snapshot = manager.create_backup(Some("keep me")).unwrap();

        assert!(snapshot.path.exists());
        let remaining = manager.list_backups().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].filename, snapshot.filename);
        assert_eq!(remaining[0].description.as_deref(), Some("keep me"));
    }

    #[test]
    fn test_failed_wal_copy_removes_partial_backup() {
        let (manager, _temp) = create_test_manager(5);
        fs::write(manager.database_wal_path(), b"pending frames").unwrap();
        manager.store.ensure_directory().unwrap();

        let now = Utc::now();
        let filename = manager.store.generate_name(SnapshotKind::Standard, now);
        fs::create_dir_all(manager.store.wal_path(&filename)).unwrap();

        let err = manager.capture_as(&filename, None, now).unwrap_err();
        assert!(matches!(err, BackupError::Io(_)));
        assert!(!manager.store.path(&filename).exists());
        assert!(manager.store.get(&filename).unwrap().is_none());
    }

    #[test]
    fn test_failed_metadata_write_removes_partial_backup() {
        let (manager, _temp) = create_test_manager(5);
        fs::write(manager.database_wal_path(), b"pending frames").unwrap();
        manager.store.ensure_directory().unwrap();

        let now = Utc::now();
        let filename = manager.store.generate_name(SnapshotKind::Standard, now);
        let metadata_path = manager.store.metadata_path(&filename);
        fs::create_dir_all(&metadata_path).unwrap();
        fs::write(metadata_path.join("occupied"), b"x").unwrap();

        assert!(manager.capture_as(&filename, Some("described"), now).is_err());
        assert!(!manager.store.path(&filename).exists());
        assert!(!manager.store.wal_path(&filename).exists());
        assert!(manager.list_backups().unwrap().is_empty());
    }

    #[test]
    fn test_list_backups_without_lock_file() {
        let (manager, _temp) = create_test_manager(5);
        let snapshot = manager.create_backup(None).unwrap();

        let lock_path = manager.backup_dir().join(crate::backup::LOCK_FILE_NAME);
        fs::remove_file(&lock_path).unwrap();
        fs::create_dir(&lock_path).unwrap();

        let backups = manager.list_backups().unwrap();
        assert_eq!(backups.len(), 1);
        assert_eq!(backups[0].filename, snapshot.filename);
    }

    #[test]
    fn test_delete_backup_removes_companions() {
        let (manager, _temp) = create_test_manager(5);
        fs::write(manager.database_wal_path(), b"wal").unwrap();

        let snapshot = manager.create_backup(Some("doomed")).unwrap();
        manager.delete_backup(&snapshot.filename).unwrap();

        assert!(!snapshot.path.exists());
        assert!(!manager.store.wal_path(&snapshot.filename).exists());
        assert!(!manager.store.metadata_path(&snapshot.filename).exists());
    }

    #[test]
    fn test_delete_missing_backup() {
        let (manager, _temp) = create_test_manager(5);

        assert!(manager.delete_backup("backup_missing.db").unwrap_err().is_not_found());

        manager.create_backup(None).unwrap();
        assert!(manager.delete_backup("backup_missing.db").unwrap_err().is_not_found());
        assert!(manager.delete_backup("../data/cms.db").unwrap_err().is_validation());
    }

    #[test]
    fn test_get_backup() {
        let (manager, _temp) = create_test_manager(5);

        let snapshot = manager.create_backup(Some("tagged")).unwrap();
        let found = manager.get_backup(&snapshot.filename).unwrap().unwrap();
        assert_eq!(found, snapshot);

        assert!(manager.get_backup(".lock").unwrap().is_none());
    }
}
