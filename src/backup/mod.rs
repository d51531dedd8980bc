//! Backup system for cms-backup
//!
//! Snapshots the live database file together with its write-ahead log,
//! keeps a bounded number of them, and restores one over the live database
//! with a safety snapshot taken first.
//!
//! # Architecture
//!
//! - `SnapshotStore`: naming, catalog and sidecar metadata of the backup directory
//! - `BackupManager`: create, delete, retention and restore
//! - `BackupLock`: advisory lock serializing all of the above
//!
//! # Backup Format
//!
//! Each snapshot is a set of files sharing one base name:
//! - `backup_<timestamp>.db`: copy of the main database file
//! - `backup_<timestamp>.db-wal`: copy of the write-ahead log, if one existed
//! - `backup_<timestamp>.db.json`: `{ "description", "createdAt" }`, if a description was given
//!
//! Safety snapshots taken before a restore are named
//! `backup_<timestamp>-pre-restore.db`.
//!
//! # Retention Policy
//!
//! After every backup the oldest ordinary snapshots beyond
//! `max_backups` (default 10) are deleted. Pre-restore snapshots are not
//! counted unless `exempt_pre_restore` is turned off.
//!
//! # Example
//!
//! ```rust,ignore
//! use cms_backup::backup::BackupManager;
//! use cms_backup::config::{BackupPaths, Settings};
//!
//! let paths = BackupPaths::new()?;
//! let settings = Settings::load_or_create(&paths)?;
//! let manager = BackupManager::new(settings.resolve(&paths));
//!
//! let snapshot = manager.create_backup(Some("before plugin upgrade"))?;
//!
//! // Later, restore from it
//! let result = manager.restore_backup(&snapshot.filename)?;
//! println!("{}", result.summary());
//! ```

mod lock;
mod manager;
mod restore;
mod store;

pub use lock::{BackupLock, LOCK_FILE_NAME};
pub use manager::BackupManager;
pub use restore::{RestoreResult, WalChange};
pub use store::{
    companion_path, is_snapshot_filename, parse_snapshot_timestamp, snapshot_name,
    SnapshotInfo, SnapshotKind, SnapshotMetadata, SnapshotStore,
};
