//! User settings for cms-backup
//!
//! Manages path overrides and the backup retention policy.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::paths::BackupPaths;
use crate::error::BackupError;
use crate::storage::file_io::write_json_atomic;

/// Backup retention settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRetention {
    /// Number of ordinary backups to keep
    #[serde(default = "default_max_backups")]
    pub max_backups: usize,
    /// Whether pre-restore safety snapshots are left out of the count
    #[serde(default = "default_exempt_pre_restore")]
    pub exempt_pre_restore: bool,
}

fn default_max_backups() -> usize {
    10
}

fn default_exempt_pre_restore() -> bool {
    true
}

impl BackupRetention {
    /// Reject policies that would leave no room for a single backup
    pub fn validate(&self) -> Result<(), BackupError> {
        if self.max_backups == 0 {
            return Err(BackupError::Config(
                "retention.max_backups must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for BackupRetention {
    fn default() -> Self {
        Self {
            max_backups: default_max_backups(),
            exempt_pre_restore: default_exempt_pre_restore(),
        }
    }
}

/// User settings for cms-backup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Live database location; relative paths resolve against the base directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,

    /// Backup directory location; relative paths resolve against the base directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<PathBuf>,

    /// Backup retention policy
    #[serde(default)]
    pub retention: BackupRetention,
}

fn default_schema_version() -> u32 {
    1
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            database_path: None,
            backup_dir: None,
            retention: BackupRetention::default(),
        }
    }
}

/// Fully resolved configuration for a [`crate::backup::BackupManager`]
#[derive(Debug, Clone)]
pub struct BackupConfig {
    /// Live database file
    pub database_path: PathBuf,
    /// Directory holding snapshots
    pub backup_dir: PathBuf,
    /// Retention policy applied after each backup
    pub retention: BackupRetention,
}

impl Settings {
    /// Load settings from disk, or create default settings if file doesn't exist
    pub fn load_or_create(paths: &BackupPaths) -> Result<Self, BackupError> {
        let settings_path = paths.settings_file();

        if settings_path.exists() {
            let contents = std::fs::read_to_string(&settings_path).map_err(|e| {
                BackupError::Io(format!("Failed to read settings file: {}", e))
            })?;

            let settings: Settings = serde_json::from_str(&contents).map_err(|e| {
                BackupError::Config(format!("Failed to parse settings file: {}", e))
            })?;
            settings.retention.validate()?;

            Ok(settings)
        } else {
            // Don't save yet - let caller decide when to persist
            Ok(Settings::default())
        }
    }

    /// Save settings to disk
    pub fn save(&self, paths: &BackupPaths) -> Result<(), BackupError> {
        paths.ensure_directories()?;
        write_json_atomic(paths.settings_file(), self)
    }

    /// Resolve path overrides against the defaults
    pub fn resolve(&self, paths: &BackupPaths) -> BackupConfig {
        let database_path = self
            .database_path
            .as_deref()
            .map(|p| paths.resolve(p))
            .unwrap_or_else(|| paths.database_file());
        let backup_dir = self
            .backup_dir
            .as_deref()
            .map(|p| paths.resolve(p))
            .unwrap_or_else(|| paths.backup_dir());

        BackupConfig {
            database_path,
            backup_dir,
            retention: self.retention.clone(),
        }
    }
}
