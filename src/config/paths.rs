//! Path management for cms-backup
//!
//! Resolves where the live database, the backup directory and the settings
//! file live.
//!
//! ## Path Resolution Order
//!
//! 1. `CMS_BACKUP_DATA_DIR` environment variable (if set)
//! 2. The platform data directory for `cms-backup` (via `directories`)

use std::path::PathBuf;

use directories::ProjectDirs;

use crate::error::BackupError;

/// Environment variable that overrides the base directory
pub const DATA_DIR_ENV: &str = "CMS_BACKUP_DATA_DIR";

/// Manages all default paths used by cms-backup
#[derive(Debug, Clone)]
pub struct BackupPaths {
    /// Base directory for the database, backups and settings
    base_dir: PathBuf,
}

impl BackupPaths {
    /// Create a new BackupPaths instance
    ///
    /// # Errors
    ///
    /// Returns an error if no platform data directory can be determined and
    /// `CMS_BACKUP_DATA_DIR` is not set.
    pub fn new() -> Result<Self, BackupError> {
        let base_dir = match std::env::var_os(DATA_DIR_ENV) {
            Some(custom) if !custom.is_empty() => PathBuf::from(custom),
            _ => resolve_default_path()?,
        };

        Ok(Self { base_dir })
    }

    /// Create BackupPaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the data directory holding the live database
    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }

    /// Get the default live database path
    pub fn database_file(&self) -> PathBuf {
        self.data_dir().join("cms.db")
    }

    /// Get the default backup directory
    pub fn backup_dir(&self) -> PathBuf {
        self.base_dir.join("backups")
    }

    /// Get the path to the settings file
    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Resolve a configured path override against the base directory
    pub fn resolve(&self, path: &std::path::Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Ensure the base and data directories exist
    ///
    /// The backup directory is not created here; snapshots create it on
    /// first use.
    pub fn ensure_directories(&self) -> Result<(), BackupError> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| BackupError::Io(format!("Failed to create base directory: {}", e)))?;

        std::fs::create_dir_all(self.data_dir())
            .map_err(|e| BackupError::Io(format!("Failed to create data directory: {}", e)))?;

        Ok(())
    }
}

/// Resolve the default base directory from the platform conventions
fn resolve_default_path() -> Result<PathBuf, BackupError> {
    ProjectDirs::from("", "", "cms-backup")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| {
            BackupError::Config(format!(
                "Could not determine a data directory; set {}",
                DATA_DIR_ENV
            ))
        })
}
