//! Custom error types for cms-backup
//!
//! This module defines the error hierarchy for the backup engine using thiserror
//! for ergonomic error definitions.

use std::fmt;

use thiserror::Error;

/// The main error type for backup engine operations
#[derive(Error, Debug)]
pub enum BackupError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Rejected input, such as a backup name that escapes the backup directory
    #[error("Validation error: {0}")]
    Validation(String),

    /// Source-missing errors (live database or named snapshot)
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// The backup directory lock could not be acquired or released
    #[error("Lock error: {0}")]
    Lock(String),

    /// Restore failed after the live database was touched
    #[error("Restore of {filename} failed: {reason} ({rollback})")]
    Restore {
        filename: String,
        reason: String,
        rollback: RollbackOutcome,
    },
}

/// How far a failed restore got in putting the previous state back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackOutcome {
    /// Database and write-ahead log both match the pre-restore snapshot
    Complete,
    /// The database file was put back but its write-ahead log was not
    MainOnly,
    /// The pre-restore snapshot could not be applied at all
    Failed,
    /// There was no pre-restore snapshot to roll back to
    Unavailable,
}

impl RollbackOutcome {
    /// Whether the live files are back in their pre-restore state
    pub fn is_complete(self) -> bool {
        self == Self::Complete
    }
}

impl fmt::Display for RollbackOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let note = match self {
            Self::Complete => "rolled back to pre-restore snapshot",
            Self::MainOnly => {
                "database rolled back to pre-restore snapshot, write-ahead log not reconciled"
            }
            Self::Failed => "rollback to pre-restore snapshot failed",
            Self::Unavailable => "rollback not possible",
        };
        f.write_str(note)
    }
}

impl BackupError {
    /// Create a "not found" error for a snapshot
    pub fn backup_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Backup",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for the live database
    pub fn database_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Database",
            identifier: identifier.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

// Implement From traits for common error types

impl From<std::io::Error> for BackupError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for BackupError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for backup engine operations
pub type BackupResult<T> = Result<T, BackupError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BackupError::Config("test error".into());
        assert_eq!(err.to_string(), "Configuration error: test error");
    }

    #[test]
    fn test_not_found_error() {
        let err = BackupError::backup_not_found("backup_2025-01-01T00-00-00-000Z.db");
        assert_eq!(
            err.to_string(),
            "Backup not found: backup_2025-01-01T00-00-00-000Z.db"
        );
        assert!(err.is_not_found());
        assert!(!err.is_validation());
    }

    #[test]
    fn test_restore_error_display() {
        let err = BackupError::Restore {
            filename: "backup_a.db".into(),
            reason: "disk full".into(),
            rollback: RollbackOutcome::Complete,
        };
        assert_eq!(
            err.to_string(),
            "Restore of backup_a.db failed: disk full (rolled back to pre-restore snapshot)"
        );

        let err = BackupError::Restore {
            filename: "backup_a.db".into(),
            reason: "disk full".into(),
            rollback: RollbackOutcome::MainOnly,
        };
        assert!(err.to_string().ends_with("write-ahead log not reconciled)"));
        assert!(!RollbackOutcome::MainOnly.is_complete());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let backup_err: BackupError = io_err.into();
        assert!(matches!(backup_err, BackupError::Io(_)));
    }
}
