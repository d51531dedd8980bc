//! Configuration module for cms-backup
//!
//! This module provides configuration management including:
//! - Base directory resolution
//! - Settings persistence (path overrides, retention)

pub mod paths;
pub mod settings;

pub use paths::BackupPaths;
pub use settings::{BackupConfig, BackupRetention, Settings};
