//! cms-backup - backup and restore engine for the CMS admin database
//!
//! The CMS stores its content in a single file-based transactional database
//! (a main file plus a write-ahead log). This crate snapshots that file pair,
//! keeps a bounded history of snapshots, and restores one over the live
//! database with a safety snapshot taken first.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Path resolution and settings
//! - `error`: Custom error types
//! - `storage`: Atomic file helpers
//! - `backup`: Snapshot store, backup, retention and restore
//! - `display`: Terminal formatting
//! - `cli`: Command handlers for the `cms-backup` binary
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
//! for snapshot in manager.list_backups()? {
//!     println!("{}", snapshot.filename);
//! }
//! ```

pub mod backup;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod storage;

pub use error::{BackupError, BackupResult, RollbackOutcome};
