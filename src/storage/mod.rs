//! Storage helpers for cms-backup
//!
//! Provides atomic JSON writes and durable file copies used by the backup
//! engine and settings persistence.

pub mod file_io;

pub use file_io::{copy_synced, read_json_required, remove_if_exists, write_json_atomic};
