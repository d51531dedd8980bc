//! Display formatting for terminal output
//!
//! Provides utilities for formatting snapshots for terminal display.

pub mod snapshot;

pub use snapshot::{format_age, format_size, format_snapshot_details, format_snapshot_table};
