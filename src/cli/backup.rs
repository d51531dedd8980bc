//! Backup CLI commands
//!
//! Implements CLI commands for backup management.

use std::path::Path;

use chrono::Utc;
use clap::Subcommand;

use crate::backup::BackupManager;
use crate::display::{format_size, format_snapshot_details, format_snapshot_table};
use crate::error::{BackupError, BackupResult};

/// Backup subcommands
#[derive(Subcommand)]
pub enum BackupCommands {
    /// Create a new backup of the live database
    Create {
        /// Free-text note stored with the backup
        #[arg(short, long)]
        description: Option<String>,
    },

    /// List all available backups, newest first
    List {
        /// Show detailed information
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show information about a specific backup
    Info {
        /// Backup filename (use 'latest' for most recent)
        backup: String,
    },

    /// Restore the live database from a backup
    Restore {
        /// Backup filename (use 'latest' for most recent)
        backup: String,

        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Delete a backup and its companion files
    Delete {
        /// Backup filename
        backup: String,

        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Delete old backups according to retention policy
    Prune {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

/// Handle a backup command
pub fn handle_backup_command(manager: &BackupManager, cmd: BackupCommands) -> BackupResult<()> {
    match cmd {
        BackupCommands::Create { description } => {
            println!("Creating backup...");
            let snapshot = manager.create_backup(description.as_deref())?;
            println!("Backup created: {}", snapshot.filename);
            println!("Location: {}", snapshot.path.display());
            println!("Size: {}", format_size(snapshot.size_bytes));
        }

        BackupCommands::List { verbose } => {
            let backups = manager.list_backups()?;

            if backups.is_empty() {
                println!("No backups found.");
                println!("Create one with: cms-backup create");
                return Ok(());
            }

            let now = Utc::now();
            if verbose {
                for backup in &backups {
                    println!("{}", format_snapshot_details(backup, now));
                }
            } else {
                println!("{}", format_snapshot_table(&backups, now));
            }

            println!();
            println!("Total: {} backup(s)", backups.len());
        }

        BackupCommands::Info { backup } => {
            let filename = resolve_backup_name(manager, &backup)?;
            let snapshot = manager
                .get_backup(&filename)?
                .ok_or_else(|| BackupError::backup_not_found(&filename))?;

            println!("Backup Details");
            println!("==============");
            print!("{}", format_snapshot_details(&snapshot, Utc::now()));
        }

        BackupCommands::Restore { backup, force } => {
            let filename = resolve_backup_name(manager, &backup)?;
            let snapshot = manager
                .get_backup(&filename)?
                .ok_or_else(|| BackupError::backup_not_found(&filename))?;

            println!("Backup Information");
            println!("==================");
            print!("{}", format_snapshot_details(&snapshot, Utc::now()));
            println!();

            if !force {
                println!(
                    "WARNING: This will overwrite the live database at {}",
                    manager.database_path().display()
                );
                println!("The current database will be saved as a pre-restore snapshot first.");
                println!("To proceed, run again with --force flag:");
                println!("  cms-backup restore {} --force", backup);
                return Ok(());
            }

            println!("Restoring from backup...");
            let result = manager.restore_backup(&filename)?;

            println!("Restore complete!");
            println!("{}", result.summary());
        }

        BackupCommands::Delete { backup, force } => {
            let filename = resolve_backup_name(manager, &backup)?;
            if manager.get_backup(&filename)?.is_none() {
                return Err(BackupError::backup_not_found(filename));
            }

            if !force {
                println!("This will permanently delete {}", filename);
                println!("To proceed, run again with --force flag:");
                println!("  cms-backup delete {} --force", backup);
                return Ok(());
            }

            manager.delete_backup(&filename)?;
            println!("Deleted backup: {}", filename);
        }

        BackupCommands::Prune { force } => {
            let backups = manager.list_backups()?;
            let retention = manager.retention();

            let counted = backups
                .iter()
                .filter(|b| manager.counts_toward_cap(b))
                .count();
            let to_delete = counted.saturating_sub(retention.max_backups);

            if to_delete == 0 {
                println!("No backups to prune.");
                println!(
                    "Current retention policy: keep {} backup(s); you have {}.",
                    retention.max_backups, counted
                );
                return Ok(());
            }

            println!("Prune Summary");
            println!("=============");
            println!("Retention policy: keep {} backup(s)", retention.max_backups);
            println!("Counted backups: {}", counted);
            println!("To be deleted: {}", to_delete);
            println!();

            if !force {
                println!("To delete old backups, run again with --force flag:");
                println!("  cms-backup prune --force");
                return Ok(());
            }

            let deleted = manager.enforce_retention()?;
            println!("Deleted {} backup(s).", deleted.len());
        }
    }

    Ok(())
}

/// Resolve a backup identifier to a filename in the backup directory
///
/// Accepts `latest`, a bare filename, or a path whose file name is used.
fn resolve_backup_name(manager: &BackupManager, backup: &str) -> BackupResult<String> {
    if backup.eq_ignore_ascii_case("latest") {
        return manager
            .get_latest_backup()?
            .map(|b| b.filename)
            .ok_or_else(|| BackupError::backup_not_found("latest"));
    }

    let path = Path::new(backup);
    if path.components().count() > 1 {
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            return Ok(name.to_string());
        }
    }

    Ok(backup.to_string())
}
