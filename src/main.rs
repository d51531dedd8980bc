use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cms_backup::backup::BackupManager;
use cms_backup::cli::{handle_backup_command, BackupCommands};
use cms_backup::config::{paths::BackupPaths, settings::Settings};

#[derive(Parser)]
#[command(
    name = "cms-backup",
    version,
    about = "Backup and restore the CMS database",
    long_about = "cms-backup snapshots the CMS database together with its write-ahead \
                  log, keeps a bounded history of snapshots, and restores any of them \
                  with an automatic safety snapshot of the state being replaced."
)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Backup(BackupCommands),

    /// Write a default settings file and create the data directory
    Init,

    /// Show current configuration and paths
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over the default level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.debug {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let paths = BackupPaths::new()?;
    let settings = Settings::load_or_create(&paths)?;
    let config = settings.resolve(&paths);

    match cli.command {
        Commands::Backup(cmd) => {
            let manager = BackupManager::new(config);
            handle_backup_command(&manager, cmd)?;
        }
        Commands::Init => {
            println!("Initializing cms-backup at: {}", paths.base_dir().display());
            if paths.settings_file().exists() {
                println!("Settings already exist: {}", paths.settings_file().display());
            } else {
                settings.save(&paths)?;
                println!("Wrote settings: {}", paths.settings_file().display());
            }
            paths.ensure_directories()?;
        }
        Commands::Config => {
            println!("cms-backup Configuration");
            println!("========================");
            println!("Base directory:   {}", paths.base_dir().display());
            println!("Settings file:    {}", paths.settings_file().display());
            println!("Database:         {}", config.database_path.display());
            println!("Backup directory: {}", config.backup_dir.display());
            println!("Keep backups:     {}", config.retention.max_backups);
            println!(
                "Pre-restore snapshots count toward limit: {}",
                if config.retention.exempt_pre_restore {
                    "no"
                } else {
                    "yes"
                }
            );
        }
    }

    Ok(())
}
