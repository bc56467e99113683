mod config;
mod managers;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use managers::backup::BackupManager;
use std::path::PathBuf;
use std::sync::Arc;
use utils::locker::{LockError, RunLock};
use utils::store::RedisCliClient;
use utils::transfer::RsyncTransfer;

/// Exit code when the run lock is already held
const EXIT_LOCK_HELD: i32 = 2;
/// Exit code when one or more instances were skipped
const EXIT_PARTIAL: i32 = 1;

#[derive(Parser)]
#[command(name = "redis-backup")]
#[command(about = "Coordinated point-in-time backups for a fleet of Redis replicas", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "/etc/redis-backup/config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Back up all configured instances (the default)
    Run,

    /// List configured instances
    List,

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load and validate configuration
    let config = config::load_config(&cli.config)?;

    // If no command specified, run the backups
    match cli.command.unwrap_or(Commands::Run) {
        Commands::Validate => {
            println!("Configuration is valid!");
            println!("Instances: {}", config.instances.len());
            println!("Backup root: {}", config.global.root_backup_dir.display());
            Ok(())
        }

        Commands::List => {
            println!("Configured instances:");
            for instance in &config.instances {
                println!("  {}", instance);
            }
            Ok(())
        }

        Commands::Run => run_backups(config).await,
    }
}

async fn run_backups(config: config::Config) -> Result<()> {
    // Setup logging with file rotation (must keep guard alive)
    let _log_guard = managers::logging::init_logging(
        &config.global.log_directory,
        &config.global.log_level,
        config.global.log_max_files,
    )?;

    // Both external collaborators must be present before taking the lock
    for binary in ["redis-cli", "rsync"] {
        if which::which(binary).is_err() {
            eprintln!("Required binary not found in PATH: {}", binary);
            std::process::exit(EXIT_PARTIAL);
        }
    }

    let lock_file = config.global.lock_file.clone();
    let manager = BackupManager::new(
        config,
        Arc::new(RedisCliClient::new()),
        Arc::new(RsyncTransfer::new()),
    );

    // The run blocks on poll sleeps, so it lives on a blocking thread while
    // the main task watches for termination signals.
    let mut run = tokio::task::spawn_blocking(move || manager.run());

    let result = tokio::select! {
        res = &mut run => res.map_err(|e| anyhow::anyhow!("backup task failed: {}", e))?,
        _ = shutdown_signal() => {
            tracing::warn!("Termination signal received, releasing lock and aborting run");
            RunLock::force_release(&lock_file);
            std::process::exit(EXIT_PARTIAL);
        }
    };

    match result {
        Ok(report) => {
            if report.all_succeeded() {
                println!(
                    "✓ {} instance(s) backed up to {}",
                    report.attempts.len(),
                    report.backup_directory.display()
                );
                Ok(())
            } else {
                println!(
                    "✗ {} of {} instance(s) skipped:",
                    report.failure_count(),
                    report.attempts.len()
                );
                for attempt in report.failures() {
                    println!("  {}: {}", attempt.instance, attempt.outcome);
                }
                std::process::exit(EXIT_PARTIAL);
            }
        }
        Err(e) => {
            if let Some(LockError::AlreadyHeld(path)) = e.downcast_ref::<LockError>() {
                eprintln!(
                    "Lock file already present ({}), another run is active",
                    path.display()
                );
                std::process::exit(EXIT_LOCK_HELD);
            }
            Err(e)
        }
    }
}

/// Wait for SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl+c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}
