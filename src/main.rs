/// Main entry point for the PulmoPulse sync engine
///
/// This file sets up logging, parses command line arguments and either starts
/// the MCP server (the default) or runs a single sync from the command line.
/// The server listens for JSON-RPC requests over stdin/stdout, so logs always
/// go to stderr.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

use pulmo_sync::config::{default_config_path, default_database_path};
use pulmo_sync::{Config, PulmoSyncApp, SyncEvent};

/// Command line arguments for the PulmoPulse sync engine
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to the SQLite database file
    /// If not provided, uses a default location in the user's data directory
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Path to the configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Signed-in user, overriding the configuration file
    #[arg(long, global = true)]
    user_id: Option<String>,

    /// JSON health export to read samples from, overriding the configuration file
    #[arg(long, global = true)]
    health_export: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable verbose output (implies debug)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Serve MCP tools over stdin/stdout (default)
    Serve,
    /// Run one full sync and exit
    Sync,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Set up logging based on command line flags
    let log_level = if args.verbose {
        "debug"
    } else if args.debug {
        "info"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(format!("pulmo_sync={}", log_level))
        .with_writer(std::io::stderr) // Send logs to stderr, not stdout
        .init();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => {
            info!("Looking for configuration at {}", default_config_path().display());
            Config::load_default()?
        }
    };
    if let Some(user_id) = args.user_id {
        config.user_id = Some(user_id);
    }
    if let Some(export) = args.health_export {
        config.health_export = Some(export);
    }
    config.validate()?;

    let db_path = args.database.unwrap_or_else(default_database_path);
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    info!("Using database at: {}", db_path.display());

    let app = PulmoSyncApp::new(db_path, &config).await?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            // Handles JSON-RPC communication over stdin/stdout
            app.run().await?;
            info!("PulmoPulse sync server shutdown complete");
        }
        Command::Sync => sync_once(app).await?,
    }

    Ok(())
}

/// Run a single sync, printing its events; Ctrl-C cancels
async fn sync_once(app: PulmoSyncApp) -> Result<(), Box<dyn std::error::Error>> {
    let (run, mut events) = app.begin_run();

    let cancel = app.cancel_flag().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancelling sync...");
            cancel.cancel();
        }
    });

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SyncEvent::Progress { current, total } => eprintln!("  {}/{}", current, total),
                SyncEvent::Log(line) => eprintln!("{}", line),
                SyncEvent::Completed(summary) => println!("{}", summary),
            }
        }
    });

    let summary = app.sync_once(run).await;
    printer.await?;

    info!(
        "Sync finished: {} questionnaires, {} health records",
        summary.questionnaires_sent, summary.health_records_sent
    );
    Ok(())
}
