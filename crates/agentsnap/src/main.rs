//! agentsnap - versioned backups of AI agent workspaces.
//!
//! This is the main entry point for the agentsnap CLI.

mod commands;

use agentsnap_core::{Config, CoreError, CoreResult};
use agentsnap_util::log::{self, LogConfig, LogLevel};
use clap::{Parser, Subcommand};
use commands::*;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "agentsnap")]
#[command(author, version, about = "Versioned backups of AI agent workspaces", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to $AGENTSNAP_CONFIG, then ~/.config/agentsnap/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a new config file
    Init {
        /// Directory to back up (repeat for several)
        #[arg(short, long = "source", required = true)]
        sources: Vec<PathBuf>,
        /// Where snapshots are stored
        #[arg(short, long)]
        destination: PathBuf,
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
    /// Capture a new snapshot
    Snapshot {
        /// Note stored with the snapshot
        #[arg(short, long)]
        message: Option<String>,
        /// Store a snapshot even if nothing changed
        #[arg(long)]
        force: bool,
    },
    /// List snapshots, newest first
    List {
        /// Print output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the files of one snapshot
    Show {
        /// Snapshot ID (`0` = current state, `1` = newest, or a full ID)
        id: String,
        /// Print output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Compare two snapshots
    Diff {
        /// Older side
        #[arg(default_value = "1")]
        from: String,
        /// Newer side
        #[arg(default_value = "0")]
        to: String,
        /// Unified diff with line hunks
        #[arg(long, conflicts_with = "metadata")]
        content: bool,
        /// Unified diff from stored hashes and sizes only
        #[arg(long)]
        metadata: bool,
    },
    /// Restore a snapshot
    Restore {
        /// Snapshot ID (`1` = newest, or a full ID)
        id: String,
        /// Restore into this directory instead of over the sources
        #[arg(short, long)]
        target: Option<PathBuf>,
    },
    /// Delete snapshots outside the retention policy
    Prune {
        /// Only show what would be deleted
        #[arg(long)]
        dry_run: bool,
    },
    /// Show recent save, delete and restore events
    History {
        /// Number of entries to show
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
    /// Show configuration
    Config,
}

/// Exit status for malformed input (bad ID, invalid config).
const EXIT_USAGE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config_path = match cli.config.clone() {
        Some(path) => path,
        None => match Config::default_path() {
            Ok(path) => path,
            Err(e) => return report(e.into()),
        },
    };
    let config = Config::load(&config_path).await;
    init_logging(cli.verbose, config.as_ref().ok());
    tracing::debug!(path = %config_path.display(), "Using config file");

    match run(cli.command, config_path, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(e),
    }
}

async fn run(
    command: Commands,
    config_path: PathBuf,
    config: CoreResult<Config>,
) -> anyhow::Result<()> {
    match command {
        Commands::Init {
            sources,
            destination,
            force,
        } => handle_init(&config_path, sources, destination, force).await,
        Commands::Config => show_config(&config_path, config),
        Commands::Snapshot { message, force } => {
            handle_snapshot(&open_service(config).await?, message, force).await
        }
        Commands::List { json } => handle_list(&open_service(config).await?, json).await,
        Commands::Show { id, json } => handle_show(&open_service(config).await?, &id, json).await,
        Commands::Diff {
            from,
            to,
            content,
            metadata,
        } => {
            let service = open_service(config).await?;
            handle_diff(&service, &from, &to, diff_mode(content, metadata)).await
        }
        Commands::Restore { id, target } => {
            handle_restore(&open_service(config).await?, &id, target.as_deref()).await
        }
        Commands::Prune { dry_run } => handle_prune(&open_service(config).await?, dry_run).await,
        Commands::History { limit } => handle_history(&open_service(config).await?, limit).await,
    }
}

fn init_logging(verbose: bool, config: Option<&Config>) {
    let level = if verbose {
        LogLevel::Debug
    } else {
        config
            .and_then(|c| c.log_level.as_deref())
            .and_then(LogLevel::parse)
            .unwrap_or(LogLevel::Warn)
    };

    log::init(LogConfig {
        print: true,
        level,
        include_location: verbose,
        file: log::default_log_path(),
    });
}

fn report(error: anyhow::Error) -> ExitCode {
    eprintln!("error: {error:#}");
    let usage = error
        .downcast_ref::<CoreError>()
        .is_some_and(CoreError::is_usage_error);
    if usage {
        ExitCode::from(EXIT_USAGE)
    } else {
        ExitCode::FAILURE
    }
}
