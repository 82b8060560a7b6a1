//! Findex CLI - Command-line interface for Findex
//!
//! This is the main entry point for users interacting with Findex.
//! It provides commands for building the index, searching it, keeping
//! it up to date and serving it to other programs.

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "findex")]
#[command(author = "Findex Contributors")]
#[command(version)]
#[command(about = "Instant file and folder search for your machine", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file (defaults to <config dir>/findex/settings.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Index database directory (defaults to <data dir>/findex/index)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default settings file
    Init,

    /// Crawl the search paths and rebuild the index
    Index,

    /// Search for files and folders by name
    Search {
        /// Search query (whitespace-separated terms must all match)
        query: String,

        /// Maximum results to return (defaults to maxResults)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Only return directories
        #[arg(short, long)]
        dirs: bool,
    },

    /// Show index status
    Status,

    /// Keep the index up to date until interrupted
    Watch,

    /// Serve JSON-RPC requests on stdin/stdout
    Serve,

    /// Show or clear recent searches
    Recent {
        /// Forget all recent searches
        #[arg(long)]
        clear: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays clean for results and protocol frames.
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let result = match commands::Paths::resolve(cli.config, cli.db) {
        Ok(paths) => match cli.command {
            Commands::Init => commands::init(&paths),
            Commands::Index => commands::index(&paths).await,
            Commands::Search { query, limit, dirs } => {
                commands::search(&paths, &query, limit, dirs).await
            }
            Commands::Status => commands::status(&paths),
            Commands::Watch => commands::watch(&paths).await,
            Commands::Serve => commands::serve(&paths).await,
            Commands::Recent { clear } => commands::recent(&paths, clear),
        },
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}
