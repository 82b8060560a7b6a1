//! CLI command implementations.

use colored::Colorize;
use findex_core::Settings;
use findex_server::{Engine, IndexEvent, Rebuild, RpcServer, SearchOptions, Startup};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Where settings and the index live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub config: PathBuf,
    pub db: PathBuf,
}

impl Paths {
    /// Uses the given paths, falling back to the platform directories.
    pub fn resolve(config: Option<PathBuf>, db: Option<PathBuf>) -> Result<Self> {
        let config = match config {
            Some(path) => path,
            None => Settings::default_path().ok_or("could not determine the config directory")?,
        };
        let db = match db {
            Some(path) => path,
            None => dirs::data_dir()
                .ok_or("could not determine the data directory")?
                .join("findex")
                .join("index"),
        };
        Ok(Self { config, db })
    }
}

fn open_engine(paths: &Paths) -> Result<Engine> {
    debug!(
        "Settings at {}, index at {}",
        paths.config.display(),
        paths.db.display()
    );
    let settings = Settings::load(&paths.config)?;
    if let Some(parent) = paths.db.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(Engine::open(settings, &paths.db)?)
}

/// Write a default settings file.
pub fn init(paths: &Paths) -> Result<()> {
    if paths.config.exists() {
        println!(
            "{} Already initialized ({})",
            "✓".green(),
            paths.config.display()
        );
        return Ok(());
    }

    Settings::default().save(&paths.config)?;

    println!(
        "{} Wrote default settings to {}",
        "✓".green(),
        paths.config.display()
    );
    println!("  Edit {} to choose what gets indexed", "searchPaths".cyan());
    println!("  Run {} to build the index", "findex index".cyan());

    Ok(())
}

/// Crawl the search paths and rebuild the index.
pub async fn index(paths: &Paths) -> Result<()> {
    let engine = open_engine(paths)?;
    println!("{}", "Indexing...".cyan());

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner.set_message("Scanning...");

    let mut events = engine.subscribe();
    let ticker = {
        let spinner = spinner.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(IndexEvent::Progress(progress)) => {
                        let place = progress.current_path.unwrap_or_default();
                        spinner.set_message(format!(
                            "{} entries  {}",
                            progress.files_processed,
                            place.dimmed()
                        ));
                    }
                    Ok(IndexEvent::Ready { .. }) | Err(RecvError::Closed) => break,
                    Err(RecvError::Lagged(_)) => continue,
                }
            }
        })
    };

    let start = Instant::now();
    let rebuild = engine.rebuild().await?;
    ticker.abort();
    spinner.finish_and_clear();

    let status = match rebuild {
        Rebuild::Completed(status) => status,
        Rebuild::AlreadyRunning(_) => {
            println!("{} Another index build is already running", "⚠".yellow());
            return Ok(());
        }
    };

    println!(
        "{} Indexed {} entries in {}ms",
        "✓".green(),
        status.count.to_string().cyan(),
        start.elapsed().as_millis()
    );

    if status.count == 0 {
        eprintln!("\n{} Nothing was indexed. Check:", "⚠ Warning:".yellow());
        eprintln!("  - searchPaths in {} exist", paths.config.display());
        eprintln!("  - They are not hidden or listed in excludePatterns");
    }

    Ok(())
}

/// Search for files and folders by name.
pub async fn search(paths: &Paths, query: &str, limit: Option<usize>, dirs: bool) -> Result<()> {
    let engine = open_engine(paths)?;
    let loaded = engine.load()?.is_some();

    let defaults = SearchOptions::from_settings(&engine.settings());
    let options = SearchOptions {
        limit: limit.unwrap_or(defaults.limit),
        directories_only: dirs || defaults.directories_only,
    };

    let hits = engine.search_with(query, options).await;
    engine.add_recent_search(query)?;

    if !loaded {
        println!(
            "{}",
            "No index yet; searched the disk directly. Run `findex index` for faster results."
                .dimmed()
        );
    }

    if hits.is_empty() {
        println!("No matches found for \"{}\"", query);
        return Ok(());
    }

    println!("Found {} matches:\n", hits.len());

    for hit in hits {
        let kind = if hit.is_directory { "dir " } else { "file" };
        println!("  {} {} {}", kind.yellow(), hit.name.cyan(), hit.path.dimmed());
    }

    Ok(())
}

/// Show index status.
pub fn status(paths: &Paths) -> Result<()> {
    let engine = open_engine(paths)?;
    engine.load()?;
    let status = engine.status();
    let settings = engine.settings();

    println!("{}", "📊 Findex Status".cyan().bold());
    println!();
    println!("  {} {}", "Entries:".dimmed(), status.count);
    println!(
        "  {} {}",
        "Ready:".dimmed(),
        if status.ready { "yes".green() } else { "no".red() }
    );
    match engine.last_indexed_at()? {
        Some(at) => println!(
            "  {} {}",
            "Last indexed:".dimmed(),
            at.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        None => println!("  {} {}", "Last indexed:".dimmed(), "never".yellow()),
    }
    if status.ready && engine.is_stale()? {
        println!("  {} {}", "Stale:".dimmed(), "yes, run `findex index`".yellow());
    }

    println!();
    println!("{}", "📁 Search Paths".cyan().bold());
    for root in settings.resolved_roots()? {
        println!("  {}", root.display());
    }
    println!();
    println!("  {} {}", "Settings:".dimmed(), paths.config.display());
    println!("  {} {}", "Database:".dimmed(), paths.db.display());

    Ok(())
}

/// Keep the index up to date until Ctrl+C.
pub async fn watch(paths: &Paths) -> Result<()> {
    let engine = open_engine(paths)?;
    let mut settings = engine.settings();
    if !settings.watch {
        settings.watch = true;
        engine.reconfigure(settings).await?;
    }

    match engine.start()? {
        Startup::Loaded {
            count,
            refresh_scheduled,
        } => {
            println!("{} Loaded {} entries", "✓".green(), count);
            if refresh_scheduled {
                println!("  Index is stale; it will be refreshed in the background");
            }
        }
        Startup::Indexing => println!("{}", "No index yet, building one...".cyan()),
    }

    let mut events = engine.subscribe();
    let reporter = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(IndexEvent::Ready { count }) => {
                    println!("{} Index ready ({} entries)", "✓".green(), count);
                }
                Ok(IndexEvent::Progress(_)) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    println!("  Press {} to stop", "Ctrl+C".cyan());
    tokio::signal::ctrl_c().await?;

    reporter.abort();
    engine.stop_listener();
    println!("{} Stopped", "✓".green());

    Ok(())
}

/// Serve JSON-RPC on stdio. Nothing but protocol frames goes to stdout.
pub async fn serve(paths: &Paths) -> Result<()> {
    let engine = open_engine(paths)?;
    engine.start()?;
    RpcServer::new(engine).run_stdio().await?;
    Ok(())
}

/// Show or clear recent searches.
pub fn recent(paths: &Paths, clear: bool) -> Result<()> {
    let engine = open_engine(paths)?;

    if clear {
        engine.clear_recent_searches()?;
        println!("{} Cleared recent searches", "✓".green());
        return Ok(());
    }

    let recent = engine.recent_searches()?;
    if recent.is_empty() {
        println!("No recent searches");
        return Ok(());
    }

    for (i, query) in recent.iter().enumerate() {
        println!("  {} {}", format!("{:>2}.", i + 1).dimmed(), query);
    }

    Ok(())
}
