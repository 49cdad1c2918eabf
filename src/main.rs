//! Gleaner main entry point
//!
//! This is the command-line interface for the Gleaner image harvester.

use clap::Parser;
use gleaner::config::{load_config_with_hash, Config};
use gleaner::orchestrator::{run_scheduled, Orchestrator, PassMode};
use gleaner::storage::{SqliteStorage, Storage};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Gleaner: an image harvesting engine
///
/// Gleaner pulls candidate images from search APIs, static pages and
/// script-rendered pages, keeps the ones that pass its quality filter and
/// hands them to an ingestion endpoint, remembering what it has already
/// ingested or given up on.
///
/// Without a mode flag, one batch pass and one crawl pass run back to back.
#[derive(Parser, Debug)]
#[command(name = "gleaner")]
#[command(version)]
#[command(about = "An image harvesting engine", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Run a batch pass over query-API and static-page sources
    #[arg(long)]
    batch: bool,

    /// Run a frontier pass over crawlable sources
    #[arg(long)]
    crawl: bool,

    /// Seed the frontier from crawlable sources
    #[arg(long)]
    seed: bool,

    /// Repeat the selected passes every `interval-minutes` until Ctrl-C
    #[arg(long)]
    schedule: bool,

    /// Override `[scheduler] batch-size`
    #[arg(long, value_name = "N")]
    batch_size: Option<u32>,

    /// Validate config and show what would be harvested without running
    #[arg(long, conflicts_with_all = ["stats", "batch", "crawl", "seed", "schedule"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "batch", "crawl", "seed", "schedule"])]
    stats: bool,

    /// Clear the failure count of an image URL and exit
    #[arg(long, value_name = "URL")]
    reset_failure: Option<String>,

    /// Permanently skip an image URL and exit
    #[arg(long, value_name = "URL")]
    force_skip: Option<String>,

    /// Put failed frontier items back to pending and exit
    #[arg(long)]
    retry_failed: bool,
}

impl Cli {
    fn has_operator_action(&self) -> bool {
        self.reset_failure.is_some() || self.force_skip.is_some() || self.retry_failed
    }

    /// Passes to run; both when neither is selected
    fn pass_modes(&self) -> Vec<PassMode> {
        match (self.batch, self.crawl) {
            (true, false) => vec![PassMode::Batch],
            (false, true) => vec![PassMode::Crawl],
            _ => vec![PassMode::Batch, PassMode::Crawl],
        }
    }

    fn seed_only(&self) -> bool {
        self.seed && !self.batch && !self.crawl && !self.schedule
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Some(batch_size) = cli.batch_size {
        config.scheduler.batch_size = batch_size;
    }

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }
    if cli.stats {
        return handle_stats(&config);
    }
    if cli.has_operator_action() {
        return handle_operator_actions(&cli, &config);
    }

    handle_harvest(&cli, &config, &config_hash).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("gleaner=info,warn"),
            1 => EnvFilter::new("gleaner=debug,info"),
            2 => EnvFilter::new("gleaner=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the sources and what each would run
fn handle_dry_run(config: &Config) {
    println!("=== Gleaner Dry Run ===\n");

    println!("Scheduler:");
    println!("  Batch size: {}", config.scheduler.batch_size);
    println!("  Interval: {} minutes", config.scheduler.interval_minutes);
    println!(
        "  Frontier batch size: {}",
        config.scheduler.frontier_batch_size
    );

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nStorage:");
    println!("  Database: {}", config.storage.database_path);
    println!("  Assets: {}", config.storage.asset_dir);
    if let Some(base) = &config.storage.public_base_url {
        println!("  Public base URL: {}", base);
    }

    println!("\nIngest endpoint: {}", config.ingest.endpoint);
    if config.ingest.token_env.is_some() && config.ingest.token().is_none() {
        println!("  ! token variable is set in config but empty in the environment");
    }

    let enabled: Vec<_> = config.sources.iter().filter(|s| s.enabled).collect();
    println!("\nSources ({} enabled of {}):", enabled.len(), config.sources.len());
    for source in &config.sources {
        let mode = match source.crawl_depth {
            Some(depth) if source.kind == gleaner::SourceKind::Url => {
                format!("crawl, depth {}", depth)
            }
            _ => "batch".to_string(),
        };
        let state = if source.enabled { "" } else { " (disabled)" };
        println!(
            "  - {} [{}] {} ({}){}",
            source.name, source.kind, source.query, mode, state
        );
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use gleaner::output::{load_statistics, print_statistics};

    println!("Database: {}\n", config.storage.database_path);

    // Open the database
    let storage = SqliteStorage::new(Path::new(&config.storage.database_path))?;

    // Load statistics
    let today = chrono::Utc::now().date_naive();
    let stats = load_statistics(&storage, today)?;

    // Print statistics
    print_statistics(&stats);

    Ok(())
}

/// Handles the ledger and frontier operator actions
fn handle_operator_actions(
    cli: &Cli,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut storage = SqliteStorage::new(Path::new(&config.storage.database_path))?;

    if let Some(url) = &cli.reset_failure {
        storage.reset_failure(url)?;
        println!("✓ Failure count cleared for {}", url);
    }

    if let Some(url) = &cli.force_skip {
        storage.force_permanent_skip(url, "skipped by operator")?;
        println!("✓ {} will be skipped", url);
    }

    if cli.retry_failed {
        let reset = storage.reset_failed_items()?;
        println!("✓ {} failed frontier items back to pending", reset);
    }

    Ok(())
}

/// Handles seeding and the batch and crawl passes
async fn handle_harvest(
    cli: &Cli,
    config: &Config,
    config_hash: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator = Orchestrator::from_config(config, config_hash)?;

    if cli.seed {
        let seeded = orchestrator.seed_frontier()?;
        tracing::info!("Frontier seeded with {} new URLs", seeded);
        if cli.seed_only() {
            orchestrator.shutdown().await;
            return Ok(());
        }
    }

    let modes = cli.pass_modes();
    let result = if cli.schedule {
        let interval = Duration::from_secs(config.scheduler.interval_minutes * 60);
        run_scheduled(&orchestrator, interval, &modes).await
    } else {
        tokio::select! {
            result = run_once(&orchestrator, &modes, cli.batch_size) => result,
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("Interrupted, shutting down");
                Ok(())
            }
        }
    };

    // Explicit shutdown releases the render session on every exit path
    orchestrator.shutdown().await;

    match result {
        Ok(()) => {
            tracing::info!("Harvest finished");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}

async fn run_once(
    orchestrator: &Orchestrator,
    modes: &[PassMode],
    batch_size: Option<u32>,
) -> gleaner::Result<()> {
    for mode in modes {
        let report = match mode {
            PassMode::Batch => orchestrator.run_batch(batch_size).await?,
            PassMode::Crawl => orchestrator.run_frontier().await?,
        };
        if let Some(report) = report {
            tracing::info!(
                "{} pass (run {}): {} uploaded of {} scraped",
                report.mode,
                report.job_run_id,
                report.counters.uploaded,
                report.counters.scraped
            );
        }
    }
    Ok(())
}
