//! Sumi-Sieve main entry point
//!
//! This is the command-line interface for the Sumi-Sieve identifier enumerator.

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use sumi_sieve::config::{load_config_with_hash, Config};
use sumi_sieve::crawler::{run_crawl, StartMode};
use sumi_sieve::output::{
    export_records, generate_markdown_summary, generate_summary, print_statistics,
};
use sumi_sieve::storage::{SnapshotStore, SqliteStorage};
use tracing_subscriber::EnvFilter;

/// Sumi-Sieve: an identifier enumerator for truncating search endpoints
///
/// Sumi-Sieve discovers every identifier behind a search endpoint that caps
/// its result pages, narrowing search terms until every leaf query is known
/// to be complete. Crawl state is snapshotted to SQLite so an interrupted
/// crawl resumes where it stopped.
#[derive(Parser, Debug)]
#[command(name = "sumi-sieve")]
#[command(version)]
#[command(about = "An identifier enumerator for truncating search endpoints", long_about = None)]
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

    /// Resume from the latest snapshot (default behavior)
    #[arg(long, conflicts_with = "fresh")]
    resume: bool,

    /// Start a fresh crawl, discarding stored snapshots
    #[arg(long, conflicts_with = "resume")]
    fresh: bool,

    /// Talk to the endpoint over plain HTTP
    #[arg(long)]
    insecure: bool,

    /// Validate config and show the crawl plan without fetching anything
    #[arg(long, conflicts_with_all = ["stats", "export"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export"])]
    stats: bool,

    /// Write the record export and summary from the latest snapshot and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    export: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.insecure {
        config.endpoint.insecure = true;
    }

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.export {
        handle_export(&config)?;
    } else {
        let mode = if cli.fresh {
            StartMode::Fresh
        } else {
            StartMode::Resume
        };
        handle_crawl(config, config_hash, mode).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_sieve=info,warn"),
            1 => EnvFilter::new("sumi_sieve=debug,info"),
            2 => EnvFilter::new("sumi_sieve=trace,debug"),
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

/// Handles the --dry-run mode: shows the crawl plan
fn handle_dry_run(config: &Config) {
    let crawler = &config.crawler;
    println!("=== Sumi-Sieve Dry Run ===\n");

    println!("Endpoint:");
    println!("  URL: {}", config.endpoint.url);
    println!(
        "  Search term: {} '{}'",
        if config.endpoint.term_in_path {
            "path parameter"
        } else {
            "query parameter"
        },
        config.endpoint.term_param
    );
    println!("  Plain HTTP: {}", config.endpoint.insecure);
    if let Some(kind) = &config.endpoint.record_type {
        println!("  Keeping records of type: {}", kind);
    }

    println!("\nCrawler Configuration:");
    println!("  Workers: {}", crawler.workers);
    println!("  Max results per query: {}", crawler.max_results);
    println!("  First-level alphabet: {}", crawler.first_level_alphabet);
    println!("  Narrowing alphabet: {}", crawler.narrowing_alphabet);
    println!(
        "  Staging: {} per round until {} queued, then {} per round",
        crawler.staging_batch_size, crawler.staging_threshold, crawler.bulk_batch_size
    );
    println!(
        "  Confirmation threshold: {}",
        crawler.confirmation_threshold
    );
    if crawler.complete_through.is_some() || crawler.truncated_from.is_some() {
        println!(
            "  Static rule: complete through {:?}, truncated from {:?}",
            crawler.complete_through, crawler.truncated_from
        );
    }

    println!("\nRetry:");
    println!("  Max attempts: {}", config.retry.max_attempts);
    println!("  Backoff base: {}s", config.retry.backoff_base_secs);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Export: {}", config.output.export_path);
    if let Some(summary) = &config.output.summary_path {
        println!("  Summary: {}", summary);
    }

    let first_level = crawler
        .first_level_alphabet
        .chars()
        .map(|c| c.to_string())
        .filter(|term| !crawler.presplit_terms.contains(term))
        .count();
    let presplit = crawler.presplit_terms.len() * crawler.narrowing_alphabet.chars().count();

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would start with {} first-level queries",
        first_level + presplit
    );
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let Some(summary) = generate_summary(&storage)? else {
        println!("No snapshots stored yet.");
        return Ok(());
    };

    let history = storage.snapshot_history()?;
    print_statistics(&summary, &history);

    Ok(())
}

/// Handles the --export mode: writes outputs from the latest snapshot
fn handle_export(config: &Config) -> anyhow::Result<()> {
    println!("=== Exporting Crawl Results ===\n");
    println!("Database: {}", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let snapshot = storage
        .load_latest_snapshot()?
        .context("no snapshot stored in the database")?;

    let export_path = Path::new(&config.output.export_path);
    let written = export_records(snapshot.records.values(), export_path)?;
    println!("✓ Exported {} records to: {}", written, export_path.display());

    if let Some(summary_path) = &config.output.summary_path {
        let summary = generate_summary(&storage)?.context("no snapshot stored in the database")?;
        generate_markdown_summary(&summary, Path::new(summary_path))?;
        println!("✓ Summary exported to: {}", summary_path);
    }

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: String, mode: StartMode) -> anyhow::Result<()> {
    match mode {
        StartMode::Fresh => tracing::info!("Starting fresh crawl (discarding stored snapshots)"),
        StartMode::Resume => tracing::info!("Starting crawl (will resume from latest snapshot)"),
    }

    match run_crawl(config, Some(config_hash), mode).await {
        Ok(progress) => {
            println!("{}", progress);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
