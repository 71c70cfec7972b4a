//! Crab main entry point
//!
//! This is the command-line interface for the crab page-type crawler.

use anyhow::{Context, Result};
use clap::Parser;
use crab::config::{load_config_with_hash, Config};
use crab::output::{
    generate_markdown_summary, print_statistics, write_dataset, ColumnFilter, CrawlSummary,
};
use crab::plugin::test_server::{DataPage, ListingPage};
use crab::plugin::{PageParsers, PageTypeId};
use crab::Coordinator;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Page type of the toy server's listing pages
const LISTING_TYPE: PageTypeId = 1;

/// Page type of the toy server's data pages
const DATA_TYPE: PageTypeId = 2;

/// Crab: a pluggable page-type crawler
///
/// Crab walks a site starting from the configured seeds, hands every page to
/// the parser registered for its page type, and exports the extracted records
/// as one CSV file per table.
#[derive(Parser, Debug)]
#[command(name = "crab")]
#[command(version)]
#[command(about = "A pluggable page-type crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG", required_unless_present = "parsers")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "parsers")]
    dry_run: bool,

    /// List the registered page parsers and exit
    #[arg(long, conflicts_with = "dry_run")]
    parsers: bool,

    /// Only export columns whose name contains one of these (comma separated)
    #[arg(short = 'n', long = "columns", value_name = "COLUMN")]
    columns: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let parsers = build_parsers()?;
    if cli.parsers {
        handle_parsers(&parsers);
        return Ok(());
    }

    let Some(config_path) = cli.config else {
        anyhow::bail!("A configuration file is required");
    };

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", config_path.display());
    let (config, config_hash) = load_config_with_hash(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config, &parsers);
        return Ok(());
    }

    let filter = ColumnFilter::new(&cli.columns);
    handle_crawl(config, parsers, &config_hash, &filter).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("crab=info,warn"),
            1 => EnvFilter::new("crab=debug,info"),
            2 => EnvFilter::new("crab=trace,debug"),
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

/// Registers the built-in page parsers for the toy server layout
fn build_parsers() -> Result<PageParsers> {
    let mut parsers = PageParsers::new();
    parsers
        .register(LISTING_TYPE, ListingPage::new(LISTING_TYPE, DATA_TYPE))
        .context("Failed to register listing parser")?;
    parsers
        .register(DATA_TYPE, DataPage)
        .context("Failed to register data parser")?;
    Ok(parsers)
}

/// Handles the --parsers mode: lists the page parser registry
fn handle_parsers(parsers: &PageParsers) {
    println!("=== Registered Page Parsers ===\n");
    for info in parsers.describe() {
        println!("{}", info);
    }
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config, parsers: &PageParsers) {
    let crawler = &config.crawler;

    println!("=== Crab Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Workers: {}", crawler.workers);
    println!("  Fetch attempts: {}", crawler.fetch_retries);
    println!("  Page retries: {}", crawler.validate_retries);
    println!("  Fetch timeout: {}ms", crawler.fetch_timeout_ms);
    println!(
        "  Backoff: {}ms doubling up to {}ms",
        crawler.backoff_base_ms, crawler.backoff_max_ms
    );
    println!("  Request delay per host: {}ms", crawler.request_delay_ms);
    match crawler.max_depth {
        Some(depth) => println!("  Max depth: {}", depth),
        None => println!("  Max depth: unlimited"),
    }
    match crawler.max_pages {
        Some(pages) => println!("  Max pages: {}", pages),
        None => println!("  Max pages: unlimited"),
    }
    if let Some(timeout) = crawler.crawl_timeout_secs {
        println!("  Crawl timeout: {}s", timeout);
    }

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Dataset directory: {}", config.output.dataset_dir);
    if let Some(summary) = &config.output.summary_path {
        println!("  Summary: {}", summary);
    }

    println!("\nSeeds ({}):", config.seeds.len());
    for seed in &config.seeds {
        let parser = parsers
            .resolve(seed.type_id)
            .map(|p| p.name().to_string())
            .unwrap_or_else(|_| "no parser registered".to_string());
        println!("  - {} (type {}: {})", seed.url, seed.type_id, parser);
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would start crawling with {} seed URLs",
        config.seeds.len()
    );
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    parsers: PageParsers,
    config_hash: &str,
    filter: &ColumnFilter,
) -> Result<()> {
    let output = config.output.clone();

    let coordinator = Coordinator::new(parsers, config.crawler.clone(), &config.user_agent)
        .context("Failed to set up the crawler")?;
    let seeded = coordinator
        .seed_entries(&config.seeds)
        .context("Invalid seed URL")?;
    tracing::info!("Total seed URLs: {}", seeded);

    // Ctrl-C stops the crawl but still exports what was collected
    let cancel = coordinator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing up");
            cancel.cancel();
        }
    });

    let report = coordinator.run().await.context("Crawl failed")?;

    let dataset_dir = Path::new(&output.dataset_dir);
    let written = write_dataset(&report.dataset, dataset_dir, filter)
        .with_context(|| format!("Failed to export dataset to {}", dataset_dir.display()))?;
    tracing::info!("Exported {} table(s) to {}", written.len(), dataset_dir.display());

    let summary = CrawlSummary::from_report(&report, Some(config_hash));
    if let Some(path) = &output.summary_path {
        generate_markdown_summary(&summary, Path::new(path))
            .with_context(|| format!("Failed to write summary to {}", path))?;
        tracing::info!("Summary written to: {}", path);
    }

    print_statistics(&summary);
    Ok(())
}
