//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry logic
//! - The frontier of pages still to visit
//! - Workers dispatching pages to their page parsers
//! - Aggregating parsed records
//! - Overall crawl coordination

mod aggregator;
mod coordinator;
mod fetcher;
mod frontier;
mod report;
mod stats;
mod worker;

pub use aggregator::{Aggregator, Dataset};
pub use coordinator::Coordinator;
pub use fetcher::{build_http_client, Fetcher};
pub use frontier::{Admission, Frontier};
pub use report::CrawlReport;
pub use stats::{CrawlStats, StatsSnapshot};
pub use worker::{Worker, WorkerContext};

use crate::config::{Config, CrawlerConfig, UserAgentConfig};
use crate::plugin::PageParsers;
use crate::state::PageRef;
use crate::Result;

/// Crawls from the given seeds with the default user agent
///
/// # Arguments
///
/// * `seeds` - Starting pages, admitted in order
/// * `parsers` - Page parsers keyed by page type
/// * `options` - Worker count, retry budgets, timeouts and limits
///
/// # Returns
///
/// * `Ok(CrawlReport)` - The crawl ran; individual page failures are in the report
/// * `Err(CrabError)` - Invalid options or HTTP client failure
pub async fn run(
    seeds: Vec<PageRef>,
    parsers: PageParsers,
    options: CrawlerConfig,
) -> Result<CrawlReport> {
    let coordinator = Coordinator::new(parsers, options, &UserAgentConfig::default())?;
    coordinator.seed(seeds);
    coordinator.run().await
}

/// Runs a complete crawl described by a configuration file
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Build the HTTP client from the user agent settings
/// 2. Seed the frontier with the configured `[[seed]]` entries
/// 3. Visit pages with the configured number of workers
/// 4. Return the dataset and the run report
pub async fn crawl(config: Config, parsers: PageParsers) -> Result<CrawlReport> {
    let coordinator = Coordinator::new(parsers, config.crawler, &config.user_agent)?;
    coordinator.seed_entries(&config.seeds)?;
    coordinator.run().await
}
