//! Crawler coordinator - main crawl orchestration logic
//!
//! This module owns one crawl run:
//! - Building the frontier, fetcher and aggregator
//! - Seeding the frontier
//! - Spawning the worker pool
//! - Cancelling on request or when the crawl timeout expires
//! - Logging progress and assembling the final report

use crate::config::{validate_crawler_config, CrawlerConfig, SeedEntry, UserAgentConfig};
use crate::crawler::aggregator::Aggregator;
use crate::crawler::fetcher::Fetcher;
use crate::crawler::frontier::Frontier;
use crate::crawler::report::CrawlReport;
use crate::crawler::stats::CrawlStats;
use crate::crawler::worker::{Worker, WorkerContext};
use crate::plugin::PageParsers;
use crate::state::{PageRef, PageState};
use crate::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

/// Main crawler coordinator structure
pub struct Coordinator {
    config: CrawlerConfig,
    frontier: Arc<Frontier>,
    fetcher: Arc<Fetcher>,
    parsers: Arc<PageParsers>,
    aggregator: Arc<Aggregator>,
    stats: Arc<CrawlStats>,
    cancel: CancellationToken,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `parsers` - Registry of page parsers, frozen for the duration of the run
    /// * `config` - The crawler configuration
    /// * `user_agent` - Identification sent with every request
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(CrabError)` - Invalid options or HTTP client failure
    pub fn new(
        parsers: PageParsers,
        config: CrawlerConfig,
        user_agent: &UserAgentConfig,
    ) -> Result<Self> {
        validate_crawler_config(&config)?;

        if parsers.is_empty() {
            tracing::warn!("No page parsers registered; every page will fail");
        }

        let cancel = CancellationToken::new();
        let stats = Arc::new(CrawlStats::new());
        let fetcher = Fetcher::new(&config, user_agent, stats.clone())?;

        Ok(Self {
            frontier: Arc::new(Frontier::new(&config, cancel.clone())),
            fetcher: Arc::new(fetcher),
            parsers: Arc::new(parsers),
            aggregator: Arc::new(Aggregator::new()),
            stats,
            cancel,
            config,
        })
    }

    /// Admits the starting pages in the given order
    pub fn seed<I>(&self, pages: I) -> usize
    where
        I: IntoIterator<Item = PageRef>,
    {
        self.frontier.seed(pages)
    }

    /// Normalizes and admits configured seed entries
    pub fn seed_entries(&self, seeds: &[SeedEntry]) -> Result<usize> {
        let pages = seeds
            .iter()
            .map(|seed| PageRef::seed(&seed.url, seed.type_id))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(self.seed(pages))
    }

    /// Token that stops the run when cancelled
    ///
    /// Workers stop taking pages; pages being visited are released and
    /// reported as pending.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs the crawl to completion or cancellation
    pub async fn run(self) -> Result<CrawlReport> {
        let started_at = Utc::now();
        let start_time = Instant::now();

        tracing::info!(
            "Starting crawl: {} worker(s), {} seed page(s), {} parser(s)",
            self.config.workers,
            self.frontier.queued_len(),
            self.parsers.len()
        );

        let ctx = WorkerContext {
            frontier: self.frontier.clone(),
            fetcher: self.fetcher.clone(),
            parsers: self.parsers.clone(),
            aggregator: self.aggregator.clone(),
            stats: self.stats.clone(),
            cancel: self.cancel.clone(),
        };

        let mut workers = JoinSet::new();
        for id in 0..self.config.workers {
            workers.spawn(Worker::new(id, ctx.clone()).run());
        }

        let timeout_task = self.spawn_timeout();
        let progress_task = self.spawn_progress(start_time);

        let mut pages_taken = 0;
        while let Some(result) = workers.join_next().await {
            match result {
                Ok(taken) => pages_taken += taken,
                Err(e) => {
                    // A lost worker may hold an in-flight page forever
                    tracing::error!("Worker task failed: {}", e);
                    self.frontier.cancel();
                }
            }
        }

        if let Some(task) = timeout_task {
            task.abort();
        }
        progress_task.abort();

        let cancelled = self.cancel.is_cancelled();
        let state_counts = self.frontier.state_counts();
        let pending = state_counts.get(&PageState::Queued).copied().unwrap_or(0);
        let failed = self.frontier.failed_pages();
        let stats = self.stats.snapshot();
        drop(ctx);

        let dataset = match Arc::try_unwrap(self.aggregator) {
            Ok(aggregator) => aggregator.into_dataset(),
            Err(shared) => shared.snapshot(),
        };

        if cancelled {
            tracing::warn!("Crawl cancelled with {} page(s) unprocessed", pending);
        }
        tracing::info!(
            "Crawl completed: {} page visit(s), {} record row(s), {} failed page(s) in {:?}",
            pages_taken,
            dataset.total_records(),
            failed.len(),
            start_time.elapsed()
        );

        Ok(CrawlReport {
            dataset,
            failed,
            state_counts,
            stats,
            started_at,
            finished_at: Utc::now(),
            cancelled,
            pending,
        })
    }

    fn spawn_timeout(&self) -> Option<JoinHandle<()>> {
        let limit = self.config.crawl_timeout()?;
        let frontier = self.frontier.clone();

        Some(tokio::spawn(async move {
            tokio::time::sleep(limit).await;
            tracing::warn!("Crawl timeout of {:?} reached, cancelling", limit);
            frontier.cancel();
        }))
    }

    fn spawn_progress(&self, start_time: Instant) -> JoinHandle<()> {
        let frontier = self.frontier.clone();
        let stats = self.stats.clone();
        let interval = self.config.progress_interval();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let snapshot = stats.snapshot();
                let rate = snapshot.requests as f64 / start_time.elapsed().as_secs_f64();
                tracing::info!(
                    "Progress: {} page(s) seen, {} queued, {} in flight, {} record row(s), {:.2} requests/sec",
                    frontier.visited_count(),
                    frontier.queued_len(),
                    frontier.in_flight(),
                    snapshot.records,
                    rate
                );
            }
        })
    }
}
