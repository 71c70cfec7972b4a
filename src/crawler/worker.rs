//! Crawl worker
//!
//! A worker repeatedly takes a page from the frontier and visits it:
//!
//! ```text
//! take ─► fetch ─► resolve parser ─► validate ─► parse + navigate ─► publish
//!           │            │               │              │
//!           ▼            ▼               ▼              ▼
//!         retry     mark_failed        retry       mark_failed
//! ```
//!
//! Records and links of a page are both computed before either is published,
//! so a parser fault leaves no partial output behind. Parser panics are caught
//! and only fail the page being visited.

use crate::crawler::aggregator::Aggregator;
use crate::crawler::fetcher::Fetcher;
use crate::crawler::frontier::Frontier;
use crate::crawler::stats::CrawlStats;
use crate::plugin::{guarded, Link, PageParsers};
use crate::state::{FailureReason, PageRef, PageState};
use crate::url::resolve_link;
use crate::PluginError;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything a worker shares with the other workers of a crawl
#[derive(Clone)]
pub struct WorkerContext {
    pub frontier: Arc<Frontier>,
    pub fetcher: Arc<Fetcher>,
    pub parsers: Arc<PageParsers>,
    pub aggregator: Arc<Aggregator>,
    pub stats: Arc<CrawlStats>,
    pub cancel: CancellationToken,
}

pub struct Worker {
    id: usize,
    ctx: WorkerContext,
}

impl Worker {
    pub fn new(id: usize, ctx: WorkerContext) -> Self {
        Self { id, ctx }
    }

    /// Visits pages until the frontier is exhausted or the crawl is cancelled
    ///
    /// # Returns
    ///
    /// Number of pages this worker took from the frontier
    pub async fn run(self) -> usize {
        tracing::debug!("Worker {} started", self.id);
        let mut taken = 0;

        while let Some(page) = self.ctx.frontier.take().await {
            taken += 1;
            self.visit(page).await;
        }

        tracing::debug!("Worker {} stopped after {} page(s)", self.id, taken);
        taken
    }

    async fn visit(&self, page: PageRef) {
        tracing::debug!("Worker {} visiting {}", self.id, page);

        let fetched = tokio::select! {
            result = self.ctx.fetcher.fetch(page.url()) => Some(result),
            _ = self.ctx.cancel.cancelled() => None,
        };
        let content = match fetched {
            Some(Ok(content)) => content,
            Some(Err(e)) => {
                self.retry(&page, FailureReason::Fetch(e.to_string()));
                return;
            }
            None => {
                self.ctx.frontier.release(&page);
                return;
            }
        };
        self.transition(&page, PageState::Fetched);

        if self.ctx.cancel.is_cancelled() {
            self.ctx.frontier.release(&page);
            return;
        }

        let parser = match self.ctx.parsers.resolve(page.type_id) {
            Ok(parser) => parser,
            Err(e) => {
                tracing::warn!("{} for {}", e, page.url());
                self.ctx
                    .frontier
                    .mark_failed(&page, FailureReason::UnknownType(page.type_id));
                return;
            }
        };

        match guarded("validate", || Ok(parser.validate(&content))) {
            Ok(true) => self.transition(&page, PageState::Valid),
            Ok(false) => {
                tracing::debug!("Content of {} failed validation", page.url());
                self.transition(&page, PageState::Invalid);
                self.retry(&page, FailureReason::ValidationFailed);
                return;
            }
            Err(e) => {
                self.fail_plugin(&page, e);
                return;
            }
        }

        let records = match guarded("parse", || parser.parse(&content)) {
            Ok(records) => records,
            Err(e) => {
                self.fail_plugin(&page, e);
                return;
            }
        };
        let links = match guarded("navigate", || parser.navigate(&content)) {
            Ok(links) => links,
            Err(e) => {
                self.fail_plugin(&page, e);
                return;
            }
        };

        if self.ctx.cancel.is_cancelled() {
            self.ctx.frontier.release(&page);
            return;
        }

        let children = self.child_pages(&page, links);
        let admitted = self.ctx.frontier.offer_all(children);
        self.ctx.stats.record_links(admitted);

        let rows = self.ctx.aggregator.submit_all(records);
        self.ctx.stats.record_rows(rows);

        self.transition(&page, PageState::Parsed);
        if let Err(e) = self.ctx.frontier.mark_done(&page) {
            tracing::warn!("{}", e);
        }
        tracing::debug!(
            "Finished {}: {} record row(s), {} new link(s)",
            page.url(),
            rows,
            admitted
        );
    }

    /// Resolves discovered links against the page they were found on
    ///
    /// Children sit one level below the shallowest depth the page is known at.
    fn child_pages(&self, page: &PageRef, links: Vec<Link>) -> Vec<PageRef> {
        let depth = self
            .ctx
            .frontier
            .depth_of(page)
            .unwrap_or(page.depth)
            .saturating_add(1);
        links
            .into_iter()
            .filter_map(|link| {
                match resolve_link(page.url(), &link.url)
                    .and_then(|url| PageRef::new(url, link.type_id, depth))
                {
                    Ok(child) => Some(child),
                    Err(e) => {
                        tracing::debug!("Skipping link '{}' on {}: {}", link.url, page.url(), e);
                        None
                    }
                }
            })
            .collect()
    }

    fn retry(&self, page: &PageRef, reason: FailureReason) {
        if self.ctx.cancel.is_cancelled() {
            self.ctx.frontier.release(page);
            return;
        }

        if self.ctx.frontier.retry(page, reason.clone()) {
            self.ctx.stats.record_retry();
            tracing::debug!("Re-queued {} ({})", page.url(), reason);
        } else {
            tracing::warn!("Giving up on {}: {}", page.url(), reason);
        }
    }

    fn fail_plugin(&self, page: &PageRef, error: PluginError) {
        tracing::warn!("Page parser failed on {}: {}", page.url(), error);
        self.ctx
            .frontier
            .mark_failed(page, FailureReason::Plugin(error.to_string()));
    }

    fn transition(&self, page: &PageRef, next: PageState) {
        if let Err(e) = self.ctx.frontier.transition(page, next) {
            tracing::warn!("{}", e);
        }
    }
}
