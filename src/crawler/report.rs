use crate::crawler::aggregator::Dataset;
use crate::crawler::stats::StatsSnapshot;
use crate::state::{FailedPage, PageState};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Result of one crawl run
#[derive(Debug, Clone)]
pub struct CrawlReport {
    /// Everything the page parsers extracted
    pub dataset: Dataset,

    /// Pages that ended in `Failed`, in the order they failed
    pub failed: Vec<FailedPage>,

    /// Number of admitted pages per final state
    pub state_counts: BTreeMap<PageState, usize>,

    pub stats: StatsSnapshot,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Whether the run was stopped by cancellation or the crawl timeout
    pub cancelled: bool,

    /// Admitted pages that were never finished (non-zero only after cancellation)
    pub pending: usize,
}

impl CrawlReport {
    /// Number of pages in the given state at the end of the run
    pub fn count(&self, state: PageState) -> usize {
        self.state_counts.get(&state).copied().unwrap_or(0)
    }

    /// Number of distinct URLs that were scheduled
    pub fn pages_seen(&self) -> usize {
        self.state_counts.values().sum()
    }

    pub fn pages_done(&self) -> usize {
        self.count(PageState::Done)
    }

    pub fn pages_failed(&self) -> usize {
        self.count(PageState::Failed)
    }

    pub fn duration_seconds(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds()
    }

    /// True if the run ended because it ran out of work
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.pending == 0
    }
}
