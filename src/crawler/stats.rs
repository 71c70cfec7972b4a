use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by the fetcher and the workers of one crawl
#[derive(Debug, Default)]
pub struct CrawlStats {
    requests: AtomicU64,
    successful_requests: AtomicU64,
    retries: AtomicU64,
    new_links_found: AtomicU64,
    records: AtomicU64,
}

/// Point-in-time copy of [`CrawlStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// HTTP requests sent, including fetch retries
    pub requests: u64,

    /// Requests answered with a successful status and a readable body
    pub successful_requests: u64,

    /// Pages put back into the queue after a failed visit
    pub retries: u64,

    /// Links admitted to the frontier (seeds excluded)
    pub new_links_found: u64,

    /// Dataset rows submitted
    pub records: u64,
}

impl CrawlStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.successful_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_links(&self, count: usize) {
        self.new_links_found
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_rows(&self, count: usize) {
        self.records.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            new_links_found: self.new_links_found.load(Ordering::Relaxed),
            records: self.records.load(Ordering::Relaxed),
        }
    }
}
