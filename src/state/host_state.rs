use std::time::{Duration, Instant};

/// Tracks the request history of one host during crawling
///
/// Used by the fetcher to keep at least the configured delay between two
/// requests to the same `host[:port]`.
#[derive(Debug, Clone, Default)]
pub struct HostState {
    /// Number of requests made to this host in the current crawl
    pub request_count: u32,

    /// Start time of the most recently scheduled request to this host
    pub last_request_time: Option<Instant>,
}

impl HostState {
    /// Creates a new HostState with no recorded requests
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculates the time until the next request can be made
    ///
    /// # Arguments
    ///
    /// * `min_delay` - Minimum spacing between two requests to this host
    /// * `now` - The current time instant
    ///
    /// # Returns
    ///
    /// * `None` - If a request can be made now
    /// * `Some(wait)` - The duration to wait otherwise
    pub fn time_until_next_request(&self, min_delay: Duration, now: Instant) -> Option<Duration> {
        let last = self.last_request_time?;
        let ready_at = last + min_delay;
        if ready_at > now {
            Some(ready_at - now)
        } else {
            None
        }
    }

    /// Records that a request was made to this host
    pub fn record_request(&mut self, at: Instant) {
        self.request_count += 1;
        self.last_request_time = Some(at);
    }

    /// Books the next request slot for this host
    ///
    /// The slot is recorded immediately so that concurrent callers queue up
    /// behind each other instead of all waiting for the same instant.
    ///
    /// # Returns
    ///
    /// How long the caller has to sleep before sending its request
    pub fn reserve(&mut self, min_delay: Duration, now: Instant) -> Duration {
        let wait = self
            .time_until_next_request(min_delay, now)
            .unwrap_or(Duration::ZERO);
        self.record_request(now + wait);
        wait
    }
}
