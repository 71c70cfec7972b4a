use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for crab
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(rename = "seed", default)]
    pub seeds: Vec<SeedEntry>,
}

/// Crawler behavior configuration
///
/// Every key is optional in the TOML file; missing keys fall back to
/// [`CrawlerConfig::default`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrawlerConfig {
    /// Number of concurrent workers draining the frontier
    pub workers: usize,

    /// Total fetch attempts per page visit before a transport failure surfaces
    pub fetch_retries: u32,

    /// How many times a page may be re-queued after a failed visit
    pub validate_retries: u32,

    /// Per-attempt request timeout (milliseconds)
    pub fetch_timeout_ms: u64,

    /// TCP connect timeout (milliseconds)
    pub connect_timeout_ms: u64,

    /// Delay before the second fetch attempt, doubled for every attempt after it (milliseconds)
    pub backoff_base_ms: u64,

    /// Upper bound for the backoff delay (milliseconds)
    pub backoff_max_ms: u64,

    /// Minimum time between two requests to the same host (milliseconds)
    pub request_delay_ms: u64,

    /// Links deeper than this are not followed (seeds are depth 0)
    ///
    /// A page's depth is the shortest path the crawl has found to it by the
    /// time it finishes; a shorter path discovered later does not revisit it.
    pub max_depth: Option<u16>,

    /// Stop admitting new URLs once this many have been scheduled
    pub max_pages: Option<usize>,

    /// Cancel the crawl once it has been running this long (seconds)
    pub crawl_timeout_secs: Option<u64>,

    /// How often progress is logged (seconds)
    pub progress_interval_secs: u64,

    /// Accept invalid TLS certificates
    pub accept_invalid_certs: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            fetch_retries: 3,
            validate_retries: 2,
            fetch_timeout_ms: 10_000,
            connect_timeout_ms: 5_000,
            backoff_base_ms: 250,
            backoff_max_ms: 10_000,
            request_delay_ms: 0,
            max_depth: None,
            max_pages: None,
            crawl_timeout_secs: None,
            progress_interval_secs: 5,
            accept_invalid_certs: false,
        }
    }
}

impl CrawlerConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn crawl_timeout(&self) -> Option<Duration> {
        self.crawl_timeout_secs.map(Duration::from_secs)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.progress_interval_secs)
    }

    /// Returns the delay to wait before the given fetch attempt (1-based)
    ///
    /// The first attempt never waits. Later attempts wait
    /// `backoff_base * 2^(attempt - 2)`, capped at `backoff_max`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exponent = (attempt - 2).min(31);
        let delay = self
            .backoff_base_ms
            .saturating_mul(1u64 << exponent)
            .min(self.backoff_max_ms);
        Duration::from_millis(delay)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url", default)]
    pub contact_url: Option<String>,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "crab".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: None,
        }
    }
}

impl UserAgentConfig {
    /// Formats the User-Agent header value: `Name/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        match &self.contact_url {
            Some(contact) => format!(
                "{}/{} (+{})",
                self.crawler_name, self.crawler_version, contact
            ),
            None => format!("{}/{}", self.crawler_name, self.crawler_version),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving one CSV file per table
    #[serde(rename = "dataset-dir")]
    pub dataset_dir: String,

    /// Path to the markdown summary file
    #[serde(rename = "summary-path", default)]
    pub summary_path: Option<String>,
}

/// A starting page and the page type it should be parsed as
#[derive(Debug, Clone, Deserialize)]
pub struct SeedEntry {
    pub url: String,

    #[serde(rename = "type-id")]
    pub type_id: crate::plugin::PageTypeId,
}
