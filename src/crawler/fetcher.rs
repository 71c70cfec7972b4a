//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - Retrying transient failures with exponential backoff
//! - Spacing out requests to the same host
//! - Error classification

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::crawler::stats::CrawlStats;
use crate::state::HostState;
use crate::url::host_key;
use crate::FetchError;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use url::Url;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `crawler` - Timeouts and TLS settings
/// * `user_agent` - The user agent configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(
    crawler: &CrawlerConfig,
    user_agent: &UserAgentConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(crawler.fetch_timeout())
        .connect_timeout(crawler.connect_timeout())
        .danger_accept_invalid_certs(crawler.accept_invalid_certs)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Outcome of a single request
enum Attempt {
    /// Worth trying again
    Transient(String),
    /// Retrying the same request cannot succeed
    Permanent(u16),
    /// The request never reached the network in a usable form
    Fatal(String),
}

/// Retrieves page content over HTTP
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | HTTP 2xx | Return body |
/// | HTTP 4xx | Immediate `FetchError::Status` |
/// | HTTP 5xx | Retry with backoff |
/// | Timeout / connection error | Retry with backoff |
/// | Body read failure | Retry with backoff |
/// | Redirect loop | Immediate `FetchError::Request` |
pub struct Fetcher {
    client: Client,
    max_attempts: u32,
    config: CrawlerConfig,
    hosts: Mutex<HashMap<String, HostState>>,
    stats: Arc<CrawlStats>,
}

impl Fetcher {
    /// Creates a fetcher with its own HTTP client
    pub fn new(
        config: &CrawlerConfig,
        user_agent: &UserAgentConfig,
        stats: Arc<CrawlStats>,
    ) -> Result<Self, reqwest::Error> {
        let client = build_http_client(config, user_agent)?;
        Ok(Self::with_client(client, config, stats))
    }

    /// Creates a fetcher around an existing client
    pub fn with_client(client: Client, config: &CrawlerConfig, stats: Arc<CrawlStats>) -> Self {
        Self {
            client,
            max_attempts: config.fetch_retries.max(1),
            config: config.clone(),
            hosts: Mutex::new(HashMap::new()),
            stats,
        }
    }

    /// Fetches a URL and returns its body
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - The response body of the first successful attempt
    /// * `Err(FetchError::Status)` - The server answered with a client error
    /// * `Err(FetchError::Request)` - The request cannot succeed, e.g. a redirect loop
    /// * `Err(FetchError::Exhausted)` - Every attempt failed
    pub async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        let mut cause = String::new();

        for attempt in 1..=self.max_attempts {
            let backoff = self.config.backoff_delay(attempt);
            if !backoff.is_zero() {
                tracing::debug!(
                    "Retrying {} in {:?} (attempt {}/{})",
                    url,
                    backoff,
                    attempt,
                    self.max_attempts
                );
                tokio::time::sleep(backoff).await;
            }

            self.wait_for_host(url).await;
            self.stats.record_request();

            let started = Instant::now();
            match self.attempt(url).await {
                Ok(body) => {
                    self.stats.record_success();
                    tracing::trace!(
                        "Fetched {} ({} bytes) in {:?}",
                        url,
                        body.len(),
                        started.elapsed()
                    );
                    return Ok(body);
                }
                Err(Attempt::Permanent(status)) => {
                    tracing::debug!("HTTP {} for {}", status, url);
                    return Err(FetchError::Status {
                        url: url.to_string(),
                        status,
                    });
                }
                Err(Attempt::Fatal(error)) => {
                    tracing::debug!("Request to {} cannot succeed: {}", url, error);
                    return Err(FetchError::Request {
                        url: url.to_string(),
                        cause: error,
                    });
                }
                Err(Attempt::Transient(error)) => {
                    tracing::trace!(
                        "Attempt {} for {} failed after {:?}: {}",
                        attempt,
                        url,
                        started.elapsed(),
                        error
                    );
                    cause = error;
                }
            }
        }

        Err(FetchError::Exhausted {
            url: url.to_string(),
            attempts: self.max_attempts,
            cause,
        })
    }

    async fn attempt(&self, url: &Url) -> Result<String, Attempt> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(classify_error)?;

        let status = response.status();
        if status.is_server_error() {
            return Err(Attempt::Transient(format!("HTTP {}", status.as_u16())));
        }
        if !status.is_success() {
            return Err(Attempt::Permanent(status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| Attempt::Transient(format!("Failed to read body: {}", e)))
    }

    /// Sleeps until the next request slot for the URL's host
    async fn wait_for_host(&self, url: &Url) {
        let delay = self.config.request_delay();
        if delay.is_zero() {
            return;
        }
        let Some(key) = host_key(url) else {
            return;
        };

        let wait = {
            let mut hosts = self.hosts.lock().unwrap_or_else(PoisonError::into_inner);
            hosts.entry(key).or_default().reserve(delay, Instant::now())
        };

        if wait > Duration::ZERO {
            tokio::time::sleep(wait).await;
        }
    }

    /// Number of requests sent to each host so far
    pub fn host_request_counts(&self) -> HashMap<String, u32> {
        let hosts = self.hosts.lock().unwrap_or_else(PoisonError::into_inner);
        hosts
            .iter()
            .map(|(host, state)| (host.clone(), state.request_count))
            .collect()
    }
}

fn classify_error(e: reqwest::Error) -> Attempt {
    if e.is_timeout() {
        Attempt::Transient("Request timeout".to_string())
    } else if e.is_connect() {
        Attempt::Transient(format!("Connection failed: {}", e))
    } else if e.is_redirect() || e.is_builder() {
        Attempt::Fatal(e.to_string())
    } else {
        Attempt::Transient(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_config() -> CrawlerConfig {
        CrawlerConfig {
            fetch_retries: 3,
            fetch_timeout_ms: 2_000,
            backoff_base_ms: 1,
            backoff_max_ms: 4,
            ..CrawlerConfig::default()
        }
    }

    fn create_fetcher(config: &CrawlerConfig) -> (Fetcher, Arc<CrawlStats>) {
        let stats = Arc::new(CrawlStats::new());
        let fetcher = Fetcher::new(config, &UserAgentConfig::default(), stats.clone()).unwrap();
        (fetcher, stats)
    }

    fn url(server: &MockServer, p: &str) -> Url {
        Url::parse(&format!("{}{}", server.uri(), p)).unwrap()
    }

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(&CrawlerConfig::default(), &UserAgentConfig::default());
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>hello</p>"))
            .expect(1)
            .mount(&server)
            .await;

        let (fetcher, stats) = create_fetcher(&create_test_config());
        let body = fetcher.fetch(&url(&server, "/page/1")).await.unwrap();

        assert_eq!(body, "<p>hello</p>");
        assert_eq!(stats.snapshot().requests, 1);
        assert_eq!(stats.snapshot().successful_requests, 1);
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let (fetcher, _) = create_fetcher(&create_test_config());
        let err = fetcher.fetch(&url(&server, "/missing")).await.unwrap_err();

        assert!(matches!(err, FetchError::Status { status: 404, .. }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_redirect_loop_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/loop"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/loop"))
            .mount(&server)
            .await;

        let (fetcher, stats) = create_fetcher(&create_test_config());
        let err = fetcher.fetch(&url(&server, "/loop")).await.unwrap_err();

        assert!(matches!(err, FetchError::Request { .. }), "{:?}", err);
        assert!(!err.is_transient());
        // One attempt, no backoff rounds
        assert_eq!(stats.snapshot().requests, 1);
    }

    #[tokio::test]
    async fn test_server_error_retried_until_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let (fetcher, stats) = create_fetcher(&create_test_config());
        let err = fetcher.fetch(&url(&server, "/flaky")).await.unwrap_err();

        match err {
            FetchError::Exhausted {
                attempts, cause, ..
            } => {
                assert_eq!(attempts, 3);
                assert!(cause.contains("503"));
            }
            other => panic!("expected exhausted retries, got {:?}", other),
        }
        assert_eq!(stats.snapshot().requests, 3);
        assert_eq!(stats.snapshot().successful_requests, 0);
    }

    #[tokio::test]
    async fn test_server_error_then_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/recovering"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/recovering"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let (fetcher, stats) = create_fetcher(&create_test_config());
        let body = fetcher.fetch(&url(&server, "/recovering")).await.unwrap();

        assert_eq!(body, "ok");
        assert_eq!(stats.snapshot().requests, 2);
    }

    #[tokio::test]
    async fn test_timeout_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let config = CrawlerConfig {
            fetch_retries: 2,
            fetch_timeout_ms: 50,
            ..create_test_config()
        };
        let (fetcher, _) = create_fetcher(&config);
        let err = fetcher.fetch(&url(&server, "/slow")).await.unwrap_err();

        assert!(err.is_transient());
        assert!(matches!(err, FetchError::Exhausted { attempts: 2, .. }));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let config = CrawlerConfig {
            fetch_retries: 2,
            ..create_test_config()
        };
        let (fetcher, _) = create_fetcher(&config);
        // Port 9 (discard) is not expected to be listening locally
        let err = fetcher
            .fetch(&Url::parse("http://127.0.0.1:9/").unwrap())
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_request_delay_per_host() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let config = CrawlerConfig {
            request_delay_ms: 100,
            ..create_test_config()
        };
        let (fetcher, _) = create_fetcher(&config);

        let started = Instant::now();
        fetcher.fetch(&url(&server, "/a")).await.unwrap();
        fetcher.fetch(&url(&server, "/b")).await.unwrap();
        fetcher.fetch(&url(&server, "/c")).await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(200));
        let counts = fetcher.host_request_counts();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts.values().next(), Some(&3));
    }
}
