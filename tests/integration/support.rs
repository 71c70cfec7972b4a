//! Shared fixtures: the toy server, crawler options and instrumented parsers

use crab::config::CrawlerConfig;
use crab::plugin::test_server::{data_html, listing_html, DataPage, ListingPage};
use crab::plugin::{Link, PageParser, PageParsers, PageTypeId, ParsedRecord, Row};
use crab::{CrawlReport, PluginError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const LISTING: PageTypeId = 1;
pub const DATA: PageTypeId = 2;

/// Serves the listing/data site
///
/// - `/` redirects to `/page/1`
/// - `/page/N` for N in 1..=100, 400 outside that range
/// - `/data/D` for any number D
/// - everything else is 404
pub struct ToyServer;

impl Respond for ToyServer {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let path = request.url.path();
        if path == "/" {
            return ResponseTemplate::new(301).insert_header("Location", "/page/1");
        }

        if let Some(n) = path.strip_prefix("/page/") {
            return match n.parse::<u32>() {
                Ok(n) if (1..=100).contains(&n) => html(listing_html(n)),
                Ok(_) => ResponseTemplate::new(400),
                Err(_) => ResponseTemplate::new(404),
            };
        }

        if let Some(d) = path.strip_prefix("/data/") {
            if let Ok(d) = d.parse::<u64>() {
                return html(data_html(d));
            }
        }

        ResponseTemplate::new(404)
    }
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "text/html")
}

/// Starts a mock server answering every GET like the toy server
pub async fn start_toy_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ToyServer)
        .mount(&server)
        .await;
    server
}

/// Crawler options tuned for tests: short backoff, no progress noise
pub fn test_options(workers: usize) -> CrawlerConfig {
    CrawlerConfig {
        workers,
        backoff_base_ms: 1,
        backoff_max_ms: 4,
        fetch_timeout_ms: 2_000,
        progress_interval_secs: 60,
        ..Default::default()
    }
}

/// The parsers registered by the `crab` binary
pub fn toy_parsers() -> PageParsers {
    let mut parsers = PageParsers::new();
    parsers
        .register(LISTING, ListingPage::new(LISTING, DATA))
        .unwrap();
    parsers.register(DATA, DataPage).unwrap();
    parsers
}

/// Number of GET requests the server received per path
pub async fn requests_by_path(server: &MockServer) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for request in server.received_requests().await.unwrap_or_default() {
        *counts.entry(request.url.path().to_string()).or_insert(0) += 1;
    }
    counts
}

/// `(input, output)` pairs of the `data` table, sorted by input
pub fn data_pairs(report: &CrawlReport) -> Vec<(u64, u64)> {
    let mut pairs: Vec<(u64, u64)> = report
        .dataset
        .get("data")
        .unwrap_or_default()
        .iter()
        .map(|row| {
            (
                row["input"].parse().unwrap(),
                row["output"].parse().unwrap(),
            )
        })
        .collect();
    pairs.sort_unstable();
    pairs
}

/// Calls made to a [`CountingParser`]
#[derive(Debug, Default)]
pub struct Calls {
    pub validate: AtomicUsize,
    pub parse: AtomicUsize,
    pub navigate: AtomicUsize,
}

impl Calls {
    pub fn get(&self) -> (usize, usize, usize) {
        (
            self.validate.load(Ordering::SeqCst),
            self.parse.load(Ordering::SeqCst),
            self.navigate.load(Ordering::SeqCst),
        )
    }
}

/// Parser with a fixed validation verdict that records every call
pub struct CountingParser {
    pub valid: bool,
    pub calls: Arc<Calls>,
}

impl CountingParser {
    pub fn new(valid: bool) -> (Self, Arc<Calls>) {
        let calls = Arc::new(Calls::default());
        (
            Self {
                valid,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

impl PageParser for CountingParser {
    fn name(&self) -> &str {
        "counting"
    }

    fn validate(&self, _content: &str) -> bool {
        self.calls.validate.fetch_add(1, Ordering::SeqCst);
        self.valid
    }

    fn parse(&self, content: &str) -> Result<Vec<ParsedRecord>, PluginError> {
        self.calls.parse.fetch_add(1, Ordering::SeqCst);
        let mut fields = Row::new();
        fields.insert("length".to_string(), content.len().to_string());
        Ok(vec![ParsedRecord::Flat {
            kind: "pages".to_string(),
            fields,
        }])
    }

    fn navigate(&self, _content: &str) -> Result<Vec<Link>, PluginError> {
        self.calls.navigate.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }
}

/// Follows every `<a href>` on a page, tagging links with its own type
pub struct FollowAll {
    pub type_id: PageTypeId,
}

impl PageParser for FollowAll {
    fn name(&self) -> &str {
        "follow-all"
    }

    fn navigate(&self, content: &str) -> Result<Vec<Link>, PluginError> {
        let document = scraper::Html::parse_document(content);
        let anchors = scraper::Selector::parse("a[href]").map_err(|e| PluginError::Failed {
            operation: "navigate",
            message: e.to_string(),
        })?;
        Ok(document
            .select(&anchors)
            .filter_map(|a| a.value().attr("href"))
            .map(|href| Link::new(href, self.type_id))
            .collect())
    }
}

/// Panics on every parse call
pub struct Panicking;

impl PageParser for Panicking {
    fn name(&self) -> &str {
        "panicking"
    }

    fn parse(&self, _content: &str) -> Result<Vec<ParsedRecord>, PluginError> {
        panic!("parser bug");
    }
}
