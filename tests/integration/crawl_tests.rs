//! End-to-end crawls against the toy server
//!
//! These tests use wiremock to serve the listing/data site and check the
//! dataset, the request log and the final page states of full runs.

use crate::support::*;
use crab::config::{parse_config, CrawlerConfig};
use crab::output::{write_dataset, ColumnFilter};
use crab::plugin::PageParsers;
use crab::{crawl, run, PageRef, PageState};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn expected_pairs(inputs: std::ops::RangeInclusive<u64>) -> Vec<(u64, u64)> {
    inputs.map(|d| (d, d * d)).collect()
}

#[tokio::test]
async fn test_crawl_toy_server_to_depth_two() {
    let server = start_toy_server().await;
    let seed = PageRef::seed(&format!("{}/page/1", server.uri()), LISTING).unwrap();

    let options = CrawlerConfig {
        max_depth: Some(2),
        ..test_options(4)
    };
    let report = run(vec![seed], toy_parsers(), options).await.unwrap();

    // Pages 2-5 sit at depth 1, so data pages 10-59 are the only ones in reach
    assert_eq!(data_pairs(&report), expected_pairs(10..=59));
    assert!(report.is_complete());
    assert!(report.failed.is_empty());

    // Listing pages 1-9 and data pages 10-59, each exactly once
    assert_eq!(report.pages_done(), 59);
    assert_eq!(report.pages_seen(), 59);
    assert_eq!(report.stats.requests, 59);
    assert_eq!(report.stats.records, 50);

    let requests = requests_by_path(&server).await;
    let data_requests: Vec<_> = requests
        .iter()
        .filter(|(path, _)| path.starts_with("/data/"))
        .collect();
    assert_eq!(data_requests.len(), 50);
    assert!(data_requests.iter().all(|(_, count)| **count == 1));
    assert!(!requests.contains_key("/page/10"));
}

#[tokio::test]
async fn test_dataset_independent_of_worker_count() {
    for workers in [1, 4, 16] {
        let server = start_toy_server().await;
        let seed = PageRef::seed(&format!("{}/page/1", server.uri()), LISTING).unwrap();

        let options = CrawlerConfig {
            max_depth: Some(2),
            ..test_options(workers)
        };
        let report = run(vec![seed], toy_parsers(), options).await.unwrap();

        assert_eq!(
            data_pairs(&report),
            expected_pairs(10..=59),
            "dataset differs with {} worker(s)",
            workers
        );
        assert_eq!(report.dataset.total_records(), 50);
    }
}

#[tokio::test]
async fn test_redirected_seed() {
    let server = start_toy_server().await;
    let seed = PageRef::seed(&format!("{}/", server.uri()), LISTING).unwrap();

    let options = CrawlerConfig {
        max_depth: Some(1),
        ..test_options(4)
    };
    let report = run(vec![seed], toy_parsers(), options).await.unwrap();

    // `/` serves page 1 after the redirect; its data links are at depth 1
    assert_eq!(data_pairs(&report), expected_pairs(10..=19));
    assert!(report.failed.is_empty());
}

#[tokio::test]
async fn test_listing_page_out_of_range_fails() {
    let server = start_toy_server().await;
    let seeds = vec![
        PageRef::seed(&format!("{}/page/101", server.uri()), LISTING).unwrap(),
        PageRef::seed(&format!("{}/data/7", server.uri()), DATA).unwrap(),
    ];

    let options = CrawlerConfig {
        validate_retries: 0,
        ..test_options(2)
    };
    let report = run(seeds, toy_parsers(), options).await.unwrap();

    assert_eq!(data_pairs(&report), vec![(7, 49)]);
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].page.url().path().ends_with("/page/101"));
    assert!(report.failed[0].reason.to_string().contains("400"));
}

#[tokio::test]
async fn test_cyclic_links_terminate() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<a href='/b'>b</a><a href='/a'>self</a>"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<a href='a'>a</a>"))
        .mount(&server)
        .await;

    let mut parsers = PageParsers::new();
    parsers.register(7, FollowAll { type_id: 7 }).unwrap();
    let seed = PageRef::seed(&format!("{}/a", server.uri()), 7).unwrap();

    // No depth limit: only the visited set stops the cycle
    let report = tokio::time::timeout(
        std::time::Duration::from_secs(10),
        run(vec![seed], parsers, test_options(4)),
    )
    .await
    .expect("crawl of a cyclic graph did not finish")
    .unwrap();

    assert_eq!(report.pages_done(), 2);
    assert!(report.is_complete());

    let requests = requests_by_path(&server).await;
    assert_eq!(requests.get("/a"), Some(&1));
    assert_eq!(requests.get("/b"), Some(&1));
}

#[tokio::test]
async fn test_crawl_from_config_and_export() {
    let server = start_toy_server().await;
    let dir = tempfile::tempdir().unwrap();
    let dataset_dir = dir.path().join("dataset");

    let toml = format!(
        r#"
[crawler]
workers = 4
max-depth = 2
backoff-base-ms = 1
backoff-max-ms = 4

[user-agent]
crawler-name = "crab-test"
crawler-version = "1.0.0"

[output]
dataset-dir = "{}"

[[seed]]
url = "{}/page/1"
type-id = 1
"#,
        dataset_dir.display(),
        server.uri()
    );
    let config = parse_config(&toml).unwrap();

    let report = crawl(config, toy_parsers()).await.unwrap();
    assert_eq!(report.dataset.total_records(), 50);
    assert_eq!(report.count(PageState::Done), 59);

    let written = write_dataset(&report.dataset, &dataset_dir, &ColumnFilter::default()).unwrap();
    assert_eq!(written, vec![dataset_dir.join("data.csv")]);

    let csv = std::fs::read_to_string(dataset_dir.join("data.csv")).unwrap();
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("input,output"));
    assert_eq!(lines.count(), 50);
    assert!(csv.contains("\n12,144\n"));
}

#[tokio::test]
async fn test_user_agent_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/3"))
        .and(wiremock::matchers::header("user-agent", "crab-test/1.0.0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            crab::plugin::test_server::data_html(3),
        ))
        .expect(1)
        .mount(&server)
        .await;

    let toml = format!(
        r#"
[user-agent]
crawler-name = "crab-test"
crawler-version = "1.0.0"

[output]
dataset-dir = "unused"

[[seed]]
url = "{}/data/3"
type-id = 2
"#,
        server.uri()
    );
    let config = parse_config(&toml).unwrap();

    let report = crawl(config, toy_parsers()).await.unwrap();
    assert_eq!(data_pairs(&report), vec![(3, 9)]);
}

#[tokio::test]
async fn test_links_requested_as_written() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<a href='/search?flag'>flag</a>\
             <a href='/search?flag#results'>same page</a>\
             <a href='/a//b'>double slash</a>\
             <a href='/q?b=2&amp;a=1&amp;utm_source=x'>query</a>\
             <a href='/q?a=1&amp;b=2'>same query, other order</a>\
             <a href='/enc?q=a%20b'>encoded</a>",
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>leaf</p>"))
        .mount(&server)
        .await;

    let mut parsers = PageParsers::new();
    parsers.register(7, FollowAll { type_id: 7 }).unwrap();
    let seed = PageRef::seed(&format!("{}/start", server.uri()), 7).unwrap();

    let report = run(vec![seed], parsers, test_options(1)).await.unwrap();
    assert_eq!(report.pages_done(), 5);

    let mut requested: Vec<String> = server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request| match request.url.query() {
            Some(query) => format!("{}?{}", request.url.path(), query),
            None => request.url.path().to_string(),
        })
        .collect();
    requested.sort();

    assert_eq!(
        requested,
        vec![
            "/a//b",
            "/enc?q=a%20b",
            "/q?b=2&a=1&utm_source=x",
            "/search?flag",
            "/start",
        ]
    );
}
