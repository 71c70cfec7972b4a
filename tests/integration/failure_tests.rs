//! Retry budgets, fault containment and cancellation

use crate::support::*;
use crab::config::{CrawlerConfig, UserAgentConfig};
use crab::plugin::test_server::data_html;
use crab::plugin::PageParsers;
use crab::state::FailureReason;
use crab::{run, Coordinator, PageRef, PageState};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn serve(server: &MockServer, at: &str, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(template)
        .mount(server)
        .await;
}

fn page(server: &MockServer, at: &str, type_id: u32) -> PageRef {
    PageRef::seed(&format!("{}{}", server.uri(), at), type_id).unwrap()
}

#[tokio::test]
async fn test_invalid_content_fetched_until_budget_spent() {
    let server = MockServer::start().await;
    serve(&server, "/flaky", ResponseTemplate::new(200).set_body_string("partial")).await;

    let (parser, calls) = CountingParser::new(false);
    let mut parsers = PageParsers::new();
    parsers.register(5, parser).unwrap();

    let options = CrawlerConfig {
        validate_retries: 2,
        ..test_options(2)
    };
    let report = run(vec![page(&server, "/flaky", 5)], parsers, options)
        .await
        .unwrap();

    // One first visit plus two retries
    assert_eq!(requests_by_path(&server).await.get("/flaky"), Some(&3));
    assert_eq!(report.count(PageState::Failed), 1);
    assert_eq!(report.failed[0].reason, FailureReason::ValidationFailed);
    assert_eq!(report.failed[0].attempts, 3);
    assert_eq!(report.stats.retries, 2);

    // Rejected content never reaches parse or navigate
    assert_eq!(calls.get(), (3, 0, 0));
    assert!(report.dataset.is_empty());
}

#[tokio::test]
async fn test_valid_content_parsed_once() {
    let server = MockServer::start().await;
    serve(&server, "/ok", ResponseTemplate::new(200).set_body_string("hello")).await;

    let (parser, calls) = CountingParser::new(true);
    let mut parsers = PageParsers::new();
    parsers.register(5, parser).unwrap();

    let report = run(vec![page(&server, "/ok", 5)], parsers, test_options(2))
        .await
        .unwrap();

    assert_eq!(calls.get(), (1, 1, 1));
    assert_eq!(report.pages_done(), 1);
    assert_eq!(report.dataset.get("pages").unwrap()[0]["length"], "5");
}

#[tokio::test]
async fn test_client_error_not_retried_by_fetcher() {
    let server = start_toy_server().await;

    let options = CrawlerConfig {
        fetch_retries: 3,
        validate_retries: 1,
        ..test_options(1)
    };
    let report = run(vec![page(&server, "/data/missing", DATA)], toy_parsers(), options)
        .await
        .unwrap();

    // One request per visit: the fetcher gives up on a 404 immediately
    assert_eq!(requests_by_path(&server).await.get("/data/missing"), Some(&2));
    assert_eq!(report.failed.len(), 1);
    match &report.failed[0].reason {
        FailureReason::Fetch(cause) => assert!(cause.contains("404"), "{}", cause),
        other => panic!("unexpected reason {:?}", other),
    }
}

#[tokio::test]
async fn test_server_error_retried_by_fetcher() {
    let server = MockServer::start().await;
    serve(&server, "/data/4", ResponseTemplate::new(503)).await;

    let options = CrawlerConfig {
        fetch_retries: 3,
        validate_retries: 1,
        ..test_options(1)
    };
    let report = run(vec![page(&server, "/data/4", DATA)], toy_parsers(), options)
        .await
        .unwrap();

    // Three fetch attempts on each of the two visits
    assert_eq!(requests_by_path(&server).await.get("/data/4"), Some(&6));
    assert_eq!(report.pages_failed(), 1);
    assert!(report.failed[0].reason.to_string().contains("3 attempt(s)"));
}

#[tokio::test]
async fn test_transient_error_recovers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/6"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    serve(
        &server,
        "/data/6",
        ResponseTemplate::new(200).set_body_string(data_html(6)),
    )
    .await;

    let report = run(vec![page(&server, "/data/6", DATA)], toy_parsers(), test_options(1))
        .await
        .unwrap();

    assert_eq!(data_pairs(&report), vec![(6, 36)]);
    assert_eq!(report.stats.requests, 2);
    assert_eq!(report.stats.retries, 0);
}

#[tokio::test]
async fn test_unknown_page_type_contained() {
    let server = start_toy_server().await;
    let seeds = vec![page(&server, "/data/2", 99), page(&server, "/data/3", DATA)];

    let report = run(seeds, toy_parsers(), test_options(2)).await.unwrap();

    assert_eq!(data_pairs(&report), vec![(3, 9)]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].reason, FailureReason::UnknownType(99));
    // Not a retry trigger
    assert_eq!(report.failed[0].attempts, 1);
}

#[tokio::test]
async fn test_parser_panic_contained() {
    let server = start_toy_server().await;

    let mut parsers = toy_parsers();
    parsers.register(9, Panicking).unwrap();
    let seeds = vec![page(&server, "/data/1", 9), page(&server, "/data/8", DATA)];

    let report = run(seeds, parsers, test_options(2)).await.unwrap();

    assert_eq!(data_pairs(&report), vec![(8, 64)]);
    assert_eq!(report.pages_failed(), 1);
    match &report.failed[0].reason {
        FailureReason::Plugin(message) => {
            assert!(message.contains("parse panicked: parser bug"), "{}", message)
        }
        other => panic!("unexpected reason {:?}", other),
    }
}

#[tokio::test]
async fn test_cancellation_stops_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(data_html(1))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let coordinator =
        Coordinator::new(toy_parsers(), test_options(2), &UserAgentConfig::default()).unwrap();
    coordinator.seed((0..20).map(|i| page(&server, &format!("/data/{}", i), DATA)));

    let cancel = coordinator.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
    });

    let report = tokio::time::timeout(Duration::from_secs(5), coordinator.run())
        .await
        .expect("cancelled crawl did not stop")
        .unwrap();

    assert!(report.cancelled);
    assert!(!report.is_complete());
    // The two in-flight pages were released rather than failed
    assert_eq!(report.pending, 20);
    assert!(report.failed.is_empty());
    assert!(report.dataset.is_empty());
}

#[tokio::test]
async fn test_crawl_timeout_cancels() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(data_html(1))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let options = CrawlerConfig {
        crawl_timeout_secs: Some(1),
        fetch_timeout_ms: 10_000,
        ..test_options(1)
    };
    let seeds = (0..3).map(|i| page(&server, &format!("/data/{}", i), DATA)).collect();

    let report = tokio::time::timeout(Duration::from_secs(5), run(seeds, toy_parsers(), options))
        .await
        .expect("crawl timeout did not stop the run")
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.pending, 3);
}

#[tokio::test]
async fn test_page_limit() {
    let server = start_toy_server().await;

    let options = CrawlerConfig {
        max_pages: Some(5),
        ..test_options(4)
    };
    let report = run(vec![page(&server, "/page/1", LISTING)], toy_parsers(), options)
        .await
        .unwrap();

    assert_eq!(report.pages_seen(), 5);
    assert_eq!(report.stats.requests, 5);
    assert!(report.is_complete());
}
