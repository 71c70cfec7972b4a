//! Integration tests for the crawler
//!
//! Every test runs full crawls against a wiremock server.

mod crawl_tests;
mod failure_tests;
mod support;
