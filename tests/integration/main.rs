//! Integration tests for Sumi-Sieve
//!
//! `crawl_tests` drives whole crawls through in-process endpoints,
//! `http_tests` runs them over HTTP against wiremock servers.

mod common;
mod crawl_tests;
mod http_tests;
