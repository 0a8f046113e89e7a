//! Whole crawls through in-process endpoints

use crate::common::{exported_keys, record_type, test_config, universe, SyntheticEndpoint};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use sumi_sieve::crawler::{
    Coordinator, CrawlDriver, RetryPolicy, SearchAssistDecoder, StartMode, Transport,
};
use sumi_sieve::storage::{SnapshotStore, SqliteStorage};
use sumi_sieve::{CountVerdict, SieveError};

fn driver(
    config: &sumi_sieve::Config,
    endpoint: Arc<SyntheticEndpoint>,
    record_type: Option<&str>,
) -> CrawlDriver {
    CrawlDriver::new(
        config.crawler.clone(),
        RetryPolicy::from(&config.retry),
        endpoint,
        Arc::new(SearchAssistDecoder::new(record_type.map(str::to_string))),
    )
    .unwrap()
}

fn keys(driver: &CrawlDriver) -> BTreeSet<String> {
    driver.records().map(|r| r.key.clone()).collect()
}

#[tokio::test]
async fn test_static_rule_crawl_collects_universe() {
    let dir = tempfile::tempdir().unwrap();
    let symbols = universe("abcd");
    let mut config = test_config(dir.path(), "http://unused.test/", "abcd", 6);
    config.crawler.complete_through = Some(5);

    let endpoint = Arc::new(SyntheticEndpoint::new(symbols.clone(), 6));
    let mut driver = driver(&config, endpoint.clone(), None);
    let progress = driver.run().await.unwrap();

    assert!(progress.done);
    assert_eq!(keys(&driver), symbols.iter().cloned().collect());
    assert!(driver.tree().is_complete());

    // every query was issued exactly once
    let requests = endpoint.requests();
    let distinct: BTreeSet<&String> = requests.iter().collect();
    assert_eq!(distinct.len(), requests.len());
    assert_eq!(requests.len(), progress.completed_queries);
}

#[tokio::test]
async fn test_learns_truncation_below_page_size() {
    let dir = tempfile::tempdir().unwrap();
    let symbols = universe("abcd");
    let config = test_config(dir.path(), "http://unused.test/", "abcd", 10);

    // the endpoint never returns more than 7 items although pages hold 10
    let endpoint = Arc::new(SyntheticEndpoint::new(symbols.clone(), 7));
    let mut driver = driver(&config, endpoint, None);
    driver.run().await.unwrap();

    assert_eq!(keys(&driver), symbols.iter().cloned().collect());

    let classifier = driver.classifier();
    assert_eq!(classifier.verdict(7), Some(CountVerdict::Truncated));
    assert_eq!(classifier.verdict(9), Some(CountVerdict::Truncated));
    assert_eq!(classifier.verdict(1), Some(CountVerdict::Complete));
}

#[tokio::test]
async fn test_record_type_filter_still_explores_everything() {
    let dir = tempfile::tempdir().unwrap();
    let symbols = universe("abc");
    let config = test_config(dir.path(), "http://unused.test/", "abc", 5);

    let endpoint = Arc::new(SyntheticEndpoint::new(symbols.clone(), 5));
    let mut driver = driver(&config, endpoint, Some("S"));
    driver.run().await.unwrap();

    let expected: BTreeSet<String> = symbols
        .iter()
        .filter(|s| record_type(s) == "S")
        .cloned()
        .collect();
    assert_eq!(keys(&driver), expected);
    assert!(driver.records().all(|r| r.field("type") == Some("S")));
    assert!(driver.tree().is_complete());
}

#[tokio::test]
async fn test_presplit_term_is_never_fetched() {
    let dir = tempfile::tempdir().unwrap();
    let symbols = universe("abc");
    let mut config = test_config(dir.path(), "http://unused.test/", "abc", 5);
    config.crawler.presplit_terms = vec!["b".to_string()];

    let endpoint = Arc::new(SyntheticEndpoint::new(symbols.clone(), 5));
    let mut driver = driver(&config, endpoint.clone(), None);
    driver.run().await.unwrap();

    assert!(!endpoint.requests().iter().any(|term| term == "b"));
    let expected: BTreeSet<String> = symbols.iter().filter(|s| *s != "b").cloned().collect();
    assert_eq!(keys(&driver), expected);
}

#[tokio::test]
async fn test_interrupted_crawl_resumes_from_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let symbols = universe("abcd");
    let config = test_config(dir.path(), "http://unused.test/", "abcd", 6);
    let db_path = Path::new(&config.output.database_path);

    let failing = Arc::new(SyntheticEndpoint::new(symbols.clone(), 6).failing_on("b"));
    let mut first = Coordinator::with_transport(
        config.clone(),
        Some("hash-1".to_string()),
        StartMode::Resume,
        SqliteStorage::new(db_path).unwrap(),
        failing.clone() as Arc<dyn Transport>,
    )
    .unwrap();

    let result = first.run().await;
    assert!(matches!(result, Err(SieveError::Fetch { ref term, .. }) if term == "b"));
    assert_eq!(failing.requests(), vec!["a", "b"]);
    drop(first);

    let stored = SqliteStorage::new(db_path).unwrap();
    let snapshot = stored.load_latest_snapshot().unwrap().unwrap();
    assert!(!snapshot.done);
    assert_eq!(snapshot.progress().completed_queries, 1);
    drop(stored);

    let healthy = Arc::new(SyntheticEndpoint::new(symbols.clone(), 6));
    let mut second = Coordinator::with_transport(
        config.clone(),
        Some("hash-1".to_string()),
        StartMode::Resume,
        SqliteStorage::new(db_path).unwrap(),
        healthy.clone() as Arc<dyn Transport>,
    )
    .unwrap();
    let progress = second.run().await.unwrap();

    assert!(progress.done);
    assert_eq!(progress.unique_records, symbols.len());
    assert!(!healthy.requests().iter().any(|term| term == "a"));
    assert_eq!(healthy.requests()[0], "b");
    assert_eq!(exported_keys(&config.output.export_path), symbols);
}
