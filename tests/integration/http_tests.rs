//! Crawls over HTTP against wiremock servers

use crate::common::{
    exported_keys, search_assist_page, search_term, test_config, universe, PrefixResponder,
    TermLocation,
};
use std::collections::HashSet;
use std::sync::Mutex;
use sumi_sieve::crawler::{Coordinator, HttpTransport, StartMode, TransportError};
use sumi_sieve::SieveError;
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

#[tokio::test]
async fn test_full_crawl_with_query_parameter() {
    let mock_server = MockServer::start().await;
    let symbols = universe("abc");

    Mock::given(method("GET"))
        .and(path("/v1/finance/search"))
        .and(query_param("lang", "en-US"))
        .respond_with(PrefixResponder {
            universe: symbols.clone(),
            cap: 5,
            location: TermLocation::Query,
        })
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let url = format!("{}/v1/finance/search", mock_server.uri());
    let mut config = test_config(dir.path(), &url, "abc", 5);
    config
        .endpoint
        .query
        .insert("lang".to_string(), "en-US".to_string());

    let mut coordinator =
        Coordinator::new(config.clone(), Some("hash".to_string()), StartMode::Fresh).unwrap();
    let progress = coordinator.run().await.unwrap();

    assert!(progress.done);
    assert_eq!(progress.unique_records, symbols.len());
    assert_eq!(exported_keys(&config.output.export_path), symbols);

    let summary = std::fs::read_to_string(config.output.summary_path.unwrap()).unwrap();
    assert!(summary.contains("# Sumi-Sieve Crawl Summary"));
}

#[tokio::test]
async fn test_full_crawl_with_path_parameter() {
    let mock_server = MockServer::start().await;
    let symbols = universe("ab");

    Mock::given(method("GET"))
        .and(path_regex(r"^/lookup;q="))
        .respond_with(PrefixResponder {
            universe: symbols.clone(),
            cap: 4,
            location: TermLocation::Path,
        })
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let url = format!("{}/lookup", mock_server.uri());
    let mut config = test_config(dir.path(), &url, "ab", 4);
    config.endpoint.term_in_path = true;

    let mut coordinator = Coordinator::new(config.clone(), None, StartMode::Fresh).unwrap();
    let progress = coordinator.run().await.unwrap();

    assert_eq!(progress.unique_records, symbols.len());
    assert_eq!(exported_keys(&config.output.export_path), symbols);
}

/// Fails the first request for every search term with a 503
struct FlakyResponder {
    inner: PrefixResponder,
    seen: Mutex<HashSet<String>>,
}

impl Respond for FlakyResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let term = search_term(request, TermLocation::Query);
        if self.seen.lock().unwrap().insert(term) {
            return ResponseTemplate::new(503);
        }
        self.inner.respond(request)
    }
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let mock_server = MockServer::start().await;
    let symbols = universe("ab");

    Mock::given(method("GET"))
        .respond_with(FlakyResponder {
            inner: PrefixResponder {
                universe: symbols.clone(),
                cap: 4,
                location: TermLocation::Query,
            },
            seen: Mutex::new(HashSet::new()),
        })
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), &mock_server.uri(), "ab", 4);

    let mut coordinator = Coordinator::new(config, None, StartMode::Fresh).unwrap();
    let progress = coordinator.run().await.unwrap();

    assert_eq!(progress.unique_records, symbols.len());
    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2 * progress.completed_queries);
}

#[tokio::test]
async fn test_exhausted_retries_abort_crawl() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), &mock_server.uri(), "ab", 4);

    let mut coordinator = Coordinator::new(config.clone(), None, StartMode::Fresh).unwrap();
    let result = coordinator.run().await;

    match result {
        Err(SieveError::RetriesExhausted {
            attempts, source, ..
        }) => {
            assert_eq!(attempts, config.retry.max_attempts + 1);
            assert!(matches!(source, TransportError::Status(500)));
        }
        other => panic!("expected exhausted retries, got {:?}", other),
    }
    assert!(!coordinator.driver().is_done());
}

#[tokio::test]
async fn test_unparsable_body_is_fatal_without_retry() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), &mock_server.uri(), "ab", 4);

    let mut coordinator = Coordinator::new(config, None, StartMode::Fresh).unwrap();
    let result = coordinator.run().await;

    assert!(matches!(
        result,
        Err(SieveError::Fetch {
            source: TransportError::Body(_),
            ..
        })
    ));
}

#[tokio::test]
async fn test_request_url_shapes() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path(), "https://query.example.com/v1/search", "ab", 4);

    let transport = HttpTransport::new(&config.endpoint).unwrap();
    assert_eq!(
        transport.request_url("ab").as_str(),
        "http://query.example.com/v1/search?q=ab"
    );

    config.endpoint.term_in_path = true;
    config.endpoint.insecure = false;
    let transport = HttpTransport::new(&config.endpoint).unwrap();
    assert_eq!(
        transport.request_url("a b").as_str(),
        "https://query.example.com/v1/search;q=a+b"
    );

    let page = search_assist_page(&[]);
    assert_eq!(page["data"]["items"].as_array().unwrap().len(), 0);
}
