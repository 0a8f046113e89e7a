//! Shared fixtures: a synthetic identifier universe and endpoints over it

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use sumi_sieve::config::{Config, CrawlerConfig, EndpointConfig, OutputConfig, RetryConfig};
use sumi_sieve::crawler::{Transport, TransportError};
use wiremock::{Request, Respond, ResponseTemplate};

/// Every string over `alphabet` of length 1..=3, with every third one dropped
pub fn universe(alphabet: &str) -> Vec<String> {
    let chars: Vec<char> = alphabet.chars().collect();
    let mut all = Vec::new();
    for a in &chars {
        all.push(a.to_string());
        for b in &chars {
            all.push(format!("{}{}", a, b));
            for c in &chars {
                all.push(format!("{}{}{}", a, b, c));
            }
        }
    }

    let mut kept: Vec<String> = all
        .into_iter()
        .enumerate()
        .filter(|(i, _)| i % 3 != 1)
        .map(|(_, s)| s)
        .collect();
    kept.sort();
    kept
}

/// Three-letter identifiers are indices, the rest are equities
pub fn record_type(symbol: &str) -> &'static str {
    if symbol.len() == 3 {
        "I"
    } else {
        "S"
    }
}

/// Renders symbols as a search-assist response
pub fn search_assist_page(symbols: &[&String]) -> Value {
    let items: Vec<Value> = symbols
        .iter()
        .map(|s| {
            json!({
                "symbol": s,
                "name": format!("{} Holdings", s.to_uppercase()),
                "exch": "NMS",
                "type": record_type(s),
                "exchDisp": "NASDAQ",
                "typeDisp": if record_type(s) == "I" { "Index" } else { "Equity" },
            })
        })
        .collect();
    json!({ "data": { "items": items } })
}

/// Symbols starting with `term`, cut at `cap` when more exist
pub fn prefix_matches<'a>(universe: &'a [String], term: &str, cap: usize) -> Vec<&'a String> {
    universe
        .iter()
        .filter(|s| s.starts_with(term))
        .take(cap)
        .collect()
}

/// In-process endpoint over a universe
///
/// Returns every match when there are at most `cap`, otherwise the first
/// `cap`. Terms listed in `fail_on` get an unparsable body.
pub struct SyntheticEndpoint {
    universe: Vec<String>,
    cap: usize,
    fail_on: HashSet<String>,
    requests: Mutex<Vec<String>>,
}

impl SyntheticEndpoint {
    pub fn new(universe: Vec<String>, cap: usize) -> Self {
        Self {
            universe,
            cap,
            fail_on: HashSet::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(mut self, term: &str) -> Self {
        self.fail_on.insert(term.to_string());
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for SyntheticEndpoint {
    async fn fetch(&self, search_term: &str) -> Result<Value, TransportError> {
        self.requests.lock().unwrap().push(search_term.to_string());
        if self.fail_on.contains(search_term) {
            return Err(TransportError::Body("expected value at line 1".to_string()));
        }
        Ok(search_assist_page(&prefix_matches(
            &self.universe,
            search_term,
            self.cap,
        )))
    }
}

/// Where the search term sits in the request
#[derive(Clone, Copy)]
pub enum TermLocation {
    Query,
    Path,
}

/// wiremock responder serving a universe the way [`SyntheticEndpoint`] does
pub struct PrefixResponder {
    pub universe: Vec<String>,
    pub cap: usize,
    pub location: TermLocation,
}

pub fn search_term(request: &Request, location: TermLocation) -> String {
    match location {
        TermLocation::Query => request
            .url
            .query_pairs()
            .find(|(key, _)| key == "q")
            .map(|(_, value)| value.into_owned())
            .unwrap_or_default(),
        TermLocation::Path => request
            .url
            .path()
            .rsplit_once('=')
            .map(|(_, term)| term.to_string())
            .unwrap_or_default(),
    }
}

impl Respond for PrefixResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let term = search_term(request, self.location);
        let body = search_assist_page(&prefix_matches(&self.universe, &term, self.cap));
        ResponseTemplate::new(200).set_body_json(body)
    }
}

/// Crawl configuration over the lowercase alphabet `alphabet`
pub fn test_config(dir: &Path, url: &str, alphabet: &str, max_results: usize) -> Config {
    Config {
        crawler: CrawlerConfig {
            workers: 4,
            max_results,
            staging_threshold: 8,
            staging_batch_size: 1,
            bulk_batch_size: 16,
            confirmation_threshold: 2,
            first_level_alphabet: alphabet.to_string(),
            narrowing_alphabet: alphabet.to_string(),
            presplit_terms: vec![],
            complete_through: None,
            truncated_from: None,
        },
        retry: RetryConfig {
            max_attempts: 2,
            backoff_base_secs: 0,
        },
        endpoint: EndpointConfig {
            url: url.to_string(),
            term_param: "q".to_string(),
            term_in_path: false,
            insecure: true,
            timeout_secs: 5,
            user_agent: "sumi-sieve-tests".to_string(),
            record_type: None,
            query: BTreeMap::new(),
        },
        output: OutputConfig {
            database_path: dir.join("sieve.db").display().to_string(),
            export_path: dir.join("records.json").display().to_string(),
            summary_path: Some(dir.join("summary.md").display().to_string()),
            snapshot_every: 1,
            keep_snapshots: 3,
        },
    }
}

/// Keys of an exported record file, in file order
pub fn exported_keys(path: &str) -> Vec<String> {
    let content = std::fs::read_to_string(path).unwrap();
    let records: Vec<sumi_sieve::Record> = serde_json::from_str(&content).unwrap();
    records.into_iter().map(|r| r.key).collect()
}
