use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Main configuration structure for Sumi-Sieve
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    pub endpoint: EndpointConfig,
    pub output: OutputConfig,
}

/// Search-space exploration configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Number of concurrent fetch workers
    #[serde(default = "default_workers")]
    pub workers: u32,

    /// Maximum number of items the endpoint ever returns for one query
    pub max_results: usize,

    /// Queue length at which processing switches from FIFO to LIFO
    #[serde(default = "default_staging_threshold")]
    pub staging_threshold: usize,

    /// Queries dispatched per round while still in the FIFO phase
    #[serde(default = "default_staging_batch_size")]
    pub staging_batch_size: usize,

    /// Queries dispatched per round once in the LIFO phase
    #[serde(default = "default_bulk_batch_size")]
    pub bulk_batch_size: usize,

    /// Matching subtree observations needed before a count is trusted as complete
    #[serde(default = "default_confirmation_threshold")]
    pub confirmation_threshold: u32,

    /// Characters used for the first level of queries under the root
    pub first_level_alphabet: String,

    /// Characters appended to a term when its result set needs narrowing
    pub narrowing_alphabet: String,

    /// First-level terms that are expanded immediately instead of fetched
    #[serde(default)]
    pub presplit_terms: Vec<String>,

    /// Static rule: counts up to and including this value are complete
    #[serde(default)]
    pub complete_through: Option<usize>,

    /// Static rule: counts from this value upward are truncated
    #[serde(default)]
    pub truncated_from: Option<usize>,
}

/// Retry behavior for transient fetch failures
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryConfig {
    /// Retries allowed after the first failed attempt
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Sleep `backoff_base_secs ^ attempt` seconds before retry `attempt`
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_secs: default_backoff_base_secs(),
        }
    }
}

/// The search endpoint being enumerated
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct EndpointConfig {
    /// Endpoint URL; the scheme is replaced according to `insecure`
    pub url: String,

    /// Name of the parameter carrying the search term
    #[serde(default = "default_term_param")]
    pub term_param: String,

    /// Send the term as a `;name=value` path parameter instead of a query parameter
    #[serde(default)]
    pub term_in_path: bool,

    /// Use plain http instead of https
    #[serde(default)]
    pub insecure: bool,

    /// Connect and read timeout for each request (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Keep only items of this type (all items when unset)
    #[serde(default)]
    pub record_type: Option<String>,

    /// Fixed query parameters sent with every request
    #[serde(default)]
    pub query: BTreeMap<String, String>,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite database holding crawl snapshots
    pub database_path: String,

    /// Path of the JSON record export
    pub export_path: String,

    /// Path of the markdown crawl summary
    #[serde(default)]
    pub summary_path: Option<String>,

    /// Rounds between snapshots
    #[serde(default = "default_snapshot_every")]
    pub snapshot_every: u32,

    /// Snapshots kept in the database; older ones are pruned
    #[serde(default = "default_keep_snapshots")]
    pub keep_snapshots: usize,
}

fn default_workers() -> u32 {
    100
}

fn default_staging_threshold() -> usize {
    2000
}

fn default_staging_batch_size() -> usize {
    1
}

fn default_bulk_batch_size() -> usize {
    2000
}

fn default_confirmation_threshold() -> u32 {
    20
}

fn default_max_attempts() -> u32 {
    10
}

fn default_backoff_base_secs() -> u64 {
    5
}

fn default_term_param() -> String {
    "searchTerm".to_string()
}

fn default_timeout_secs() -> u64 {
    12
}

fn default_user_agent() -> String {
    format!("sumi-sieve/{}", env!("CARGO_PKG_VERSION"))
}

fn default_snapshot_every() -> u32 {
    1
}

fn default_keep_snapshots() -> usize {
    3
}
