//! Search endpoint transport
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the HTTP client with user agent and timeouts
//! - Placing the search term in the request URL
//! - Classifying failures into retryable and fatal kinds
//! - Exponential back-off retries for transient failures

use crate::config::{EndpointConfig, RetryConfig};
use crate::{ConfigError, SieveError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use url::{form_urlencoded, Url};

/// Failure of a single request to the search endpoint
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("response transfer failed: {0}")]
    ChunkedTransfer(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("response body is not valid JSON: {0}")]
    Body(String),
}

impl TransportError {
    /// Returns true if the request may succeed when repeated
    ///
    /// Every network-level failure is retried, including unexpected HTTP
    /// statuses. A complete body that fails to parse is not.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Body(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_connect() {
            Self::Connection(error.to_string())
        } else if error.is_body() || error.is_decode() {
            Self::ChunkedTransfer(error.to_string())
        } else if let Some(status) = error.status() {
            Self::Status(status.as_u16())
        } else {
            Self::Connection(error.to_string())
        }
    }
}

/// Something that can run a search term against the endpoint
///
/// Implementations return the parsed JSON body; they must apply their own
/// per-request timeout.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, search_term: &str) -> Result<Value, TransportError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The endpoint configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &EndpointConfig) -> Result<Client, reqwest::Error> {
    let timeout = Duration::from_secs(config.timeout_secs);

    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(timeout)
        .connect_timeout(timeout)
        .https_only(!config.insecure)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Transport for the real search endpoint over HTTP
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    term_param: String,
    term_in_path: bool,
    query: Vec<(String, String)>,
}

impl HttpTransport {
    /// Creates a transport from the endpoint configuration
    ///
    /// The configured URL's scheme is replaced with `http` when `insecure`
    /// is set and `https` otherwise.
    pub fn new(config: &EndpointConfig) -> Result<Self, SieveError> {
        let mut base_url = Url::parse(&config.url)?;
        let scheme = if config.insecure { "http" } else { "https" };
        base_url.set_scheme(scheme).map_err(|_| {
            ConfigError::InvalidUrl(format!("cannot use scheme {} for {}", scheme, config.url))
        })?;

        Ok(Self {
            client: build_http_client(config)?,
            base_url,
            term_param: config.term_param.clone(),
            term_in_path: config.term_in_path,
            query: config
                .query
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        })
    }

    /// Builds the request URL for a search term
    pub fn request_url(&self, search_term: &str) -> Url {
        let mut url = self.base_url.clone();

        if self.term_in_path {
            let encoded: String = form_urlencoded::byte_serialize(search_term.as_bytes()).collect();
            let path = format!("{};{}={}", url.path(), self.term_param, encoded);
            url.set_path(&path);
        }

        if !self.query.is_empty() || !self.term_in_path {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query {
                pairs.append_pair(key, value);
            }
            if !self.term_in_path {
                pairs.append_pair(&self.term_param, search_term);
            }
        }

        url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, search_term: &str) -> Result<Value, TransportError> {
        let url = self.request_url(search_term);
        tracing::debug!("req {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| TransportError::Body(e.to_string()))
    }
}

/// Exponential back-off schedule for transient failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries allowed after the first failed attempt
    pub max_attempts: u32,

    /// Retry `n` sleeps `backoff_base_secs ^ n` seconds first
    pub backoff_base_secs: u64,
}

impl RetryPolicy {
    /// Sleep before retry number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        Duration::from_secs(self.backoff_base_secs.saturating_pow(attempt))
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            backoff_base_secs: config.backoff_base_secs,
        }
    }
}

/// Fetches a search term, retrying transient failures with back-off
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | Timeout | Retry with back-off |
/// | Connection failure | Retry with back-off |
/// | Partial transfer | Retry with back-off |
/// | Unexpected HTTP status | Retry with back-off |
/// | Unparsable body | Fatal immediately |
/// | Retries exhausted | Fatal |
///
/// # Returns
///
/// * `Ok(Value)` - The parsed response body
/// * `Err(SieveError)` - A fatal failure; the crawl cannot continue without this query
pub async fn fetch_with_retry(
    transport: &dyn Transport,
    search_term: &str,
    policy: &RetryPolicy,
) -> Result<Value, SieveError> {
    let mut retries = 0;
    loop {
        match transport.fetch(search_term).await {
            Ok(body) => return Ok(body),
            Err(source) if !source.is_retryable() => {
                return Err(SieveError::Fetch {
                    term: search_term.to_string(),
                    source,
                });
            }
            Err(source) if retries >= policy.max_attempts => {
                return Err(SieveError::RetriesExhausted {
                    term: search_term.to_string(),
                    attempts: retries + 1,
                    source,
                });
            }
            Err(source) => {
                retries += 1;
                let delay = policy.delay_for(retries);
                tracing::warn!(
                    "Fetch for '{}' failed ({}). Retry attempt: {} of {}. Sleep period: {} seconds.",
                    search_term,
                    source,
                    retries,
                    policy.max_attempts,
                    delay.as_secs()
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
