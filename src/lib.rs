//! Sumi-Sieve: an identifier enumerator for truncating search endpoints
//!
//! This crate discovers every identifier behind a search endpoint that only
//! accepts a search term, has no pagination, and silently truncates its result
//! pages. It narrows search terms one character at a time until every leaf
//! query is known to have returned a complete result set, learning from the
//! crawl itself which result counts indicate truncation.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Sumi-Sieve operations
#[derive(Debug, Error)]
pub enum SieveError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch for '{term}' failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        term: String,
        attempts: u32,
        source: crawler::TransportError,
    },

    #[error("Fetch for '{term}' failed: {source}")]
    Fetch {
        term: String,
        source: crawler::TransportError,
    },

    #[error("Failed to decode response for '{term}': {source}")]
    Decode {
        term: String,
        source: crawler::DecodeError,
    },

    #[error("Protocol violation for '{term}': reported count {count} exceeds maximum {max}")]
    ProtocolViolation {
        term: String,
        count: usize,
        max: usize,
    },

    #[error("Internal invariant violated: {0}")]
    Invariant(String),

    #[error("Fetch worker failed: {0}")]
    Worker(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] storage::StorageError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SieveError {
    /// Convenience constructor for invariant violations
    pub(crate) fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant(message.into())
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid endpoint URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Sumi-Sieve operations
pub type Result<T> = std::result::Result<T, SieveError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{run_crawl, CrawlDriver, Coordinator, Progress, Record, StartMode};
pub use state::{CountVerdict, QueryTree, ResultCountClassifier};
