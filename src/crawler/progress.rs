//! Progress reporting
//!
//! Purely observational: nothing reported here feeds back into the crawl.

use crate::crawler::decoder::Record;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Receives every completed query together with the records it produced
pub trait ProgressSink: Send {
    fn query_completed(&mut self, search_term: &str, records: &[Record]);
}

/// Default sink logging each completed query
#[derive(Debug, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn query_completed(&mut self, search_term: &str, records: &[Record]) {
        tracing::debug!(
            "Query '{}' returned {} records",
            search_term,
            records.len()
        );
    }
}

/// Snapshot of crawl progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Queries fetched or presplit so far
    pub completed_queries: usize,

    /// Queries still waiting in the queue
    pub remaining_queries: usize,

    /// Distinct records collected so far
    pub unique_records: usize,

    /// Whether the crawl has finished
    pub done: bool,
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.done {
            write!(
                f,
                "Done! {} queries, {} unique records collected.",
                self.completed_queries, self.unique_records
            )
        } else {
            write!(
                f,
                "Query {}/{}. {} unique records collected so far.",
                self.completed_queries,
                self.completed_queries + self.remaining_queries,
                self.unique_records
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_display_running() {
        let progress = Progress {
            completed_queries: 12,
            remaining_queries: 28,
            unique_records: 85,
            done: false,
        };
        assert_eq!(
            progress.to_string(),
            "Query 12/40. 85 unique records collected so far."
        );
    }

    #[test]
    fn test_progress_display_done() {
        let progress = Progress {
            completed_queries: 40,
            remaining_queries: 0,
            unique_records: 120,
            done: true,
        };
        assert!(progress.to_string().starts_with("Done!"));
    }
}
