//! Crawl summary data shared by the report formats

use crate::crawler::{CrawlSnapshot, Progress, QueueOrder};
use crate::state::CountVerdict;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to format output: {0}")]
    Format(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// One row of the result-count verdict table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerdictRow {
    pub count: usize,
    pub verdict: CountVerdict,
    /// Completeness evidence gathered while the count was unknown
    pub streak: u32,
}

/// Everything the reports show about a crawl
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub saved_at: DateTime<Utc>,
    pub config_hash: Option<String>,
    pub rounds: u64,
    pub progress: Progress,
    pub queue_order: QueueOrder,

    /// Nodes in the query tree, master node excluded
    pub tree_nodes: usize,

    /// Length of the longest search term issued
    pub max_term_length: usize,

    pub verdicts: Vec<VerdictRow>,

    /// Record counts keyed by their `type` field
    pub records_by_type: BTreeMap<String, usize>,

    /// Snapshots kept in the database
    pub snapshots_stored: usize,
}

impl CrawlSummary {
    /// Builds a summary from a snapshot
    pub fn from_snapshot(snapshot: &CrawlSnapshot, snapshots_stored: usize) -> Self {
        let classifier = &snapshot.classifier;
        let verdicts = classifier
            .verdicts()
            .iter()
            .enumerate()
            .map(|(count, &verdict)| VerdictRow {
                count,
                verdict,
                streak: classifier.streak(count),
            })
            .collect();

        let mut records_by_type = BTreeMap::new();
        for record in snapshot.records.values() {
            let kind = record.field("type").unwrap_or("unknown").to_string();
            *records_by_type.entry(kind).or_insert(0) += 1;
        }

        let max_term_length = snapshot
            .tree
            .depth_first()
            .map(|(_, node)| node.search_term().chars().count())
            .max()
            .unwrap_or(0);

        Self {
            saved_at: snapshot.saved_at,
            config_hash: snapshot.config_hash.clone(),
            rounds: snapshot.rounds,
            progress: snapshot.progress(),
            queue_order: snapshot.order,
            tree_nodes: snapshot.tree.len().saturating_sub(1),
            max_term_length,
            verdicts,
            records_by_type,
            snapshots_stored,
        }
    }

    /// Number of counts with the given verdict
    pub fn verdict_total(&self, verdict: CountVerdict) -> usize {
        self.verdicts.iter().filter(|row| row.verdict == verdict).count()
    }
}
