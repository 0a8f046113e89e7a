//! Exported crawl state
//!
//! A snapshot holds everything needed to resume an equivalent crawl. How
//! it is stored is up to the storage layer; this module only fixes its shape.

use crate::crawler::decoder::Record;
use crate::crawler::progress::Progress;
use crate::crawler::work_queue::QueueOrder;
use crate::state::{NodeId, QueryTree, ResultCountClassifier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Complete state of a crawl between two rounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSnapshot {
    /// When the snapshot was taken
    pub saved_at: DateTime<Utc>,

    /// Hash of the configuration the crawl was running with
    #[serde(default)]
    pub config_hash: Option<String>,

    /// Deduplicated records keyed by identifier
    pub records: BTreeMap<String, Record>,

    /// The full query tree
    pub tree: QueryTree,

    /// Queued nodes in queue storage order
    pub pending: Vec<NodeId>,

    /// Queue orientation (staging or bulk phase)
    pub order: QueueOrder,

    /// Nodes dispatched in the round that was running
    #[serde(default)]
    pub in_flight: Vec<NodeId>,

    /// Learned result-count verdicts
    pub classifier: ResultCountClassifier,

    /// Queries completed so far, in completion order
    pub completed: Vec<NodeId>,

    /// Whether the crawl had finished
    pub done: bool,

    /// Rounds run so far
    #[serde(default)]
    pub rounds: u64,
}

impl CrawlSnapshot {
    /// Progress at the time of the snapshot
    pub fn progress(&self) -> Progress {
        Progress {
            completed_queries: self.completed.len(),
            remaining_queries: self.pending.len() + self.in_flight.len(),
            unique_records: self.records.len(),
            done: self.done,
        }
    }
}
