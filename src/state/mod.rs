//! State module for tracking crawl progress
//!
//! This module holds the two pieces of state the crawl learns as it runs.
//!
//! # Components
//!
//! - `QueryTree`: arena of search-term nodes, their results and completion
//! - `ResultCountClassifier`: per-count verdicts on whether a result page was truncated

mod classifier;
mod query_tree;

// Re-export main types
pub use classifier::{CountVerdict, ResultCountClassifier, SurveyReport};
pub use query_tree::{DepthFirst, NodeId, QueryNode, QueryTree};
