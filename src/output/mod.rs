//! Output module for exporting records and reporting on crawls
//!
//! This module handles:
//! - Exporting the collected records as JSON
//! - Generating markdown summaries of crawl state
//! - Printing statistics for the `--stats` mode

mod export;
mod markdown;
pub mod stats;
mod summary;

pub use export::{export_records, format_records_json};
pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use stats::print_statistics;
pub use summary::{CrawlSummary, OutputError, OutputResult, VerdictRow};

use crate::storage::SnapshotStore;
use crate::SieveError;

/// Builds a summary of the latest snapshot in storage
///
/// Returns `None` when the database holds no snapshot yet.
pub fn generate_summary(storage: &dyn SnapshotStore) -> Result<Option<CrawlSummary>, SieveError> {
    let Some(snapshot) = storage.load_latest_snapshot()? else {
        return Ok(None);
    };
    let stored = storage.snapshot_history()?.len();

    Ok(Some(CrawlSummary::from_snapshot(&snapshot, stored)))
}
