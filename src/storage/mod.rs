//! Storage module for persisting crawl state
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Snapshot persistence for resumption
//! - The queryable mirror of collected records

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{SnapshotStore, StorageError, StorageResult};

use crate::SieveError;
use chrono::{DateTime, Utc};
use std::path::Path;

/// Initializes or opens a storage database
pub fn open_storage(path: &Path) -> Result<SqliteStorage, SieveError> {
    SqliteStorage::new(path)
}

/// Summary row of a stored snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRecord {
    pub id: i64,
    pub saved_at: DateTime<Utc>,
    pub config_hash: Option<String>,
    pub rounds: u64,
    pub done: bool,
    pub completed_queries: usize,
    pub remaining_queries: usize,
    pub unique_records: usize,
}
