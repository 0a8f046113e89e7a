//! Storage traits and error types

use crate::crawler::{CrawlSnapshot, Record};
use crate::storage::SnapshotRecord;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence for crawl snapshots
///
/// A snapshot is only ever written between rounds, so loading the latest
/// one yields a state the crawl can resume from.
pub trait SnapshotStore {
    /// Persists a snapshot and mirrors its records
    ///
    /// Returns the ID of the stored snapshot.
    fn save_snapshot(&mut self, snapshot: &CrawlSnapshot) -> StorageResult<i64>;

    /// Loads a snapshot by ID
    fn load_snapshot(&self, id: i64) -> StorageResult<CrawlSnapshot>;

    /// Loads the most recent snapshot, if any
    fn load_latest_snapshot(&self) -> StorageResult<Option<CrawlSnapshot>>;

    /// Summaries of all stored snapshots, newest first
    fn snapshot_history(&self) -> StorageResult<Vec<SnapshotRecord>>;

    /// Deletes all but the newest `keep` snapshots
    ///
    /// Returns the number of snapshots removed.
    fn prune_snapshots(&mut self, keep: usize) -> StorageResult<usize>;

    /// All mirrored records, ordered by key
    fn load_records(&self) -> StorageResult<Vec<Record>>;

    /// Removes every snapshot and record
    fn clear(&mut self) -> StorageResult<()>;
}
