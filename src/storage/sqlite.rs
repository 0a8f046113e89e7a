//! SQLite storage implementation

use crate::crawler::{CrawlSnapshot, Record};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{SnapshotStore, StorageError, StorageResult};
use crate::storage::SnapshotRecord;
use crate::SieveError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates the database at `path`
    pub fn new(path: &Path) -> Result<Self, SieveError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, SieveError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn decode_snapshot(state: &str) -> StorageResult<CrawlSnapshot> {
        Ok(serde_json::from_str(state)?)
    }
}

fn parse_timestamp(raw: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StorageError::Database(format!("bad timestamp '{}': {}", raw, e)))
}

impl SnapshotStore for SqliteStorage {
    fn save_snapshot(&mut self, snapshot: &CrawlSnapshot) -> StorageResult<i64> {
        let state = serde_json::to_string(snapshot)?;
        let progress = snapshot.progress();

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO snapshots (saved_at, config_hash, rounds, done, completed_queries,
                                    remaining_queries, unique_records, state)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                snapshot.saved_at.to_rfc3339(),
                snapshot.config_hash,
                snapshot.rounds as i64,
                snapshot.done,
                progress.completed_queries as i64,
                progress.remaining_queries as i64,
                progress.unique_records as i64,
                state,
            ],
        )?;
        let id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO records (key, fields, snapshot_id) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET fields = excluded.fields,
                                                snapshot_id = excluded.snapshot_id",
            )?;
            for record in snapshot.records.values() {
                let fields = serde_json::to_string(&record.fields)?;
                stmt.execute(params![record.key, fields, id])?;
            }
        }

        tx.commit()?;
        tracing::debug!("Saved snapshot {} ({})", id, progress);
        Ok(id)
    }

    fn load_snapshot(&self, id: i64) -> StorageResult<CrawlSnapshot> {
        let state: String = self
            .conn
            .query_row(
                "SELECT state FROM snapshots WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(StorageError::SnapshotNotFound(id))?;

        Self::decode_snapshot(&state)
    }

    fn load_latest_snapshot(&self) -> StorageResult<Option<CrawlSnapshot>> {
        let state: Option<String> = self
            .conn
            .query_row(
                "SELECT state FROM snapshots ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        state.as_deref().map(Self::decode_snapshot).transpose()
    }

    fn snapshot_history(&self) -> StorageResult<Vec<SnapshotRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, saved_at, config_hash, rounds, done, completed_queries,
                    remaining_queries, unique_records
             FROM snapshots ORDER BY id DESC",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, bool>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, i64>(7)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(
                |(id, saved_at, config_hash, rounds, done, completed, remaining, unique)| {
                    Ok(SnapshotRecord {
                        id,
                        saved_at: parse_timestamp(&saved_at)?,
                        config_hash,
                        rounds: rounds as u64,
                        done,
                        completed_queries: completed as usize,
                        remaining_queries: remaining as usize,
                        unique_records: unique as usize,
                    })
                },
            )
            .collect()
    }

    fn prune_snapshots(&mut self, keep: usize) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let cutoff: Option<i64> = tx
            .query_row(
                "SELECT id FROM snapshots ORDER BY id DESC LIMIT 1 OFFSET ?1",
                params![keep.saturating_sub(1) as i64],
                |row| row.get(0),
            )
            .optional()?;

        let Some(cutoff) = cutoff else {
            return Ok(0);
        };
        if keep == 0 {
            tx.execute("DELETE FROM records", [])?;
            let removed = tx.execute("DELETE FROM snapshots", [])?;
            tx.commit()?;
            return Ok(removed);
        }

        // records point at the snapshot that last wrote them
        tx.execute(
            "UPDATE records SET snapshot_id = ?1 WHERE snapshot_id < ?1",
            params![cutoff],
        )?;
        let removed = tx.execute("DELETE FROM snapshots WHERE id < ?1", params![cutoff])?;
        tx.commit()?;

        Ok(removed)
    }

    fn load_records(&self) -> StorageResult<Vec<Record>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, fields FROM records ORDER BY key")?;

        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(key, fields)| {
                let fields: BTreeMap<String, String> = serde_json::from_str(&fields)?;
                Ok(Record { key, fields })
            })
            .collect()
    }

    fn clear(&mut self) -> StorageResult<()> {
        self.conn
            .execute_batch("DELETE FROM records; DELETE FROM snapshots;")?;
        Ok(())
    }
}
