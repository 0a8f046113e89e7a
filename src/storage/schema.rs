//! Database schema definitions
//!
//! Snapshots are stored whole as JSON next to a few summary columns, and the
//! collected records are mirrored into their own table so they can be
//! queried without decoding a snapshot.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Crawl state snapshots, newest has the highest id
CREATE TABLE IF NOT EXISTS snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    saved_at TEXT NOT NULL,
    config_hash TEXT,
    rounds INTEGER NOT NULL,
    done INTEGER NOT NULL DEFAULT 0,
    completed_queries INTEGER NOT NULL,
    remaining_queries INTEGER NOT NULL,
    unique_records INTEGER NOT NULL,
    state TEXT NOT NULL
);

-- Collected records, keyed by identifier
CREATE TABLE IF NOT EXISTS records (
    key TEXT PRIMARY KEY,
    fields TEXT NOT NULL,
    snapshot_id INTEGER NOT NULL REFERENCES snapshots(id)
);

CREATE INDEX IF NOT EXISTS idx_records_snapshot ON records(snapshot_id);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
