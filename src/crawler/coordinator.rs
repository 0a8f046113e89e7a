//! Crawler coordinator - persistence-aware crawl orchestration
//!
//! Wraps a [`CrawlDriver`] with everything around the crawl itself:
//! - Opening storage and resuming from the latest snapshot
//! - Saving snapshots between rounds
//! - Writing the record export and the markdown summary at the end

use crate::config::Config;
use crate::crawler::decoder::SearchAssistDecoder;
use crate::crawler::driver::CrawlDriver;
use crate::crawler::fetcher::{HttpTransport, RetryPolicy, Transport};
use crate::crawler::progress::Progress;
use crate::output::{export_records, generate_markdown_summary, CrawlSummary};
use crate::storage::{SnapshotStore, SqliteStorage};
use crate::SieveError;
use std::path::Path;
use std::sync::Arc;

/// How to treat existing state in the database
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    /// Continue from the latest snapshot when there is one
    Resume,

    /// Discard stored snapshots and start over
    Fresh,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Config,
    config_hash: Option<String>,
    storage: SqliteStorage,
    driver: CrawlDriver,
}

impl Coordinator {
    /// Creates a coordinator talking to the configured HTTP endpoint
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `config_hash` - Hash of the configuration file, stored with snapshots
    /// * `mode` - Whether to resume from or discard stored snapshots
    pub fn new(
        config: Config,
        config_hash: Option<String>,
        mode: StartMode,
    ) -> Result<Self, SieveError> {
        let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
        let transport = Arc::new(HttpTransport::new(&config.endpoint)?);
        Self::with_transport(config, config_hash, mode, storage, transport)
    }

    /// Creates a coordinator over an explicit storage and transport
    pub fn with_transport(
        config: Config,
        config_hash: Option<String>,
        mode: StartMode,
        mut storage: SqliteStorage,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, SieveError> {
        let decoder = Arc::new(SearchAssistDecoder::new(config.endpoint.record_type.clone()));
        let policy = RetryPolicy::from(&config.retry);

        let latest = match mode {
            StartMode::Fresh => {
                storage.clear()?;
                tracing::info!("Cleared stored snapshots, starting fresh");
                None
            }
            StartMode::Resume => storage.load_latest_snapshot()?,
        };

        let driver = match latest {
            Some(snapshot) => {
                if let (Some(stored), Some(current)) = (&snapshot.config_hash, &config_hash) {
                    if stored != current {
                        tracing::warn!(
                            "Configuration changed since the snapshot from {} was saved",
                            snapshot.saved_at.to_rfc3339()
                        );
                    }
                }
                tracing::info!("Resuming crawl: {}", snapshot.progress());
                CrawlDriver::restore(
                    config.crawler.clone(),
                    policy,
                    transport,
                    decoder,
                    snapshot,
                )?
            }
            None => {
                tracing::info!("No snapshot found, starting new crawl");
                CrawlDriver::new(config.crawler.clone(), policy, transport, decoder)?
            }
        };

        Ok(Self {
            config,
            config_hash,
            storage,
            driver,
        })
    }

    pub fn driver(&self) -> &CrawlDriver {
        &self.driver
    }

    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }

    /// Runs the crawl to completion and writes the outputs
    ///
    /// A snapshot is saved every `snapshot-every` rounds and once the crawl
    /// is done. A fatal error leaves the last snapshot in place for a later
    /// resume.
    pub async fn run(&mut self) -> Result<Progress, SieveError> {
        tracing::info!("Starting crawl: {}", self.driver.progress());

        let snapshot_every = self.config.output.snapshot_every.max(1);
        let mut rounds_since_snapshot = 0;

        while !self.driver.is_done() {
            let round = self.driver.advance().await?;
            rounds_since_snapshot += 1;

            if rounds_since_snapshot >= snapshot_every || self.driver.is_done() {
                self.save_snapshot()?;
                rounds_since_snapshot = 0;
            }

            // staging rounds are single queries; report those every 10 rounds
            if round.dispatched > 1 || self.driver.rounds() % 10 == 0 {
                tracing::info!("{}", self.driver.progress());
            }
        }

        self.write_outputs()?;

        let progress = self.driver.progress();
        tracing::info!("{}", progress);
        Ok(progress)
    }

    /// Saves the current crawl state and prunes old snapshots
    pub fn save_snapshot(&mut self) -> Result<i64, SieveError> {
        let mut snapshot = self.driver.snapshot();
        snapshot.config_hash = self.config_hash.clone();

        let id = self.storage.save_snapshot(&snapshot)?;
        let pruned = self.storage.prune_snapshots(self.config.output.keep_snapshots)?;
        if pruned > 0 {
            tracing::debug!("Pruned {} old snapshots", pruned);
        }

        Ok(id)
    }

    /// Writes the JSON export and, when configured, the markdown summary
    fn write_outputs(&self) -> Result<(), SieveError> {
        let export_path = Path::new(&self.config.output.export_path);
        export_records(self.driver.records(), export_path)?;

        if let Some(summary_path) = &self.config.output.summary_path {
            let mut snapshot = self.driver.snapshot();
            snapshot.config_hash = self.config_hash.clone();
            let stored = self.storage.snapshot_history()?.len();

            let summary = CrawlSummary::from_snapshot(&snapshot, stored);
            generate_markdown_summary(&summary, Path::new(summary_path))?;
            tracing::info!("Wrote crawl summary to {}", summary_path);
        }

        Ok(())
    }
}

/// Runs a complete crawl against the configured endpoint
///
/// # Example
///
/// ```no_run
/// use sumi_sieve::config::load_config_with_hash;
/// use sumi_sieve::crawler::{run_crawl, StartMode};
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("sieve.toml"))?;
/// let progress = run_crawl(config, Some(hash), StartMode::Resume).await?;
/// println!("{}", progress);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: Config,
    config_hash: Option<String>,
    mode: StartMode,
) -> Result<Progress, SieveError> {
    let mut coordinator = Coordinator::new(config, config_hash, mode)?;
    coordinator.run().await
}
