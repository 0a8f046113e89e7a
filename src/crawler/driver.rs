//! Crawl driver - round-based exploration of the search space
//!
//! The driver owns all crawl state: the query tree, the work queue, the
//! result-count classifier and the deduplicated record store. Each call to
//! [`CrawlDriver::advance`] runs one round:
//! 1. Take a batch from the work queue (one query while staging, a large
//!    batch once in bulk order)
//! 2. Fetch the batch through the pipeline and process every response
//! 3. Wait until every dispatched query has been fetched and processed
//! 4. Survey the tree to learn new result-count verdicts
//!
//! The crawl is done once the queue is empty after a round.

use crate::config::CrawlerConfig;
use crate::crawler::decoder::{Record, RecordDecoder};
use crate::crawler::fetcher::{RetryPolicy, Transport};
use crate::crawler::pipeline::{FetchJob, FetchPipeline, FetchedResponse};
use crate::crawler::progress::{Progress, ProgressSink, TracingProgress};
use crate::crawler::snapshot::CrawlSnapshot;
use crate::crawler::work_queue::{QueueOrder, WorkQueue};
use crate::state::{NodeId, QueryTree, ResultCountClassifier, SurveyReport};
use crate::SieveError;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Outcome of one round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundSummary {
    /// Queries dispatched in this round
    pub dispatched: usize,

    /// Queue order the round ran under
    pub order: QueueOrder,

    /// Verdicts learned by the survey after the round
    pub survey: SurveyReport,
}

/// Drives a crawl round by round
pub struct CrawlDriver {
    config: CrawlerConfig,
    tree: QueryTree,
    queue: WorkQueue,
    classifier: ResultCountClassifier,
    records: BTreeMap<String, Record>,
    completed: Vec<NodeId>,
    in_flight: Vec<NodeId>,
    done: bool,
    rounds: u64,
    pipeline: FetchPipeline,
    decoder: Arc<dyn RecordDecoder>,
    progress: Box<dyn ProgressSink>,
}

impl CrawlDriver {
    /// Starts a new crawl
    ///
    /// Creates the master node, expands it with the first-level alphabet and
    /// queues the first-level queries. Presplit terms are expanded with the
    /// narrowing alphabet right away and never fetched themselves.
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `policy` - Retry schedule for transient fetch failures
    /// * `transport` - Runs search terms against the endpoint
    /// * `decoder` - Turns endpoint responses into records
    pub fn new(
        config: CrawlerConfig,
        policy: RetryPolicy,
        transport: Arc<dyn Transport>,
        decoder: Arc<dyn RecordDecoder>,
    ) -> Result<Self, SieveError> {
        let classifier =
            ResultCountClassifier::new(config.max_results, config.confirmation_threshold)
                .with_static_rule(config.complete_through, config.truncated_from)?;
        let pipeline = FetchPipeline::new(transport, policy, config.workers as usize);

        let mut driver = Self {
            tree: QueryTree::new(),
            queue: WorkQueue::new(config.staging_threshold),
            classifier,
            records: BTreeMap::new(),
            completed: Vec::new(),
            in_flight: Vec::new(),
            done: false,
            rounds: 0,
            pipeline,
            decoder,
            progress: Box::new(TracingProgress),
            config,
        };
        driver.seed()?;

        Ok(driver)
    }

    /// Resumes a crawl from a snapshot
    ///
    /// Nodes that were in flight when the snapshot was taken and never got
    /// a response are queued again, at the front in FIFO order and at the
    /// back in LIFO order.
    pub fn restore(
        config: CrawlerConfig,
        policy: RetryPolicy,
        transport: Arc<dyn Transport>,
        decoder: Arc<dyn RecordDecoder>,
        snapshot: CrawlSnapshot,
    ) -> Result<Self, SieveError> {
        snapshot.tree.validate()?;
        snapshot.classifier.validate(config.max_results)?;

        let tree = snapshot.tree;
        for &node in snapshot.pending.iter().chain(&snapshot.completed) {
            tree.node(node)?;
        }

        let mut queue =
            WorkQueue::from_parts(snapshot.pending, snapshot.order, config.staging_threshold);
        let unresolved: Vec<NodeId> = snapshot
            .in_flight
            .iter()
            .copied()
            .filter(|&id| {
                tree.get(id).is_some_and(|node| {
                    node.reported_count().is_none() && !node.is_done() && !node.is_expanded()
                }) && !queue.contains(id)
            })
            .collect();
        if !unresolved.is_empty() {
            tracing::info!("Requeueing {} interrupted queries", unresolved.len());
            queue.requeue(&unresolved);
        }

        let done = snapshot.done && queue.is_empty() && tree.is_complete();
        let pipeline = FetchPipeline::new(transport, policy, config.workers as usize);

        Ok(Self {
            config,
            tree,
            queue,
            classifier: snapshot.classifier,
            records: snapshot.records,
            completed: snapshot.completed,
            in_flight: Vec::new(),
            done,
            rounds: snapshot.rounds,
            pipeline,
            decoder,
            progress: Box::new(TracingProgress),
        })
    }

    /// Replaces the progress sink
    pub fn with_progress(mut self, sink: Box<dyn ProgressSink>) -> Self {
        self.progress = sink;
        self
    }

    fn seed(&mut self) -> Result<(), SieveError> {
        let first_level = self
            .tree
            .add_children(QueryTree::ROOT, &self.config.first_level_alphabet)?;

        let (presplit, regular): (Vec<NodeId>, Vec<NodeId>) =
            first_level.into_iter().partition(|&id| {
                let term = self.tree.search_term(id);
                self.config.presplit_terms.iter().any(|t| t == term)
            });

        self.queue.push_children(&regular);
        for node in presplit {
            let children = self
                .tree
                .add_children(node, &self.config.narrowing_alphabet)?;
            tracing::debug!(
                "Presplit '{}' into {} queries",
                self.tree.search_term(node),
                children.len()
            );
            self.queue.push_children(&children);
            self.completed.push(node);
        }

        Ok(())
    }

    /// Runs one round
    ///
    /// Calling this on a finished crawl does nothing.
    pub async fn advance(&mut self) -> Result<RoundSummary, SieveError> {
        if self.done {
            return Ok(RoundSummary {
                dispatched: 0,
                order: self.queue.order(),
                survey: SurveyReport::default(),
            });
        }

        self.queue.apply_staging_policy();
        let order = self.queue.order();
        let limit = match order {
            QueueOrder::Fifo => self.config.staging_batch_size,
            QueueOrder::Lifo => self.config.bulk_batch_size,
        };

        let batch = self.queue.pop_batch(limit);
        self.in_flight = batch.clone();
        let jobs: Vec<FetchJob> = batch
            .iter()
            .map(|&node| FetchJob {
                node,
                search_term: self.tree.search_term(node).to_string(),
            })
            .collect();

        let mut round = self.pipeline.launch(jobs);
        let mut processed = 0;
        while let Some(outcome) = round.next().await {
            if let Err(e) = outcome.and_then(|fetched| self.process(fetched)) {
                round.abort().await;
                return Err(e);
            }
            processed += 1;
        }
        round.finish().await?;

        if processed != batch.len() {
            return Err(SieveError::invariant(format!(
                "round dispatched {} queries but processed {}",
                batch.len(),
                processed
            )));
        }
        self.in_flight.clear();
        self.rounds += 1;

        let survey = self.classifier.survey(&self.tree)?;
        if !survey.is_empty() {
            tracing::info!(
                "Result counts learned: complete {:?}, truncated {:?}",
                survey.completed,
                survey.truncated
            );
        }

        if self.queue.is_empty() {
            if !self.tree.is_complete() {
                return Err(SieveError::invariant(
                    "work queue drained but the query tree is unresolved",
                ));
            }
            self.done = true;
            tracing::info!(
                "Crawl complete: {} queries, {} unique records",
                self.completed.len(),
                self.records.len()
            );
        }

        Ok(RoundSummary {
            dispatched: batch.len(),
            order,
            survey,
        })
    }

    /// Runs rounds until the crawl is done
    pub async fn run(&mut self) -> Result<Progress, SieveError> {
        while !self.done {
            self.advance().await?;
        }
        Ok(self.progress())
    }

    /// Folds one fetched response into the crawl state
    fn process(&mut self, fetched: FetchedResponse) -> Result<(), SieveError> {
        let FetchedResponse {
            node,
            search_term,
            body,
        } = fetched;

        let page = self
            .decoder
            .decode(&body)
            .map_err(|source| SieveError::Decode {
                term: search_term.clone(),
                source,
            })?;

        let max = self.classifier.max_results();
        let verdict = match self.classifier.verdict(page.count) {
            Some(verdict) if page.observed.len() <= max => verdict,
            _ => {
                return Err(SieveError::ProtocolViolation {
                    term: search_term,
                    count: page.count.max(page.observed.len()),
                    max,
                });
            }
        };

        for key in &page.observed {
            self.tree.record_own_result(node, key)?;
        }
        self.tree.set_reported_count(node, page.count)?;
        for record in &page.records {
            self.records.insert(record.key.clone(), record.clone());
        }

        if verdict.needs_narrowing() {
            let children = self
                .tree
                .add_children(node, &self.config.narrowing_alphabet)?;
            self.queue.push_children(&children);
        } else {
            self.tree.mark_done(node)?;
        }

        tracing::debug!(
            "'{}' returned {} ({}), {} pending",
            search_term,
            page.count,
            verdict,
            self.queue.len()
        );
        self.progress.query_completed(&search_term, &page.records);
        self.completed.push(node);

        Ok(())
    }

    /// Whether the crawl has finished
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Records collected so far, ordered by key
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Progress summary
    pub fn progress(&self) -> Progress {
        Progress {
            completed_queries: self.completed.len(),
            remaining_queries: self.queue.len() + self.in_flight.len(),
            unique_records: self.records.len(),
            done: self.done,
        }
    }

    pub fn tree(&self) -> &QueryTree {
        &self.tree
    }

    pub fn classifier(&self) -> &ResultCountClassifier {
        &self.classifier
    }

    pub fn queue_order(&self) -> QueueOrder {
        self.queue.order()
    }

    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    /// Captures the whole crawl state
    pub fn snapshot(&self) -> CrawlSnapshot {
        CrawlSnapshot {
            saved_at: Utc::now(),
            config_hash: None,
            records: self.records.clone(),
            tree: self.tree.clone(),
            pending: self.queue.pending().collect(),
            order: self.queue.order(),
            in_flight: self.in_flight.clone(),
            classifier: self.classifier.clone(),
            completed: self.completed.clone(),
            done: self.done,
            rounds: self.rounds,
        }
    }
}
