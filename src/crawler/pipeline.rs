//! Fetch pipeline for one round of queries
//!
//! A round is a fan-out/fan-in: a dispatcher task hands each job to a fetch
//! worker while a semaphore caps how many run at once, and every finished
//! fetch lands on a bounded returns channel. The caller drains that channel
//! on its own task and is the only one mutating crawl state, so the tree,
//! classifier and record store need no locking.

use crate::crawler::fetcher::{fetch_with_retry, RetryPolicy, Transport};
use crate::state::NodeId;
use crate::SieveError;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};

/// A query handed to a fetch worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchJob {
    pub node: NodeId,
    pub search_term: String,
}

/// A completed fetch waiting to be processed
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub node: NodeId,
    pub search_term: String,
    pub body: Value,
}

/// Pool of fetch workers sharing one transport
pub struct FetchPipeline {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    workers: usize,
}

impl FetchPipeline {
    /// Creates a pipeline running at most `workers` fetches at once
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy, workers: usize) -> Self {
        Self {
            transport,
            policy,
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Starts fetching a batch of jobs
    ///
    /// The returned round yields one outcome per job, in completion order.
    pub fn launch(&self, jobs: Vec<FetchJob>) -> PipelineRound {
        let (returns_tx, returns_rx) = mpsc::channel(self.workers);
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let transport = Arc::clone(&self.transport);
        let policy = self.policy.clone();

        let dispatcher = tokio::spawn(async move {
            let mut workers = JoinSet::new();

            for job in jobs {
                let permit = Arc::clone(&semaphore)
                    .acquire_owned()
                    .await
                    .map_err(|e| SieveError::Worker(e.to_string()))?;
                let transport = Arc::clone(&transport);
                let policy = policy.clone();
                let returns_tx = returns_tx.clone();

                workers.spawn(async move {
                    let _permit = permit;
                    let outcome = fetch_with_retry(transport.as_ref(), &job.search_term, &policy)
                        .await
                        .map(|body| FetchedResponse {
                            node: job.node,
                            search_term: job.search_term,
                            body,
                        });
                    // a closed channel means the round was aborted
                    let _ = returns_tx.send(outcome).await;
                });
            }

            // the channel closes once the last worker drops its sender
            drop(returns_tx);

            while let Some(joined) = workers.join_next().await {
                joined.map_err(|e| SieveError::Worker(e.to_string()))?;
            }
            Ok(())
        });

        PipelineRound {
            returns: returns_rx,
            dispatcher,
        }
    }
}

/// An in-progress round of fetches
pub struct PipelineRound {
    returns: mpsc::Receiver<Result<FetchedResponse, SieveError>>,
    dispatcher: JoinHandle<Result<(), SieveError>>,
}

impl PipelineRound {
    /// Waits for the next completed fetch
    ///
    /// Returns `None` once every worker has finished.
    pub async fn next(&mut self) -> Option<Result<FetchedResponse, SieveError>> {
        self.returns.recv().await
    }

    /// Waits for the dispatcher and surfaces worker panics
    pub async fn finish(self) -> Result<(), SieveError> {
        match self.dispatcher.await {
            Ok(result) => result,
            Err(e) => Err(SieveError::Worker(e.to_string())),
        }
    }

    /// Stops every worker of the round, including requests still in flight
    pub async fn abort(mut self) {
        self.returns.close();
        self.dispatcher.abort();
        // dropping the aborted dispatcher's JoinSet aborts its workers
        let _ = self.dispatcher.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::fetcher::TransportError;
    use async_trait::async_trait;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Echoes the search term back and tracks peak concurrency
    #[derive(Default)]
    struct EchoTransport {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Transport for EchoTransport {
        async fn fetch(&self, search_term: &str) -> Result<Value, TransportError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);

            if search_term == "bad" {
                return Err(TransportError::Body("not json".to_string()));
            }
            Ok(serde_json::json!({ "term": search_term }))
        }
    }

    fn jobs(terms: &[&str]) -> Vec<FetchJob> {
        terms
            .iter()
            .enumerate()
            .map(|(node, term)| FetchJob {
                node,
                search_term: term.to_string(),
            })
            .collect()
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 1,
            backoff_base_secs: 1,
        }
    }

    #[tokio::test]
    async fn test_every_job_returns_once() {
        let transport = Arc::new(EchoTransport::default());
        let pipeline = FetchPipeline::new(transport, policy(), 4);

        let terms = ["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"];
        let mut round = pipeline.launch(jobs(&terms));

        let mut seen = BTreeSet::new();
        while let Some(outcome) = round.next().await {
            let fetched = outcome.unwrap();
            assert_eq!(fetched.body["term"], fetched.search_term.as_str());
            assert!(seen.insert(fetched.node));
        }
        round.finish().await.unwrap();

        assert_eq!(seen.len(), terms.len());
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let transport = Arc::new(EchoTransport::default());
        let pipeline = FetchPipeline::new(Arc::clone(&transport) as Arc<dyn Transport>, policy(), 3);

        let terms: Vec<String> = (0..30).map(|i| format!("t{}", i)).collect();
        let term_refs: Vec<&str> = terms.iter().map(String::as_str).collect();
        let mut round = pipeline.launch(jobs(&term_refs));
        while let Some(outcome) = round.next().await {
            outcome.unwrap();
        }
        round.finish().await.unwrap();

        let peak = transport.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak concurrency {} exceeded pool size", peak);
        assert!(peak >= 1);
    }

    #[tokio::test]
    async fn test_fatal_fetch_surfaces_as_outcome() {
        let transport = Arc::new(EchoTransport::default());
        let pipeline = FetchPipeline::new(transport, policy(), 2);

        let mut round = pipeline.launch(jobs(&["a", "bad", "c"]));
        let mut failures = 0;
        while let Some(outcome) = round.next().await {
            if let Err(e) = outcome {
                assert!(matches!(e, SieveError::Fetch { .. }));
                failures += 1;
            }
        }
        round.finish().await.unwrap();

        assert_eq!(failures, 1);
    }

    #[tokio::test]
    async fn test_abort_stops_round() {
        let transport = Arc::new(EchoTransport::default());
        let pipeline = FetchPipeline::new(transport, policy(), 1);

        let terms: Vec<String> = (0..50).map(|i| format!("t{}", i)).collect();
        let term_refs: Vec<&str> = terms.iter().map(String::as_str).collect();
        let mut round = pipeline.launch(jobs(&term_refs));

        assert!(round.next().await.is_some());
        round.abort().await;
    }

    #[tokio::test]
    async fn test_empty_round_finishes() {
        let transport = Arc::new(EchoTransport::default());
        let pipeline = FetchPipeline::new(transport, policy(), 2);

        let mut round = pipeline.launch(Vec::new());
        assert!(round.next().await.is_none());
        round.finish().await.unwrap();
    }
}
