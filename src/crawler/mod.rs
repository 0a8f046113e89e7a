//! Crawler module for enumerating identifiers behind a search endpoint
//!
//! This module contains the core crawling logic, including:
//! - HTTP transport with retry and backoff
//! - Response decoding into records
//! - The staged work queue and the round-based fetch pipeline
//! - The crawl driver and the persistence-aware coordinator

mod coordinator;
mod decoder;
mod driver;
mod fetcher;
mod pipeline;
mod progress;
mod snapshot;
mod work_queue;

pub use coordinator::{run_crawl, Coordinator, StartMode};
pub use decoder::{DecodeError, DecodedPage, Record, RecordDecoder, SearchAssistDecoder};
pub use driver::{CrawlDriver, RoundSummary};
pub use fetcher::{
    build_http_client, fetch_with_retry, HttpTransport, RetryPolicy, Transport, TransportError,
};
pub use pipeline::{FetchJob, FetchPipeline, FetchedResponse, PipelineRound};
pub use progress::{Progress, ProgressSink, TracingProgress};
pub use snapshot::CrawlSnapshot;
pub use work_queue::{QueueOrder, WorkQueue};
