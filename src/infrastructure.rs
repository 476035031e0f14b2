//! Infrastructure layer for configuration, logging, fetching, parsing and persistence
//!
//! Everything here talks to the outside world (or to its data formats) on behalf of
//! the crawl frontier in `crate::crawling`.

pub mod config;  // Configuration constants, input parsing and loading
pub mod logging;  // Logging infrastructure
pub mod parsing_error;  // Parsing error types
pub mod parsing;  // HTML/JSON extraction pipeline
pub mod http_client;  // Fetcher contract and reqwest implementation
pub mod job_sink;  // Result sinks
pub mod work_queue_engine;  // Bounded worker pool driving the frontier

// Re-export commonly used items
pub use config::{AppConfig, ConfigError, nhs_jobs};
pub use logging::{init_logging, init_logging_with_config};
pub use parsing::{ExtractionPipeline, JobDetailParser, JobListParser, ParsingConfig, ParsingError, ParsingResult};
pub use http_client::{FetchError, FetchedBody, Fetcher, HttpClientConfig, HttpFetcher, ResponseKind};
pub use job_sink::{JobSink, JsonLinesSink, MemorySink, SinkError};
pub use work_queue_engine::{CrawlError, CrawlSummary, WorkQueueConfig, WorkQueueManager, WorkerContext};
