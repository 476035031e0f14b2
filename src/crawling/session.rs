//! # Crawl Session
//!
//! Wires configuration, fetcher and sink into a ready-to-run crawl.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::frontier::FrontierController;
use super::state::CrawlContext;
use super::tasks::CrawlRequest;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::http_client::Fetcher;
use crate::infrastructure::job_sink::JobSink;
use crate::infrastructure::parsing::ExtractionPipeline;
use crate::infrastructure::work_queue_engine::{
    CrawlError, CrawlSummary, WorkQueueConfig, WorkQueueManager, WorkerContext,
};

pub struct CrawlSession {
    queue: WorkQueueManager,
    worker_context: Arc<WorkerContext>,
    seeds: Vec<CrawlRequest>,
}

impl CrawlSession {
    /// Compile the extractors and build seed requests. Fails on unusable selector
    /// configuration or when there is nothing to crawl.
    pub fn new(config: &AppConfig, fetcher: Arc<dyn Fetcher>, sink: Arc<dyn JobSink>) -> Result<Self, CrawlError> {
        let seed_urls = config.input.seed_urls();
        if seed_urls.is_empty() {
            return Err(CrawlError::NoSeeds);
        }

        let pipeline = ExtractionPipeline::from_config(&config.parsing)?;
        let context = Arc::new(CrawlContext::from_input(&config.input));
        let frontier = Arc::new(FrontierController::new(pipeline, context));
        let seeds = frontier.seed_requests(&seed_urls);

        Ok(Self {
            queue: WorkQueueManager::new(WorkQueueConfig::from(&config.crawler)),
            worker_context: Arc::new(WorkerContext {
                fetcher,
                frontier,
                sink,
            }),
            seeds,
        })
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.queue = self.queue.with_cancellation(token);
        self
    }

    pub fn frontier(&self) -> &FrontierController {
        &self.worker_context.frontier
    }

    pub fn seeds(&self) -> &[CrawlRequest] {
        &self.seeds
    }

    pub async fn run(self) -> CrawlSummary {
        let Self {
            queue,
            worker_context,
            seeds,
        } = self;
        queue.enqueue(seeds).await;
        queue.run(worker_context).await
    }
}
