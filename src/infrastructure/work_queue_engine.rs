//! Work-queue crawl engine
//!
//! A FIFO of pending requests plus a count of requests being worked on, both under one
//! lock. A fixed number of workers poll the queue; the crawl is over when nothing is
//! pending and nothing is active. Follow-up requests are queued before the finishing
//! request stops counting as active, so the queue can never look drained early.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::crawling::{CrawlRequest, FrontierController, RequestEvent, RequestLabel};
use crate::infrastructure::config::{ConfigError, CrawlerSettings};
use crate::infrastructure::http_client::{Fetcher, ResponseKind};
use crate::infrastructure::job_sink::{JobSink, SinkError};
use crate::infrastructure::parsing::ParsingError;

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("No seed URLs to crawl")]
    NoSeeds,

    #[error("Invalid extraction configuration: {0}")]
    Parsing(#[from] ParsingError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Output sink failed: {0}")]
    Sink(#[from] SinkError),
}

#[derive(Debug, Clone)]
pub struct WorkQueueConfig {
    pub max_concurrent_workers: usize,
    pub queue_check_interval_ms: u64,
}

impl Default for WorkQueueConfig {
    fn default() -> Self {
        Self::from(&CrawlerSettings::default())
    }
}

impl From<&CrawlerSettings> for WorkQueueConfig {
    fn from(settings: &CrawlerSettings) -> Self {
        Self {
            max_concurrent_workers: settings.max_concurrency.max(1),
            queue_check_interval_ms: settings.queue_check_interval_ms,
        }
    }
}

/// Collaborators every worker uses
pub struct WorkerContext {
    pub fetcher: Arc<dyn Fetcher>,
    pub frontier: Arc<FrontierController>,
    pub sink: Arc<dyn JobSink>,
}

/// Final crawl counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlSummary {
    pub saved: u64,
    pub list_pages_visited: u64,
    pub details_scheduled: u64,
    pub requests_processed: u64,
    pub requests_failed: u64,
    /// Records the sink rejected, plus a failed final flush; none of them count as saved
    pub sink_failures: u64,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<CrawlRequest>,
    active: usize,
}

enum NextRequest {
    Ready(CrawlRequest),
    Wait,
    Drained,
}

pub struct WorkQueueManager {
    state: Mutex<QueueState>,
    cancellation_token: CancellationToken,
    config: WorkQueueConfig,
    processed: AtomicU64,
    failed: AtomicU64,
    sink_failures: AtomicU64,
}

impl WorkQueueManager {
    pub fn new(config: WorkQueueConfig) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            cancellation_token: CancellationToken::new(),
            config,
            processed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            sink_failures: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Stop handing out requests; in-flight requests still complete
    pub fn cancel(&self) {
        info!("Cancelling crawl");
        self.cancellation_token.cancel();
    }

    pub async fn enqueue(&self, requests: impl IntoIterator<Item = CrawlRequest>) {
        let mut state = self.state.lock().await;
        state.pending.extend(requests);
        debug!(pending = state.pending.len(), "Requests queued");
    }

    pub async fn pending_len(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    /// Run workers until the queue drains or the crawl is cancelled
    pub async fn run(&self, context: Arc<WorkerContext>) -> CrawlSummary {
        let started = Instant::now();
        let started_at = Utc::now();
        info!(workers = self.config.max_concurrent_workers, "Starting workers");

        let workers = (0..self.config.max_concurrent_workers)
            .map(|worker_id| self.worker_loop(worker_id, Arc::clone(&context)));
        futures::future::join_all(workers).await;

        if let Err(e) = context.sink.flush().await {
            self.sink_failures.fetch_add(1, Ordering::SeqCst);
            warn!("Failed to flush output: {}", e);
        }

        let budget = &context.frontier.context().budget;
        let summary = CrawlSummary {
            saved: budget.saved(),
            list_pages_visited: budget.list_pages_visited(),
            details_scheduled: budget.details_scheduled(),
            requests_processed: self.processed.load(Ordering::SeqCst),
            requests_failed: self.failed.load(Ordering::SeqCst),
            sink_failures: self.sink_failures.load(Ordering::SeqCst),
            cancelled: self.cancellation_token.is_cancelled(),
            started_at,
            finished_at: Utc::now(),
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
        info!(?summary, "All workers finished");
        summary
    }

    async fn worker_loop(&self, worker_id: usize, context: Arc<WorkerContext>) {
        debug!(worker_id, "Worker started");
        let idle = Duration::from_millis(self.config.queue_check_interval_ms);

        loop {
            if self.cancellation_token.is_cancelled() {
                debug!(worker_id, "Worker cancelled");
                break;
            }

            match self.next_request().await {
                NextRequest::Ready(request) => {
                    debug!(worker_id, kind = request.kind(), url = %request.url, "Processing request");
                    let follow_ups = self.process(request, &context).await;
                    self.finish_request(follow_ups).await;
                }
                NextRequest::Wait => tokio::time::sleep(idle).await,
                NextRequest::Drained => break,
            }
        }
        debug!(worker_id, "Worker stopped");
    }

    async fn next_request(&self) -> NextRequest {
        let mut state = self.state.lock().await;
        match state.pending.pop_front() {
            Some(request) => {
                state.active += 1;
                NextRequest::Ready(request)
            }
            None if state.active == 0 => NextRequest::Drained,
            None => NextRequest::Wait,
        }
    }

    async fn finish_request(&self, follow_ups: Vec<CrawlRequest>) {
        let mut state = self.state.lock().await;
        state.pending.extend(follow_ups);
        state.active = state.active.saturating_sub(1);
    }

    /// Fetch, let the frontier decide, deliver commits; returns follow-up requests
    async fn process(&self, request: CrawlRequest, context: &WorkerContext) -> Vec<CrawlRequest> {
        self.processed.fetch_add(1, Ordering::SeqCst);
        let event = self.fetch_event(request, context).await;
        if matches!(event, RequestEvent::Failed { .. }) {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }

        let transition = context.frontier.handle(event);
        for record in &transition.commit {
            if let Err(e) = context.sink.append(record).await {
                self.sink_failures.fetch_add(1, Ordering::SeqCst);
                context.frontier.commit_failed(record, &e);
            }
        }
        transition.enqueue
    }

    async fn fetch_event(&self, request: CrawlRequest, context: &WorkerContext) -> RequestEvent {
        let html = match context.fetcher.fetch(&request.url, ResponseKind::Html).await {
            Ok(body) => body.body,
            Err(error) => return RequestEvent::Failed { request, error },
        };

        match request.label {
            RequestLabel::List { page } => {
                let api_body = match context.frontier.api_url(&request) {
                    Some(api_url) => match context.fetcher.fetch(&api_url, ResponseKind::Json).await {
                        Ok(body) => body
                            .json()
                            .map_err(|e| debug!(page, "JSON API response unusable: {}", e))
                            .ok(),
                        Err(e) => {
                            debug!(page, "JSON API not available: {}", e);
                            None
                        }
                    },
                    None => None,
                };
                RequestEvent::ListFetched {
                    request,
                    html,
                    api_body,
                }
            }
            RequestLabel::Detail { .. } => RequestEvent::DetailFetched { request, html },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawling::{CrawlBudget, CrawlContext, CrawlMode};
    use crate::infrastructure::config::{MaxPages, ResultsWanted};
    use crate::infrastructure::http_client::{FetchError, FetchedBody};
    use crate::domain::JobRecord;
    use crate::infrastructure::job_sink::MemorySink;
    use crate::infrastructure::parsing::{ExtractionPipeline, ParsingConfig};
    use async_trait::async_trait;
    use url::Url;

    /// Serves one results page with two adverts; everything else 404s
    struct OnePageFetcher;

    #[async_trait]
    impl Fetcher for OnePageFetcher {
        async fn fetch(&self, url: &Url, kind: ResponseKind) -> Result<FetchedBody, FetchError> {
            let body = match (kind, url.path()) {
                (ResponseKind::Html, "/results") if url.query() == Some("q=1") => r#"<ul>
                    <li class="search-result"><h2><a href="/candidate/jobadvert/1">One</a></h2></li>
                    <li class="search-result"><h2><a href="/candidate/jobadvert/2">Two</a></h2></li>
                </ul>"#
                    .to_string(),
                (ResponseKind::Html, path) if path.starts_with("/candidate/jobadvert/") => {
                    format!(r#"<h1 id="heading">Advert {path}</h1>"#)
                }
                _ => {
                    return Err(FetchError::Http {
                        status: 404,
                        url: url.to_string(),
                    });
                }
            };
            Ok(FetchedBody {
                url: url.clone(),
                status: 200,
                body,
            })
        }
    }

    /// Rejects every record
    struct FullDiskSink;

    #[async_trait]
    impl JobSink for FullDiskSink {
        async fn append(&self, _record: &JobRecord) -> Result<(), SinkError> {
            Err(SinkError::Io(std::io::Error::other("no space left on device")))
        }
    }

    fn worker_context(sink: Arc<dyn JobSink>) -> Arc<WorkerContext> {
        let crawl = CrawlContext::new(
            CrawlBudget::new(ResultsWanted(Some(10)), MaxPages(2)),
            CrawlMode::Detail,
        );
        let pipeline = ExtractionPipeline::from_config(&ParsingConfig::default()).unwrap();
        Arc::new(WorkerContext {
            fetcher: Arc::new(OnePageFetcher),
            frontier: Arc::new(FrontierController::new(pipeline, Arc::new(crawl))),
            sink,
        })
    }

    fn config() -> WorkQueueConfig {
        WorkQueueConfig {
            max_concurrent_workers: 3,
            queue_check_interval_ms: 5,
        }
    }

    #[tokio::test]
    async fn test_queue_drains_and_terminates() {
        let sink = Arc::new(MemorySink::new());
        let context = worker_context(sink.clone());
        let queue = WorkQueueManager::new(config());
        let seed = Url::parse("https://example.test/results?q=1").unwrap();
        queue.enqueue(context.frontier.seed_requests(&[seed])).await;

        let summary = queue.run(context).await;

        assert_eq!(sink.len(), 2);
        assert_eq!(summary.saved, 2);
        assert_eq!(summary.details_scheduled, 2);
        // page 2 is requested and fails
        assert_eq!(summary.list_pages_visited, 1);
        assert_eq!(summary.requests_failed, 1);
        assert_eq!(summary.requests_processed, 4);
        assert_eq!(summary.sink_failures, 0);
        assert!(!summary.cancelled);
        assert!(summary.finished_at >= summary.started_at);
        assert_eq!(queue.pending_len().await, 0);
    }

    #[tokio::test]
    async fn test_rejected_records_are_reported_and_not_saved() {
        let context = worker_context(Arc::new(FullDiskSink));
        let queue = WorkQueueManager::new(config());
        let seed = Url::parse("https://example.test/results?q=1").unwrap();
        queue.enqueue(context.frontier.seed_requests(&[seed])).await;

        let summary = queue.run(context).await;

        assert_eq!(summary.sink_failures, 2);
        assert_eq!(summary.saved, 0);
        assert_eq!(summary.details_scheduled, 2);
    }

    #[tokio::test]
    async fn test_cancelled_queue_stops_dequeuing() {
        let sink = Arc::new(MemorySink::new());
        let context = worker_context(sink.clone());
        let queue = WorkQueueManager::new(config());
        let seed = Url::parse("https://example.test/results?q=1").unwrap();
        queue.enqueue(context.frontier.seed_requests(&[seed])).await;
        queue.cancel();

        let summary = queue.run(context).await;
        assert!(summary.cancelled);
        assert_eq!(summary.requests_processed, 0);
        assert!(sink.is_empty());
        assert_eq!(queue.pending_len().await, 1);
    }
}
