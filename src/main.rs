//! NHS Jobs crawler command line entry point
//!
//! Usage: `nhs-jobs-crawler [config-file]`. The config path can also come from
//! `NHSJOBS_CONFIG`; any setting can be overridden with `NHSJOBS__SECTION__KEY`
//! environment variables.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use nhs_jobs_crawler::crawling::CrawlSession;
use nhs_jobs_crawler::infrastructure::config::AppConfig;
use nhs_jobs_crawler::infrastructure::http_client::HttpFetcher;
use nhs_jobs_crawler::infrastructure::job_sink::JsonLinesSink;
use nhs_jobs_crawler::infrastructure::logging::init_logging_with_config;

const CONFIG_PATH_ENV: &str = "NHSJOBS_CONFIG";

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_PATH_ENV).ok());
    let config = AppConfig::load(config_path.as_deref()).context("Failed to load configuration")?;

    init_logging_with_config(&config.logging)?;
    info!(
        results_wanted = %config.input.results_wanted,
        max_pages = config.input.max_pages.0,
        collect_details = config.input.collect_details,
        "🚀 NHS Jobs crawler starting"
    );

    let cancellation = CancellationToken::new();
    let fetcher = HttpFetcher::new(config.http.clone())?.with_cancellation(cancellation.clone());
    let sink = JsonLinesSink::create(&config.output.path)
        .await
        .with_context(|| format!("Failed to open output file {}", config.output.path.display()))?;

    let session = CrawlSession::new(&config, Arc::new(fetcher), Arc::new(sink))?
        .with_cancellation(cancellation.clone());

    let ctrl_c = cancellation.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupt received, finishing in-flight requests");
                ctrl_c.cancel();
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    let summary = session.run().await;
    info!(
        saved = summary.saved,
        list_pages = summary.list_pages_visited,
        details_scheduled = summary.details_scheduled,
        failed = summary.requests_failed,
        elapsed_ms = summary.elapsed_ms,
        "Scraping completed. Total jobs saved: {}",
        summary.saved
    );
    Ok(())
}
