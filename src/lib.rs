//! NHS Jobs crawler
//!
//! Discovers job postings on the NHS Jobs listings site and produces one normalized
//! record per posting.
//! - `domain`: job records, listing hints and seed query construction
//! - `infrastructure`: configuration, logging, HTTP fetching, HTML/JSON extraction,
//!   result sinks and the work queue engine
//! - `crawling`: request types, shared crawl state and the frontier controller

// Module declarations
pub mod domain;
pub mod infrastructure;
pub mod crawling;

// Re-export the types most callers need
pub use domain::{JobRecord, ListingHint, SearchQuery};
pub use crawling::{CrawlBudget, CrawlContext, CrawlMode, CrawlSession, FrontierController, SeenSet};
pub use infrastructure::config::AppConfig;
