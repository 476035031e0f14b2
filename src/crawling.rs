//! # Crawl frontier
//!
//! Request types, per-crawl shared state, and the controller that turns fetched pages
//! into records and follow-up requests.

pub mod frontier;
pub mod session;
pub mod state;
pub mod tasks;

pub use frontier::FrontierController;
pub use session::CrawlSession;
pub use state::{CrawlBudget, CrawlContext, CrawlMode, SeenSet};
pub use tasks::{CrawlRequest, RequestEvent, RequestId, RequestLabel, Transition};
