//! Domain module - job posting entities and seed construction
//!
//! Each module is its own file in the domain/ directory; public exports are
//! defined here for convenience.

pub mod job;
pub mod search_query;

pub use job::{JobRecord, ListingHint};
pub use search_query::SearchQuery;
