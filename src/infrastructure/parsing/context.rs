//! Parsing contexts
//!
//! Per-page information the parsers need besides the document itself.

use url::Url;

use crate::crawling::state::SeenSet;
use crate::domain::ListingHint;

/// Context for a search results page
#[derive(Debug, Clone, Copy)]
pub struct ListParseContext<'a> {
    /// URL of the listing page, used to resolve relative links
    pub page_url: &'a Url,

    /// 1-based page number within the seed chain
    pub page_number: u32,

    /// Crawl-wide seen set; consulted read-only while extracting
    pub seen: &'a SeenSet,
}

impl<'a> ListParseContext<'a> {
    pub fn new(page_url: &'a Url, page_number: u32, seen: &'a SeenSet) -> Self {
        Self {
            page_url,
            page_number,
            seen,
        }
    }
}

/// Context for a job advert page
#[derive(Debug, Clone, Copy)]
pub struct DetailParseContext<'a> {
    /// The detail request URL; becomes the record's identity
    pub url: &'a Url,

    /// Partial record observed on the listing page, if any
    pub hint: Option<&'a ListingHint>,
}

impl<'a> DetailParseContext<'a> {
    pub fn new(url: &'a Url) -> Self {
        Self { url, hint: None }
    }

    pub fn with_hint(mut self, hint: Option<&'a ListingHint>) -> Self {
        self.hint = hint;
        self
    }
}
