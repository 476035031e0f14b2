//! Next-page resolution for search results
//!
//! An explicit "next" link is preferred; otherwise the next page is manufactured by
//! setting the `page` query parameter on the current URL.

use scraper::Html;
use tracing::{debug, warn};
use url::Url;

use super::config::PaginationSelectors;
use super::field_chain::FieldChain;
use super::{ParsingResult, resolve_url};
use crate::infrastructure::config::nhs_jobs::PAGE_PARAM;

#[derive(Debug)]
pub struct PaginationResolver {
    next_link: FieldChain,
}

impl PaginationResolver {
    pub fn new() -> ParsingResult<Self> {
        Self::with_config(&PaginationSelectors::default())
    }

    pub fn with_config(selectors: &PaginationSelectors) -> ParsingResult<Self> {
        Ok(Self {
            next_link: FieldChain::compile("next_link", &selectors.next_link)?,
        })
    }

    /// URL of the page after `current_page`.
    ///
    /// Returns `None` only when no explicit link resolves and `current_url` cannot carry
    /// a query string.
    pub fn next_page(&self, html: &Html, current_url: &Url, current_page: u32) -> Option<Url> {
        if let Some(href) = self.next_link.resolve_raw(html.root_element()) {
            match resolve_url(&href, current_url) {
                Ok(url) => {
                    debug!(next = %url, "Following explicit next-page link");
                    return Some(url);
                }
                Err(e) => warn!("Ignoring next-page link: {}", e),
            }
        }
        with_page_param(current_url, current_page.saturating_add(1))
    }
}

/// `url` with its `page` query parameter set to `page`.
///
/// Any existing `page` parameter is replaced; other parameters keep their order.
pub fn with_page_param(url: &Url, page: u32) -> Option<Url> {
    if url.cannot_be_a_base() {
        return None;
    }

    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != PAGE_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut next = url.clone();
    next.query_pairs_mut()
        .clear()
        .extend_pairs(retained)
        .append_pair(PAGE_PARAM, &page.to_string());
    Some(next)
}
