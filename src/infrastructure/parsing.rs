//! HTML and JSON extraction for NHS Jobs pages
//!
//! Selector-driven parsers for search results and job adverts, the JSON API mapper,
//! pagination, and the field normalizer every extracted value passes through.

pub mod api_mapper;
pub mod config;
pub mod context;
pub mod field_chain;
pub mod job_detail_parser;
pub mod job_list_parser;
pub mod normalizer;
pub mod pagination;
pub mod structured_data;

// Re-export public types
pub use crate::infrastructure::parsing_error::{ParsingError, ParsingResult};
pub use api_mapper::map_api_results;
pub use config::{FieldRule, ParsingConfig};
pub use context::{DetailParseContext, ListParseContext};
pub use job_detail_parser::JobDetailParser;
pub use job_list_parser::{JobListParser, ListingItems};
pub use normalizer::{collapse_whitespace, normalize};
pub use pagination::{PaginationResolver, with_page_param};

use url::Url;

/// Resolve a link found on `base` into an absolute http(s) URL without fragment.
pub fn resolve_url(href: &str, base: &Url) -> ParsingResult<Url> {
    let href = href.trim();
    if href.is_empty() {
        return Err(ParsingError::url_resolution_failed(href, "empty link", Some(base.as_str())));
    }

    let mut url = base
        .join(href)
        .map_err(|e| ParsingError::url_resolution_failed(href, e, Some(base.as_str())))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ParsingError::url_resolution_failed(
            href,
            format!("unsupported scheme '{}'", url.scheme()),
            Some(base.as_str()),
        ));
    }
    url.set_fragment(None);
    Ok(url)
}

/// All page parsers, compiled once per crawl from the parsing configuration
#[derive(Debug)]
pub struct ExtractionPipeline {
    pub listing: JobListParser,
    pub detail: JobDetailParser,
    pub pagination: PaginationResolver,
}

impl ExtractionPipeline {
    pub fn from_config(config: &ParsingConfig) -> ParsingResult<Self> {
        Ok(Self {
            listing: JobListParser::with_config(&config.listing)?,
            detail: JobDetailParser::with_config(&config.detail)?,
            pagination: PaginationResolver::with_config(&config.pagination)?,
        })
    }
}
