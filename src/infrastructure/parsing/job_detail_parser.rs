//! Job advert page parser
//!
//! Field precedence on a detail page:
//! 1. embedded `JobPosting` structured data (title, company, date posted, location,
//!    salary, contract type, description);
//! 2. the page markup, through each field's selector chain;
//! 3. the listing hint carried by the request.
//!
//! Closing date and reference come from the markup first; the structured data's
//! `validThrough` is the last resort for the closing date.

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::config::DetailSelectors;
use super::context::DetailParseContext;
use super::field_chain::{FieldChain, compile_selector, compile_selectors};
use super::normalizer::normalize;
use super::structured_data::{StructuredPosting, find_job_posting};
use super::ParsingResult;
use crate::domain::{JobRecord, ListingHint};

/// Parser for job advert pages
#[derive(Debug)]
pub struct JobDetailParser {
    structured_data: Selector,
    title: FieldChain,
    company: FieldChain,
    location: FieldChain,
    salary: FieldChain,
    date_posted: FieldChain,
    closing_date: FieldChain,
    contract_type: FieldChain,
    working_pattern: FieldChain,
    reference: FieldChain,
    description: Vec<Selector>,
}

/// Normalized hint field
fn from_hint(hint: Option<&ListingHint>, field: impl Fn(&ListingHint) -> Option<&String>) -> Option<String> {
    normalize(hint.and_then(field).map(String::as_str))
}

impl JobDetailParser {
    /// Create a parser with the default NHS Jobs selectors
    pub fn new() -> ParsingResult<Self> {
        Self::with_config(&DetailSelectors::default())
    }

    /// Create parser with custom selector configuration
    pub fn with_config(selectors: &DetailSelectors) -> ParsingResult<Self> {
        Ok(Self {
            structured_data: compile_selector(&selectors.structured_data)?,
            title: FieldChain::compile("title", &selectors.title)?,
            company: FieldChain::compile("company", &selectors.company)?,
            location: FieldChain::compile("location", &selectors.location)?,
            salary: FieldChain::compile("salary", &selectors.salary)?,
            date_posted: FieldChain::compile("date_posted", &selectors.date_posted)?,
            closing_date: FieldChain::compile("closing_date", &selectors.closing_date)?,
            contract_type: FieldChain::compile("contract_type", &selectors.contract_type)?,
            working_pattern: FieldChain::compile("working_pattern", &selectors.working_pattern)?,
            reference: FieldChain::compile("reference", &selectors.reference)?,
            description: compile_selectors("description", &selectors.description)?,
        })
    }

    /// Build a complete record from a job advert page.
    ///
    /// Never fails: fields that no source provides stay `None`.
    pub fn extract_detail(&self, html: &Html, context: DetailParseContext<'_>) -> JobRecord {
        let structured = find_job_posting(html, &self.structured_data).unwrap_or_default();
        let page = html.root_element();
        let hint = context.hint;

        let StructuredPosting {
            title,
            company,
            date_posted,
            location,
            salary,
            employment_type,
            valid_through,
            description_html,
        } = structured;

        let mut record = JobRecord::new(context.url.clone());
        record.title = title
            .or_else(|| self.title.resolve(page))
            .or_else(|| from_hint(hint, |h| h.title.as_ref()));
        record.company = company
            .or_else(|| self.company.resolve(page))
            .or_else(|| from_hint(hint, |h| h.company.as_ref()));
        record.location = location
            .or_else(|| self.location.resolve(page))
            .or_else(|| from_hint(hint, |h| h.location.as_ref()));
        record.salary = salary
            .or_else(|| self.salary.resolve(page))
            .or_else(|| from_hint(hint, |h| h.salary.as_ref()));
        record.date_posted = date_posted
            .or_else(|| self.date_posted.resolve(page))
            .or_else(|| from_hint(hint, |h| h.date_posted.as_ref()));
        record.contract_type = employment_type
            .or_else(|| self.contract_type.resolve(page))
            .or_else(|| from_hint(hint, |h| h.contract_type.as_ref()));
        record.working_pattern = self
            .working_pattern
            .resolve(page)
            .or_else(|| from_hint(hint, |h| h.working_pattern.as_ref()));
        record.closing_date = self
            .closing_date
            .resolve(page)
            .or_else(|| from_hint(hint, |h| h.closing_date.as_ref()))
            .or(valid_through);
        record.reference = self
            .reference
            .resolve(page)
            .or_else(|| from_hint(hint, |h| h.reference.as_ref()));

        record.set_description_html(description_html.or_else(|| self.description_html(html)));

        debug!(
            url = %record.url,
            has_title = record.title.is_some(),
            has_description = record.description_html().is_some(),
            "Extracted job detail"
        );
        record
    }

    /// Inner HTML of every non-empty description container, in selector order.
    ///
    /// An element is used once, and an element nested in (or containing) one already
    /// used is skipped.
    fn description_html(&self, html: &Html) -> Option<String> {
        let mut used: Vec<ElementRef<'_>> = Vec::new();
        let mut parts = Vec::new();

        for selector in &self.description {
            for element in html.select(selector) {
                if used.iter().any(|taken| overlaps(*taken, element)) {
                    continue;
                }
                let inner = element.inner_html();
                let inner = inner.trim();
                if inner.is_empty() {
                    continue;
                }
                parts.push(inner.to_string());
                used.push(element);
            }
        }

        (!parts.is_empty()).then(|| parts.join("\n"))
    }
}

/// Same element, or one is an ancestor of the other
fn overlaps(a: ElementRef<'_>, b: ElementRef<'_>) -> bool {
    a.id() == b.id() || is_ancestor(a, b) || is_ancestor(b, a)
}

fn is_ancestor(candidate: ElementRef<'_>, element: ElementRef<'_>) -> bool {
    element.ancestors().any(|node| node.id() == candidate.id())
}
