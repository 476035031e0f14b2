use scraper::Html;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::infrastructure::parsing::normalizer::collapse_whitespace;

/// Elements whose text never belongs in a plain-text description
const NON_TEXT_ELEMENTS: &[&str] = &["script", "style", "noscript", "iframe"];

/// Canonical output unit: one finished job posting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredJobRecord")]
pub struct JobRecord {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub salary: Option<String>,
    pub contract_type: Option<String>,
    pub working_pattern: Option<String>,
    pub date_posted: Option<String>,
    pub closing_date: Option<String>,
    pub reference: Option<String>,
    description_html: Option<String>,
    description_text: Option<String>,
    /// Absolute address of the posting; the record's identity
    pub url: Url,
}

impl JobRecord {
    /// Empty record for a posting address
    pub fn new(url: Url) -> Self {
        Self {
            title: None,
            company: None,
            location: None,
            salary: None,
            contract_type: None,
            working_pattern: None,
            date_posted: None,
            closing_date: None,
            reference: None,
            description_html: None,
            description_text: None,
            url,
        }
    }

    /// Set the description markup; the plain-text form is always derived from it.
    pub fn set_description_html(&mut self, html: Option<String>) {
        let html = html
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty());
        self.description_text = html.as_deref().map(html_to_text);
        self.description_html = html;
    }

    pub fn description_html(&self) -> Option<&str> {
        self.description_html.as_deref()
    }

    pub fn description_text(&self) -> Option<&str> {
        self.description_text.as_deref()
    }
}

impl From<ListingHint> for JobRecord {
    fn from(hint: ListingHint) -> Self {
        Self {
            title: hint.title,
            company: hint.company,
            location: hint.location,
            salary: hint.salary,
            contract_type: hint.contract_type,
            working_pattern: hint.working_pattern,
            date_posted: hint.date_posted,
            closing_date: hint.closing_date,
            reference: hint.reference,
            description_html: None,
            description_text: None,
            url: hint.url,
        }
    }
}

/// Serialized form of a record; any stored description text is re-derived from the markup
#[derive(Deserialize)]
struct StoredJobRecord {
    title: Option<String>,
    company: Option<String>,
    location: Option<String>,
    salary: Option<String>,
    contract_type: Option<String>,
    working_pattern: Option<String>,
    date_posted: Option<String>,
    closing_date: Option<String>,
    reference: Option<String>,
    description_html: Option<String>,
    url: Url,
}

impl From<StoredJobRecord> for JobRecord {
    fn from(stored: StoredJobRecord) -> Self {
        let mut record = Self {
            title: stored.title,
            company: stored.company,
            location: stored.location,
            salary: stored.salary,
            contract_type: stored.contract_type,
            working_pattern: stored.working_pattern,
            date_posted: stored.date_posted,
            closing_date: stored.closing_date,
            reference: stored.reference,
            ..Self::new(stored.url)
        };
        record.set_description_html(stored.description_html);
        record
    }
}

/// Partial record gleaned from a listing page (HTML or JSON API).
///
/// Travels with the detail request it was scheduled for and backfills
/// whatever the detail page fails to yield.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingHint {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub salary: Option<String>,
    pub contract_type: Option<String>,
    pub working_pattern: Option<String>,
    pub date_posted: Option<String>,
    pub closing_date: Option<String>,
    pub reference: Option<String>,
    pub url: Url,
}

impl ListingHint {
    pub fn new(url: Url) -> Self {
        Self {
            title: None,
            company: None,
            location: None,
            salary: None,
            contract_type: None,
            working_pattern: None,
            date_posted: None,
            closing_date: None,
            reference: None,
            url,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Strip non-content elements from a description fragment and collapse whitespace.
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut text = String::with_capacity(html.len());

    for node in fragment.root_element().descendants() {
        let Some(chunk) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| NON_TEXT_ELEMENTS.contains(&el.name()))
        });
        if !hidden {
            text.push_str(chunk);
        }
    }

    collapse_whitespace(&text)
}
