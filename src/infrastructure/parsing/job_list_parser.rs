//! Search results page parser
//!
//! Produces [`ListingHint`]s lazily, in document order. Container-scoped extraction is
//! tried first; a page-wide scan for job advert anchors runs only when that pass
//! produced nothing.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

use super::config::ListingSelectors;
use super::context::ListParseContext;
use super::field_chain::{FieldChain, compile_selector, compile_selectors, element_text};
use super::normalizer::normalize;
use super::{ParsingResult, resolve_url};
use crate::domain::ListingHint;

/// Parser for extracting job summaries from search results pages
#[derive(Debug)]
pub struct JobListParser {
    container_selectors: Vec<Selector>,
    title_link_selectors: Vec<Selector>,
    fallback_link_selector: Selector,
    company: FieldChain,
    location: FieldChain,
    salary: FieldChain,
    date_posted: FieldChain,
    closing_date: FieldChain,
    contract_type: FieldChain,
    working_pattern: FieldChain,
}

impl JobListParser {
    /// Create a parser with the default NHS Jobs selectors
    pub fn new() -> ParsingResult<Self> {
        Self::with_config(&ListingSelectors::default())
    }

    /// Create parser with custom selector configuration
    pub fn with_config(selectors: &ListingSelectors) -> ParsingResult<Self> {
        Ok(Self {
            container_selectors: compile_selectors("containers", &selectors.containers)?,
            title_link_selectors: compile_selectors("title_link", &selectors.title_link)?,
            fallback_link_selector: compile_selector(&selectors.fallback_links)?,
            company: FieldChain::compile("company", &selectors.company)?,
            location: FieldChain::compile("location", &selectors.location)?,
            salary: FieldChain::compile("salary", &selectors.salary)?,
            date_posted: FieldChain::compile("date_posted", &selectors.date_posted)?,
            closing_date: FieldChain::compile("closing_date", &selectors.closing_date)?,
            contract_type: FieldChain::compile("contract_type", &selectors.contract_type)?,
            working_pattern: FieldChain::compile("working_pattern", &selectors.working_pattern)?,
        })
    }

    /// Lazily extract listing items from a parsed results page.
    ///
    /// URLs already in the crawl-wide seen set, and repeats within the page, are
    /// skipped (first occurrence wins). The seen set is only read here; admission
    /// into the crawl is the frontier's job.
    pub fn extract_listing<'a>(&'a self, html: &'a Html, context: ListParseContext<'a>) -> ListingItems<'a> {
        let containers = self
            .container_selectors
            .iter()
            .map(|selector| html.select(selector).collect::<Vec<_>>())
            .find(|found| !found.is_empty())
            .unwrap_or_default();

        debug!(
            page = context.page_number,
            containers = containers.len(),
            "Extracting listing items"
        );

        ListingItems {
            parser: self,
            html,
            context,
            stage: Stage::Containers(containers.into_iter()),
            page_seen: HashSet::new(),
            yielded: 0,
        }
    }

    /// Title and absolute URL from the first title-link selector that yields both
    fn title_and_url(&self, container: ElementRef<'_>, page_url: &Url) -> Option<(String, Url)> {
        for selector in &self.title_link_selectors {
            let Some(link) = container.select(selector).next() else {
                continue;
            };
            let Some(title) = normalize(Some(&element_text(link))) else {
                continue;
            };
            let Some(href) = link_href(link) else {
                continue;
            };
            match resolve_url(href, page_url) {
                Ok(url) => return Some((title, url)),
                Err(e) => {
                    warn!("Skipping listing item: {}", e);
                    return None;
                }
            }
        }
        None
    }

    fn fill_fields(&self, container: ElementRef<'_>, title: String, url: Url) -> ListingHint {
        ListingHint {
            title: Some(title),
            company: self.company.resolve(container),
            location: self.location.resolve(container),
            salary: self.salary.resolve(container),
            contract_type: self.contract_type.resolve(container),
            working_pattern: self.working_pattern.resolve(container),
            date_posted: self.date_posted.resolve(container),
            closing_date: self.closing_date.resolve(container),
            reference: None,
            url,
        }
    }
}

/// `href` of the link itself, else of its first descendant anchor
fn link_href<'a>(link: ElementRef<'a>) -> Option<&'a str> {
    if let Some(href) = link.value().attr("href") {
        return Some(href);
    }
    link.descendants()
        .filter_map(ElementRef::wrap)
        .find_map(|el| el.value().attr("href"))
}

enum Stage<'a> {
    Containers(std::vec::IntoIter<ElementRef<'a>>),
    Anchors(std::vec::IntoIter<ElementRef<'a>>),
    Done,
}

/// Finite, non-restartable sequence of listing items for one page
pub struct ListingItems<'a> {
    parser: &'a JobListParser,
    html: &'a Html,
    context: ListParseContext<'a>,
    stage: Stage<'a>,
    page_seen: HashSet<Url>,
    yielded: usize,
}

impl ListingItems<'_> {
    /// Record `url` for this page; false if it is a repeat or already crawled
    fn claim(page_seen: &mut HashSet<Url>, context: &ListParseContext<'_>, url: &Url) -> bool {
        !context.seen.contains(url) && page_seen.insert(url.clone())
    }
}

impl<'a> Iterator for ListingItems<'a> {
    type Item = ListingHint;

    fn next(&mut self) -> Option<Self::Item> {
        let html: &'a Html = self.html;
        let parser: &'a JobListParser = self.parser;
        loop {
            match &mut self.stage {
                Stage::Containers(containers) => {
                    let Some(container) = containers.next() else {
                        self.stage = if self.yielded == 0 {
                            let anchors: Vec<_> = html.select(&parser.fallback_link_selector).collect();
                            debug!(anchors = anchors.len(), "No container items, scanning job links");
                            Stage::Anchors(anchors.into_iter())
                        } else {
                            Stage::Done
                        };
                        continue;
                    };
                    let Some((title, url)) = parser.title_and_url(container, self.context.page_url)
                    else {
                        continue;
                    };
                    if !Self::claim(&mut self.page_seen, &self.context, &url) {
                        continue;
                    }
                    self.yielded += 1;
                    return Some(parser.fill_fields(container, title, url));
                }
                Stage::Anchors(anchors) => {
                    let Some(anchor) = anchors.next() else {
                        self.stage = Stage::Done;
                        continue;
                    };
                    let Some(href) = anchor.value().attr("href") else {
                        continue;
                    };
                    let url = match resolve_url(href, self.context.page_url) {
                        Ok(url) => url,
                        Err(e) => {
                            warn!("Skipping job link: {}", e);
                            continue;
                        }
                    };
                    let title = normalize(Some(&element_text(anchor)))
                        .or_else(|| normalize(anchor.value().attr("title")));
                    let Some(title) = title else {
                        continue;
                    };
                    if !Self::claim(&mut self.page_seen, &self.context, &url) {
                        continue;
                    }
                    self.yielded += 1;
                    return Some(ListingHint::new(url).with_title(title));
                }
                Stage::Done => return None,
            }
        }
    }
}
