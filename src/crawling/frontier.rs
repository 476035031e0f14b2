//! # Frontier Controller
//!
//! Decides what happens after each fetched page: which records are committed, which
//! detail pages are scheduled, and whether a results chain continues. The controller
//! does no I/O; workers feed it [`RequestEvent`]s and apply the returned [`Transition`].
//!
//! Admission is the only place URLs enter the [`SeenSet`](super::state::SeenSet):
//! a URL is claimed at the moment it is scheduled or committed, so the same posting
//! reached from two results pages is handled once.

use std::sync::Arc;

use scraper::Html;
use serde_json::Value;
use tracing::{debug, info, trace, warn};
use url::Url;

use super::state::{CrawlContext, CrawlMode};
use super::tasks::{CrawlRequest, RequestEvent, RequestLabel, Transition};
use crate::domain::{JobRecord, ListingHint};
use crate::infrastructure::http_client::FetchError;
use crate::infrastructure::parsing::{
    DetailParseContext, ExtractionPipeline, ListParseContext, map_api_results, with_page_param,
};

pub struct FrontierController {
    pipeline: ExtractionPipeline,
    context: Arc<CrawlContext>,
}

impl FrontierController {
    pub fn new(pipeline: ExtractionPipeline, context: Arc<CrawlContext>) -> Self {
        Self { pipeline, context }
    }

    pub fn context(&self) -> &CrawlContext {
        &self.context
    }

    /// One page-1 LIST request per distinct seed
    pub fn seed_requests(&self, seeds: &[Url]) -> Vec<CrawlRequest> {
        let mut requests: Vec<CrawlRequest> = Vec::with_capacity(seeds.len());
        for seed in seeds {
            if requests.iter().any(|r| &r.url == seed) {
                debug!(seed = %seed, "Duplicate seed ignored");
                continue;
            }
            requests.push(CrawlRequest::list(seed.clone(), 1));
        }
        info!(
            seeds = requests.len(),
            wanted = self.context.budget.wanted(),
            max_pages = self.context.budget.max_pages(),
            mode = ?self.context.mode,
            "Seeding crawl"
        );
        requests
    }

    /// JSON API variant of a LIST request's page
    pub fn api_url(&self, request: &CrawlRequest) -> Option<Url> {
        with_page_param(&request.url, request.page()?)
    }

    /// Handle one fetched (or failed) request
    pub fn handle(&self, event: RequestEvent) -> Transition {
        trace!(kind = event.request().kind(), url = %event.request().url, "Handling event");
        match event {
            RequestEvent::ListFetched {
                request,
                html,
                api_body,
            } => {
                let page = request.page().unwrap_or(1);
                self.handle_list(&request, page, &html, api_body.as_ref())
            }
            RequestEvent::DetailFetched { request, html } => {
                let hint = match &request.label {
                    RequestLabel::Detail { hint } => hint.as_ref(),
                    RequestLabel::List { .. } => None,
                };
                self.handle_detail(&request.url, hint, &html)
            }
            RequestEvent::Failed { request, error } => {
                self.handle_failure(&request, &error);
                Transition::default()
            }
        }
    }

    /// A committed record could not be delivered; it no longer counts as saved
    pub fn commit_failed(&self, record: &JobRecord, error: &dyn std::fmt::Display) {
        self.context.budget.release_saves(1);
        warn!(url = %record.url, "Failed to store record: {}", error);
    }

    fn handle_list(&self, request: &CrawlRequest, page: u32, html: &str, api_body: Option<&Value>) -> Transition {
        let budget = &self.context.budget;
        budget.record_list_page();

        let document = Html::parse_document(html);
        let candidates = self.listing_candidates(request, page, &document, api_body);

        if candidates.is_empty() {
            info!(page, url = %request.url, "No jobs found; ending this results chain");
            return Transition::default();
        }

        let mut transition = match self.context.mode {
            CrawlMode::Detail => self.schedule_details(candidates),
            CrawlMode::DirectList => self.commit_listing(candidates),
        };

        if budget.should_paginate(page) {
            if let Some(next) = self.pipeline.pagination.next_page(&document, &request.url, page) {
                debug!(page = page + 1, url = %next, "Scheduling next results page");
                transition.enqueue.push(CrawlRequest::list(next, page + 1));
            }
        } else {
            debug!(page, saved = budget.saved(), "Not paginating further");
        }

        info!(
            page,
            scheduled = transition.enqueue.iter().filter(|r| !r.is_list()).count(),
            committed = transition.commit.len(),
            "Processed results page"
        );
        transition
    }

    /// API results when usable, otherwise the HTML extraction
    fn listing_candidates(
        &self,
        request: &CrawlRequest,
        page: u32,
        document: &Html,
        api_body: Option<&Value>,
    ) -> Vec<ListingHint> {
        if let Some(body) = api_body {
            match map_api_results(body, &request.url) {
                Ok(hints) => {
                    info!(page, jobs = hints.len(), "JSON API returned jobs");
                    return hints;
                }
                Err(e) => debug!(page, "Falling back to HTML parsing: {}", e),
            }
        }

        let context = ListParseContext::new(&request.url, page, &self.context.seen);
        let hints: Vec<ListingHint> = self.pipeline.listing.extract_listing(document, context).collect();
        debug!(page, jobs = hints.len(), "HTML parsing found jobs");
        hints
    }

    fn schedule_details(&self, candidates: Vec<ListingHint>) -> Transition {
        let budget = &self.context.budget;
        let granted = budget.reserve_details(candidates.len() as u64);

        let enqueue: Vec<CrawlRequest> = candidates
            .into_iter()
            .filter(|hint| self.context.seen.insert(hint.url.clone()))
            .take(usize::try_from(granted).unwrap_or(usize::MAX))
            .map(|hint| CrawlRequest::detail(hint.url.clone(), Some(hint)))
            .collect();

        let admitted = enqueue.len() as u64;
        budget.release_details(granted - admitted);
        budget.record_details_scheduled(admitted);

        Transition {
            enqueue,
            commit: Vec::new(),
        }
    }

    fn commit_listing(&self, candidates: Vec<ListingHint>) -> Transition {
        let budget = &self.context.budget;
        let granted = budget.reserve_saves(candidates.len() as u64);

        let commit: Vec<JobRecord> = candidates
            .into_iter()
            .filter(|hint| self.context.seen.insert(hint.url.clone()))
            .take(usize::try_from(granted).unwrap_or(usize::MAX))
            .map(JobRecord::from)
            .collect();

        budget.release_saves(granted - commit.len() as u64);
        Transition {
            enqueue: Vec::new(),
            commit,
        }
    }

    fn handle_detail(&self, url: &Url, hint: Option<&ListingHint>, html: &str) -> Transition {
        let budget = &self.context.budget;

        if budget.is_satisfied() {
            budget.release_details(1);
            debug!(url = %url, "Budget reached; discarding detail page");
            return Transition::default();
        }

        let document = Html::parse_document(html);
        let record = self
            .pipeline
            .detail
            .extract_detail(&document, DetailParseContext::new(url).with_hint(hint));

        // saved is bumped before the in-flight slot is returned
        let committed = budget.reserve_saves(1) == 1;
        budget.release_details(1);

        if committed {
            debug!(url = %url, saved = budget.saved(), "Saved job");
            Transition {
                enqueue: Vec::new(),
                commit: vec![record],
            }
        } else {
            debug!(url = %url, "Budget reached; discarding detail page");
            Transition::default()
        }
    }

    fn handle_failure(&self, request: &CrawlRequest, error: &FetchError) {
        match &request.label {
            RequestLabel::Detail { .. } => {
                self.context.budget.release_details(1);
                warn!(url = %request.url, "Detail request failed: {}", error);
            }
            RequestLabel::List { page } => {
                warn!(page, url = %request.url, "Results page failed; ending this chain: {}", error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawling::state::CrawlBudget;
    use crate::infrastructure::config::{MaxPages, ResultsWanted};
    use crate::infrastructure::parsing::ParsingConfig;

    fn controller(wanted: u64, max_pages: u32, mode: CrawlMode) -> FrontierController {
        let context = CrawlContext::new(
            CrawlBudget::new(ResultsWanted(Some(wanted)), MaxPages(max_pages)),
            mode,
        );
        let pipeline = ExtractionPipeline::from_config(&ParsingConfig::default()).unwrap();
        FrontierController::new(pipeline, Arc::new(context))
    }

    fn results_page(ids: &[&str]) -> String {
        let items: String = ids
            .iter()
            .map(|id| {
                format!(
                    r#"<li class="search-result"><h2><a href="/candidate/jobadvert/{id}">Job {id}</a></h2></li>"#
                )
            })
            .collect();
        format!("<html><body><ul>{items}</ul></body></html>")
    }

    fn seed() -> Url {
        Url::parse("https://www.jobs.nhs.uk/candidate/search/results?keyword=nurse").unwrap()
    }

    fn list_event(page: u32, html: String) -> RequestEvent {
        RequestEvent::ListFetched {
            request: CrawlRequest::list(seed(), page),
            html,
            api_body: None,
        }
    }

    #[test]
    fn test_seed_requests_dedupe() {
        let frontier = controller(10, 5, CrawlMode::Detail);
        let requests = frontier.seed_requests(&[seed(), seed()]);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].page(), Some(1));
    }

    #[test]
    fn test_detail_mode_schedules_within_budget() {
        let frontier = controller(2, 5, CrawlMode::Detail);
        let transition = frontier.handle(list_event(1, results_page(&["A", "B", "C"])));

        let details: Vec<_> = transition.enqueue.iter().filter(|r| !r.is_list()).collect();
        assert_eq!(details.len(), 2);
        assert!(transition.commit.is_empty());
        // budget fully reserved, so no next page
        assert!(transition.enqueue.iter().all(|r| !r.is_list()));
        assert_eq!(frontier.context().budget.in_flight_details(), 2);
        assert_eq!(frontier.context().seen.len(), 2);
    }

    #[test]
    fn test_direct_mode_commits_and_paginates() {
        let frontier = controller(10, 5, CrawlMode::DirectList);
        let transition = frontier.handle(list_event(1, results_page(&["A", "B"])));

        assert_eq!(transition.commit.len(), 2);
        assert_eq!(frontier.context().budget.saved(), 2);
        let next: Vec<_> = transition.enqueue.iter().filter(|r| r.is_list()).collect();
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].page(), Some(2));
        assert_eq!(
            next[0].url.as_str(),
            "https://www.jobs.nhs.uk/candidate/search/results?keyword=nurse&page=2"
        );
    }

    #[test]
    fn test_page_ceiling_stops_chain() {
        let frontier = controller(10, 1, CrawlMode::DirectList);
        let transition = frontier.handle(list_event(1, results_page(&["A"])));
        assert!(transition.enqueue.is_empty());
        assert_eq!(transition.commit.len(), 1);
    }

    #[test]
    fn test_empty_page_ends_chain() {
        let frontier = controller(10, 5, CrawlMode::Detail);
        let transition = frontier.handle(list_event(1, "<html><body></body></html>".to_string()));
        assert!(transition.is_empty());
        assert_eq!(frontier.context().budget.list_pages_visited(), 1);
    }

    #[test]
    fn test_seen_urls_are_not_rescheduled() {
        let frontier = controller(10, 5, CrawlMode::Detail);
        let first = frontier.handle(list_event(1, results_page(&["A", "B"])));
        assert_eq!(first.enqueue.iter().filter(|r| !r.is_list()).count(), 2);

        let second = frontier.handle(list_event(2, results_page(&["B", "C"])));
        let scheduled: Vec<_> = second
            .enqueue
            .iter()
            .filter(|r| !r.is_list())
            .map(|r| r.url.path().to_string())
            .collect();
        assert_eq!(scheduled, vec!["/candidate/jobadvert/C"]);
        assert_eq!(frontier.context().budget.in_flight_details(), 3);
    }

    #[test]
    fn test_api_results_take_precedence() {
        let frontier = controller(10, 5, CrawlMode::DirectList);
        let transition = frontier.handle(RequestEvent::ListFetched {
            request: CrawlRequest::list(seed(), 1),
            html: results_page(&["HTML-1"]),
            api_body: Some(serde_json::json!({
                "results": [{"title": "Api Job", "url": "/candidate/jobadvert/API-1"}]
            })),
        });
        assert_eq!(transition.commit.len(), 1);
        assert_eq!(transition.commit[0].title.as_deref(), Some("Api Job"));
    }

    #[test]
    fn test_detail_commit_and_release() {
        let frontier = controller(1, 5, CrawlMode::Detail);
        let list = frontier.handle(list_event(1, results_page(&["A"])));
        let request = list.enqueue.into_iter().find(|r| !r.is_list()).unwrap();

        let transition = frontier.handle(RequestEvent::DetailFetched {
            request,
            html: r#"<h1 id="heading">Staff Nurse</h1>"#.to_string(),
        });
        assert_eq!(transition.commit.len(), 1);
        assert_eq!(transition.commit[0].title.as_deref(), Some("Staff Nurse"));
        let budget = &frontier.context().budget;
        assert_eq!(budget.saved(), 1);
        assert_eq!(budget.in_flight_details(), 0);
    }

    #[test]
    fn test_detail_after_budget_filled_is_discarded() {
        let frontier = controller(2, 5, CrawlMode::Detail);
        let list = frontier.handle(list_event(1, results_page(&["A"])));
        let request = list.enqueue.into_iter().find(|r| !r.is_list()).unwrap();

        let budget = &frontier.context().budget;
        assert_eq!(budget.in_flight_details(), 1);
        assert_eq!(budget.reserve_saves(2), 2);

        let transition = frontier.handle(RequestEvent::DetailFetched {
            request,
            html: r#"<h1 id="heading">Staff Nurse</h1>"#.to_string(),
        });
        assert!(transition.is_empty());
        assert_eq!(budget.in_flight_details(), 0);
        assert_eq!(budget.saved(), 2);
    }

    #[test]
    fn test_failed_detail_releases_slot() {
        let frontier = controller(3, 5, CrawlMode::Detail);
        let list = frontier.handle(list_event(1, results_page(&["A"])));
        let request = list.enqueue.into_iter().find(|r| !r.is_list()).unwrap();
        assert_eq!(frontier.context().budget.in_flight_details(), 1);

        let transition = frontier.handle(RequestEvent::Failed {
            request,
            error: FetchError::Timeout {
                url: "https://www.jobs.nhs.uk/candidate/jobadvert/A".to_string(),
            },
        });
        assert!(transition.is_empty());
        assert_eq!(frontier.context().budget.in_flight_details(), 0);
        assert_eq!(frontier.context().budget.saved(), 0);
    }

    #[test]
    fn test_commit_failed_uncounts_record() {
        let frontier = controller(3, 5, CrawlMode::DirectList);
        let transition = frontier.handle(list_event(1, results_page(&["A"])));
        frontier.commit_failed(&transition.commit[0], &"disk full");
        assert_eq!(frontier.context().budget.saved(), 0);
    }
}
