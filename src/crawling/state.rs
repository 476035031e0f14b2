//! # Shared Crawl State
//!
//! Budget accounting and URL de-duplication shared by every worker of one crawl.
//! Nothing here is global: each crawl owns its [`CrawlContext`].

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use url::Url;

use crate::infrastructure::config::{CrawlInput, MaxPages, ResultsWanted};

/// Whether listing items are followed to their detail pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlMode {
    /// Schedule a DETAIL request per listing item
    Detail,
    /// Commit listing-only records straight from results pages
    DirectList,
}

impl CrawlMode {
    pub fn from_collect_details(collect_details: bool) -> Self {
        if collect_details { Self::Detail } else { Self::DirectList }
    }
}

/// Result budget shared across workers.
///
/// Invariant: `saved + in_flight_details <= wanted` after every admission decision.
/// Reservations are compare-and-swap loops so concurrent handlers cannot both claim
/// the last slot. A DETAIL commit bumps `saved` before releasing its in-flight slot,
/// so the sum is never under-counted in between.
#[derive(Debug)]
pub struct CrawlBudget {
    wanted: u64,
    max_pages: u32,
    saved: AtomicU64,
    in_flight_details: AtomicU64,
    details_scheduled: AtomicU64,
    list_pages_visited: AtomicU64,
}

impl CrawlBudget {
    pub fn new(wanted: ResultsWanted, max_pages: MaxPages) -> Self {
        Self {
            wanted: wanted.limit(),
            max_pages: max_pages.0.max(1),
            saved: AtomicU64::new(0),
            in_flight_details: AtomicU64::new(0),
            details_scheduled: AtomicU64::new(0),
            list_pages_visited: AtomicU64::new(0),
        }
    }

    pub fn wanted(&self) -> u64 {
        self.wanted
    }

    pub fn max_pages(&self) -> u32 {
        self.max_pages
    }

    pub fn saved(&self) -> u64 {
        self.saved.load(Ordering::SeqCst)
    }

    pub fn in_flight_details(&self) -> u64 {
        self.in_flight_details.load(Ordering::SeqCst)
    }

    pub fn details_scheduled(&self) -> u64 {
        self.details_scheduled.load(Ordering::SeqCst)
    }

    pub fn list_pages_visited(&self) -> u64 {
        self.list_pages_visited.load(Ordering::SeqCst)
    }

    /// Slots not yet committed or promised to a detail request
    pub fn remaining(&self) -> u64 {
        self.wanted
            .saturating_sub(self.saved().saturating_add(self.in_flight_details()))
    }

    pub fn is_satisfied(&self) -> bool {
        self.saved() >= self.wanted
    }

    /// Listing page `page` may schedule its successor
    pub fn should_paginate(&self, page: u32) -> bool {
        self.remaining() > 0 && page < self.max_pages
    }

    pub fn record_list_page(&self) -> u64 {
        self.list_pages_visited.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Reserve up to `requested` detail slots; returns how many were granted.
    pub fn reserve_details(&self, requested: u64) -> u64 {
        let mut in_flight = self.in_flight_details.load(Ordering::SeqCst);
        loop {
            let room = self
                .wanted
                .saturating_sub(self.saved().saturating_add(in_flight));
            let grant = room.min(requested);
            if grant == 0 {
                return 0;
            }
            match self.in_flight_details.compare_exchange(
                in_flight,
                in_flight + grant,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return grant,
                Err(current) => in_flight = current,
            }
        }
    }

    /// Return detail slots that were reserved but not used, or whose request finished
    pub fn release_details(&self, count: u64) {
        if count == 0 {
            return;
        }
        let _ = self
            .in_flight_details
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_sub(count)));
    }

    /// Count `count` scheduled detail requests
    pub fn record_details_scheduled(&self, count: u64) {
        self.details_scheduled.fetch_add(count, Ordering::SeqCst);
    }

    /// Reserve up to `requested` commits directly on `saved`; returns the grant.
    pub fn reserve_saves(&self, requested: u64) -> u64 {
        let mut saved = self.saved.load(Ordering::SeqCst);
        loop {
            let grant = self.wanted.saturating_sub(saved).min(requested);
            if grant == 0 {
                return 0;
            }
            match self
                .saved
                .compare_exchange(saved, saved + grant, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return grant,
                Err(current) => saved = current,
            }
        }
    }

    /// Un-count commits that were reserved but not delivered
    pub fn release_saves(&self, count: u64) {
        if count == 0 {
            return;
        }
        let _ = self
            .saved
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_sub(count)));
    }
}

/// Set of URLs admitted into the crawl. Monotonic: URLs are never removed.
#[derive(Debug, Default)]
pub struct SeenSet {
    urls: Mutex<HashSet<Url>>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `url`; true when it was not present before
    pub fn insert(&self, url: Url) -> bool {
        self.urls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url)
    }

    pub fn contains(&self, url: &Url) -> bool {
        self.urls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(url)
    }

    pub fn len(&self) -> usize {
        self.urls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything one crawl shares between its workers
#[derive(Debug)]
pub struct CrawlContext {
    pub budget: CrawlBudget,
    pub seen: SeenSet,
    pub mode: CrawlMode,
}

impl CrawlContext {
    pub fn new(budget: CrawlBudget, mode: CrawlMode) -> Self {
        Self {
            budget,
            seen: SeenSet::new(),
            mode,
        }
    }

    pub fn from_input(input: &CrawlInput) -> Self {
        Self::new(
            CrawlBudget::new(input.results_wanted, input.max_pages),
            CrawlMode::from_collect_details(input.collect_details),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn budget(wanted: u64) -> CrawlBudget {
        CrawlBudget::new(ResultsWanted(Some(wanted)), MaxPages(3))
    }

    #[test]
    fn test_detail_reservations_respect_budget() {
        let budget = budget(5);
        assert_eq!(budget.reserve_details(3), 3);
        assert_eq!(budget.reserve_details(3), 2);
        assert_eq!(budget.reserve_details(1), 0);
        assert_eq!(budget.remaining(), 0);

        budget.release_details(2);
        assert_eq!(budget.in_flight_details(), 3);
        assert_eq!(budget.remaining(), 2);
    }

    #[test]
    fn test_save_reservations() {
        let budget = budget(2);
        assert_eq!(budget.reserve_saves(3), 2);
        assert!(budget.is_satisfied());
        budget.release_saves(1);
        assert_eq!(budget.saved(), 1);
        assert!(!budget.is_satisfied());
    }

    #[test]
    fn test_unbounded_budget() {
        let budget = CrawlBudget::new(ResultsWanted::UNBOUNDED, MaxPages(1));
        assert_eq!(budget.reserve_details(1_000), 1_000);
        assert!(budget.remaining() > 0);
        assert!(!budget.should_paginate(1));
    }

    #[test]
    fn test_should_paginate() {
        let budget = budget(2);
        assert!(budget.should_paginate(1));
        assert!(!budget.should_paginate(3));
        budget.reserve_details(2);
        assert!(!budget.should_paginate(1));
    }

    #[test]
    fn test_concurrent_reservations_never_exceed_wanted() {
        let budget = Arc::new(budget(50));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let budget = Arc::clone(&budget);
                std::thread::spawn(move || (0..20).map(|_| budget.reserve_details(1)).sum::<u64>())
            })
            .collect();
        let granted: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(granted, 50);
        assert_eq!(budget.in_flight_details(), 50);
    }

    #[test]
    fn test_seen_set_insert_reports_novelty() {
        let seen = SeenSet::new();
        let url = Url::parse("https://www.jobs.nhs.uk/candidate/jobadvert/X").unwrap();
        assert!(seen.insert(url.clone()));
        assert!(!seen.insert(url.clone()));
        assert!(seen.contains(&url));
        assert_eq!(seen.len(), 1);
    }
}
