//! # Crawl Request Definitions
//!
//! Requests flowing through the work queue, the events a worker reports back to the
//! frontier once a request has been fetched, and the transition the frontier answers with.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::domain::{JobRecord, ListingHint};
use crate::infrastructure::http_client::FetchError;

/// Unique identifier for a crawl request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(Uuid);

impl RequestId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a request is for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestLabel {
    /// Search results page `page` (1-based) of a seed chain
    List { page: u32 },
    /// Job advert page, with whatever the listing showed about it
    Detail { hint: Option<ListingHint> },
}

/// One unit of work in the queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlRequest {
    pub id: RequestId,
    pub url: Url,
    pub label: RequestLabel,
}

impl CrawlRequest {
    pub fn list(url: Url, page: u32) -> Self {
        Self {
            id: RequestId::new(),
            url,
            label: RequestLabel::List { page },
        }
    }

    pub fn detail(url: Url, hint: Option<ListingHint>) -> Self {
        Self {
            id: RequestId::new(),
            url,
            label: RequestLabel::Detail { hint },
        }
    }

    /// Short request kind for logs
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self.label {
            RequestLabel::List { .. } => "list",
            RequestLabel::Detail { .. } => "detail",
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self.label, RequestLabel::List { .. })
    }

    pub fn page(&self) -> Option<u32> {
        match self.label {
            RequestLabel::List { page } => Some(page),
            RequestLabel::Detail { .. } => None,
        }
    }
}

/// Outcome of fetching a request, reported to the frontier
#[derive(Debug)]
pub enum RequestEvent {
    /// Results page HTML, plus the JSON API body for the same page when it was available
    ListFetched {
        request: CrawlRequest,
        html: String,
        api_body: Option<serde_json::Value>,
    },
    DetailFetched {
        request: CrawlRequest,
        html: String,
    },
    Failed {
        request: CrawlRequest,
        error: FetchError,
    },
}

impl RequestEvent {
    pub fn request(&self) -> &CrawlRequest {
        match self {
            Self::ListFetched { request, .. }
            | Self::DetailFetched { request, .. }
            | Self::Failed { request, .. } => request,
        }
    }
}

/// Follow-up work and finished records produced by handling one event
#[derive(Debug, Default)]
pub struct Transition {
    pub enqueue: Vec<CrawlRequest>,
    pub commit: Vec<JobRecord>,
}

impl Transition {
    pub fn is_empty(&self) -> bool {
        self.enqueue.is_empty() && self.commit.is_empty()
    }
}
