//! Configuration infrastructure
//!
//! Contains the NHS Jobs site constants, crawl input parsing and configuration loading.
//!
//! Configuration is layered:
//! 1. Built-in defaults (every section is `#[serde(default)]`)
//! 2. Optional config file (TOML/JSON/YAML, picked by extension)
//! 3. Environment variables prefixed with `NHSJOBS` (e.g. `NHSJOBS__INPUT__RESULTS_WANTED=20`)

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::domain::SearchQuery;
use crate::infrastructure::http_client::HttpClientConfig;
use crate::infrastructure::parsing::ParsingConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {source}")]
    Load {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// What to crawl and how much of it
    pub input: CrawlInput,

    /// Worker pool settings
    pub crawler: CrawlerSettings,

    /// HTTP fetcher settings
    pub http: HttpClientConfig,

    /// Selector chains for listing and detail pages
    pub parsing: ParsingConfig,

    /// Where finished records go
    pub output: OutputConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from an optional file plus `NHSJOBS` environment overrides.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            info!("Loading configuration from {}", path);
            builder = builder.add_source(config::File::with_name(path));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("input.start_urls"),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.crawler.max_concurrency == 0 {
            return Err(ConfigError::Validation {
                message: "crawler.max_concurrency must be greater than 0".to_string(),
            });
        }
        if self.http.max_requests_per_second == 0 {
            return Err(ConfigError::Validation {
                message: "http.max_requests_per_second must be greater than 0".to_string(),
            });
        }
        if self.http.timeout_seconds == 0 {
            return Err(ConfigError::Validation {
                message: "http.timeout_seconds must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "NHSJOBS";

/// Crawl input: seeds plus budget
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlInput {
    /// Filters used to build the seed when no explicit URL is given
    pub query: SearchQuery,

    /// Explicit listing URLs to start from
    pub start_urls: Vec<String>,
    pub start_url: Option<String>,
    pub url: Option<String>,

    /// Target record count
    pub results_wanted: ResultsWanted,

    /// Listing page ceiling per seed chain
    pub max_pages: MaxPages,

    /// Visit detail pages (true) or commit listing records directly (false)
    pub collect_details: bool,
}

impl Default for CrawlInput {
    fn default() -> Self {
        Self {
            query: SearchQuery::default(),
            start_urls: Vec::new(),
            start_url: None,
            url: None,
            results_wanted: ResultsWanted::default(),
            max_pages: MaxPages::default(),
            collect_details: defaults::COLLECT_DETAILS,
        }
    }
}

impl CrawlInput {
    /// Seed URLs: explicit start URLs if any parse, otherwise the search query URL.
    pub fn seed_urls(&self) -> Vec<Url> {
        let explicit = self
            .start_urls
            .iter()
            .chain(self.start_url.iter())
            .chain(self.url.iter());

        let mut seeds = Vec::new();
        for raw in explicit {
            match Url::parse(raw.trim()) {
                Ok(url) => seeds.push(url),
                Err(e) => warn!("Ignoring invalid start URL '{}': {}", raw, e),
            }
        }

        if seeds.is_empty() {
            seeds.push(self.query.start_url());
        }
        seeds
    }
}

/// Result budget; `None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultsWanted(pub Option<u64>);

impl ResultsWanted {
    pub const UNBOUNDED: Self = Self(None);

    /// Budget as a counter limit (`u64::MAX` when unbounded)
    pub fn limit(self) -> u64 {
        self.0.unwrap_or(u64::MAX)
    }

    fn from_raw(raw: f64) -> Self {
        if raw.is_finite() {
            // Saturating float→int cast; anything below one still asks for one result
            Self(Some((raw.floor() as u64).max(1)))
        } else {
            Self::UNBOUNDED
        }
    }
}

impl Default for ResultsWanted {
    fn default() -> Self {
        Self(Some(defaults::RESULTS_WANTED))
    }
}

/// Listing page ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxPages(pub u32);

impl MaxPages {
    fn from_raw(raw: f64) -> Self {
        if raw.is_finite() {
            Self((raw.floor() as u32).max(1))
        } else {
            Self::default()
        }
    }
}

impl Default for MaxPages {
    fn default() -> Self {
        Self(defaults::MAX_PAGES)
    }
}

/// Numbers arrive as integers, floats or strings depending on the source layer
#[derive(Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Int(i64),
    Float(f64),
    Text(String),
}

impl RawNumber {
    fn as_f64(&self) -> f64 {
        match self {
            Self::Int(v) => *v as f64,
            Self::Float(v) => *v,
            Self::Text(s) => s.trim().parse().unwrap_or(f64::NAN),
        }
    }
}

impl<'de> Deserialize<'de> for ResultsWanted {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawNumber::deserialize(deserializer).map(|raw| Self::from_raw(raw.as_f64()))
    }
}

impl Serialize for ResultsWanted {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Some(n) => serializer.serialize_u64(n),
            None => serializer.serialize_str("unlimited"),
        }
    }
}

impl fmt::Display for ResultsWanted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(n) => write!(f, "{n}"),
            None => f.write_str("unlimited"),
        }
    }
}

impl<'de> Deserialize<'de> for MaxPages {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawNumber::deserialize(deserializer).map(|raw| Self::from_raw(raw.as_f64()))
    }
}

impl Serialize for MaxPages {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.0)
    }
}

/// Worker pool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerSettings {
    /// Number of concurrent request workers
    pub max_concurrency: usize,

    /// Idle poll interval for workers waiting on the queue
    pub queue_check_interval_ms: u64,
}

impl Default for CrawlerSettings {
    fn default() -> Self {
        Self {
            max_concurrency: defaults::MAX_CONCURRENCY,
            queue_check_interval_ms: defaults::QUEUE_CHECK_INTERVAL_MS,
        }
    }
}

/// Output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// JSON-lines file receiving one record per line
    pub path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(defaults::OUTPUT_PATH),
        }
    }
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted logs
    pub json_format: bool,

    /// Enable console output
    pub console_output: bool,

    /// Enable file output
    pub file_output: bool,

    /// Directory for log files (defaults to ./logs)
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: false,
            console_output: true,
            file_output: false,
            log_dir: None,
        }
    }
}

/// NHS Jobs site constants
pub mod nhs_jobs {
    use url::Url;

    /// Canonical search results page
    pub const SEARCH_RESULTS_URL: &str = "https://www.jobs.nhs.uk/candidate/search/results";

    /// Path fragment shared by every job advert (detail page)
    pub const JOB_ADVERT_PATH: &str = "/candidate/jobadvert/";

    /// Query parameter carrying the listing page number
    pub const PAGE_PARAM: &str = "page";

    /// Browser-like user agent the site expects
    pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

    pub const ACCEPT_LANGUAGE: &str = "en-GB,en;q=0.9";

    /// Search filter query parameter names
    pub mod params {
        pub const KEYWORD: &str = "keyword";
        pub const LOCATION: &str = "location";
        pub const DISTANCE: &str = "distance";
        pub const CONTRACT_TYPE: &str = "contractType";
        pub const WORKING_PATTERN: &str = "workingPattern";
        pub const STAFF_GROUP: &str = "staffGroup";
        pub const PAY_RANGE: &str = "salaryRange";
    }

    #[allow(clippy::missing_panics_doc)]
    pub fn search_results_url() -> Url {
        Url::parse(SEARCH_RESULTS_URL).expect("SEARCH_RESULTS_URL is a valid URL")
    }
}

/// Default values
pub mod defaults {
    /// Default target record count
    pub const RESULTS_WANTED: u64 = 100;

    /// Default listing page ceiling
    pub const MAX_PAGES: u32 = 50;

    /// Detail collection is on unless disabled
    pub const COLLECT_DETAILS: bool = true;

    /// Default number of concurrent request workers
    pub const MAX_CONCURRENCY: usize = 6;

    /// Default idle poll interval in milliseconds
    pub const QUEUE_CHECK_INTERVAL_MS: u64 = 50;

    /// Default request timeout in seconds
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 90;

    /// Default retry attempts for failed requests
    pub const MAX_REQUEST_RETRIES: u32 = 3;

    /// Default base retry delay in milliseconds
    pub const RETRY_BASE_DELAY_MS: u64 = 1000;

    /// Default request rate ceiling
    pub const MAX_REQUESTS_PER_SECOND: u32 = 7;

    /// Default output file
    pub const OUTPUT_PATH: &str = "jobs.jsonl";

    /// Default log level
    pub const LOG_LEVEL: &str = "info";
}
