//! Parsing error types
//!
//! None of these abort a crawl: the frontier logs them and drops the offending
//! item, block or request.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParsingError {
    #[error("Invalid CSS selector: {selector} - {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("No valid selectors compiled for '{field}'. Errors: {errors}")]
    NoValidSelectors { field: String, errors: String },

    #[error("Invalid pattern for '{field}': {reason}")]
    InvalidPattern { field: String, reason: String },

    #[error("URL resolution failed: {url} - {reason}")]
    UrlResolutionFailed {
        url: String,
        reason: String,
        base_url: Option<String>,
    },

    #[error("Structured data block {index} is malformed: {reason}")]
    MalformedStructuredData { index: usize, reason: String },

    #[error("API response has no usable results: {reason}")]
    EmptyApiResponse { reason: String },
}

impl ParsingError {
    /// Create an invalid selector error
    pub fn invalid_selector(selector: &str, reason: impl ToString) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a URL resolution error
    pub fn url_resolution_failed(url: &str, reason: impl ToString, base_url: Option<&str>) -> Self {
        Self::UrlResolutionFailed {
            url: url.to_string(),
            reason: reason.to_string(),
            base_url: base_url.map(ToString::to_string),
        }
    }

    /// Configuration problems are fixed by the operator, not by retrying or skipping
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidSelector { .. } | Self::NoValidSelectors { .. } | Self::InvalidPattern { .. }
        )
    }
}

pub type ParsingResult<T> = Result<T, ParsingError>;
