//! Search results JSON API mapping
//!
//! The listing endpoint answers `Accept: application/json` requests with a `results`
//! array whose key names vary between deployments, so each field is read from a list of
//! candidate keys.

use std::collections::HashSet;

use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use super::normalizer::normalize;
use super::structured_data::scalar_text;
use super::{ParsingError, ParsingResult, resolve_url};
use crate::domain::ListingHint;

const TITLE_KEYS: &[&str] = &["title"];
const COMPANY_KEYS: &[&str] = &["employer", "organisation", "company"];
const LOCATION_KEYS: &[&str] = &["location", "jobLocation"];
const SALARY_KEYS: &[&str] = &["salary", "payRange"];
const CONTRACT_TYPE_KEYS: &[&str] = &["contractType", "contract"];
const WORKING_PATTERN_KEYS: &[&str] = &["workingPattern", "workingHours"];
const DATE_POSTED_KEYS: &[&str] = &["datePosted", "postedDate"];
const CLOSING_DATE_KEYS: &[&str] = &["closingDate", "deadline"];
const REFERENCE_KEYS: &[&str] = &["reference", "jobReference", "referenceNumber"];
const URL_KEYS: &[&str] = &["url", "link", "jobUrl", "href"];

/// First key holding a non-empty normalized scalar
fn first_value(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| item.get(*key))
        .find_map(|value| normalize(scalar_text(value).as_deref()))
}

/// Map an API body to listing hints.
///
/// Fails with [`ParsingError::EmptyApiResponse`] when the body carries no usable result;
/// callers then fall back to the HTML page. Results whose link cannot be resolved
/// against `page_url` are dropped individually.
pub fn map_api_results(body: &Value, page_url: &Url) -> ParsingResult<Vec<ListingHint>> {
    let results = body
        .get("results")
        .and_then(Value::as_array)
        .filter(|results| !results.is_empty())
        .ok_or_else(|| ParsingError::EmptyApiResponse {
            reason: "no non-empty `results` array".to_string(),
        })?;

    let mut page_seen = HashSet::new();
    let mut hints = Vec::with_capacity(results.len());

    for (index, item) in results.iter().enumerate() {
        let Some(href) = URL_KEYS
            .iter()
            .filter_map(|key| item.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .find(|href| !href.is_empty())
        else {
            debug!(index, "API result has no link, skipping");
            continue;
        };

        let url = match resolve_url(href, page_url) {
            Ok(url) => url,
            Err(e) => {
                warn!(index, "Skipping API result: {}", e);
                continue;
            }
        };
        if !page_seen.insert(url.clone()) {
            continue;
        }

        hints.push(ListingHint {
            title: first_value(item, TITLE_KEYS),
            company: first_value(item, COMPANY_KEYS),
            location: first_value(item, LOCATION_KEYS),
            salary: first_value(item, SALARY_KEYS),
            contract_type: first_value(item, CONTRACT_TYPE_KEYS),
            working_pattern: first_value(item, WORKING_PATTERN_KEYS),
            date_posted: first_value(item, DATE_POSTED_KEYS),
            closing_date: first_value(item, CLOSING_DATE_KEYS),
            reference: first_value(item, REFERENCE_KEYS),
            url,
        });
    }

    if hints.is_empty() {
        return Err(ParsingError::EmptyApiResponse {
            reason: format!("none of {} results carried a usable link", results.len()),
        });
    }
    Ok(hints)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page_url() -> Url {
        Url::parse("https://www.jobs.nhs.uk/candidate/search/results?keyword=nurse&page=2").unwrap()
    }

    #[test]
    fn test_maps_alternate_keys_and_normalizes() {
        let body = json!({
            "results": [
                {
                    "title": "Staff Nurse Staff Nurse",
                    "organisation": "  Leeds   Teaching Hospitals ",
                    "jobLocation": "Leeds",
                    "payRange": "£28,407 to £34,581",
                    "contract": "Permanent",
                    "workingHours": "Full-time Full-time",
                    "postedDate": "1 May 2025",
                    "deadline": "30 May 2025",
                    "referenceNumber": 1234567,
                    "jobUrl": "/candidate/jobadvert/C9-1"
                }
            ]
        });
        let hints = map_api_results(&body, &page_url()).unwrap();
        assert_eq!(hints.len(), 1);
        let hint = &hints[0];
        assert_eq!(hint.title.as_deref(), Some("Staff Nurse"));
        assert_eq!(hint.company.as_deref(), Some("Leeds Teaching Hospitals"));
        assert_eq!(hint.working_pattern.as_deref(), Some("Full-time"));
        assert_eq!(hint.reference.as_deref(), Some("1234567"));
        assert_eq!(hint.url.as_str(), "https://www.jobs.nhs.uk/candidate/jobadvert/C9-1");
    }

    #[test]
    fn test_empty_or_missing_results_fall_back() {
        for body in [json!({}), json!({"results": []}), json!({"results": "x"}), json!([1, 2])] {
            assert!(matches!(
                map_api_results(&body, &page_url()),
                Err(ParsingError::EmptyApiResponse { .. })
            ));
        }
    }

    #[test]
    fn test_items_without_usable_link_are_dropped() {
        let body = json!({
            "results": [
                {"title": "No link"},
                {"title": "Bad link", "url": "http://[::1"},
                {"title": "Kept", "href": "https://www.jobs.nhs.uk/candidate/jobadvert/C9-2"},
                {"title": "Duplicate", "link": "/candidate/jobadvert/C9-2"}
            ]
        });
        let hints = map_api_results(&body, &page_url()).unwrap();
        assert_eq!(hints.len(), 1);
        assert_eq!(hints[0].title.as_deref(), Some("Kept"));
    }
}
