//! Embedded JSON-LD job postings
//!
//! Detail pages may carry `<script type="application/ld+json">` blocks describing the
//! posting. The first `JobPosting` object found (top-level, inside an array, or inside an
//! `@graph`) takes precedence over the page markup for the fields it provides.

use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

use super::normalizer::normalize;
use super::ParsingError;

const JOB_POSTING_TYPE: &str = "JobPosting";

/// Fields read from a `JobPosting` object, already normalized
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructuredPosting {
    pub title: Option<String>,
    pub company: Option<String>,
    pub date_posted: Option<String>,
    pub location: Option<String>,
    pub salary: Option<String>,
    pub employment_type: Option<String>,
    pub valid_through: Option<String>,
    /// Raw description markup; not normalized
    pub description_html: Option<String>,
}

/// Scan every structured-data block in document order for a job posting.
///
/// Blocks that fail to parse are logged at debug and skipped.
pub fn find_job_posting(html: &Html, blocks: &Selector) -> Option<StructuredPosting> {
    for (index, block) in html.select(blocks).enumerate() {
        let raw: String = block.text().collect();
        let value = match serde_json::from_str::<Value>(raw.trim()) {
            Ok(value) => value,
            Err(e) => {
                let err = ParsingError::MalformedStructuredData {
                    index,
                    reason: e.to_string(),
                };
                debug!("Skipping structured data block: {}", err);
                continue;
            }
        };

        if let Some(posting) = candidates(&value).into_iter().find(|v| is_job_posting(v)) {
            debug!(block = index, "Found JobPosting structured data");
            return Some(map_posting(posting));
        }
    }
    None
}

/// Objects a block may describe: itself, array members, and `@graph` members
fn candidates(value: &Value) -> Vec<&Value> {
    let mut found = Vec::new();
    match value {
        Value::Array(items) => {
            for item in items {
                found.extend(candidates(item));
            }
        }
        Value::Object(map) => {
            found.push(value);
            if let Some(Value::Array(graph)) = map.get("@graph") {
                found.extend(graph.iter().filter(|v| v.is_object()));
            }
        }
        _ => {}
    }
    found
}

fn is_job_posting(value: &Value) -> bool {
    let declared = value.get("@type").or_else(|| value.get("type"));
    match declared {
        Some(Value::String(t)) => t == JOB_POSTING_TYPE,
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some(JOB_POSTING_TYPE)),
        _ => false,
    }
}

/// Scalar as text: strings as-is, numbers in their JSON form, arrays of scalars joined
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(scalar_text).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        _ => None,
    }
}

fn field(value: Option<&Value>) -> Option<String> {
    normalize(value.and_then(scalar_text).as_deref())
}

fn map_posting(posting: &Value) -> StructuredPosting {
    let description_html = posting
        .get("description")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(ToString::to_string);

    StructuredPosting {
        title: field(posting.get("title")).or_else(|| field(posting.get("name"))),
        company: organisation(posting.get("hiringOrganization")),
        date_posted: field(posting.get("datePosted")),
        location: location(posting.get("jobLocation")),
        salary: salary(posting.get("baseSalary")),
        employment_type: field(posting.get("employmentType")),
        valid_through: field(posting.get("validThrough")).or_else(|| field(posting.get("expires"))),
        description_html,
    }
}

fn organisation(value: Option<&Value>) -> Option<String> {
    let org = value?;
    if org.is_object() {
        field(org.get("name"))
    } else {
        field(Some(org))
    }
}

/// Address parts (locality, region, postcode) joined, else the place name
fn location(value: Option<&Value>) -> Option<String> {
    let place = match value? {
        Value::Array(places) => places.first()?,
        other => other,
    };
    if !place.is_object() {
        return field(Some(place));
    }

    match place.get("address") {
        Some(address @ Value::Object(_)) => {
            let parts: Vec<String> = ["addressLocality", "addressRegion", "postalCode"]
                .iter()
                .filter_map(|key| field(address.get(*key)))
                .collect();
            if parts.is_empty() {
                field(place.get("name"))
            } else {
                Some(parts.join(", "))
            }
        }
        Some(address) => field(Some(address)).or_else(|| field(place.get("name"))),
        None => field(place.get("name")),
    }
}

/// `baseSalary.value.value`, else "min to max currency", else any scalar form
fn salary(value: Option<&Value>) -> Option<String> {
    let base = value?;
    if !base.is_object() {
        return field(Some(base));
    }

    let amount = base.get("value");
    if let Some(exact) = field(amount.and_then(|a| a.get("value"))) {
        return Some(exact);
    }

    let range = amount.and_then(|a| {
        let min = scalar_text(a.get("minValue")?)?;
        let max = scalar_text(a.get("maxValue")?)?;
        let currency = base
            .get("currency")
            .or_else(|| a.get("currency"))
            .and_then(scalar_text)
            .unwrap_or_default();
        normalize(Some(&format!("{min} to {max} {currency}")))
    });

    range.or_else(|| amount.filter(|a| !a.is_object()).and_then(|a| field(Some(a))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocks() -> Selector {
        Selector::parse(r#"script[type="application/ld+json"]"#).unwrap()
    }

    fn page(blocks: &[&str]) -> Html {
        let scripts: String = blocks
            .iter()
            .map(|b| format!(r#"<script type="application/ld+json">{b}</script>"#))
            .collect();
        Html::parse_document(&format!("<html><head>{scripts}</head><body></body></html>"))
    }

    #[test]
    fn test_malformed_block_is_skipped() {
        let html = page(&[
            "{ not json",
            r#"{"@type": "JobPosting", "title": "Porter Porter", "hiringOrganization": {"name": "Barts Health"}}"#,
        ]);
        let posting = find_job_posting(&html, &blocks()).unwrap();
        assert_eq!(posting.title.as_deref(), Some("Porter"));
        assert_eq!(posting.company.as_deref(), Some("Barts Health"));
    }

    #[test]
    fn test_graph_and_array_forms() {
        let html = page(&[
            r#"[{"@type": "Organization", "name": "x"}]"#,
            r#"{"@context": "https://schema.org", "@graph": [
                {"@type": "WebPage"},
                {"@type": ["JobPosting"], "title": "Midwife", "datePosted": "2025-05-01",
                 "validThrough": "2025-06-01T23:59",
                 "employmentType": ["FULL_TIME", "PART_TIME"],
                 "description": "  <p>Deliver care</p> "}
            ]}"#,
        ]);
        let posting = find_job_posting(&html, &blocks()).unwrap();
        assert_eq!(posting.title.as_deref(), Some("Midwife"));
        assert_eq!(posting.employment_type.as_deref(), Some("FULL_TIME, PART_TIME"));
        assert_eq!(posting.valid_through.as_deref(), Some("2025-06-01T23:59"));
        assert_eq!(posting.description_html.as_deref(), Some("<p>Deliver care</p>"));
    }

    #[test]
    fn test_location_and_salary_shapes() {
        let html = page(&[r#"{
            "@type": "JobPosting",
            "jobLocation": [{"@type": "Place", "address": {"addressLocality": "Leeds", "postalCode": "LS1 3EX"}}],
            "baseSalary": {"currency": "GBP", "value": {"minValue": 28407, "maxValue": 34581, "unitText": "YEAR"}}
        }"#]);
        let posting = find_job_posting(&html, &blocks()).unwrap();
        assert_eq!(posting.location.as_deref(), Some("Leeds, LS1 3EX"));
        assert_eq!(posting.salary.as_deref(), Some("28407 to 34581 GBP"));

        let html = page(&[r#"{"@type": "JobPosting", "baseSalary": {"value": {"value": "£12.45 an hour"}}}"#]);
        let posting = find_job_posting(&html, &blocks()).unwrap();
        assert_eq!(posting.salary.as_deref(), Some("£12.45 an hour"));
        assert_eq!(posting.location, None);
    }

    #[test]
    fn test_name_and_expires_fallbacks() {
        let html = page(&[r#"{"@type": "JobPosting", "name": "Ward Clerk", "expires": "2025-09-01"}"#]);
        let posting = find_job_posting(&html, &blocks()).unwrap();
        assert_eq!(posting.title.as_deref(), Some("Ward Clerk"));
        assert_eq!(posting.valid_through.as_deref(), Some("2025-09-01"));

        let html = page(&[r#"{"@type": "JobPosting", "title": "Porter", "name": "ignored",
            "validThrough": "2025-06-30", "expires": "2025-12-31"}"#]);
        let posting = find_job_posting(&html, &blocks()).unwrap();
        assert_eq!(posting.title.as_deref(), Some("Porter"));
        assert_eq!(posting.valid_through.as_deref(), Some("2025-06-30"));
    }

    #[test]
    fn test_no_job_posting() {
        let html = page(&[r#"{"@type": "Organization", "name": "NHS"}"#]);
        assert_eq!(find_job_posting(&html, &blocks()), None);
    }
}
