//! Parsing configuration for HTML extraction
//!
//! Selector chains are data: every field lists its extraction rules in priority order
//! and the first rule producing a non-empty normalized value wins. Defaults match the
//! NHS Jobs markup; any chain can be overridden from the config file.

use serde::{Deserialize, Serialize};

use crate::infrastructure::config::nhs_jobs::JOB_ADVERT_PATH;

/// Main parsing configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsingConfig {
    /// Search results page selectors
    pub listing: ListingSelectors,

    /// Job advert page selectors
    pub detail: DetailSelectors,

    /// "Next page" link selectors
    pub pagination: PaginationSelectors,
}

/// One way of reading a field out of an element scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldRule {
    /// Full text content of the first match
    Text { selector: String },

    /// Text nodes directly under the first match, children excluded
    OwnText { selector: String },

    /// Attribute value of the first match
    Attr { selector: String, attr: String },

    /// Attribute of the first match whose visible text contains `needle`
    AttrByText {
        selector: String,
        attr: String,
        needle: String,
    },

    /// Text of the element immediately following the first match,
    /// provided it matches `sibling`
    NextSibling { selector: String, sibling: String },

    /// First-match text of each selector, empty parts dropped, joined by `separator`
    Joined {
        selectors: Vec<String>,
        separator: String,
    },

    /// Text of the first match with the first occurrence of `pattern` (a regex) removed
    TextStripped { selector: String, pattern: String },
}

impl FieldRule {
    pub fn text(selector: &str) -> Self {
        Self::Text {
            selector: selector.to_string(),
        }
    }

    pub fn own_text(selector: &str) -> Self {
        Self::OwnText {
            selector: selector.to_string(),
        }
    }

    pub fn attr(selector: &str, attr: &str) -> Self {
        Self::Attr {
            selector: selector.to_string(),
            attr: attr.to_string(),
        }
    }

    /// Selector strings this rule depends on, for diagnostics
    pub fn selectors(&self) -> Vec<&str> {
        match self {
            Self::Text { selector }
            | Self::OwnText { selector }
            | Self::Attr { selector, .. }
            | Self::AttrByText { selector, .. }
            | Self::TextStripped { selector, .. } => vec![selector.as_str()],
            Self::NextSibling { selector, sibling } => vec![selector.as_str(), sibling.as_str()],
            Self::Joined { selectors, .. } => selectors.iter().map(String::as_str).collect(),
        }
    }
}

fn strings(selectors: &[&str]) -> Vec<String> {
    selectors.iter().map(ToString::to_string).collect()
}

/// CSS selectors for search results pages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingSelectors {
    /// Result container selectors; the first one matching anything is used
    pub containers: Vec<String>,

    /// Title link selectors, tried in order within a container
    pub title_link: Vec<String>,

    pub company: Vec<FieldRule>,
    pub location: Vec<FieldRule>,
    pub salary: Vec<FieldRule>,
    pub date_posted: Vec<FieldRule>,
    pub closing_date: Vec<FieldRule>,
    pub contract_type: Vec<FieldRule>,
    pub working_pattern: Vec<FieldRule>,

    /// Page-wide job advert anchors, used when no container yields an item
    pub fallback_links: String,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            containers: strings(&["li.search-result", "article.search-result", "div.search-result"]),
            title_link: strings(&[
                r#"[data-test="search-result-job-title"]"#,
                "h2 a",
                "h3 a",
                advert_link_selector().as_str(),
            ]),
            company: vec![
                FieldRule::own_text(r#"[data-test="search-result-location"] h3"#),
                FieldRule::text(r#"[data-test="search-result-location"]"#),
                FieldRule::text(r#"[class*="employer"]"#),
                FieldRule::text(r#"[class*="organisation"]"#),
            ],
            location: vec![
                FieldRule::text(r#"[data-test="search-result-location"] h3 .location-font-size"#),
                FieldRule::text(r#"[data-test="search-result-location"] .location-font-size"#),
                FieldRule::text(r#"[class*="location"]"#),
            ],
            salary: vec![
                FieldRule::text(r#"[data-test="search-result-salary"] strong"#),
                FieldRule::text(r#"[class*="salary"]"#),
            ],
            date_posted: vec![
                FieldRule::text(r#"[data-test="search-result-publicationDate"] strong"#),
                FieldRule::attr("time[datetime]", "datetime"),
            ],
            closing_date: vec![
                FieldRule::text(r#"[data-test="search-result-closingDate"] strong"#),
                FieldRule::text(r#"[class*="closing"]"#),
            ],
            contract_type: vec![
                FieldRule::text(r#"[data-test="search-result-jobType"] strong"#),
                FieldRule::text(r#"[data-test="search-result-contractType"] strong"#),
                FieldRule::text(r#"[class*="contract"]"#),
            ],
            working_pattern: vec![
                FieldRule::text(r#"[data-test="search-result-workingPattern"] strong"#),
                FieldRule::text(r#"[class*="working-pattern"]"#),
                FieldRule::text(r#"[class*="hours"]"#),
            ],
            fallback_links: advert_link_selector(),
        }
    }
}

/// Any anchor pointing at a job advert
fn advert_link_selector() -> String {
    format!(r#"a[href*="{JOB_ADVERT_PATH}"]"#)
}

/// CSS selectors for job advert pages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetailSelectors {
    /// Embedded structured data blocks
    pub structured_data: String,

    pub title: Vec<FieldRule>,
    pub company: Vec<FieldRule>,
    pub location: Vec<FieldRule>,
    pub salary: Vec<FieldRule>,
    pub date_posted: Vec<FieldRule>,
    pub closing_date: Vec<FieldRule>,
    pub contract_type: Vec<FieldRule>,
    pub working_pattern: Vec<FieldRule>,
    pub reference: Vec<FieldRule>,

    /// Description containers; every non-empty match contributes, in this order
    pub description: Vec<String>,
}

impl Default for DetailSelectors {
    fn default() -> Self {
        Self {
            structured_data: r#"script[type="application/ld+json"]"#.to_string(),
            title: vec![
                FieldRule::text("#heading"),
                FieldRule::text("h1"),
                FieldRule::text(r#"[class*="job-title"]"#),
            ],
            company: vec![
                FieldRule::text("#employer_name"),
                FieldRule::text(r#"[class*="employer"]"#),
                FieldRule::text(r#"[class*="organisation"]"#),
            ],
            location: vec![
                FieldRule::Joined {
                    selectors: strings(&[
                        "#employer_address_line_1",
                        "#employer_address_line_2",
                        "#employer_address_line_3",
                        "#employer_town",
                        "#employer_postcode",
                    ]),
                    separator: ", ".to_string(),
                },
                FieldRule::text(r#"[class*="location"]"#),
            ],
            salary: vec![FieldRule::text("#fixed_salary"), FieldRule::text("#salary")],
            date_posted: vec![
                FieldRule::text("#date_posted"),
                FieldRule::attr("time[datetime]", "datetime"),
            ],
            closing_date: vec![
                FieldRule::TextStripped {
                    selector: "#closing_date".to_string(),
                    pattern: r"(?i)the\s+closing\s+date\s+is".to_string(),
                },
                FieldRule::text(r#"[class*="closing-date"]"#),
            ],
            contract_type: vec![
                FieldRule::text("#contract_type"),
                FieldRule::text(r#"[class*="contract-type"]"#),
            ],
            working_pattern: vec![
                FieldRule::NextSibling {
                    selector: "#working_pattern_heading".to_string(),
                    sibling: "p".to_string(),
                },
                FieldRule::text("#working_pattern"),
                FieldRule::text(r#"[class*="working-pattern"]"#),
            ],
            reference: vec![
                FieldRule::text("#trac-job-reference"),
                FieldRule::text(r#"[class*="reference"]"#),
            ],
            description: strings(&[
                "#job_overview",
                "#job_description",
                r#"section[class*="job-description"]"#,
                r#"div[class*="job-description"]"#,
                "#job-description",
                ".description",
            ]),
        }
    }
}

/// Selectors locating the explicit "next page" link
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationSelectors {
    /// Rules yielding the raw `href` of the next-page link, in priority order
    pub next_link: Vec<FieldRule>,
}

impl Default for PaginationSelectors {
    fn default() -> Self {
        Self {
            next_link: vec![
                FieldRule::attr("a.nhsuk-pagination__link--next", "href"),
                FieldRule::attr(r#"a[rel="next"]"#, "href"),
                FieldRule::attr(r#"a[aria-label*="next" i]"#, "href"),
                FieldRule::AttrByText {
                    selector: "a[href]".to_string(),
                    attr: "href".to_string(),
                    needle: "Next".to_string(),
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_chains_are_populated() {
        let config = ParsingConfig::default();
        assert_eq!(config.listing.containers.len(), 3);
        assert_eq!(config.detail.description[1], "#job_description");
        assert_eq!(config.pagination.next_link.len(), 4);
    }

    #[test]
    fn test_rules_deserialize_from_tagged_form() {
        let rules: Vec<FieldRule> = serde_json::from_str(
            r##"[
                {"kind": "text", "selector": "h1"},
                {"kind": "attr", "selector": "time", "attr": "datetime"},
                {"kind": "joined", "selectors": ["#a", "#b"], "separator": " / "}
            ]"##,
        )
        .unwrap();
        assert_eq!(rules[0], FieldRule::text("h1"));
        assert_eq!(rules[1], FieldRule::attr("time", "datetime"));
        assert_eq!(rules[2].selectors(), vec!["#a", "#b"]);
    }

    #[test]
    fn test_partial_override_keeps_other_defaults() {
        let config: ParsingConfig =
            serde_json::from_str(r#"{"listing": {"containers": ["div.job"]}}"#).unwrap();
        assert_eq!(config.listing.containers, vec!["div.job".to_string()]);
        assert_eq!(config.listing.title_link.len(), 4);
        assert!(!config.detail.title.is_empty());
    }
}
