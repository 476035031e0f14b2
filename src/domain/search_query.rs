use serde::{Deserialize, Serialize};
use url::Url;

use crate::infrastructure::config::nhs_jobs;

/// Search filters that become query parameters on the canonical results URL
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchQuery {
    pub keyword: Option<String>,
    pub location: Option<String>,
    pub distance: Option<String>,
    pub contract_type: Option<String>,
    pub working_pattern: Option<String>,
    pub staff_group: Option<String>,
    pub pay_range: Option<String>,
}

impl SearchQuery {
    /// Build the search-results URL; blank filters are left out.
    pub fn start_url(&self) -> Url {
        let mut url = nhs_jobs::search_results_url();
        {
            let mut pairs = url.query_pairs_mut();
            for (param, value) in self.params() {
                if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
                    pairs.append_pair(param, value);
                }
            }
        }
        // An empty query string would leave a dangling '?'
        if url.query() == Some("") {
            url.set_query(None);
        }
        url
    }

    fn params(&self) -> [(&'static str, Option<&str>); 7] {
        use nhs_jobs::params;
        [
            (params::KEYWORD, self.keyword.as_deref()),
            (params::LOCATION, self.location.as_deref()),
            (params::DISTANCE, self.distance.as_deref()),
            (params::CONTRACT_TYPE, self.contract_type.as_deref()),
            (params::WORKING_PATTERN, self.working_pattern.as_deref()),
            (params::STAFF_GROUP, self.staff_group.as_deref()),
            (params::PAY_RANGE, self.pay_range.as_deref()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_query_is_bare_results_url() {
        let url = SearchQuery::default().start_url();
        assert_eq!(url.as_str(), "https://www.jobs.nhs.uk/candidate/search/results");
    }

    #[test]
    fn test_filters_become_query_parameters() {
        let query = SearchQuery {
            keyword: Some(" nurse ".into()),
            location: Some("Leeds".into()),
            distance: Some("".into()),
            contract_type: Some("Permanent".into()),
            pay_range: Some("20-30".into()),
            ..SearchQuery::default()
        };
        let url = query.start_url();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert_eq!(
            pairs,
            vec![
                ("keyword".to_string(), "nurse".to_string()),
                ("location".to_string(), "Leeds".to_string()),
                ("contractType".to_string(), "Permanent".to_string()),
                ("salaryRange".to_string(), "20-30".to_string()),
            ]
        );
    }
}
