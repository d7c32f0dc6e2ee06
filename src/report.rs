//! Report data model and summary rollup.
//!
//! Field names are part of the serialized contract and must not change.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::mapping::CANONICAL_VERBS;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiReport {
    pub war_file_name: String,
    /// ISO-8601 timestamp of the analysis run.
    pub analysis_date: String,
    pub total_apis: usize,
    pub analysis_summary: AnalysisSummary,
    pub apis: Vec<ApiEndpoint>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub state_altering_apis: usize,
    pub read_only_apis: usize,
    pub validated_apis: usize,
    pub controller_classes: usize,
    pub http_methods_distribution: HttpMethodDistribution,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpMethodDistribution {
    #[serde(rename = "GET")]
    pub get: usize,
    #[serde(rename = "POST")]
    pub post: usize,
    #[serde(rename = "PUT")]
    pub put: usize,
    #[serde(rename = "DELETE")]
    pub delete: usize,
    #[serde(rename = "PATCH")]
    pub patch: usize,
    #[serde(rename = "OPTIONS")]
    pub options: usize,
    #[serde(rename = "HEAD")]
    pub head: usize,
}

impl HttpMethodDistribution {
    pub fn increment(&mut self, verb: &str) {
        match verb {
            "GET" => self.get += 1,
            "POST" => self.post += 1,
            "PUT" => self.put += 1,
            "DELETE" => self.delete += 1,
            "PATCH" => self.patch += 1,
            "OPTIONS" => self.options += 1,
            "HEAD" => self.head += 1,
            _ => {}
        }
    }

    pub fn total(&self) -> usize {
        self.get + self.post + self.put + self.delete + self.patch + self.options + self.head
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEndpoint {
    pub api_url: String,
    pub http_method: String,
    /// Dotted FQN of the declaring controller class.
    pub controller_class: String,
    pub controller_method: String,
    pub alters_state: bool,
    pub validation: Vec<String>,
    pub method_details: MethodDetails,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MethodDetails {
    pub return_type: String,
    pub parameter_types: Vec<String>,
    pub annotations: Vec<String>,
    pub transaction_attributes: TransactionAttributes,
    pub produces: Vec<String>,
    pub consumes: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionAttributes {
    pub is_transactional: bool,
    pub read_only: bool,
}

impl ApiReport {
    /// Assembles the final report: endpoint list in emission order plus the
    /// summary rollup. `state_altering + read_only` always equals the total;
    /// the verb histogram covers the seven canonical verbs.
    pub fn assemble(war_file_name: impl Into<String>, apis: Vec<ApiEndpoint>) -> Self {
        let mut summary = AnalysisSummary::default();
        let mut controllers: Vec<&str> = Vec::new();

        for endpoint in &apis {
            if endpoint.alters_state {
                summary.state_altering_apis += 1;
            } else {
                summary.read_only_apis += 1;
            }
            if !endpoint.validation.is_empty() {
                summary.validated_apis += 1;
            }
            if !controllers.contains(&endpoint.controller_class.as_str()) {
                controllers.push(&endpoint.controller_class);
            }
            debug_assert!(CANONICAL_VERBS.contains(&endpoint.http_method.as_str()));
            summary
                .http_methods_distribution
                .increment(&endpoint.http_method);
        }
        summary.controller_classes = controllers.len();

        Self {
            war_file_name: war_file_name.into(),
            analysis_date: Utc::now().to_rfc3339(),
            total_apis: apis.len(),
            analysis_summary: summary,
            apis,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(verb: &str, class: &str, alters: bool, validation: Vec<String>) -> ApiEndpoint {
        ApiEndpoint {
            api_url: "/api".to_string(),
            http_method: verb.to_string(),
            controller_class: class.to_string(),
            controller_method: "m".to_string(),
            alters_state: alters,
            validation,
            method_details: MethodDetails::default(),
        }
    }

    #[test]
    fn summary_counts_sum_to_total() {
        let report = ApiReport::assemble(
            "demo.war",
            vec![
                endpoint("GET", "com.ex.A", false, vec![]),
                endpoint("POST", "com.ex.A", true, vec!["@Valid".to_string()]),
                endpoint("DELETE", "com.ex.B", true, vec![]),
            ],
        );

        let summary = &report.analysis_summary;
        assert_eq!(report.total_apis, 3);
        assert_eq!(summary.state_altering_apis + summary.read_only_apis, 3);
        assert_eq!(summary.validated_apis, 1);
        assert_eq!(summary.controller_classes, 2);
        assert_eq!(summary.http_methods_distribution.total(), 3);
        assert_eq!(summary.http_methods_distribution.get, 1);
        assert_eq!(summary.http_methods_distribution.post, 1);
        assert_eq!(summary.http_methods_distribution.delete, 1);
    }

    #[test]
    fn serialized_field_names_are_stable() {
        let report = ApiReport::assemble(
            "demo.war",
            vec![endpoint("GET", "com.ex.A", false, vec![])],
        );
        let json = serde_json::to_value(&report).unwrap();

        assert!(json.get("war_file_name").is_some());
        assert!(json.get("analysis_date").is_some());
        assert_eq!(json["total_apis"], 1);
        assert!(json["analysis_summary"]["http_methods_distribution"]["GET"].is_number());
        let api = &json["apis"][0];
        assert_eq!(api["api_url"], "/api");
        assert_eq!(api["http_method"], "GET");
        assert!(api["method_details"]["transaction_attributes"]["is_transactional"].is_boolean());
        assert!(api["method_details"]["transaction_attributes"]["read_only"].is_boolean());
    }

    #[test]
    fn analysis_date_is_rfc3339() {
        let report = ApiReport::assemble("demo.war", vec![]);
        assert!(chrono::DateTime::parse_from_rfc3339(&report.analysis_date).is_ok());
    }
}
