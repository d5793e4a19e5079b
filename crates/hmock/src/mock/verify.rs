//! Verification reports.

use super::store::{Expectation, ExpectationStore, UnexpectedRequestLog};
use super::types::{Content, ContentKind, UnexpectedRequest};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

const UNMET_HEADING: &str = "Some requests expectations were not met:";
const UNEXPECTED_HEADING: &str = "There were some unexpected requests:";

/// Expectation whose actual call count differs from its configured repeats.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmetExpectation {
    pub name: String,
    pub uri: String,
    pub method: String,
    pub expected_headers: BTreeMap<String, String>,
    pub expected_content: Option<Content>,
    pub expected_content_type: ContentKind,
    pub expected_calls: u32,
    pub actual_calls: u32,
}

impl UnmetExpectation {
    fn from_expectation(expectation: &Expectation) -> Self {
        Self {
            name: expectation.name.clone(),
            uri: expectation.uri.as_str().to_string(),
            method: expectation.method.to_string(),
            expected_headers: expectation.headers.iter().cloned().collect(),
            expected_content: expectation.content.clone(),
            expected_content_type: expectation.content_kind,
            expected_calls: expectation.repeats,
            actual_calls: expectation.calls,
        }
    }
}

impl fmt::Display for UnmetExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers = self
            .expected_headers
            .iter()
            .map(|(name, value)| format!("{name}: {value}"))
            .collect::<Vec<_>>()
            .join(", ");
        let content = self
            .expected_content
            .as_ref()
            .map(Content::to_json_string)
            .unwrap_or_default();
        write!(
            f,
            "Request Name:'{}' | Request Uri: '{}' | Request Method: '{}' | Expected Request Headers: '{}' | \
             Expected Request Content: '{}' | Expected Request Content Type: '{}' | \
             Expected Number Of Calls: '{}' | Actual Number Of Calls: '{}'",
            self.name,
            self.uri,
            self.method,
            headers,
            content,
            self.expected_content_type,
            self.expected_calls,
            self.actual_calls
        )
    }
}

/// Outcome of a verification: unmet expectations and, when requested,
/// unexpected requests. Empty means success.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    pub unmet_expectations: Vec<UnmetExpectation>,
    pub unexpected_requests: Vec<UnexpectedRequest>,
}

impl VerificationReport {
    /// Report covering expectations only.
    pub(crate) fn expectations(store: &ExpectationStore) -> Self {
        Self {
            unmet_expectations: store
                .iter()
                .filter(|expectation| !expectation.is_satisfied())
                .map(UnmetExpectation::from_expectation)
                .collect(),
            unexpected_requests: Vec::new(),
        }
    }

    /// Report covering expectations and every unexpected request.
    pub(crate) fn full(store: &ExpectationStore, log: &UnexpectedRequestLog) -> Self {
        Self {
            unexpected_requests: log.entries().to_vec(),
            ..Self::expectations(store)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.unmet_expectations.is_empty() && self.unexpected_requests.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sections = Vec::new();
        if !self.unmet_expectations.is_empty() {
            let lines: Vec<String> = self.unmet_expectations.iter().map(ToString::to_string).collect();
            sections.push(format!("{UNMET_HEADING}\n{}", lines.join("\n")));
        }
        if !self.unexpected_requests.is_empty() {
            let lines: Vec<String> = self.unexpected_requests.iter().map(ToString::to_string).collect();
            sections.push(format!("{UNEXPECTED_HEADING}\n{}", lines.join("\n")));
        }
        write!(f, "{}", sections.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockRequest;
    use hyper::Method;

    fn store_with(calls: u32, repeats: u32) -> ExpectationStore {
        let mut store = ExpectationStore::default();
        let mut expectation = Expectation::new(Method::POST, "/users").unwrap();
        expectation.name = "create user".to_string();
        expectation.headers.push(("Authorization".to_string(), "Bearer t".to_string()));
        expectation.content = Some(Content::from(serde_json::json!({"name": "Ann"})));
        expectation.content_kind = ContentKind::Json;
        expectation.repeats = repeats;
        expectation.calls = calls;
        store.push(expectation);
        store
    }

    #[test]
    fn test_satisfied_expectations_produce_empty_report() {
        let report = VerificationReport::expectations(&store_with(2, 2));
        assert!(report.is_empty());
        assert_eq!(report.to_string(), "");
    }

    #[test]
    fn test_under_and_over_calls_are_unmet() {
        assert_eq!(VerificationReport::expectations(&store_with(0, 1)).unmet_expectations.len(), 1);
        assert_eq!(VerificationReport::expectations(&store_with(3, 2)).unmet_expectations.len(), 1);
    }

    #[test]
    fn test_unmet_line_format() {
        let report = VerificationReport::expectations(&store_with(0, 2));
        let text = report.to_string();
        assert!(text.starts_with(UNMET_HEADING));
        assert!(text.contains(
            "Request Name:'create user' | Request Uri: '/users' | Request Method: 'POST' | \
             Expected Request Headers: 'Authorization: Bearer t' | \
             Expected Request Content: '{\"name\":\"Ann\"}' | Expected Request Content Type: 'json' | \
             Expected Number Of Calls: '2' | Actual Number Of Calls: '0'"
        ));
    }

    #[test]
    fn test_full_report_lists_unexpected_requests() {
        let store = store_with(2, 2);
        let mut log = UnexpectedRequestLog::default();
        log.record(
            &MockRequest::new(Method::GET, "/missing")
                .with_header("accept", "a")
                .with_header("accept", "b")
                .with_body("hello"),
        );

        let report = VerificationReport::full(&store, &log);
        assert!(!report.is_empty());
        let text = report.to_string();
        assert!(text.starts_with(UNEXPECTED_HEADING));
        assert!(text.contains(
            "Request Uri: '/missing' | Request Method: 'GET' | Request Headers: 'accept - a, b' | Request Content: 'hello'"
        ));
    }

    #[test]
    fn test_report_serializes_as_camel_case_json() {
        let json = VerificationReport::expectations(&store_with(1, 2)).to_json().unwrap();
        assert!(json.contains("\"unmetExpectations\""));
        assert!(json.contains("\"actualCalls\": 1"));
    }
}
