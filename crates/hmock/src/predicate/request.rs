//! Combined match decision for one expectation and one request.

use super::content::content_equivalent;
use crate::mock::{Content, ContentKind, Expectation, MockRequest, RequestPredicate};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, warn};

/// Evaluate every criterion after the repeat budget, in order, stopping at
/// the first failure. Has no side effects.
pub fn request_matches(expectation: &Expectation, request: &MockRequest) -> bool {
    expectation.method == request.method
        && expectation.uri.matches(&request.uri)
        && headers_match(&expectation.headers, request)
        && content_type_matches(expectation.content_kind, request)
        && body_matches(expectation.content.as_ref(), request)
        && predicate_accepts(expectation.predicate.as_ref(), request, &expectation.name)
}

/// Match and consume: on success the expectation's call count grows by one.
/// Exhausted expectations never match.
pub fn try_consume(expectation: &mut Expectation, request: &MockRequest) -> bool {
    if expectation.is_exhausted() || !request_matches(expectation, request) {
        return false;
    }
    expectation.calls += 1;
    true
}

fn headers_match(expected: &[(String, String)], request: &MockRequest) -> bool {
    expected.iter().all(|(name, value)| {
        request
            .header_values(name)
            .iter()
            .any(|actual| actual == value)
    })
}

fn content_type_matches(kind: ContentKind, request: &MockRequest) -> bool {
    if kind == ContentKind::None {
        return true;
    }
    request
        .content_type()
        .is_some_and(|content_type| kind.accepts(content_type))
}

fn body_matches(expected: Option<&Content>, request: &MockRequest) -> bool {
    let Some(expected) = expected else {
        return true;
    };
    let body = request.body_text();
    if body.trim().is_empty() {
        return false;
    }

    let content_type = request.content_type().unwrap_or_default();
    let kind = ContentKind::from_content_type(content_type);
    match content_equivalent(kind, content_type, expected, &body) {
        Ok(equivalent) => equivalent,
        Err(e) => {
            warn!(error = %e, uri = %request.uri, "Request body could not be compared, treating as no match");
            false
        }
    }
}

fn predicate_accepts(predicate: Option<&RequestPredicate>, request: &MockRequest, name: &str) -> bool {
    let Some(predicate) = predicate else {
        return true;
    };
    match catch_unwind(AssertUnwindSafe(|| predicate(request))) {
        Ok(accepted) => {
            if !accepted {
                debug!(expectation = name, "Custom predicate rejected request");
            }
            accepted
        }
        Err(_) => {
            warn!(expectation = name, "Custom predicate panicked, treating as no match");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::Method;
    use serde_json::json;
    use std::sync::Arc;

    fn expectation(method: Method, uri: &str) -> Expectation {
        Expectation::new(method, uri).unwrap()
    }

    #[test]
    fn test_method_must_match_exactly() {
        let e = expectation(Method::GET, "/users");
        assert!(request_matches(&e, &MockRequest::new(Method::GET, "/users")));
        assert!(!request_matches(&e, &MockRequest::new(Method::POST, "/users")));
    }

    #[test]
    fn test_header_names_case_insensitive_values_exact() {
        let mut e = expectation(Method::GET, "/users");
        e.headers.push(("X-Api-Key".to_string(), "secret".to_string()));

        let ok = MockRequest::new(Method::GET, "/users").with_header("x-api-key", "secret");
        let wrong_value = MockRequest::new(Method::GET, "/users").with_header("x-api-key", "SECRET");
        let missing = MockRequest::new(Method::GET, "/users");

        assert!(request_matches(&e, &ok));
        assert!(!request_matches(&e, &wrong_value));
        assert!(!request_matches(&e, &missing));
    }

    #[test]
    fn test_header_value_may_be_one_of_many() {
        let mut e = expectation(Method::GET, "/users");
        e.headers.push(("Accept".to_string(), "application/json".to_string()));

        let request = MockRequest::new(Method::GET, "/users")
            .with_header("accept", "text/html, application/json");
        assert!(request_matches(&e, &request));
    }

    #[test]
    fn test_content_type_only_check() {
        let mut e = expectation(Method::POST, "/users");
        e.content_kind = ContentKind::Json;

        let json = MockRequest::new(Method::POST, "/users")
            .with_header("content-type", "text/json; charset=utf-8");
        let xml = MockRequest::new(Method::POST, "/users").with_header("content-type", "text/xml");
        let none = MockRequest::new(Method::POST, "/users");

        assert!(request_matches(&e, &json));
        assert!(!request_matches(&e, &xml));
        assert!(!request_matches(&e, &none));
    }

    #[test]
    fn test_every_synonym_selects_its_own_kind() {
        use crate::mock::{JSON_MEDIA_TYPES, XML_MEDIA_TYPES};

        let cases = [
            (ContentKind::Json, JSON_MEDIA_TYPES, XML_MEDIA_TYPES),
            (ContentKind::Xml, XML_MEDIA_TYPES, JSON_MEDIA_TYPES),
        ];
        for (kind, accepted, rejected) in cases {
            let mut e = expectation(Method::POST, "/users");
            e.content_kind = kind;
            for media_type in accepted {
                let request = MockRequest::new(Method::POST, "/users").with_header("content-type", media_type);
                assert!(request_matches(&e, &request), "{kind} should accept {media_type}");
            }
            for media_type in rejected {
                let request = MockRequest::new(Method::POST, "/users").with_header("content-type", media_type);
                assert!(!request_matches(&e, &request), "{kind} should reject {media_type}");
            }
        }
    }

    #[test]
    fn test_near_miss_media_types_are_rejected() {
        let near_misses = [
            (ContentKind::Json, "application/json-patch+json"),
            (ContentKind::Json, "application/vnd.api+json"),
            (ContentKind::Json, "application/jsonp"),
            (ContentKind::Xml, "application/atom+xml"),
            (ContentKind::Xml, "application/xhtml+xml"),
        ];
        for (kind, media_type) in near_misses {
            let mut e = expectation(Method::POST, "/users");
            e.content_kind = kind;
            let request = MockRequest::new(Method::POST, "/users").with_header("content-type", media_type);
            assert!(!request_matches(&e, &request), "{kind} should reject {media_type}");
        }
    }

    #[test]
    fn test_expected_body_requires_non_empty_body() {
        let mut e = expectation(Method::POST, "/users");
        e.content = Some(Content::from(json!({"name": "Ann"})));

        let empty = MockRequest::new(Method::POST, "/users")
            .with_header("content-type", "application/json");
        let full = MockRequest::new(Method::POST, "/users")
            .with_header("content-type", "application/json")
            .with_body(r#"{"name":"Ann"}"#);

        assert!(!request_matches(&e, &empty));
        assert!(request_matches(&e, &full));
    }

    #[test]
    fn test_body_compared_by_request_content_type() {
        let mut e = expectation(Method::POST, "/users");
        e.content = Some(Content::from(json!({"name": "Ann"})));

        let xml = MockRequest::new(Method::POST, "/users")
            .with_header("content-type", "application/xml")
            .with_body("<User><name>Ann</name></User>");
        assert!(request_matches(&e, &xml));

        let plain = MockRequest::new(Method::POST, "/users")
            .with_header("content-type", "text/plain")
            .with_body(r#"{"name":"Ann"}"#);
        assert!(!request_matches(&e, &plain));
    }

    #[test]
    fn test_malformed_body_is_no_match() {
        let mut e = expectation(Method::POST, "/users");
        e.content = Some(Content::from(json!({"name": "Ann"})));

        let request = MockRequest::new(Method::POST, "/users")
            .with_header("content-type", "application/json")
            .with_body("{broken");
        assert!(!request_matches(&e, &request));
    }

    #[test]
    fn test_predicate_runs_last_and_panics_are_contained() {
        let mut e = expectation(Method::GET, "/users");
        e.predicate = Some(Arc::new(|request: &MockRequest| request.uri.ends_with("users")));
        assert!(request_matches(&e, &MockRequest::new(Method::GET, "/users")));

        e.predicate = Some(Arc::new(|_: &MockRequest| -> bool { panic!("predicate failure") }));
        assert!(!request_matches(&e, &MockRequest::new(Method::GET, "/users")));
    }

    #[test]
    fn test_try_consume_respects_repeats() {
        let mut e = expectation(Method::GET, "/users");
        e.repeats = 2;
        let request = MockRequest::new(Method::GET, "/users");

        assert!(try_consume(&mut e, &request));
        assert!(try_consume(&mut e, &request));
        assert!(!try_consume(&mut e, &request));
        assert_eq!(e.calls, 2);
    }

    #[test]
    fn test_zero_repeats_never_matches() {
        let mut e = expectation(Method::GET, "/users");
        e.repeats = 0;
        assert!(!try_consume(&mut e, &MockRequest::new(Method::GET, "/users")));
        assert_eq!(e.calls, 0);
    }

    #[test]
    fn test_failed_match_does_not_count() {
        let mut e = expectation(Method::GET, "/users");
        assert!(!try_consume(&mut e, &MockRequest::new(Method::GET, "/orders")));
        assert_eq!(e.calls, 0);
    }
}
