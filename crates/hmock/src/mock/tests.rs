//! Tests for the mock engine.
//!
//! Covers dispatch ordering and consumption, matching through the engine,
//! simulated timeouts, verification and concurrent delivery.

use super::*;
use crate::config::MockServerConfig;
use crate::wait::Suspend;
use async_trait::async_trait;
use hyper::{Method, StatusCode};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing_test::traced_test;

/// Records every suspension and holds it until released.
#[derive(Default)]
struct GatedSuspend {
    calls: parking_lot::Mutex<Vec<Duration>>,
    gate: Notify,
}

impl GatedSuspend {
    fn calls(&self) -> Vec<Duration> {
        self.calls.lock().clone()
    }

    fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl Suspend for GatedSuspend {
    async fn suspend(&self, duration: Duration) {
        self.calls.lock().push(duration);
        self.gate.notified().await;
    }
}

fn get(uri: &str) -> MockRequest {
    MockRequest::new(Method::GET, uri)
}

fn json_post(uri: &str, body: &str) -> MockRequest {
    MockRequest::new(Method::POST, uri)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
}

#[tokio::test]
async fn test_identical_expectations_answer_in_registration_order() {
    let engine = MockEngine::default();
    engine
        .expect_get("/users/1")
        .unwrap()
        .respond(ResponseTemplate::new(StatusCode::OK).content(ContentKind::None, "first"));
    engine
        .expect_get("/users/1")
        .unwrap()
        .respond(ResponseTemplate::new(StatusCode::OK).content(ContentKind::None, "second"));

    let first = engine.dispatch(get("/users/1")).await.unwrap();
    let second = engine.dispatch(get("/users/1")).await.unwrap();
    let third = engine.dispatch(get("/users/1")).await.unwrap();

    assert_eq!(first.body_text(), "first");
    assert_eq!(second.body_text(), "second");
    assert_eq!(third.status, StatusCode::NOT_IMPLEMENTED);
    assert!(engine.verify_expectations().is_ok());
    assert!(engine.verify_expectations_and_unexpected().is_err());
}

#[tokio::test]
async fn test_default_repeat_count_is_one() {
    let engine = MockEngine::default();
    let id = engine.expect_get("/ping").unwrap().register();

    assert_eq!(engine.expectation(id).unwrap().repeats(), 1);
    assert_eq!(engine.dispatch(get("/ping")).await.unwrap().status, StatusCode::OK);
    assert_eq!(
        engine.dispatch(get("/ping")).await.unwrap().status,
        StatusCode::NOT_IMPLEMENTED
    );
    assert_eq!(engine.calls(id), Some(1));
}

#[tokio::test]
async fn test_expectation_matches_at_most_repeat_count() {
    let engine = MockEngine::default();
    let id = engine.expect_get("/items").unwrap().times(3).register();

    for _ in 0..5 {
        engine.dispatch(get("/items")).await.unwrap();
    }

    assert_eq!(engine.calls(id), Some(3));
    assert_eq!(engine.unexpected_requests().len(), 2);
    assert!(engine.verify_expectations().is_ok());
}

#[tokio::test]
async fn test_zero_repeats_declares_never_called() {
    let engine = MockEngine::default();
    engine.expect_delete("/users/1").unwrap().times(0).register();

    assert!(engine.verify_expectations().is_ok());
    let response = engine
        .dispatch(MockRequest::new(Method::DELETE, "/users/1"))
        .await
        .unwrap();
    assert_eq!(response.status, StatusCode::NOT_IMPLEMENTED);
    assert_eq!(engine.unexpected_requests().len(), 1);
}

#[tokio::test]
async fn test_uncalled_expectation_fails_verification() {
    let engine = MockEngine::default();
    engine.expect_get("/never").unwrap().name("never called").times(2).register();

    let err = engine.verify_expectations().unwrap_err();
    let report = err.report().unwrap();
    assert_eq!(report.unmet_expectations.len(), 1);
    assert_eq!(report.unmet_expectations[0].name, "never called");
    assert_eq!(report.unmet_expectations[0].expected_calls, 2);
    assert_eq!(report.unmet_expectations[0].actual_calls, 0);
    assert!(err.to_string().contains("Some requests expectations were not met:"));
}

#[tokio::test]
async fn test_full_verification_aggregates_both_lists() {
    let engine = MockEngine::default();
    engine.expect_get("/expected").unwrap().register();
    engine.dispatch(get("/surprise")).await.unwrap();

    let err = engine.verify_expectations_and_unexpected().unwrap_err();
    let report = err.report().unwrap();
    assert_eq!(report.unmet_expectations.len(), 1);
    assert_eq!(report.unexpected_requests.len(), 1);
    let text = err.to_string();
    assert!(text.contains("Some requests expectations were not met:"));
    assert!(text.contains("There were some unexpected requests:"));
    assert!(text.contains("Request Uri: '/surprise'"));
}

#[tokio::test]
async fn test_regex_and_literal_uris_through_the_engine() {
    let engine = MockEngine::default();
    engine.expect_get("user/[0-9]{2}").unwrap().times(2).register();
    engine.expect_get("http://localhost/usER/abc").unwrap().register();

    assert_eq!(engine.dispatch(get("/user/23/data")).await.unwrap().status, StatusCode::OK);
    assert_eq!(engine.dispatch(get("/user/abc")).await.unwrap().status, StatusCode::OK);
    assert_eq!(engine.dispatch(get("/user/45")).await.unwrap().status, StatusCode::OK);
    assert!(engine.verify_expectations_and_unexpected().is_ok());
}

#[test]
fn test_invalid_uri_rejected_at_registration() {
    let engine = MockEngine::default();
    let err = engine.expect_get(r"users[\]23/data").err().unwrap();
    assert!(matches!(err, MockError::Configuration { .. }));
    assert!(err.to_string().contains(r"users[\]23/data"));
}

#[tokio::test]
async fn test_json_body_matching() {
    let engine = MockEngine::default();
    engine
        .expect_post("/users")
        .unwrap()
        .json(&json!({"a": 1, "b": 2}))
        .unwrap()
        .respond_with_status(StatusCode::CREATED);

    let mismatch = engine.dispatch(json_post("/users", r#"{"a":"X"}"#)).await.unwrap();
    assert_eq!(mismatch.status, StatusCode::NOT_IMPLEMENTED);

    let matched = engine.dispatch(json_post("/users", r#"{"b":2,"a":1}"#)).await.unwrap();
    assert_eq!(matched.status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_json_strings_are_case_sensitive() {
    let engine = MockEngine::default();
    engine
        .expect_post("/users")
        .unwrap()
        .content(ContentKind::Json, r#"{"a":"x"}"#)
        .register();

    let response = engine.dispatch(json_post("/users", r#"{"a":"X"}"#)).await.unwrap();
    assert_eq!(response.status, StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn test_xml_body_matching() {
    let engine = MockEngine::default();
    engine
        .expect_put("/users/1")
        .unwrap()
        .content(ContentKind::Xml, "<User><name>Ann</name><age>30</age></User>")
        .register();

    let request = MockRequest::new(Method::PUT, "/users/1")
        .with_header("content-type", "text/xml; charset=utf-8")
        .with_body("<User>\n  <age>30</age>\n  <name>Ann</name>\n</User>");
    assert_eq!(engine.dispatch(request).await.unwrap().status, StatusCode::OK);
}

#[tokio::test]
async fn test_untyped_text_content() {
    let engine = MockEngine::default();
    engine
        .expect_post("/notes")
        .unwrap()
        .content(ContentKind::None, "remember the milk")
        .register();

    let request = MockRequest::new(Method::POST, "/notes")
        .with_header("content-type", "text/plain")
        .with_body("remember the milk");
    assert_eq!(engine.dispatch(request).await.unwrap().status, StatusCode::OK);
}

#[tokio::test]
async fn test_structured_null_content_is_unconstrained() {
    let engine = MockEngine::default();
    engine
        .expect_post("/anything")
        .unwrap()
        .content(ContentKind::Json, serde_json::Value::Null)
        .register();

    let request = MockRequest::new(Method::POST, "/anything").with_header("content-type", "application/json");
    assert_eq!(engine.dispatch(request).await.unwrap().status, StatusCode::OK);
}

#[tokio::test]
async fn test_header_value_is_case_sensitive() {
    let engine = MockEngine::default();
    engine.expect_get("/h").unwrap().header("test", "value").register();

    let wrong = get("/h").with_header("Test", "Value");
    assert_eq!(engine.dispatch(wrong).await.unwrap().status, StatusCode::NOT_IMPLEMENTED);

    let right = get("/h").with_header("Test", "value");
    assert_eq!(engine.dispatch(right).await.unwrap().status, StatusCode::OK);
}

#[tokio::test]
async fn test_later_header_value_replaces_earlier() {
    let engine = MockEngine::default();
    engine
        .expect_get("/h")
        .unwrap()
        .header("X-Version", "1")
        .headers([("x-version", "2")])
        .register();

    assert_eq!(
        engine.dispatch(get("/h").with_header("x-version", "2")).await.unwrap().status,
        StatusCode::OK
    );
}

#[tokio::test]
async fn test_custom_predicate() {
    let engine = MockEngine::default();
    engine
        .expect_get("^/search")
        .unwrap()
        .matching(|request| request.uri.contains("q=rust"))
        .register();
    assert_eq!(
        engine.dispatch(get("/search?q=go")).await.unwrap().status,
        StatusCode::NOT_IMPLEMENTED
    );
    assert_eq!(engine.dispatch(get("/search?q=rust")).await.unwrap().status, StatusCode::OK);
}

#[tokio::test]
async fn test_response_builder_error_propagates_and_consumes() {
    let engine = MockEngine::default();
    let id = engine
        .expect_get("/explode")
        .unwrap()
        .respond_with(|_| Err(anyhow::anyhow!("builder failed")));

    let err = engine.dispatch(get("/explode")).await.unwrap_err();
    assert_eq!(err.to_string(), "builder failed");
    assert_eq!(engine.calls(id), Some(1));
}

#[tokio::test]
async fn test_response_builder_sees_the_request() {
    let engine = MockEngine::default();
    engine.expect_post("/echo").unwrap().respond_with(|request| {
        Ok(MockResponse::new(StatusCode::OK).with_body(request.body.clone(), Some("text/plain")))
    });

    let response = engine
        .dispatch(MockRequest::new(Method::POST, "/echo").with_body("ping"))
        .await
        .unwrap();
    assert_eq!(response.body_text(), "ping");
    assert_eq!(response.header("content-type"), Some("text/plain"));
}

#[tokio::test]
async fn test_set_default_status() {
    let engine = MockEngine::default();
    engine.set_default_status(StatusCode::NOT_FOUND);
    assert_eq!(
        engine.dispatch(get("/missing")).await.unwrap().status,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_timeout_suspends_outside_the_lock() {
    let suspender = Arc::new(GatedSuspend::default());
    let config = MockServerConfig::default().with_timeout_simulation(Duration::from_millis(750));
    let engine = Arc::new(MockEngine::with_suspender(&config, suspender.clone()));
    engine.expect_get("/slow").unwrap().time_out();
    engine.expect_get("/fast").unwrap().register();

    let slow = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move { engine.dispatch(get("/slow")).await }
    });
    while suspender.calls().is_empty() {
        tokio::task::yield_now().await;
    }

    // the engine stays usable while the timed-out request is suspended
    let fast = engine.dispatch(get("/fast")).await.unwrap();
    assert_eq!(fast.status, StatusCode::OK);
    assert!(!slow.is_finished());

    suspender.release();
    let slow = slow.await.unwrap().unwrap();
    assert_eq!(slow.status, StatusCode::NOT_IMPLEMENTED);
    assert!(slow.content.body.is_empty());
    assert_eq!(suspender.calls(), vec![Duration::from_millis(750)]);
    assert!(engine.verify_expectations_and_unexpected().is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_never_over_consume() {
    let engine = Arc::new(MockEngine::default());
    let id = engine.expect_get("/limited").unwrap().times(5).register();

    let tasks: Vec<_> = (0..20)
        .map(|_| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.dispatch(get("/limited")).await })
        })
        .collect();

    let mut ok = 0;
    for result in futures::future::join_all(tasks).await {
        if result.unwrap().unwrap().status == StatusCode::OK {
            ok += 1;
        }
    }

    assert_eq!(ok, 5);
    assert_eq!(engine.calls(id), Some(5));
    assert_eq!(engine.unexpected_requests().len(), 15);
}

#[tokio::test]
#[traced_test]
async fn test_unexpected_request_is_logged() {
    let engine = MockEngine::default();
    engine.dispatch(get("/nobody-home")).await.unwrap();
    assert!(logs_contain("recorded as unexpected"));
}

#[tokio::test]
#[traced_test]
async fn test_malformed_body_is_logged_and_unmatched() {
    let engine = MockEngine::default();
    engine
        .expect_post("/users")
        .unwrap()
        .json(&json!({"name": "Ann"}))
        .unwrap()
        .register();

    let response = engine.dispatch(json_post("/users", "{oops")).await.unwrap();
    assert_eq!(response.status, StatusCode::NOT_IMPLEMENTED);
    assert!(logs_contain("could not be compared"));
}

#[tokio::test]
async fn test_report_is_serializable() {
    let engine = MockEngine::default();
    engine.expect_get("/a").unwrap().name("a").register();
    engine.dispatch(get("/b").with_header("x-trace", "1")).await.unwrap();

    let report = engine.report();
    let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(value["unmetExpectations"][0]["name"], "a");
    assert_eq!(value["unexpectedRequests"][0]["uri"], "/b");
    assert_eq!(value["unexpectedRequests"][0]["headers"]["x-trace"][0], "1");
    assert!(value["unexpectedRequests"][0]["receivedAt"].is_string());
}
