//! Fluent expectation configuration.
//!
//! A builder is created by `MockEngine::expect` (or a method shortcut),
//! mutated step by step, and registered by exactly one finalizer:
//! `respond`, `respond_with`, `time_out` or `register`.

use super::core::MockEngine;
use super::store::{Expectation, ExpectationId};
use super::types::{Content, ContentKind, MockError, MockRequest, MockResponse, ResponseTemplate};
use hyper::StatusCode;
use serde::Serialize;
use std::sync::Arc;

#[must_use = "an expectation is only registered by a finalizer such as `respond`"]
pub struct ExpectationBuilder<'a> {
    engine: &'a MockEngine,
    expectation: Expectation,
}

impl<'a> ExpectationBuilder<'a> {
    pub(crate) fn new(engine: &'a MockEngine, expectation: Expectation) -> Self {
        Self {
            engine,
            expectation,
        }
    }

    /// Name shown in verification reports
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.expectation.name = name.into();
        self
    }

    /// Number of times the expectation must be called (default 1).
    pub fn times(mut self, repeats: u32) -> Self {
        self.expectation.repeats = repeats;
        self
    }

    /// Require a header value. A later value for the same name replaces the earlier one.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        let headers = &mut self.expectation.headers;
        match headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value,
            None => headers.push((name, value)),
        }
        self
    }

    pub fn headers<I, K, V>(self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        headers
            .into_iter()
            .fold(self, |builder, (name, value)| builder.header(name, value))
    }

    /// Require a content type without constraining the body.
    pub fn content_type(mut self, kind: ContentKind) -> Self {
        self.expectation.content_kind = kind;
        self
    }

    /// Require a body equivalent to `content`, and the content type of `kind`.
    /// A structured `null` leaves the body unconstrained.
    pub fn content(mut self, kind: ContentKind, content: impl Into<Content>) -> Self {
        let content = content.into();
        self.expectation.content_kind = kind;
        self.expectation.content = match content {
            Content::Structured(serde_json::Value::Null) => None,
            other => Some(other),
        };
        self
    }

    /// Require a JSON body equivalent to the serialized `value`.
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Result<Self, MockError> {
        Ok(self.content(ContentKind::Json, Content::structured(value)?))
    }

    /// Require an XML body equivalent to the serialized `value`.
    pub fn xml<T: Serialize + ?Sized>(self, value: &T) -> Result<Self, MockError> {
        Ok(self.content(ContentKind::Xml, Content::structured(value)?))
    }

    /// Custom check evaluated after every built-in criterion.
    pub fn matching<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&MockRequest) -> bool + Send + Sync + 'static,
    {
        self.expectation.predicate = Some(Arc::new(predicate));
        self
    }

    // ===== Finalizers =====

    pub fn respond(mut self, template: ResponseTemplate) -> ExpectationId {
        self.expectation.response = template;
        self.engine.register(self.expectation)
    }

    pub fn respond_with_status(self, status: StatusCode) -> ExpectationId {
        self.respond(ResponseTemplate::new(status))
    }

    /// Produce the whole response with `builder`; its errors reach the caller verbatim.
    pub fn respond_with<F>(self, builder: F) -> ExpectationId
    where
        F: Fn(&MockRequest) -> anyhow::Result<MockResponse> + Send + Sync + 'static,
    {
        self.respond(ResponseTemplate::from_fn(builder))
    }

    /// Simulate an unresponsive server: matched requests are held for the
    /// configured interval so the client times out first.
    pub fn time_out(mut self) -> ExpectationId {
        self.expectation.timed_out = true;
        self.engine.register(self.expectation)
    }

    /// Register with the default response (200, empty body).
    pub fn register(self) -> ExpectationId {
        self.respond(ResponseTemplate::default())
    }
}
