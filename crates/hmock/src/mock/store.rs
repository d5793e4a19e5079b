//! Ordered expectation store and unexpected-request log.

use super::types::{Content, ContentKind, MockError, MockRequest, RequestPredicate, ResponseTemplate, UnexpectedRequest};
use crate::predicate::{try_consume, UriMatcher};
use hyper::Method;
use serde::Serialize;
use std::fmt;

/// Handle to a registered expectation, valid for the engine that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ExpectationId(pub(crate) usize);

impl fmt::Display for ExpectationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One configured expectation: criteria, repeat budget, call count and
/// the response it replays.
#[derive(Clone)]
pub struct Expectation {
    pub(crate) name: String,
    pub(crate) method: Method,
    pub(crate) uri: UriMatcher,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) content_kind: ContentKind,
    pub(crate) content: Option<Content>,
    pub(crate) predicate: Option<RequestPredicate>,
    pub(crate) repeats: u32,
    pub(crate) calls: u32,
    pub(crate) response: ResponseTemplate,
    pub(crate) timed_out: bool,
}

impl Expectation {
    /// Fresh expectation expecting a single call. Fails on a malformed URI or pattern.
    pub(crate) fn new(method: Method, uri: &str) -> Result<Self, MockError> {
        Ok(Self {
            name: String::new(),
            method,
            uri: UriMatcher::parse(uri)?,
            headers: Vec::new(),
            content_kind: ContentKind::None,
            content: None,
            predicate: None,
            repeats: 1,
            calls: 0,
            response: ResponseTemplate::default(),
            timed_out: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &str {
        self.uri.as_str()
    }

    pub fn repeats(&self) -> u32 {
        self.repeats
    }

    pub fn calls(&self) -> u32 {
        self.calls
    }

    /// Called exactly as many times as configured
    pub fn is_satisfied(&self) -> bool {
        self.calls == self.repeats
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.calls >= self.repeats
    }
}

impl fmt::Debug for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expectation")
            .field("name", &self.name)
            .field("method", &self.method)
            .field("uri", &self.uri.as_str())
            .field("headers", &self.headers)
            .field("content_kind", &self.content_kind)
            .field("content", &self.content)
            .field("predicate", &self.predicate.as_ref().map(|_| "<fn>"))
            .field("repeats", &self.repeats)
            .field("calls", &self.calls)
            .field("timed_out", &self.timed_out)
            .finish()
    }
}

/// Expectations in registration order.
#[derive(Debug, Default)]
pub(crate) struct ExpectationStore {
    entries: Vec<Expectation>,
}

impl ExpectationStore {
    pub fn push(&mut self, expectation: Expectation) -> ExpectationId {
        self.entries.push(expectation);
        ExpectationId(self.entries.len() - 1)
    }

    /// Consume the first live expectation matching `request`, in registration order.
    pub fn find_and_consume(&mut self, request: &MockRequest) -> Option<&Expectation> {
        for expectation in self.entries.iter_mut() {
            if try_consume(expectation, request) {
                return Some(&*expectation);
            }
        }
        None
    }

    pub fn get(&self, id: ExpectationId) -> Option<&Expectation> {
        self.entries.get(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Expectation> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Requests that matched nothing, in arrival order.
#[derive(Debug, Default)]
pub(crate) struct UnexpectedRequestLog {
    entries: Vec<UnexpectedRequest>,
}

impl UnexpectedRequestLog {
    pub fn record(&mut self, request: &MockRequest) -> &UnexpectedRequest {
        self.entries.push(UnexpectedRequest::capture(request));
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[UnexpectedRequest] {
        &self.entries
    }
}
