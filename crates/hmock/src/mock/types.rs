//! Type definitions for the expectation engine.
//!
//! This module contains the request/response model shared by the matcher,
//! the dispatcher and the verification reports.

use super::verify::VerificationReport;
use bytes::Bytes;
use hyper::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use hyper::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

// ============================================================================
// Content Types
// ============================================================================

/// Media types accepted as JSON.
pub const JSON_MEDIA_TYPES: &[&str] = &[
    "application/json",
    "application/x-javascript",
    "application/javascript",
    "text/javascript",
    "text/x-javascript",
    "text/x-json",
    "text/json",
];

/// Media types accepted as XML.
pub const XML_MEDIA_TYPES: &[&str] = &["application/xml", "text/xml"];

/// Content type class of an expected request body or of a response body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// No content type constraint
    #[default]
    None,
    Json,
    Xml,
}

impl ContentKind {
    /// Synonym set of media types for this kind (empty for `None`).
    pub fn media_types(self) -> &'static [&'static str] {
        match self {
            ContentKind::None => &[],
            ContentKind::Json => JSON_MEDIA_TYPES,
            ContentKind::Xml => XML_MEDIA_TYPES,
        }
    }

    /// Check a `Content-Type` header value against the synonym set.
    /// Parameters such as `charset` are ignored.
    pub fn accepts(self, content_type: &str) -> bool {
        // Only the media type essence is compared, case-insensitively, so
        // `Application/JSON; charset=utf-8` counts as JSON.
        let essence = media_type_essence(content_type);
        self.media_types()
            .iter()
            .any(|media_type| media_type.eq_ignore_ascii_case(essence))
    }

    /// Classify a `Content-Type` header value; unknown media types map to `None`.
    pub fn from_content_type(content_type: &str) -> ContentKind {
        if ContentKind::Json.accepts(content_type) {
            ContentKind::Json
        } else if ContentKind::Xml.accepts(content_type) {
            ContentKind::Xml
        } else {
            ContentKind::None
        }
    }

    /// `Content-Type` value emitted on responses of this kind
    pub fn response_content_type(self) -> Option<&'static str> {
        match self {
            ContentKind::None => None,
            ContentKind::Json => Some("application/json; charset=utf-8"),
            ContentKind::Xml => Some("application/xml; charset=utf-8"),
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKind::None => write!(f, "none"),
            ContentKind::Json => write!(f, "json"),
            ContentKind::Xml => write!(f, "xml"),
        }
    }
}

/// Strip parameters from a media type: `application/json; charset=utf-8` -> `application/json`
pub fn media_type_essence(value: &str) -> &str {
    value.split(';').next().unwrap_or_default().trim()
}

/// Expected request body or response body.
///
/// `Text` is used verbatim; `Structured` is a value tree compared and
/// rendered according to the content kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Structured(serde_json::Value),
}

impl Content {
    /// Capture any serializable value as structured content.
    pub fn structured<T: Serialize + ?Sized>(value: &T) -> Result<Self, MockError> {
        Ok(Content::Structured(serde_json::to_value(value)?))
    }

    /// Whether rendering this content yields an empty body
    pub fn is_empty(&self) -> bool {
        match self {
            Content::Text(text) => text.is_empty(),
            Content::Structured(value) => value.is_null(),
        }
    }

    /// JSON rendering used in verification reports
    pub fn to_json_string(&self) -> String {
        match self {
            Content::Text(text) => text.clone(),
            Content::Structured(value) => serde_json::to_string(value).unwrap_or_default(),
        }
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Text(text.to_string())
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Text(text)
    }
}

impl From<serde_json::Value> for Content {
    fn from(value: serde_json::Value) -> Self {
        Content::Structured(value)
    }
}

// ============================================================================
// Request
// ============================================================================

/// An inbound request as seen by the matcher, with its body fully read.
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub method: Method,
    /// Request target as received: origin-form (`/path?query`) or absolute-form
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl MockRequest {
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Append a header value. Invalid names or values are dropped with a warning.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => warn!(header = name, "Dropping invalid request header"),
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Raw `Content-Type` header value, if present and printable
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    /// All values sent for a header name (case-insensitive lookup).
    /// Comma-separated lists are returned both whole and split.
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
            return Vec::new();
        };
        let mut values = Vec::new();
        for value in self.headers.get_all(name) {
            if let Ok(value) = value.to_str() {
                values.push(value);
                if value.contains(',') {
                    values.extend(value.split(',').map(str::trim));
                }
            }
        }
        values
    }
}

// ============================================================================
// Response
// ============================================================================

/// Headers that belong to the body rather than to the message, mirroring
/// the split between message headers and content headers.
const CONTENT_LEVEL_HEADERS: &[&str] = &[
    "allow",
    "content-disposition",
    "content-encoding",
    "content-language",
    "content-length",
    "content-location",
    "content-md5",
    "content-range",
    "content-type",
    "expires",
    "last-modified",
];

pub(crate) fn is_content_level_header(name: &str) -> bool {
    CONTENT_LEVEL_HEADERS
        .iter()
        .any(|header| header.eq_ignore_ascii_case(name))
}

/// Body of a response together with its own header set.
#[derive(Debug, Clone, Default)]
pub struct ResponseContent {
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Outbound response produced by the dispatcher.
#[derive(Debug, Clone, Default)]
pub struct MockResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub content: ResponseContent,
}

impl MockResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    /// Set the body and, when given, its content type.
    pub fn with_body(mut self, body: impl Into<Bytes>, content_type: Option<&str>) -> Self {
        self.content.body = body.into();
        if let Some(content_type) = content_type {
            self.insert_header(CONTENT_TYPE.as_str(), content_type);
        }
        self
    }

    /// Set a header, replacing any previous value.
    ///
    /// Content-level headers cannot live in the message header set and are
    /// attached to the content's headers instead. Returns `false` when the
    /// name or value is not a valid header.
    pub fn insert_header(&mut self, name: &str, value: &str) -> bool {
        let (Ok(header_name), Ok(header_value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) else {
            return false;
        };
        if is_content_level_header(name) {
            self.content.headers.insert(header_name, header_value);
        } else {
            self.headers.insert(header_name, header_value);
        }
        true
    }

    /// Look a header up in the message headers, then in the content headers.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .or_else(|| self.content.headers.get(name))
            .and_then(|value| value.to_str().ok())
    }

    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.content.body)
    }
}

// ============================================================================
// Capabilities
// ============================================================================

/// Custom request check evaluated after every built-in criterion.
pub type RequestPredicate = Arc<dyn Fn(&MockRequest) -> bool + Send + Sync>;

/// Replaces the whole response path; its errors are returned verbatim.
pub type ResponseBuilderFn = Arc<dyn Fn(&MockRequest) -> anyhow::Result<MockResponse> + Send + Sync>;

// ============================================================================
// Response Template
// ============================================================================

/// Response an expectation replays when it matches.
///
/// A response builder, when set, supersedes every other field.
#[derive(Clone)]
pub struct ResponseTemplate {
    pub(crate) status: StatusCode,
    pub(crate) content_kind: ContentKind,
    pub(crate) content: Option<Content>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) builder: Option<ResponseBuilderFn>,
}

impl ResponseTemplate {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            content_kind: ContentKind::None,
            content: None,
            headers: Vec::new(),
            builder: None,
        }
    }

    /// Template whose response is produced entirely by `builder`.
    pub fn from_fn<F>(builder: F) -> Self
    where
        F: Fn(&MockRequest) -> anyhow::Result<MockResponse> + Send + Sync + 'static,
    {
        Self {
            builder: Some(Arc::new(builder)),
            ..Self::default()
        }
    }

    pub fn content(mut self, kind: ContentKind, content: impl Into<Content>) -> Self {
        self.content_kind = kind;
        self.content = Some(content.into());
        self
    }

    /// Serialize `value` as a JSON body.
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Result<Self, MockError> {
        Ok(self.content(ContentKind::Json, Content::structured(value)?))
    }

    /// Serialize `value` as an XML body.
    pub fn xml<T: Serialize + ?Sized>(self, value: &T) -> Result<Self, MockError> {
        Ok(self.content(ContentKind::Xml, Content::structured(value)?))
    }

    /// Set a response header; a later value for the same name wins.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value,
            None => self.headers.push((name, value)),
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
            .fold(self, |template, (name, value)| template.header(name, value))
    }

}

impl Default for ResponseTemplate {
    fn default() -> Self {
        Self::new(StatusCode::OK)
    }
}

impl fmt::Debug for ResponseTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseTemplate")
            .field("status", &self.status)
            .field("content_kind", &self.content_kind)
            .field("content", &self.content)
            .field("headers", &self.headers)
            .field("builder", &self.builder.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

// ============================================================================
// Unexpected Requests
// ============================================================================

/// Snapshot of a request that matched no live expectation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnexpectedRequest {
    pub method: String,
    pub uri: String,
    pub headers: BTreeMap<String, Vec<String>>,
    pub body: String,
    pub received_at: String,
}

impl UnexpectedRequest {
    pub(crate) fn capture(request: &MockRequest) -> Self {
        let mut headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, value) in &request.headers {
            headers
                .entry(name.as_str().to_string())
                .or_default()
                .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
        }
        Self {
            method: request.method.to_string(),
            uri: request.uri.clone(),
            headers,
            body: request.body_text().into_owned(),
            received_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl fmt::Display for UnexpectedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers = self
            .headers
            .iter()
            .map(|(name, values)| format!("{name} - {}", values.join(", ")))
            .collect::<Vec<_>>()
            .join("|");
        write!(
            f,
            "Request Uri: '{}' | Request Method: '{}' | Request Headers: '{}' | Request Content: '{}'",
            self.uri, self.method, headers, self.body
        )
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised by the mock engine and its server
#[derive(Debug, thiserror::Error)]
pub enum MockError {
    #[error("Invalid configuration '{input}': {reason}")]
    Configuration { input: String, reason: String },
    #[error("{0}")]
    Verification(Box<VerificationReport>),
    #[error("Failed to serialize content: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to load config file {path}: {reason}")]
    ConfigFile { path: String, reason: String },
}

impl MockError {
    pub(crate) fn configuration(input: impl Into<String>, reason: impl Into<String>) -> Self {
        MockError::Configuration {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// The aggregated report carried by a verification failure
    pub fn report(&self) -> Option<&VerificationReport> {
        match self {
            MockError::Verification(report) => Some(report.as_ref()),
            _ => None,
        }
    }
}
