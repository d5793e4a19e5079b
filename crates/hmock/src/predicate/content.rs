//! Structural body equivalence.
//!
//! JSON bodies are compared as value trees: objects ignore key order,
//! arrays keep it. XML bodies are converted to the same tree shape
//! (see `xml`) and compared the same way. Structured expected content is
//! rendered as XML under a synthetic root before comparison, so both sides
//! go through one conversion path.

use super::xml::{value_to_xml, xml_to_value, DEFAULT_XML_ROOT};
use crate::mock::{Content, ContentKind};
use serde_json::Value;
use std::borrow::Cow;

/// Failure to compare two bodies structurally.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContentError {
    #[error("Malformed JSON: {0}")]
    MalformedJson(String),
    #[error("Malformed XML: {0}")]
    MalformedXml(String),
    #[error("No structural comparison available for content type '{0}'")]
    UnsupportedContentType(String),
    #[error("XML conversion failed: {0}")]
    XmlConversion(String),
}

/// Compare `actual` with `expected` using the rules of `kind`.
///
/// With no kind, textual expected content is compared byte-for-byte and
/// structured expected content cannot be compared at all.
pub fn content_equivalent(
    kind: ContentKind,
    content_type: &str,
    expected: &Content,
    actual: &str,
) -> Result<bool, ContentError> {
    match kind {
        ContentKind::Json => json_equivalent(expected, actual),
        ContentKind::Xml => xml_equivalent(expected, actual),
        ContentKind::None => match expected {
            Content::Text(text) => Ok(text == actual),
            Content::Structured(_) => Err(ContentError::UnsupportedContentType(
                content_type.to_string(),
            )),
        },
    }
}

pub fn json_equivalent(expected: &Content, actual: &str) -> Result<bool, ContentError> {
    let expected: Cow<'_, Value> = match expected {
        Content::Text(text) => Cow::Owned(parse_json(text)?),
        Content::Structured(value) => Cow::Borrowed(value),
    };
    let actual = parse_json(actual)?;
    Ok(deep_equals(&expected, &actual))
}

pub fn xml_equivalent(expected: &Content, actual: &str) -> Result<bool, ContentError> {
    let expected = match expected {
        Content::Text(text) => xml_to_value(text)?,
        Content::Structured(value) => xml_to_value(&value_to_xml(value, DEFAULT_XML_ROOT)?)?,
    };
    let actual = xml_to_value(actual)?;
    Ok(deep_equals(&expected, &actual))
}

fn parse_json(text: &str) -> Result<Value, ContentError> {
    serde_json::from_str(text).map_err(|e| ContentError::MalformedJson(e.to_string()))
}

/// Structural equality of two value trees.
///
/// Objects must have exactly the same keys, in any order. Arrays compare
/// element-wise in order. Numbers compare by value, so `1` equals `1.0`.
pub fn deep_equals(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => numbers_equal(a, b),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| deep_equals(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| deep_equals(x, y)))
        }
        _ => false,
    }
}

fn numbers_equal(a: &serde_json::Number, b: &serde_json::Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}
