//! XML <-> value tree conversion.
//!
//! The value tree of a document is the content of its root element; the root
//! name itself is discarded. Conventions:
//! - child elements become object keys; repeated names collect into an array
//! - attributes become `@name` keys
//! - text of an element with attributes or children becomes `#text`
//! - an empty element is `null`, a text-only element is a string
//! - whitespace-only text of a leaf element is formatting and reads as empty

use super::content::ContentError;
use serde_json::{Map, Value};
use sxd_document::dom::{ChildOfElement, ChildOfRoot, Document, Element};
use sxd_document::{parser, writer, Package};

/// Root element name used when rendering structured content as XML.
pub const DEFAULT_XML_ROOT: &str = "Root";

/// Item element name used for the members of a top-level array.
const ARRAY_ITEM: &str = "item";

/// Parse an XML document into the value tree of its root element's content.
pub fn xml_to_value(xml: &str) -> Result<Value, ContentError> {
    let package = parser::parse(xml).map_err(|e| ContentError::MalformedXml(format!("{e:?}")))?;
    let document = package.as_document();
    let root = document
        .root()
        .children()
        .into_iter()
        .find_map(|child| match child {
            ChildOfRoot::Element(element) => Some(element),
            _ => None,
        })
        .ok_or_else(|| ContentError::MalformedXml("document has no root element".to_string()))?;
    Ok(element_to_value(root))
}

fn element_to_value(element: Element<'_>) -> Value {
    let mut fields = Map::new();
    for attribute in element.attributes() {
        fields.insert(
            format!("@{}", attribute.name().local_part()),
            Value::String(attribute.value().to_string()),
        );
    }

    let mut text = String::new();
    let mut has_children = false;
    for child in element.children() {
        match child {
            ChildOfElement::Element(child) => {
                has_children = true;
                let name = child.name().local_part().to_string();
                let value = element_to_value(child);
                // Element values are never arrays, so an array here means a repeated name.
                match fields.get_mut(&name) {
                    Some(Value::Array(items)) => items.push(value),
                    Some(existing) => {
                        let first = existing.take();
                        *existing = Value::Array(vec![first, value]);
                    }
                    None => {
                        fields.insert(name, value);
                    }
                }
            }
            ChildOfElement::Text(node) => text.push_str(node.text()),
            _ => {}
        }
    }

    if !has_children && text.trim().is_empty() {
        text.clear();
    }

    if fields.is_empty() {
        return if text.is_empty() {
            Value::Null
        } else {
            Value::String(text)
        };
    }

    if has_children {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            fields.insert("#text".to_string(), Value::String(trimmed.to_string()));
        }
    } else if !text.is_empty() {
        fields.insert("#text".to_string(), Value::String(text));
    }
    Value::Object(fields)
}

/// Render a value tree as an XML document under a root element named `root`.
pub fn value_to_xml(value: &Value, root: &str) -> Result<String, ContentError> {
    validate_name(root)?;

    let package = Package::new();
    let document = package.as_document();
    let root_element = document.create_element(root);
    document.root().append_child(root_element);
    write_value(&document, root_element, value, true)?;

    let mut output = Vec::new();
    writer::format_document(&document, &mut output)
        .map_err(|e| ContentError::XmlConversion(e.to_string()))?;
    String::from_utf8(output).map_err(|e| ContentError::XmlConversion(e.to_string()))
}

fn write_value(
    document: &Document<'_>,
    element: Element<'_>,
    value: &Value,
    top_level: bool,
) -> Result<(), ContentError> {
    match value {
        Value::Null => {}
        Value::Bool(_) | Value::Number(_) | Value::String(_) => {
            element.append_child(document.create_text(&scalar_text(value)));
        }
        Value::Array(items) => {
            if !top_level {
                return Err(ContentError::XmlConversion(
                    "nested arrays have no XML representation".to_string(),
                ));
            }
            for item in items {
                append_child_value(document, element, ARRAY_ITEM, item)?;
            }
        }
        Value::Object(fields) => {
            for (key, field) in fields {
                if let Some(attribute) = key.strip_prefix('@') {
                    validate_name(attribute)?;
                    element.set_attribute_value(attribute, &scalar_text(field));
                } else if key == "#text" {
                    element.append_child(document.create_text(&scalar_text(field)));
                } else if let Value::Array(items) = field {
                    for item in items {
                        append_child_value(document, element, key, item)?;
                    }
                } else {
                    append_child_value(document, element, key, field)?;
                }
            }
        }
    }
    Ok(())
}

fn append_child_value(
    document: &Document<'_>,
    parent: Element<'_>,
    name: &str,
    value: &Value,
) -> Result<(), ContentError> {
    validate_name(name)?;
    let child = document.create_element(name);
    parent.append_child(child);
    write_value(document, child, value, false)
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn validate_name(name: &str) -> Result<(), ContentError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid_start && valid_rest {
        Ok(())
    } else {
        Err(ContentError::XmlConversion(format!(
            "'{name}' is not a valid XML name"
        )))
    }
}
