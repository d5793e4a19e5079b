//! Response synthesis from a matched template.

use super::types::{Content, ContentKind, MockRequest, MockResponse, ResponseTemplate};
use crate::predicate::{value_to_xml, ContentError, DEFAULT_XML_ROOT};
use anyhow::Context;
use tracing::warn;

/// Produce the response for a matched request.
///
/// A response builder replaces everything else and its result (or error)
/// is returned as is. Otherwise the status, rendered content and headers
/// of the template are applied in that order.
pub(crate) fn synthesize(template: &ResponseTemplate, request: &MockRequest) -> anyhow::Result<MockResponse> {
    if let Some(builder) = &template.builder {
        return builder(request);
    }

    let mut response = MockResponse::new(template.status);

    if let Some(content) = template.content.as_ref().filter(|content| !content.is_empty()) {
        let body = render_content(template.content_kind, content)
            .with_context(|| format!("Failed to render {} response content", template.content_kind))?;
        response = response.with_body(body, template.content_kind.response_content_type());
    }

    for (name, value) in &template.headers {
        if !response.insert_header(name, value) {
            warn!(header = %name, "Skipping invalid response header");
        }
    }

    Ok(response)
}

/// Render response content: text is passed through, structured content
/// becomes JSON, or XML under the default root.
pub fn render_content(kind: ContentKind, content: &Content) -> Result<String, ContentError> {
    match content {
        Content::Text(text) => Ok(text.clone()),
        Content::Structured(value) => match kind {
            ContentKind::Xml => value_to_xml(value, DEFAULT_XML_ROOT),
            ContentKind::Json | ContentKind::None => {
                serde_json::to_string(value).map_err(|e| ContentError::MalformedJson(e.to_string()))
            }
        },
    }
}
