//! Request matching for expectations.
//!
//! Every inbound request is evaluated against an expectation in a fixed
//! order, stopping at the first failed criterion:
//! repeat budget, method, URI, headers, content type, body, custom predicate.
//!
//! # Module Structure
//!
//! - `uri` - Literal URI comparison and regex patterns (`UriMatcher`)
//! - `xml` - XML to value-tree conversion and back
//! - `content` - Structural JSON/XML body equivalence
//! - `request` - The combined match decision and its consumption side effect

mod content;
mod request;
mod uri;
mod xml;

pub use content::{content_equivalent, deep_equals, json_equivalent, xml_equivalent, ContentError};
pub use request::{request_matches, try_consume};
pub use uri::{UriMatcher, UriParts};
pub use xml::{value_to_xml, xml_to_value, DEFAULT_XML_ROOT};
