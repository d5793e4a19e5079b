//! URI matching for expectations.
//!
//! An expectation URI is either a literal URI (absolute, or relative to
//! `http://localhost`) or a regular expression. Literal URIs compare the
//! path+query, user-info and fragment components case-insensitively after
//! normalizing percent-escapes; scheme, host and port are ignored.
//! Patterns are searched for anywhere in the request path+query unless
//! they are anchored.

use crate::mock::MockError;
use regex::{Regex, RegexBuilder};

/// Characters allowed unescaped in a well-formed URI (RFC 3986 unreserved,
/// gen-delims without brackets, sub-delims).
const URI_SYMBOLS: &[u8] = b"-._~:/?#@!$&'()*+,;=";

/// Compiled URI criterion of an expectation.
#[derive(Debug, Clone)]
pub struct UriMatcher {
    raw: String,
    kind: UriKind,
}

#[derive(Debug, Clone)]
enum UriKind {
    Literal(UriParts),
    Pattern(Regex),
}

impl UriMatcher {
    /// Classify and compile a URI or pattern.
    ///
    /// Well-formed URIs are literal; anything else must compile as a regular
    /// expression. Fails with a configuration error naming the input otherwise.
    pub fn parse(input: &str) -> Result<Self, MockError> {
        if input.trim().is_empty() {
            return Err(MockError::configuration(input, "request URI is empty"));
        }

        if is_well_formed_uri(input) {
            return Ok(Self {
                raw: input.to_string(),
                kind: UriKind::Literal(UriParts::parse(input)),
            });
        }

        RegexBuilder::new(input)
            .dot_matches_new_line(true)
            .build()
            .map(|regex| Self {
                raw: input.to_string(),
                kind: UriKind::Pattern(regex),
            })
            .map_err(|e| {
                MockError::configuration(
                    input,
                    format!("not a well-formed URI nor a valid regular expression: {e}"),
                )
            })
    }

    /// The URI or pattern as registered
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_pattern(&self) -> bool {
        matches!(self.kind, UriKind::Pattern(_))
    }

    /// Check a request target (origin-form or absolute-form) against this criterion.
    pub fn matches(&self, request_uri: &str) -> bool {
        match &self.kind {
            UriKind::Pattern(regex) => regex.is_match(split_uri(request_uri).path_and_query),
            UriKind::Literal(expected) => expected.equivalent(&UriParts::parse(request_uri)),
        }
    }
}

/// Normalized components of a URI that take part in literal comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriParts {
    pub user_info: String,
    pub path_and_query: String,
    pub fragment: String,
}

impl UriParts {
    /// Split and normalize a URI. Never fails; relative targets get a leading `/`.
    pub fn parse(uri: &str) -> Self {
        let raw = split_uri(uri);
        let path_and_query = if raw.path_and_query.starts_with('/') {
            normalize_escapes(raw.path_and_query)
        } else {
            format!("/{}", normalize_escapes(raw.path_and_query))
        };
        Self {
            user_info: normalize_escapes(raw.user_info),
            path_and_query,
            fragment: normalize_escapes(raw.fragment),
        }
    }

    /// Component-wise, case-insensitive comparison
    pub fn equivalent(&self, other: &UriParts) -> bool {
        self.path_and_query.eq_ignore_ascii_case(&other.path_and_query)
            && self.user_info.eq_ignore_ascii_case(&other.user_info)
            && self.fragment.eq_ignore_ascii_case(&other.fragment)
    }
}

struct RawUri<'a> {
    user_info: &'a str,
    path_and_query: &'a str,
    fragment: &'a str,
}

fn split_uri(uri: &str) -> RawUri<'_> {
    let (rest, fragment) = uri.split_once('#').unwrap_or((uri, ""));
    match scheme_end(rest) {
        Some(authority_start) => {
            let after_scheme = &rest[authority_start..];
            let authority_end = after_scheme
                .find(|c| c == '/' || c == '?')
                .unwrap_or(after_scheme.len());
            let authority = &after_scheme[..authority_end];
            let user_info = authority
                .rsplit_once('@')
                .map(|(user_info, _)| user_info)
                .unwrap_or("");
            RawUri {
                user_info,
                path_and_query: &after_scheme[authority_end..],
                fragment,
            }
        }
        None => RawUri {
            user_info: "",
            path_and_query: rest,
            fragment,
        },
    }
}

/// Byte offset just past `scheme://`, if the input starts with a scheme.
fn scheme_end(uri: &str) -> Option<usize> {
    let separator = uri.find("://")?;
    let scheme = &uri[..separator];
    let mut chars = scheme.chars();
    let starts_with_letter = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    let rest_valid = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    (starts_with_letter && rest_valid).then_some(separator + 3)
}

fn is_well_formed_uri(input: &str) -> bool {
    if input.matches('#').count() > 1 {
        return false;
    }
    match scheme_end(input) {
        Some(authority_start) => {
            let after_scheme = &input[authority_start..];
            let authority_end = after_scheme
                .find(|c| c == '/' || c == '?' || c == '#')
                .unwrap_or(after_scheme.len());
            let (authority, rest) = after_scheme.split_at(authority_end);
            !authority.is_empty() && has_uri_chars_only(authority, true) && has_uri_chars_only(rest, false)
        }
        None => has_uri_chars_only(input, false),
    }
}

fn has_uri_chars_only(part: &str, allow_brackets: bool) -> bool {
    let bytes = part.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'%' {
            let escaped = bytes
                .get(i + 1..i + 3)
                .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
            if !escaped {
                return false;
            }
            i += 3;
            continue;
        }
        let allowed = b.is_ascii_alphanumeric()
            || URI_SYMBOLS.contains(&b)
            || (allow_brackets && matches!(b, b'[' | b']'));
        if !allowed {
            return false;
        }
        i += 1;
    }
    true
}

/// Decode escapes of unreserved characters and upper-case the rest, so
/// `%75` and `u` compare equal while `%3E` and `>` stay distinct.
fn normalize_escapes(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let Some(decoded) = bytes.get(i + 1..i + 3).and_then(decode_hex_pair) {
                if decoded.is_ascii_alphanumeric() || matches!(decoded, b'-' | b'.' | b'_' | b'~') {
                    out.push(decoded);
                } else {
                    out.push(b'%');
                    out.extend(bytes[i + 1..i + 3].iter().map(u8::to_ascii_uppercase));
                }
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn decode_hex_pair(pair: &[u8]) -> Option<u8> {
    let text = std::str::from_utf8(pair).ok()?;
    u8::from_str_radix(text, 16).ok()
}
