//! Expectation-driven HTTP mock engine.
//!
//! This module provides:
//! - `MockEngine`: owns the expectation store and the unexpected-request log
//! - `ExpectationBuilder`: fluent configuration of one expectation
//! - `ResponseTemplate`: the response an expectation replays on match
//! - `VerificationReport`: aggregated unmet expectations and unexpected requests
//!
//! Each engine is an explicit instance; nothing is shared between engines.
//!
//! ## Module Structure
//!
//! - `types`: Data model (requests, responses, content, errors)
//! - `builder`: Fluent expectation configuration with an explicit finalize step
//! - `store`: Ordered expectation store and unexpected-request log
//! - `core`: `MockEngine` and the dispatch decision
//! - `handler`: hyper entry point wrapping `MockEngine::dispatch`
//! - `response`: Response synthesis from a matched template
//! - `verify`: Verification reports

mod builder;
mod core;
mod handler;
mod response;
mod store;
mod types;
mod verify;

#[cfg(test)]
mod tests;

pub use builder::ExpectationBuilder;
pub use core::MockEngine;
pub use handler::handle_request;
pub use store::{Expectation, ExpectationId};
pub use types::{
    Content, ContentKind, MockError, MockRequest, MockResponse, RequestPredicate,
    ResponseBuilderFn, ResponseContent, ResponseTemplate, UnexpectedRequest, JSON_MEDIA_TYPES,
    XML_MEDIA_TYPES,
};
pub use verify::{UnmetExpectation, VerificationReport};
