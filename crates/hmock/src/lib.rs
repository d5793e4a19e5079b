// Library exports for test suites and benchmarks

// ===== Expectation engine =====
pub mod mock;
pub mod predicate;

// ===== Transport and ambient configuration =====
pub mod config;
pub mod server;
pub mod wait;

pub use config::MockServerConfig;
pub use mock::{
    Content, ContentKind, ExpectationBuilder, ExpectationId, MockEngine, MockError, MockRequest,
    MockResponse, ResponseTemplate, UnexpectedRequest, UnmetExpectation, VerificationReport,
};
pub use server::MockServer;
pub use wait::{Suspend, TokioSuspend};

// Re-exported so callers can name methods and status codes without adding hyper themselves
pub use hyper::{Method, StatusCode};
