//! `MockEngine`: expectation registration, request dispatch and verification.

use super::builder::ExpectationBuilder;
use super::response::synthesize;
use super::store::{Expectation, ExpectationId, ExpectationStore, UnexpectedRequestLog};
use super::types::{MockError, MockRequest, MockResponse, ResponseTemplate, UnexpectedRequest};
use super::verify::VerificationReport;
use crate::config::MockServerConfig;
use crate::wait::{Suspend, TokioSuspend};
use hyper::{Method, StatusCode};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Shared mutable state; every match-and-consume decision and every log
/// append happens under one lock.
#[derive(Debug, Default)]
struct EngineState {
    store: ExpectationStore,
    unexpected: UnexpectedRequestLog,
}

/// Outcome of the locked decision step.
enum Decision {
    Respond {
        name: String,
        template: ResponseTemplate,
    },
    TimeOut {
        name: String,
    },
    Unexpected,
}

/// Expectation engine owning its store and unexpected-request log.
///
/// Safe to share across tasks; `dispatch` may run concurrently.
pub struct MockEngine {
    state: Mutex<EngineState>,
    default_status: AtomicU16,
    timeout_simulation: Duration,
    suspender: Arc<dyn Suspend>,
}

impl MockEngine {
    pub fn new(config: &MockServerConfig) -> Self {
        Self::with_suspender(config, Arc::new(TokioSuspend))
    }

    /// Engine whose simulated timeouts go through `suspender`.
    pub fn with_suspender(config: &MockServerConfig, suspender: Arc<dyn Suspend>) -> Self {
        Self {
            state: Mutex::new(EngineState::default()),
            default_status: AtomicU16::new(config.default_status().as_u16()),
            timeout_simulation: config.timeout_simulation(),
            suspender,
        }
    }

    // ===== Registration =====

    /// Start configuring an expectation. Fails immediately on a malformed URI or pattern.
    pub fn expect(&self, method: Method, uri: &str) -> Result<ExpectationBuilder<'_>, MockError> {
        let expectation = Expectation::new(method, uri)?;
        Ok(ExpectationBuilder::new(self, expectation))
    }

    pub fn expect_get(&self, uri: &str) -> Result<ExpectationBuilder<'_>, MockError> {
        self.expect(Method::GET, uri)
    }

    pub fn expect_post(&self, uri: &str) -> Result<ExpectationBuilder<'_>, MockError> {
        self.expect(Method::POST, uri)
    }

    pub fn expect_put(&self, uri: &str) -> Result<ExpectationBuilder<'_>, MockError> {
        self.expect(Method::PUT, uri)
    }

    pub fn expect_delete(&self, uri: &str) -> Result<ExpectationBuilder<'_>, MockError> {
        self.expect(Method::DELETE, uri)
    }

    pub fn expect_patch(&self, uri: &str) -> Result<ExpectationBuilder<'_>, MockError> {
        self.expect(Method::PATCH, uri)
    }

    pub fn expect_options(&self, uri: &str) -> Result<ExpectationBuilder<'_>, MockError> {
        self.expect(Method::OPTIONS, uri)
    }

    pub(crate) fn register(&self, expectation: Expectation) -> ExpectationId {
        let mut state = self.state.lock();
        debug!(
            name = %expectation.name,
            method = %expectation.method,
            uri = %expectation.uri.as_str(),
            repeats = expectation.repeats,
            "Registered expectation"
        );
        let id = state.store.push(expectation);
        debug!(expectations = state.store.len(), "Expectation store updated");
        id
    }

    // ===== Dispatch =====

    /// Decide and produce the response for one request.
    ///
    /// Only a response builder can fail; its error is returned as is.
    pub async fn dispatch(&self, request: MockRequest) -> anyhow::Result<MockResponse> {
        match self.decide(&request) {
            Decision::Respond { name, template } => synthesize(&template, &request).inspect(|response| {
                debug!(
                    expectation = %name,
                    method = %request.method,
                    uri = %request.uri,
                    status = response.status.as_u16(),
                    "Request matched expectation"
                );
            }),
            Decision::TimeOut { name } => {
                debug!(
                    expectation = %name,
                    uri = %request.uri,
                    delay_ms = self.timeout_simulation.as_millis() as u64,
                    "Simulating an unresponsive server"
                );
                self.suspender.suspend(self.timeout_simulation).await;
                Ok(MockResponse::new(self.default_status()))
            }
            Decision::Unexpected => Ok(MockResponse::new(self.default_status())),
        }
    }

    /// Match-and-consume, or record as unexpected, under the state lock.
    /// The lock is released before any suspension or response synthesis.
    fn decide(&self, request: &MockRequest) -> Decision {
        let mut state = self.state.lock();
        if let Some(expectation) = state.store.find_and_consume(request) {
            let name = expectation.name.clone();
            return if expectation.timed_out {
                Decision::TimeOut { name }
            } else {
                Decision::Respond {
                    name,
                    template: expectation.response.clone(),
                }
            };
        }

        let record = state.unexpected.record(request);
        info!(
            method = %record.method,
            uri = %record.uri,
            "Request matched no expectation, recorded as unexpected"
        );
        Decision::Unexpected
    }

    /// Answer a request whose body could not be read in full.
    ///
    /// It is recorded as unexpected and never consumes an expectation.
    pub fn reject_unreadable(&self, request: &MockRequest) -> MockResponse {
        let mut state = self.state.lock();
        let record = state.unexpected.record(request);
        info!(
            method = %record.method,
            uri = %record.uri,
            "Request body unreadable, recorded as unexpected"
        );
        drop(state);
        MockResponse::new(self.default_status())
    }

    // ===== Inspection =====

    /// Status returned for unmatched requests
    pub fn default_status(&self) -> StatusCode {
        StatusCode::from_u16(self.default_status.load(Ordering::Relaxed))
            .unwrap_or(StatusCode::NOT_IMPLEMENTED)
    }

    pub fn set_default_status(&self, status: StatusCode) {
        self.default_status.store(status.as_u16(), Ordering::Relaxed);
    }

    /// Consumed calls of an expectation, `None` for an unknown id.
    pub fn calls(&self, id: ExpectationId) -> Option<u32> {
        self.state.lock().store.get(id).map(Expectation::calls)
    }

    /// Snapshot of a registered expectation
    pub fn expectation(&self, id: ExpectationId) -> Option<Expectation> {
        self.state.lock().store.get(id).cloned()
    }

    pub fn unexpected_requests(&self) -> Vec<UnexpectedRequest> {
        self.state.lock().unexpected.entries().to_vec()
    }

    /// Full report without failing: unmet expectations and unexpected requests.
    pub fn report(&self) -> VerificationReport {
        let state = self.state.lock();
        VerificationReport::full(&state.store, &state.unexpected)
    }

    // ===== Verification =====

    /// Fail if any expectation was called a different number of times than configured.
    pub fn verify_expectations(&self) -> Result<(), MockError> {
        let report = VerificationReport::expectations(&self.state.lock().store);
        Self::into_result(report)
    }

    /// As `verify_expectations`, and also fail on any unexpected request.
    pub fn verify_expectations_and_unexpected(&self) -> Result<(), MockError> {
        Self::into_result(self.report())
    }

    fn into_result(report: VerificationReport) -> Result<(), MockError> {
        if report.is_empty() {
            Ok(())
        } else {
            Err(MockError::Verification(Box::new(report)))
        }
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new(&MockServerConfig::default())
    }
}

impl fmt::Debug for MockEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockEngine")
            .field("state", &*self.state.lock())
            .field("default_status", &self.default_status())
            .field("timeout_simulation", &self.timeout_simulation)
            .finish_non_exhaustive()
    }
}
