//! Suspension used to simulate an unresponsive server.
//!
//! A timed-out expectation holds its dispatch for the configured interval
//! before answering with the default status. The wait goes through the
//! `Suspend` trait so tests can observe it without sleeping.

use async_trait::async_trait;
use std::time::Duration;

/// Default simulated timeout, long enough for any client timeout to fire first.
pub const DEFAULT_TIMEOUT_SIMULATION: Duration = Duration::from_secs(120);

/// Suspends the current dispatch for a given interval.
#[async_trait]
pub trait Suspend: Send + Sync {
    async fn suspend(&self, duration: Duration);
}

/// Suspension backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSuspend;

#[async_trait]
impl Suspend for TokioSuspend {
    async fn suspend(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
