//! TCP transport for a `MockEngine`.
//!
//! `MockServer` binds a listener, serves HTTP/1.1 connections with hyper
//! (one task per connection) and hands every request to
//! `handle_request`. The accept loop stops on `shutdown()` or when the
//! server is dropped.

use crate::config::MockServerConfig;
use crate::mock::{handle_request, ExpectationBuilder, MockEngine, MockError, UnexpectedRequest, VerificationReport};
use crate::wait::Suspend;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

/// A running mock HTTP server.
pub struct MockServer {
    engine: Arc<MockEngine>,
    addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
}

impl MockServer {
    /// Start a server on the configured host and port (ephemeral if unset).
    pub async fn start(config: MockServerConfig) -> Result<Self, MockError> {
        config.validate()?;
        let engine = Arc::new(MockEngine::new(&config));
        Self::serve(&config, engine).await
    }

    /// Start a server whose simulated timeouts go through `suspender`.
    pub async fn start_with_suspender(
        config: MockServerConfig,
        suspender: Arc<dyn Suspend>,
    ) -> Result<Self, MockError> {
        config.validate()?;
        let engine = Arc::new(MockEngine::with_suspender(&config, suspender));
        Self::serve(&config, engine).await
    }

    async fn serve(config: &MockServerConfig, engine: Arc<MockEngine>) -> Result<Self, MockError> {
        let port = config.port.unwrap_or(0);
        let bind_error = |source| MockError::Bind {
            addr: format!("{}:{}", config.host, port),
            source,
        };
        let listener = TcpListener::bind((config.host.as_str(), port))
            .await
            .map_err(bind_error)?;
        let addr = listener.local_addr().map_err(bind_error)?;
        info!("Mock server listening on {}", addr);

        let (shutdown_tx, _) = broadcast::channel(1);
        let mut shutdown_rx = shutdown_tx.subscribe();
        let serving = Arc::clone(&engine);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, peer)) => {
                                let engine = Arc::clone(&serving);
                                tokio::spawn(async move {
                                    let io = TokioIo::new(stream);
                                    let service = service_fn(move |req| {
                                        handle_request(req, Arc::clone(&engine))
                                    });
                                    if let Err(e) = http1::Builder::new()
                                        .serve_connection(io, service)
                                        .await
                                    {
                                        debug!("Connection error from {}: {}", peer, e);
                                    }
                                });
                            }
                            Err(e) => {
                                error!("Accept error on {}: {}", addr, e);
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Mock server on {} shutting down", addr);
                        break;
                    }
                }
            }
        });

        Ok(Self {
            engine,
            addr,
            shutdown_tx,
        })
    }

    pub fn address(&self) -> SocketAddr {
        self.addr
    }

    /// Base URI, e.g. `http://127.0.0.1:50123`
    pub fn uri(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Absolute URL for a path on this server
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.uri(), path)
        } else {
            format!("{}/{}", self.uri(), path)
        }
    }

    pub fn engine(&self) -> &Arc<MockEngine> {
        &self.engine
    }

    pub fn expect(&self, method: Method, uri: &str) -> Result<ExpectationBuilder<'_>, MockError> {
        self.engine.expect(method, uri)
    }

    pub fn expect_get(&self, uri: &str) -> Result<ExpectationBuilder<'_>, MockError> {
        self.engine.expect_get(uri)
    }

    pub fn expect_post(&self, uri: &str) -> Result<ExpectationBuilder<'_>, MockError> {
        self.engine.expect_post(uri)
    }

    pub fn expect_put(&self, uri: &str) -> Result<ExpectationBuilder<'_>, MockError> {
        self.engine.expect_put(uri)
    }

    pub fn expect_delete(&self, uri: &str) -> Result<ExpectationBuilder<'_>, MockError> {
        self.engine.expect_delete(uri)
    }

    pub fn expect_patch(&self, uri: &str) -> Result<ExpectationBuilder<'_>, MockError> {
        self.engine.expect_patch(uri)
    }

    pub fn expect_options(&self, uri: &str) -> Result<ExpectationBuilder<'_>, MockError> {
        self.engine.expect_options(uri)
    }

    pub fn set_default_status(&self, status: StatusCode) {
        self.engine.set_default_status(status);
    }

    pub fn unexpected_requests(&self) -> Vec<UnexpectedRequest> {
        self.engine.unexpected_requests()
    }

    pub fn report(&self) -> VerificationReport {
        self.engine.report()
    }

    pub fn verify_expectations(&self) -> Result<(), MockError> {
        self.engine.verify_expectations()
    }

    pub fn verify_expectations_and_unexpected(&self) -> Result<(), MockError> {
        self.engine.verify_expectations_and_unexpected()
    }

    /// Stop accepting connections. In-flight requests run to completion.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
