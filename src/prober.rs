//! Test orchestration.
//!
//! [`Prober`] owns the shared runtime context (HTTP client, TCP connection
//! pool, cancellation token) and runs the three probes against one target.
//! A run never fails because a probe failed: each probe contributes either a
//! result field or one error entry to [`TestResults`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::config::{ConfigError, ExecutionMode, ProberConfig};
use crate::pool::ConnectionPool;
use crate::probe::http::HttpProbe;
use crate::probe::ping::PingProbe;
use crate::probe::tcp::TcpProbe;
use crate::probe::{Probe, ProbeError};
use crate::results::TestResults;

/// Errors that prevent a prober from being built or a run from starting.
#[derive(Debug, Error)]
pub enum ProberError {
    /// `run_tests` was called after `close`.
    #[error("prober is closed")]
    Closed,

    /// The shared HTTP transport could not be created.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Network path prober for a single target.
///
/// Create once, call [`run_tests`](Self::run_tests) as often as needed, then
/// call [`close`](Self::close). Dropping without closing skips cancellation
/// and leaves pooled connections to be closed by their own destructors
/// instead of being drained.
pub struct Prober {
    config: ProberConfig,
    ping: PingProbe,
    http: HttpProbe,
    tcp: TcpProbe,
    pool: Arc<ConnectionPool>,
    cancel: CancellationToken,
    limiter: Semaphore,
    closed: AtomicBool,
}

impl Prober {
    /// Validate `config` and set up the shared resources.
    ///
    /// # Errors
    /// Returns `ProberError::Config` for invalid settings and
    /// `ProberError::HttpClient` if the HTTP transport cannot be built.
    pub fn new(config: ProberConfig) -> Result<Self, ProberError> {
        config.validate()?;

        let client = config.http.build_client()?;
        let pool = Arc::new(ConnectionPool::new(
            config.target.clone(),
            config.tcp.clone(),
        ));

        let permits = match config.execution.mode {
            ExecutionMode::Sequential => 1,
            ExecutionMode::Concurrent => config.execution.max_concurrent_probes,
        };

        tracing::info!(
            target = %config.target,
            mode = ?config.execution.mode,
            reuse_connections = config.tcp.reuse_connections,
            "Prober created"
        );

        Ok(Self {
            ping: PingProbe::new(config.target.clone(), config.ping.clone()),
            http: HttpProbe::new(&config.target, client, config.http.clone()),
            tcp: TcpProbe::new(Arc::clone(&pool)),
            pool,
            cancel: CancellationToken::new(),
            limiter: Semaphore::new(permits),
            closed: AtomicBool::new(false),
            config,
        })
    }

    pub fn target(&self) -> &str {
        &self.config.target
    }

    pub fn config(&self) -> &ProberConfig {
        &self.config
    }

    /// The TCP connection pool shared by successive runs.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// A handle to the shared cancellation token.
    ///
    /// Cancelling it aborts in-flight probes; later runs fail every probe
    /// with a cancellation error until the prober is replaced.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Run ping, HTTP and TCP probes and aggregate their outcomes.
    ///
    /// # Errors
    /// Only `ProberError::Closed`; probe failures are recorded in
    /// [`TestResults::errors`].
    pub async fn run_tests(&self) -> Result<TestResults, ProberError> {
        if self.is_closed() {
            return Err(ProberError::Closed);
        }

        let mut results = TestResults::new(self.target());
        let start = Instant::now();

        let (ping, http, tcp) = match self.config.execution.mode {
            ExecutionMode::Sequential => {
                tracing::info!("Running ping test...");
                let ping = self.run_probe(&self.ping).await;
                tracing::info!("Running HTTP test...");
                let http = self.run_probe(&self.http).await;
                tracing::info!("Running TCP connectivity test...");
                let tcp = self.run_probe(&self.tcp).await;
                (ping, http, tcp)
            }
            ExecutionMode::Concurrent => {
                tracing::info!("Running ping, HTTP and TCP tests concurrently...");
                tokio::join!(
                    self.run_probe(&self.ping),
                    self.run_probe(&self.http),
                    self.run_probe(&self.tcp),
                )
            }
        };

        let ping = settle(&mut results, self.ping.name(), ping);
        let http = settle(&mut results, self.http.name(), http);
        let tcp = settle(&mut results, self.tcp.name(), tcp);
        results.ping_results = ping;
        results.http_results = http;
        results.tcp_results = tcp;

        tracing::info!(
            target = %self.target(),
            failed = results.errors.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Test run complete"
        );
        Ok(results)
    }

    /// Stop accepting runs, cancel in-flight probes and drain the pool.
    ///
    /// Safe to call more than once; only the first call has an effect.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.cancel.cancel();
        self.limiter.close();
        let drained = self.pool.close();
        tracing::info!(target = %self.target(), drained, "Prober closed");
    }

    async fn run_probe<P: Probe>(&self, probe: &P) -> Result<P::Output, ProbeError> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| ProbeError::Cancelled)?;

        let start = Instant::now();
        let result = probe.run(&self.cancel).await;
        let elapsed = start.elapsed();

        match &result {
            Ok(_) => {
                tracing::debug!(probe = probe.name(), elapsed = ?elapsed, "Probe succeeded");
            }
            Err(e) => match e.partial_tcp() {
                Some(partial) => tracing::warn!(
                    probe = probe.name(),
                    error = %e,
                    connect_time = ?partial.connect_time,
                    "{} test failed",
                    probe.name()
                ),
                None => tracing::warn!(probe = probe.name(), error = %e, "{} test failed", probe.name()),
            },
        }
        result
    }
}

impl std::fmt::Debug for Prober {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prober")
            .field("target", &self.config.target)
            .field("mode", &self.config.execution.mode)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Drop for Prober {
    fn drop(&mut self) {
        if !self.is_closed() {
            tracing::debug!(target = %self.config.target, "Prober dropped without close()");
        }
    }
}

/// Keep a probe's output, or record its error and keep nothing.
fn settle<T>(results: &mut TestResults, probe: &str, outcome: Result<T, ProbeError>) -> Option<T> {
    match outcome {
        Ok(value) => Some(value),
        Err(e) => {
            results.push_error(probe, e);
            None
        }
    }
}
