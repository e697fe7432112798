//! Reusable TCP connection pool for a single target.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use super::connection::{Liveness, PooledConnection, set_keepalive};
use super::error::PoolError;

/// Default dial timeout (10 seconds).
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Default TCP keep-alive idle time (90 seconds).
pub const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(90);

/// Default number of idle connections kept for reuse.
pub const DEFAULT_MAX_IDLE: usize = 5;

/// TCP dialing and pooling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpConfig {
    /// Upper bound for a fresh dial (default: 10s).
    #[serde(with = "humantime_serde")]
    pub dial_timeout: Duration,
    /// Keep-alive idle time set on dialed sockets (default: 90s, 0 disables).
    #[serde(with = "humantime_serde")]
    pub keepalive: Duration,
    /// Return connections to the pool after use (default: true).
    pub reuse_connections: bool,
    /// Idle connections retained for reuse (default: 5).
    pub max_idle: usize,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            keepalive: DEFAULT_KEEPALIVE,
            reuse_connections: true,
            max_idle: DEFAULT_MAX_IDLE,
        }
    }
}

impl TcpConfig {
    /// Set the dial timeout.
    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    /// Set the keep-alive idle time.
    pub fn with_keepalive(mut self, keepalive: Duration) -> Self {
        self.keepalive = keepalive;
        self
    }

    /// Enable or disable connection reuse.
    pub fn with_reuse(mut self, reuse: bool) -> Self {
        self.reuse_connections = reuse;
        self
    }

    /// Set the idle capacity.
    pub fn with_max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = max_idle;
        self
    }
}

/// Counters describing pool activity since creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Fresh connections dialed.
    pub dials: u64,
    /// Idle connections handed out again.
    pub reuses: u64,
    /// Connections closed instead of being pooled or reused.
    pub discarded: u64,
}

/// Pool of TCP connections to one target address.
///
/// Connections are liveness-checked before being handed out again. The idle
/// list is guarded by a mutex that is never held across an await point, so
/// concurrent `acquire`/`release` calls are safe and each connection has at
/// most one borrower.
#[derive(Debug)]
pub struct ConnectionPool {
    target: String,
    config: TcpConfig,
    idle: Mutex<Vec<PooledConnection>>,
    closed: AtomicBool,
    dials: AtomicU64,
    reuses: AtomicU64,
    discarded: AtomicU64,
}

impl ConnectionPool {
    /// Create an empty pool for `target` (`host:port`).
    pub fn new(target: impl Into<String>, config: TcpConfig) -> Self {
        Self {
            target: target.into(),
            config,
            idle: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            dials: AtomicU64::new(0),
            reuses: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn config(&self) -> &TcpConfig {
        &self.config
    }

    /// Take a live connection, dialing a new one if none can be reused.
    ///
    /// Returns the connection and whether it came from the idle list.
    pub async fn acquire(
        &self,
        cancel: &CancellationToken,
    ) -> Result<(PooledConnection, bool), PoolError> {
        if cancel.is_cancelled() {
            return Err(PoolError::Cancelled);
        }

        if self.config.reuse_connections {
            while let Some(conn) = self.pop_idle() {
                match conn.check_liveness() {
                    Liveness::Alive => {
                        self.reuses.fetch_add(1, Ordering::Relaxed);
                        tracing::debug!(target = %self.target, age = ?conn.age(), "Reusing pooled TCP connection");
                        return Ok((conn, true));
                    }
                    Liveness::Closed => {
                        tracing::debug!(target = %self.target, "Pooled connection closed by peer, discarding");
                        self.discard(conn);
                    }
                    Liveness::Failed(e) => {
                        tracing::debug!(target = %self.target, error = %e, "Pooled connection failed liveness check, discarding");
                        self.discard(conn);
                    }
                }
            }
        }

        let conn = self.dial(cancel).await?;
        self.dials.fetch_add(1, Ordering::Relaxed);
        Ok((conn, false))
    }

    /// Return a connection after use.
    ///
    /// The connection is closed instead of pooled when reuse is disabled, the
    /// pool is closed, the connection belongs to another target, or the idle
    /// list is full.
    pub fn release(&self, conn: PooledConnection) {
        if !self.config.reuse_connections || self.closed.load(Ordering::Acquire) {
            conn.close();
            return;
        }

        if conn.target() != self.target {
            tracing::warn!(
                pool_target = %self.target,
                conn_target = %conn.target(),
                "Refusing to pool connection dialed for another target"
            );
            self.discard(conn);
            return;
        }

        let mut idle = self.lock_idle();
        if idle.len() >= self.config.max_idle {
            drop(idle);
            self.discard(conn);
            return;
        }
        idle.push(conn);
    }

    /// Close every idle connection and return how many were closed.
    ///
    /// Calling it again on an empty pool is a no-op returning zero.
    pub fn drain(&self) -> usize {
        let drained: Vec<PooledConnection> = std::mem::take(&mut *self.lock_idle());
        let count = drained.len();
        for conn in drained {
            conn.close();
        }
        if count > 0 {
            tracing::debug!(target = %self.target, count, "Drained connection pool");
        }
        count
    }

    /// Stop pooling and drain. Later releases close their connection.
    pub fn close(&self) -> usize {
        self.closed.store(true, Ordering::Release);
        self.drain()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of idle connections currently pooled.
    pub fn idle_len(&self) -> usize {
        self.lock_idle().len()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            dials: self.dials.load(Ordering::Relaxed),
            reuses: self.reuses.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }

    // --- Private helpers ---

    fn lock_idle(&self) -> MutexGuard<'_, Vec<PooledConnection>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pop_idle(&self) -> Option<PooledConnection> {
        self.lock_idle().pop()
    }

    fn discard(&self, conn: PooledConnection) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
        conn.close();
    }

    async fn dial(&self, cancel: &CancellationToken) -> Result<PooledConnection, PoolError> {
        let dial_timeout = self.config.dial_timeout;
        let stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PoolError::Cancelled),
            result = timeout(dial_timeout, TcpStream::connect(self.target.as_str())) => match result {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => return Err(PoolError::Dial(e)),
                Err(_) => return Err(PoolError::DialTimeout(dial_timeout)),
            },
        };

        if let Err(e) = set_keepalive(&stream, self.config.keepalive) {
            tracing::warn!(target = %self.target, error = %e, "Failed to enable TCP keep-alive");
        }

        tracing::debug!(target = %self.target, "Dialed new TCP connection");
        Ok(PooledConnection::new(stream, self.target.clone()))
    }
}
