//! Connection pool error types.

use std::time::Duration;

use thiserror::Error;

/// Errors returned by [`ConnectionPool::acquire`](super::ConnectionPool::acquire).
#[derive(Debug, Error)]
pub enum PoolError {
    /// The dial itself failed (refused, unreachable, bad address).
    #[error("TCP connection failed: {0}")]
    Dial(#[from] std::io::Error),

    /// The dial did not complete within the configured timeout.
    #[error("TCP connection timed out after {0:?}")]
    DialTimeout(Duration),

    /// The shared cancellation token fired before a connection was ready.
    #[error("connection attempt cancelled")]
    Cancelled,
}
