//! TCP connection pool.
//!
//! [`ConnectionPool`] keeps connections to a single target alive between
//! test runs. Idle connections are checked with a non-blocking peek before
//! reuse; dead ones are closed and replaced by a fresh dial.
//!
//! ```rust,no_run
//! use pathprobe::pool::{ConnectionPool, TcpConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> Result<(), pathprobe::pool::PoolError> {
//! let pool = ConnectionPool::new("127.0.0.1:6379", TcpConfig::default());
//! let cancel = CancellationToken::new();
//! let (conn, reused) = pool.acquire(&cancel).await?;
//! assert!(!reused);
//! pool.release(conn);
//! pool.close();
//! # Ok(())
//! # }
//! ```

mod connection;
mod error;
mod manager;

pub use connection::PooledConnection;
pub use error::PoolError;
pub use manager::{
    ConnectionPool, DEFAULT_DIAL_TIMEOUT, DEFAULT_KEEPALIVE, DEFAULT_MAX_IDLE, PoolStats,
    TcpConfig,
};
