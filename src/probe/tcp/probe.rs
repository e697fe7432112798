//! TCP connect probe.
//!
//! Measures how long it takes to obtain a connection to the target through
//! the shared [`ConnectionPool`]. A reused connection reports near-zero
//! connect time, a fresh one the full dial latency.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::pool::ConnectionPool;
use crate::probe::traits::{Probe, ProbeError};
use crate::results::TcpResults;

/// TCP connect probe backed by a connection pool.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    pool: Arc<ConnectionPool>,
}

impl TcpProbe {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl Probe for TcpProbe {
    type Output = TcpResults;

    fn name(&self) -> &'static str {
        "tcp"
    }

    async fn run(&self, cancel: &CancellationToken) -> Result<TcpResults, ProbeError> {
        let target = self.pool.target();

        let start = Instant::now();
        let acquired = self.pool.acquire(cancel).await;
        let connect_time = start.elapsed();

        let (conn, reused) = match acquired {
            Ok(acquired) => acquired,
            Err(source) => {
                tracing::warn!(target = %target, error = %source, connect_time = ?connect_time, "TCP probe failed");
                return Err(ProbeError::Connect {
                    partial: TcpResults {
                        connect_time,
                        connected: false,
                        ..TcpResults::default()
                    },
                    source,
                });
            }
        };

        let result = TcpResults {
            connect_time,
            connected: true,
            local_addr: conn.local_addr().map(|a| a.to_string()).unwrap_or_default(),
            remote_addr: conn.peer_addr().map(|a| a.to_string()).unwrap_or_default(),
        };
        tracing::debug!(
            target = %target,
            reused,
            latency_ms = connect_time.as_secs_f64() * 1000.0,
            "TCP probe successful"
        );

        self.pool.release(conn);
        Ok(result)
    }
}
