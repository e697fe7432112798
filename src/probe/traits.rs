//! Core probe trait and error type.

use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::pool::PoolError;
use crate::results::TcpResults;

/// Errors a single probe can report.
///
/// None of these abort a test run: the orchestrator turns each into one
/// `"<probe>: <error>"` entry of [`TestResults::errors`](crate::TestResults).
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The shared cancellation token fired.
    #[error("cancelled")]
    Cancelled,

    /// The probe's own timeout elapsed.
    #[error("timeout elapsed after {0:?}")]
    Timeout(Duration),

    /// The probe was switched off in configuration.
    #[error("probe disabled")]
    Disabled,

    /// The target host could not be resolved.
    #[error("failed to resolve host '{host}': {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },

    /// The ICMP socket could not be created.
    #[error("failed to create pinger: {0}")]
    IcmpSocket(#[source] std::io::Error),

    /// Every echo failed with a non-timeout error.
    #[error("failed to run ping: {0}")]
    Icmp(#[from] surge_ping::SurgeError),

    /// TCP acquisition failed; `partial` records how long the attempt took.
    #[error("{source}")]
    Connect {
        partial: TcpResults,
        #[source]
        source: PoolError,
    },

    /// HTTP round trip failed (DNS, refused, TLS, protocol).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl ProbeError {
    /// Partial TCP timing carried by a failed connect.
    pub fn partial_tcp(&self) -> Option<&TcpResults> {
        match self {
            Self::Connect { partial, .. } => Some(partial),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Cancelled
                | Self::Connect {
                    source: PoolError::Cancelled,
                    ..
                }
        )
    }
}

/// One measurement layer (ICMP, HTTP, TCP) against the prober's target.
///
/// Implementations must check `cancel` before starting expensive work and
/// race every blocking step against it.
#[async_trait::async_trait]
pub trait Probe: Send + Sync {
    /// Result produced on success.
    type Output: Send;

    /// Short name used to prefix error entries (`"ping"`, `"http"`, `"tcp"`).
    fn name(&self) -> &'static str;

    /// Run the probe once.
    async fn run(&self, cancel: &CancellationToken) -> Result<Self::Output, ProbeError>;
}

/// Host part of a `host:port` target.
///
/// Accepts `host:port`, `[v6]:port` and bare hosts. Anything that does not
/// split cleanly is returned unchanged.
pub fn host_from_target(target: &str) -> &str {
    if let Some(rest) = target.strip_prefix('[') {
        return match rest.split_once("]:") {
            Some((host, port)) if !port.is_empty() && !port.contains(':') => host,
            _ => target,
        };
    }

    match target.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') && !port.is_empty() => host,
        _ => target,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_from_target() {
        assert_eq!(host_from_target("example.com:80"), "example.com");
        assert_eq!(host_from_target("10.0.0.1:8080"), "10.0.0.1");
        assert_eq!(host_from_target("[::1]:443"), "::1");
        assert_eq!(host_from_target("example.com"), "example.com");
        assert_eq!(host_from_target("::1"), "::1");
        assert_eq!(host_from_target("fe80::1:22"), "fe80::1:22");
        assert_eq!(host_from_target("[::1]"), "[::1]");
        assert_eq!(host_from_target("host:"), "host:");
    }

    #[test]
    fn test_partial_tcp_only_on_connect() {
        let err = ProbeError::Connect {
            partial: TcpResults {
                connect_time: Duration::from_millis(3),
                ..TcpResults::default()
            },
            source: PoolError::DialTimeout(Duration::from_secs(1)),
        };
        assert_eq!(
            err.partial_tcp().map(|p| p.connect_time),
            Some(Duration::from_millis(3))
        );
        assert!(err.to_string().contains("timed out"));
        assert!(ProbeError::Disabled.partial_tcp().is_none());
    }

    #[test]
    fn test_is_cancelled() {
        assert!(ProbeError::Cancelled.is_cancelled());
        assert!(
            ProbeError::Connect {
                partial: TcpResults::default(),
                source: PoolError::Cancelled,
            }
            .is_cancelled()
        );
        assert!(!ProbeError::Timeout(Duration::from_secs(1)).is_cancelled());
    }
}
