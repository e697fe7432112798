//! ICMP ping probe.
//!
//! Sends a fixed number of echo requests to the target host and aggregates
//! round-trip statistics.

use std::net::IpAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use surge_ping::{Client, Config, ICMP, PingIdentifier, PingSequence, SurgeError};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

use crate::probe::traits::{Probe, ProbeError, host_from_target};
use crate::results::PingResults;

/// Default number of echo requests.
pub const DEFAULT_COUNT: u32 = 10;

/// Default overall ping timeout (10 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Echo count of the fast profile.
pub const FAST_COUNT: u32 = 5;

/// Overall timeout of the fast profile (5 seconds).
pub const FAST_TIMEOUT: Duration = Duration::from_secs(5);

/// Default spacing between echo requests (1 second).
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Default ICMP payload size in bytes.
pub const DEFAULT_PAYLOAD_SIZE: usize = 56;

/// Shortest time a single echo may wait for its reply.
const MIN_ECHO_WAIT: Duration = Duration::from_secs(1);

/// Preset echo count and timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PingProfile {
    /// 10 echoes within 10 seconds.
    #[default]
    Standard,
    /// 5 echoes within 5 seconds.
    Fast,
}

impl PingProfile {
    pub fn count(self) -> u32 {
        match self {
            Self::Standard => DEFAULT_COUNT,
            Self::Fast => FAST_COUNT,
        }
    }

    pub fn timeout(self) -> Duration {
        match self {
            Self::Standard => DEFAULT_TIMEOUT,
            Self::Fast => FAST_TIMEOUT,
        }
    }
}

/// Configuration for the ICMP ping probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PingConfig {
    /// Run the probe (default: true).
    pub enabled: bool,
    /// Echo requests to send (default: 10).
    pub count: u32,
    /// Overall timeout for all echoes (default: 10s).
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Spacing between echo requests (default: 1s).
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Payload bytes per echo (default: 56).
    pub payload_size: usize,
}

impl Default for PingConfig {
    fn default() -> Self {
        Self::from_profile(PingProfile::Standard)
    }
}

impl PingConfig {
    /// Configuration for a preset profile.
    pub fn from_profile(profile: PingProfile) -> Self {
        Self {
            enabled: true,
            count: profile.count(),
            timeout: profile.timeout(),
            interval: DEFAULT_INTERVAL,
            payload_size: DEFAULT_PAYLOAD_SIZE,
        }
    }

    /// The reduced 5 echo / 5 second profile.
    pub fn fast() -> Self {
        Self::from_profile(PingProfile::Fast)
    }

    /// Apply a profile's count and timeout, keeping the other settings.
    pub fn with_profile(mut self, profile: PingProfile) -> Self {
        self.count = profile.count();
        self.timeout = profile.timeout();
        self
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// ICMP echo probe.
#[derive(Debug, Clone)]
pub struct PingProbe {
    target: String,
    config: PingConfig,
}

impl PingProbe {
    pub fn new(target: impl Into<String>, config: PingConfig) -> Self {
        Self {
            target: target.into(),
            config,
        }
    }

    pub fn config(&self) -> &PingConfig {
        &self.config
    }

    /// Host that will be pinged (target without port).
    pub fn host(&self) -> &str {
        host_from_target(&self.target)
    }
}

/// Resolve hostname to IP address.
async fn resolve_host(host: &str) -> Result<IpAddr, std::io::Error> {
    // First, try to parse as an IP address directly
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }

    let addrs = tokio::net::lookup_host((host, 0)).await?;
    addrs
        .into_iter()
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses found"))
}

#[async_trait::async_trait]
impl Probe for PingProbe {
    type Output = PingResults;

    fn name(&self) -> &'static str {
        "ping"
    }

    async fn run(&self, cancel: &CancellationToken) -> Result<PingResults, ProbeError> {
        if !self.config.enabled {
            return Err(ProbeError::Disabled);
        }
        if cancel.is_cancelled() {
            return Err(ProbeError::Cancelled);
        }

        let host = self.host();
        let ip = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProbeError::Cancelled),
            resolved = resolve_host(host) => resolved.map_err(|source| ProbeError::Resolve {
                host: host.to_string(),
                source,
            })?,
        };

        // Config::default() asks for an unprivileged datagram ICMP socket.
        let client_config = match ip {
            IpAddr::V4(_) => Config::default(),
            IpAddr::V6(_) => Config::builder().kind(ICMP::V6).build(),
        };
        let client = Client::new(&client_config).map_err(ProbeError::IcmpSocket)?;
        let mut pinger = client.pinger(ip, PingIdentifier(rand::random())).await;

        let payload = vec![0u8; self.config.payload_size];
        let deadline = Instant::now() + self.config.timeout;
        let echo_wait = self.config.interval.max(MIN_ECHO_WAIT);

        // Sequence numbers are 16-bit; larger counts are rejected by config
        // validation and capped here.
        let count = u16::try_from(self.config.count).unwrap_or(u16::MAX);
        let mut sent = 0u32;
        let mut rtts = Vec::with_capacity(usize::from(count));
        let mut last_error = None;

        for seq in 0..count {
            let started = Instant::now();
            if started >= deadline {
                break;
            }
            pinger.timeout(echo_wait.min(deadline - started));
            sent += 1;

            let reply = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ProbeError::Cancelled),
                reply = pinger.ping(PingSequence(seq), &payload) => reply,
            };

            match reply {
                Ok((_, rtt)) => {
                    tracing::trace!(host = %host, seq, rtt = ?rtt, "Echo reply");
                    rtts.push(rtt);
                }
                Err(SurgeError::Timeout { .. }) => {
                    tracing::trace!(host = %host, seq, "Echo timed out");
                }
                Err(e) => {
                    tracing::debug!(host = %host, seq, error = %e, "Echo failed");
                    last_error = Some(e);
                }
            }

            if seq + 1 < count {
                let next = (started + self.config.interval).min(deadline);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(ProbeError::Cancelled),
                    _ = sleep_until(next) => {}
                }
            }
        }

        if rtts.is_empty() {
            if let Some(e) = last_error {
                return Err(ProbeError::Icmp(e));
            }
        }

        let stats = PingResults::from_samples(sent, &rtts);
        tracing::debug!(
            host = %host,
            sent = stats.packets_sent,
            recv = stats.packets_recv,
            loss = stats.packet_loss,
            avg_rtt = ?stats.avg_rtt,
            "Ping probe finished"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_config_defaults() {
        let config = PingConfig::default();

        assert!(config.enabled);
        assert_eq!(config.count, DEFAULT_COUNT);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.interval, DEFAULT_INTERVAL);
    }

    #[test]
    fn test_ping_config_fast_profile() {
        let config = PingConfig::fast();
        assert_eq!(config.count, 5);
        assert_eq!(config.timeout, Duration::from_secs(5));

        let config = PingConfig::default()
            .with_enabled(false)
            .with_profile(PingProfile::Fast);
        assert!(!config.enabled);
        assert_eq!(config.count, FAST_COUNT);
        assert_eq!(config.timeout, FAST_TIMEOUT);
    }

    #[test]
    fn test_ping_probe_host_strips_port() {
        let probe = PingProbe::new("example.com:80", PingConfig::default());
        assert_eq!(probe.host(), "example.com");

        let probe = PingProbe::new("example.com", PingConfig::default());
        assert_eq!(probe.host(), "example.com");
    }

    #[tokio::test]
    async fn test_ping_probe_disabled() {
        let probe = PingProbe::new("example.com:80", PingConfig::default().with_enabled(false));
        let err = probe.run(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ProbeError::Disabled));
    }

    #[tokio::test]
    async fn test_ping_probe_cancelled_before_start() {
        let probe = PingProbe::new("127.0.0.1", PingConfig::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let start = std::time::Instant::now();
        let err = probe.run(&cancel).await.unwrap_err();
        assert!(matches!(err, ProbeError::Cancelled), "got {err:?}");
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_ping_probe_unresolvable_host() {
        let probe = PingProbe::new("nonexistent-host.invalid:80", PingConfig::fast());

        let err = probe.run(&CancellationToken::new()).await.unwrap_err();
        match &err {
            ProbeError::Resolve { host, .. } => assert_eq!(host, "nonexistent-host.invalid"),
            other => panic!("expected resolve error, got {other:?}"),
        }
        assert!(
            err.to_string()
                .starts_with("failed to resolve host 'nonexistent-host.invalid'")
        );
    }

    #[tokio::test]
    async fn test_resolve_host_ipv4() {
        let ip = resolve_host("127.0.0.1").await.unwrap();
        assert_eq!(ip, IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)));
    }

    #[tokio::test]
    async fn test_resolve_host_ipv6() {
        let ip = resolve_host("::1").await.unwrap();
        assert_eq!(ip, IpAddr::V6(std::net::Ipv6Addr::LOCALHOST));
    }
}
