//! Result types produced by a test run.
//!
//! [`TestResults`] is the aggregate document; each probe contributes either
//! its own result struct or one entry in [`TestResults::errors`], never both.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregate result of one test run against a target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResults {
    /// When the run started.
    pub timestamp: DateTime<Utc>,
    /// Target address as given by the caller.
    pub server_addr: String,
    /// ICMP statistics, present iff the ping probe succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ping_results: Option<PingResults>,
    /// HTTP fetch result, present iff the HTTP probe succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_results: Option<HttpResults>,
    /// TCP connect result, present iff the TCP probe succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp_results: Option<TcpResults>,
    /// One `"<probe>: <error>"` entry per failed probe, in run order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl TestResults {
    /// Create an empty result bundle stamped with the current time.
    pub fn new(server_addr: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            server_addr: server_addr.into(),
            ping_results: None,
            http_results: None,
            tcp_results: None,
            errors: Vec::new(),
        }
    }

    /// Record a failed probe as `"<probe>: <error>"`.
    pub fn push_error(&mut self, probe: &str, error: impl std::fmt::Display) {
        self.errors.push(format!("{probe}: {error}"));
    }

    /// True when every probe produced a result.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Error entries reported by the given probe.
    pub fn errors_for<'a>(&'a self, probe: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        let prefix = format!("{probe}:");
        self.errors
            .iter()
            .map(String::as_str)
            .filter(move |e| e.starts_with(&prefix))
    }
}

/// ICMP echo statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PingResults {
    /// Echo requests sent.
    pub packets_sent: u32,
    /// Echo replies received.
    pub packets_recv: u32,
    /// Lost fraction in `0.0..=1.0`.
    pub packet_loss: f64,
    #[serde(with = "duration_nanos")]
    pub min_rtt: Duration,
    #[serde(with = "duration_nanos")]
    pub max_rtt: Duration,
    #[serde(with = "duration_nanos")]
    pub avg_rtt: Duration,
    #[serde(with = "duration_nanos")]
    pub std_dev_rtt: Duration,
}

impl PingResults {
    /// Build statistics from the number of echoes sent and the round-trip
    /// times of the replies that came back.
    ///
    /// Replies beyond `sent` are ignored so `packets_recv <= packets_sent`
    /// always holds.
    pub fn from_samples(sent: u32, rtts: &[Duration]) -> Self {
        let rtts = &rtts[..rtts.len().min(sent as usize)];
        let recv = rtts.len() as u32;
        let packet_loss = if sent == 0 {
            0.0
        } else {
            1.0 - f64::from(recv) / f64::from(sent)
        };

        if rtts.is_empty() {
            return Self {
                packets_sent: sent,
                packets_recv: 0,
                packet_loss,
                ..Self::default()
            };
        }

        let secs: Vec<f64> = rtts.iter().map(Duration::as_secs_f64).collect();
        let n = secs.len() as f64;
        let mean = secs.iter().sum::<f64>() / n;
        let variance = secs.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;

        Self {
            packets_sent: sent,
            packets_recv: recv,
            packet_loss,
            min_rtt: rtts.iter().copied().min().unwrap_or_default(),
            max_rtt: rtts.iter().copied().max().unwrap_or_default(),
            avg_rtt: Duration::from_secs_f64(mean),
            std_dev_rtt: Duration::from_secs_f64(variance.sqrt()),
        }
    }
}

/// Result of a single HTTP GET.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpResults {
    pub status_code: u16,
    /// Time from sending the request to receiving response headers.
    #[serde(with = "duration_nanos")]
    pub response_time: Duration,
    /// Declared body length, `-1` when the server did not announce one.
    pub content_length: i64,
    /// Canonical header name to its first value.
    pub headers: BTreeMap<String, String>,
}

/// Result of a TCP connect attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TcpResults {
    /// Time spent acquiring the connection (near zero on reuse).
    #[serde(with = "duration_nanos")]
    pub connect_time: Duration,
    pub connected: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub local_addr: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub remote_addr: String,
}

/// Serialize a [`Duration`] as integer nanoseconds.
pub mod duration_nanos {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let nanos = u64::try_from(value.as_nanos()).unwrap_or(u64::MAX);
        serializer.serialize_u64(nanos)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_nanos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_ping_stats_from_samples() {
        let stats = PingResults::from_samples(4, &[ms(10), ms(20), ms(30)]);

        assert_eq!(stats.packets_sent, 4);
        assert_eq!(stats.packets_recv, 3);
        assert!((stats.packet_loss - 0.25).abs() < 1e-9);
        assert_eq!(stats.min_rtt, ms(10));
        assert_eq!(stats.max_rtt, ms(30));
        let avg = stats.avg_rtt.as_secs_f64() * 1000.0;
        assert!((avg - 20.0).abs() < 1e-3, "avg was {avg}");
        // population stddev of 10/20/30 ms is ~8.165 ms
        let sd = stats.std_dev_rtt.as_secs_f64() * 1000.0;
        assert!((sd - 8.165).abs() < 0.01, "stddev was {sd}");
    }

    #[test]
    fn test_ping_stats_all_lost() {
        let stats = PingResults::from_samples(5, &[]);
        assert_eq!(stats.packets_recv, 0);
        assert_eq!(stats.packet_loss, 1.0);
        assert_eq!(stats.avg_rtt, Duration::ZERO);
    }

    #[test]
    fn test_ping_stats_loss_bounds() {
        for sent in 0..6u32 {
            for recv in 0..=sent + 2 {
                let rtts = vec![ms(1); recv as usize];
                let stats = PingResults::from_samples(sent, &rtts);
                assert!(stats.packets_recv <= stats.packets_sent);
                assert!((0.0..=1.0).contains(&stats.packet_loss));
                let expected = f64::from(sent) * (1.0 - stats.packet_loss);
                assert!((f64::from(stats.packets_recv) - expected).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_test_results_json_omits_absent_fields() {
        let mut results = TestResults::new("example.com:80");
        results.tcp_results = Some(TcpResults {
            connect_time: Duration::from_nanos(1500),
            connected: true,
            local_addr: "127.0.0.1:5000".into(),
            remote_addr: "127.0.0.1:80".into(),
        });

        let json = serde_json::to_value(&results).unwrap();
        assert_eq!(json["server_addr"], "example.com:80");
        assert_eq!(json["tcp_results"]["connect_time"], 1500);
        assert!(json.get("ping_results").is_none());
        assert!(json.get("http_results").is_none());
        assert!(json.get("errors").is_none());
    }

    #[test]
    fn test_tcp_results_omit_empty_addresses() {
        let failed = TcpResults {
            connect_time: ms(3),
            connected: false,
            ..TcpResults::default()
        };
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["connected"], false);
        assert!(json.get("local_addr").is_none());
        assert!(json.get("remote_addr").is_none());
    }

    #[test]
    fn test_errors_for_prefix() {
        let mut results = TestResults::new("host");
        results.push_error("ping", "probe disabled");
        results.push_error("tcp", "connection refused");

        assert_eq!(results.errors, vec!["ping: probe disabled", "tcp: connection refused"]);
        assert_eq!(results.errors_for("ping").count(), 1);
        assert_eq!(results.errors_for("http").count(), 0);
        assert!(!results.is_success());
    }
}
