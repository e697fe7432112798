//! HTTP endpoint probe.
//!
//! Issues a single GET against the target and records status, latency,
//! declared length and response headers.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use reqwest::{Client, Response};
use reqwest::header::{ACCEPT_ENCODING, CONNECTION, HeaderMap};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::probe::traits::{Probe, ProbeError};
use crate::results::HttpResults;

/// Default request timeout (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connect timeout for the shared transport (10 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default idle timeout for pooled HTTP connections (90 seconds).
const DEFAULT_POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Default idle HTTP connections kept per host.
const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 5;

/// Default TCP keep-alive interval on transport sockets (90 seconds).
const DEFAULT_TCP_KEEPALIVE: Duration = Duration::from_secs(90);

/// Default time allowed for reading the rest of the body (1 second).
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Default body bytes read before giving up on the socket (64 KiB).
pub const DEFAULT_MAX_DRAIN_BYTES: usize = 64 * 1024;

fn default_user_agent() -> String {
    concat!("pathprobe/", env!("CARGO_PKG_VERSION")).to_string()
}

/// Configuration for the HTTP probe and its shared transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Round-trip timeout up to the response head (default: 30s).
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// TCP connect timeout of the transport (default: 10s).
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// How long idle transport connections are kept (default: 90s).
    #[serde(with = "humantime_serde")]
    pub pool_idle_timeout: Duration,
    /// Idle transport connections kept per host (default: 5).
    pub pool_max_idle_per_host: usize,
    /// TCP keep-alive interval on transport sockets (default: 90s).
    #[serde(with = "humantime_serde")]
    pub tcp_keepalive: Duration,
    /// Time allowed for reading the body after the head (default: 1s).
    #[serde(with = "humantime_serde")]
    pub drain_timeout: Duration,
    /// Body bytes read before the socket is closed instead (default: 64 KiB).
    pub max_drain_bytes: usize,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            pool_idle_timeout: DEFAULT_POOL_IDLE_TIMEOUT,
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
            tcp_keepalive: DEFAULT_TCP_KEEPALIVE,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            max_drain_bytes: DEFAULT_MAX_DRAIN_BYTES,
            user_agent: default_user_agent(),
        }
    }
}

impl HttpConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Bound the post-response body read by time and size.
    pub fn with_drain_limits(mut self, drain_timeout: Duration, max_bytes: usize) -> Self {
        self.drain_timeout = drain_timeout;
        self.max_drain_bytes = max_bytes;
        self
    }

    /// Build the shared HTTP transport.
    ///
    /// # Errors
    /// Returns the builder error if the TLS backend cannot be initialized.
    pub fn build_client(&self) -> Result<Client, reqwest::Error> {
        // Measure the direct path; proxy environment variables are ignored.
        Client::builder()
            .no_proxy()
            .user_agent(self.user_agent.as_str())
            .connect_timeout(self.connect_timeout)
            .pool_idle_timeout(self.pool_idle_timeout)
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .tcp_keepalive(self.tcp_keepalive)
            .build()
    }
}

/// HTTP GET probe over a shared client.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    url: String,
    client: Client,
    config: HttpConfig,
}

impl HttpProbe {
    /// Create a probe for `http://<target>/` using an existing client.
    pub fn new(target: &str, client: Client, config: HttpConfig) -> Self {
        Self {
            url: format!("http://{target}/"),
            client,
            config,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send the request and capture everything up to the response head.
    async fn fetch(&self) -> Result<(HttpResults, Response), reqwest::Error> {
        let request = self
            .client
            .get(&self.url)
            .header(ACCEPT_ENCODING, "gzip, deflate")
            .header(CONNECTION, "keep-alive");

        let start = Instant::now();
        let response = request.send().await?;
        let response_time = start.elapsed();

        let results = HttpResults {
            status_code: response.status().as_u16(),
            response_time,
            content_length: response
                .content_length()
                .and_then(|len| i64::try_from(len).ok())
                .unwrap_or(-1),
            headers: flatten_headers(response.headers()),
        };
        Ok((results, response))
    }

    /// Read the rest of the body so the transport can pool the socket.
    ///
    /// Gives up after `max_drain_bytes`, after `drain_timeout` or on
    /// cancellation. The response is then dropped, which closes the
    /// connection. None of this affects the recorded result.
    async fn drain(&self, mut response: Response, cancel: &CancellationToken) {
        let max_bytes = self.config.max_drain_bytes;
        let mut drained = 0usize;

        let outcome = {
            let read_body = async {
                while drained <= max_bytes {
                    match response.chunk().await? {
                        Some(chunk) => drained += chunk.len(),
                        None => return Ok(true),
                    }
                }
                Ok::<bool, reqwest::Error>(false)
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => "cancelled",
                result = timeout(self.config.drain_timeout, read_body) => match result {
                    Ok(Ok(true)) => "complete",
                    Ok(Ok(false)) => "size limit",
                    Ok(Err(e)) => {
                        tracing::debug!(url = %self.url, error = %e, "HTTP body read failed");
                        "read error"
                    }
                    Err(_) => "time limit",
                },
            }
        };

        tracing::trace!(url = %self.url, body_bytes = drained, outcome, "HTTP body drained");
    }
}

#[async_trait::async_trait]
impl Probe for HttpProbe {
    type Output = HttpResults;

    fn name(&self) -> &'static str {
        "http"
    }

    async fn run(&self, cancel: &CancellationToken) -> Result<HttpResults, ProbeError> {
        if cancel.is_cancelled() {
            return Err(ProbeError::Cancelled);
        }

        // Dropping the in-flight future on cancel or timeout closes its
        // socket instead of pooling it.
        let probe_timeout = self.config.timeout;
        let (results, response) = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProbeError::Cancelled),
            result = timeout(probe_timeout, self.fetch()) => match result {
                Ok(Ok(fetched)) => fetched,
                Ok(Err(e)) => return Err(ProbeError::Http(e)),
                Err(_) => return Err(ProbeError::Timeout(probe_timeout)),
            },
        };

        self.drain(response, cancel).await;

        tracing::debug!(
            url = %self.url,
            status = results.status_code,
            latency_ms = results.response_time.as_secs_f64() * 1000.0,
            "HTTP probe successful"
        );
        Ok(results)
    }
}

/// Canonical `Title-Case` form of a header name (`content-type` → `Content-Type`).
pub fn canonical_header_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    let mut word = first.to_ascii_uppercase().to_string();
                    word.push_str(&chars.as_str().to_ascii_lowercase());
                    word
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Map each header name to its first value.
fn flatten_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .keys()
        .filter_map(|name| {
            let value = headers.get(name)?;
            Some((
                canonical_header_name(name.as_str()),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            ))
        })
        .collect()
}
