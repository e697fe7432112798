//! pathprobe - network path diagnostics
//!
//! Measures reachability and performance of one target across three layers
//! and returns a single [`TestResults`] document.
//!
//! # Architecture
//!
//! - **Probes**: ICMP ping statistics, HTTP GET, TCP connect ([`probe`])
//! - **Connection pool**: liveness-checked TCP connection reuse ([`pool`])
//! - **Orchestration**: runs the probes and aggregates partial failures ([`Prober`])
//! - **Configuration**: YAML file plus builder methods ([`config`])
//!
//! # Example
//!
//! ```rust,no_run
//! use pathprobe::{Prober, ProberConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let prober = Prober::new(ProberConfig::new("example.com:80"))?;
//!     let results = prober.run_tests().await?;
//!     println!("{}", serde_json::to_string_pretty(&results)?);
//!     prober.close();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod pool;
pub mod probe;
mod prober;
mod results;

#[cfg(test)]
mod test_support;

pub use config::{ConfigError, ExecutionMode, ProberConfig};
pub use pool::{ConnectionPool, PoolError, TcpConfig};
pub use probe::http::HttpConfig;
pub use probe::ping::{PingConfig, PingProfile};
pub use probe::{Probe, ProbeError};
pub use prober::{Prober, ProberError};
pub use results::{HttpResults, PingResults, TcpResults, TestResults, duration_nanos};
