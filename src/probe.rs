//! Probe Layer
//!
//! Three independent measurement layers run against one target. Each probe
//! implements [`Probe`] and reports either its result or a [`ProbeError`].
//!
//! # Architecture
//!
//! - [`ping::PingProbe`]: ICMP echo statistics
//! - [`http::HttpProbe`]: single HTTP GET over a shared client
//! - [`tcp::TcpProbe`]: TCP connect through the [`ConnectionPool`](crate::pool::ConnectionPool)
//!
//! # Example
//!
//! ```rust,no_run
//! use pathprobe::probe::Probe;
//! use pathprobe::probe::ping::{PingConfig, PingProbe};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() {
//! let probe = PingProbe::new("127.0.0.1:80", PingConfig::fast());
//! match probe.run(&CancellationToken::new()).await {
//!     Ok(stats) => println!("loss: {:.0}%", stats.packet_loss * 100.0),
//!     Err(e) => println!("{}: {e}", probe.name()),
//! }
//! # }
//! ```

pub mod http;
pub mod ping;
pub mod tcp;
mod traits;

pub use traits::{Probe, ProbeError, host_from_target};
