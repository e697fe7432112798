//! Configuration module for the prober.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Target address
//! - Per-probe settings (ping profile, HTTP transport, TCP dialing and pooling)
//! - Execution mode (sequential or concurrent probes)

mod app;
mod validation;

pub use app::{ExecutionConfig, ExecutionMode, ProberConfig, default_max_concurrent_probes};
pub use validation::{ConfigError, MAX_PING_COUNT, expand_env_vars, parse_duration};
