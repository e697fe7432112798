//! HTTP fetch probe.
//!
//! - [`HttpProbe`]: one GET against `http://<target>/` over a shared client

mod probe;

pub use probe::{
    DEFAULT_DRAIN_TIMEOUT, DEFAULT_MAX_DRAIN_BYTES, DEFAULT_TIMEOUT, HttpConfig, HttpProbe,
    canonical_header_name,
};
