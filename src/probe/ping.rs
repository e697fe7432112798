//! ICMP ping probe for host reachability and round-trip statistics.
//!
//! - [`PingProbe`]: sends `count` echo requests within an overall timeout
//! - [`PingProfile`]: standard (10 echoes / 10s) or fast (5 echoes / 5s)

mod probe;

pub use probe::{
    DEFAULT_COUNT, DEFAULT_INTERVAL, DEFAULT_TIMEOUT, FAST_COUNT, FAST_TIMEOUT, PingConfig,
    PingProbe, PingProfile,
};
