//! TCP connect probe.
//!
//! - [`TcpProbe`]: measures connection acquisition through the shared pool

mod probe;

pub use probe::TcpProbe;
