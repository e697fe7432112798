//! Pooled TCP connection handle.

use std::io::{self, ErrorKind};
use std::mem::MaybeUninit;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use socket2::{SockRef, TcpKeepalive};
use tokio::net::TcpStream;

/// Outcome of a liveness check on an idle connection.
#[derive(Debug)]
pub(crate) enum Liveness {
    /// Nothing to read yet, or data already waiting.
    Alive,
    /// The peer closed its side.
    Closed,
    /// The socket reported an error (reset, etc.).
    Failed(io::Error),
}

/// An open TCP connection tagged with the target it was dialed for.
///
/// Handles are moved in and out of the pool; releasing one consumes it.
#[derive(Debug)]
pub struct PooledConnection {
    stream: TcpStream,
    target: String,
    dialed_at: Instant,
}

impl PooledConnection {
    pub(crate) fn new(stream: TcpStream, target: impl Into<String>) -> Self {
        Self {
            stream,
            target: target.into(),
            dialed_at: Instant::now(),
        }
    }

    /// Target address this connection was dialed for.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.stream.local_addr()
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.stream.peer_addr()
    }

    /// Time since the connection was established.
    pub fn age(&self) -> Duration {
        self.dialed_at.elapsed()
    }

    /// Probe the socket without blocking and without consuming data.
    ///
    /// The stream is registered with tokio and therefore non-blocking, so a
    /// raw peek returns `WouldBlock` immediately when the peer is idle.
    pub(crate) fn check_liveness(&self) -> Liveness {
        let mut buf = [MaybeUninit::<u8>::uninit(); 1];
        match SockRef::from(&self.stream).peek(&mut buf) {
            Ok(0) => Liveness::Closed,
            Ok(_) => Liveness::Alive,
            Err(e) if e.kind() == ErrorKind::WouldBlock => Liveness::Alive,
            Err(e) if e.kind() == ErrorKind::Interrupted => Liveness::Alive,
            Err(e) => Liveness::Failed(e),
        }
    }

    /// Close the connection.
    pub fn close(self) {
        tracing::trace!(target = %self.target, age = ?self.age(), "Closing TCP connection");
        drop(self.stream);
    }
}

/// Enable TCP keep-alive probes after `idle` of silence.
pub(crate) fn set_keepalive(stream: &TcpStream, idle: Duration) -> io::Result<()> {
    if idle.is_zero() {
        return Ok(());
    }
    let keepalive = TcpKeepalive::new().with_time(idle);
    SockRef::from(stream).set_tcp_keepalive(&keepalive)
}
