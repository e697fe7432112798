//! Local socket fixtures shared by unit tests.

use std::io::ErrorKind;
use std::net::SocketAddr;

use tokio::net::TcpListener;

/// Bind a loopback listener, or `None` when the sandbox forbids it.
pub(crate) async fn bind_loopback() -> Option<TcpListener> {
    match TcpListener::bind("127.0.0.1:0").await {
        Ok(l) => Some(l),
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            // Some sandboxed environments disallow binding; skip the test.
            None
        }
        Err(e) => panic!("Failed to bind test listener: {e}"),
    }
}

/// Listener that accepts connections and keeps them open.
pub(crate) async fn holding_listener() -> Option<SocketAddr> {
    let listener = bind_loopback().await?;
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    Some(addr)
}

/// Listener that closes every connection right after accepting it.
pub(crate) async fn closing_listener() -> Option<SocketAddr> {
    let listener = bind_loopback().await?;
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            drop(stream);
        }
    });
    Some(addr)
}

/// An address that was just bound and released, so nothing listens on it.
pub(crate) async fn refused_addr() -> Option<SocketAddr> {
    let listener = bind_loopback().await?;
    let addr = listener.local_addr().unwrap();
    drop(listener);
    Some(addr)
}
