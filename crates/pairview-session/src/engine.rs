//! The generic cancellable accept-loop / single-connect pattern every
//! channel reuses.
//!
//! Host side: bind once, then race `accept()` against the session stop
//! signal; the accepted `TcpStream` is owned by exactly one service task.
//! Client side: one connect attempt per channel per session start — a
//! refused connect is reported upward, never retried internally.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::warn;

use pairview_core::ConnectionError;

/// Shared cooperative-cancellation signal, one per hosting/connecting
/// session.  `true` = stop requested.
pub(crate) type StopRx = watch::Receiver<bool>;

/// Pause between accept retries after a transient accept error.
const ACCEPT_RETRY: Duration = Duration::from_millis(500);

/// Resolves once the stop signal fires (or its sender is gone).
pub(crate) async fn stopped(stop: &mut StopRx) {
    loop {
        if *stop.borrow_and_update() {
            return;
        }
        if stop.changed().await.is_err() {
            return;
        }
    }
}

pub(crate) async fn bind(ip: &str, port: u16) -> Result<TcpListener, ConnectionError> {
    TcpListener::bind((ip, port))
        .await
        .map_err(|source| ConnectionError::Bind { port, source })
}

/// Accept the next peer, or `None` when the stop signal fires first.
/// Transient accept errors are logged and retried.
pub(crate) async fn accept_or_stop(
    listener: &TcpListener,
    stop: &mut StopRx,
) -> Option<(TcpStream, SocketAddr)> {
    loop {
        tokio::select! {
            _ = stopped(stop) => return None,
            res = listener.accept() => match res {
                Ok(pair) => return Some(pair),
                Err(e) => {
                    warn!("accept failed: {e} — retrying");
                    tokio::time::sleep(ACCEPT_RETRY).await;
                }
            },
        }
    }
}

/// Single connect attempt, no internal retry.
pub(crate) async fn connect_once(ip: IpAddr, port: u16) -> Result<TcpStream, ConnectionError> {
    let addr = SocketAddr::new(ip, port);
    TcpStream::connect(addr)
        .await
        .map_err(|source| ConnectionError::Connect { addr: addr.to_string(), source })
}

/// Host-side dial-back: waits until the screen handshake has published the
/// peer address, then connects with a short bounded retry (the peer's own
/// listener may come up a beat after its handshake).
pub(crate) async fn connect_back(
    peer_rx: &mut watch::Receiver<Option<IpAddr>>,
    port: u16,
    stop: &mut StopRx,
) -> Option<TcpStream> {
    let ip = loop {
        if let Some(ip) = *peer_rx.borrow_and_update() {
            break ip;
        }
        tokio::select! {
            _ = stopped(stop) => return None,
            res = peer_rx.changed() => if res.is_err() { return None; },
        }
    };

    for attempt in 1..=5u32 {
        if *stop.borrow() {
            return None;
        }
        match connect_once(ip, port).await {
            Ok(stream) => return Some(stream),
            Err(e) => {
                warn!("dial-back to {ip}:{port} failed (attempt {attempt}): {e}");
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }
    }
    None
}
