//! Screen channel — host push, unencrypted, carries the handshake.
//!
//! The host binds once and accepts clients forever (a disconnect loops
//! back to accept a replacement peer).  Each accepted socket goes through
//! the password handshake first; only an authenticated connection gets the
//! frame stream.  Frames are base64 JPEG, pushed as fast as capture+send
//! allow — a slow client throttles the capture loop itself.

use std::net::IpAddr;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use pairview_core::{ChannelKind, SessionConfig, SessionEvent};
use pairview_core::device::ScreenSource;
use pairview_transport::{handshake, recv_frame, send_frame, SessionCredentials};

use crate::engine::{self, StopRx};

/// Host side: listener + handshake + capture/push loop.
///
/// Publishes the authenticated peer's address on `peer_tx` so dial-back
/// channels (audio, video rendezvous) know where to connect.
pub(crate) async fn host_loop(
    cfg: SessionConfig,
    creds: SessionCredentials,
    mut source: Box<dyn ScreenSource>,
    peer_tx: watch::Sender<Option<IpAddr>>,
    events: mpsc::Sender<SessionEvent>,
    mut stop: StopRx,
) {
    let listener = match engine::bind(&cfg.bind_ip, cfg.screen_port).await {
        Ok(l) => l,
        Err(e) => {
            warn!("screen listener failed: {e}");
            return;
        }
    };
    info!("screen channel listening on {}:{}", cfg.bind_ip, cfg.screen_port);

    while let Some((mut stream, addr)) = engine::accept_or_stop(&listener, &mut stop).await {
        match handshake::respond(&mut stream, &creds.password, &creds.nonce).await {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                warn!("handshake error from {addr}: {e}");
                continue;
            }
        }

        info!("screen client connected: {addr}");
        let _ = peer_tx.send(Some(addr.ip()));
        let _ = events
            .send(SessionEvent::PeerConnected { channel: ChannelKind::Screen, addr })
            .await;

        stream_frames(&mut stream, source.as_mut(), &mut stop).await;

        let _ = events
            .send(SessionEvent::PeerDisconnected { channel: ChannelKind::Screen })
            .await;
        if *stop.borrow() {
            return;
        }
        info!("screen client gone — waiting for a new one");
    }
}

async fn stream_frames(stream: &mut TcpStream, source: &mut dyn ScreenSource, stop: &mut StopRx) {
    loop {
        let frame = tokio::select! {
            _ = engine::stopped(stop) => return,
            res = source.next_frame() => match res {
                Ok(f) => f,
                Err(e) => {
                    warn!("screen capture failed: {e}");
                    continue;
                }
            },
        };

        let encoded = BASE64.encode(&frame);
        if let Err(e) = send_frame(stream, encoded.as_bytes()).await {
            debug!("screen send ended: {e}");
            return;
        }
    }
}

/// Client side: single connection (already authenticated), frame receive
/// loop.  Ends the task on disconnect — no client-side auto-reconnect.
pub(crate) async fn client_loop(
    mut stream: TcpStream,
    events: mpsc::Sender<SessionEvent>,
    mut stop: StopRx,
) {
    loop {
        let frame = tokio::select! {
            _ = engine::stopped(&mut stop) => return,
            res = recv_frame(&mut stream) => res,
        };

        match frame {
            Ok(Some(payload)) => match BASE64.decode(&payload[..]) {
                Ok(jpeg) => {
                    let _ = events.send(SessionEvent::ScreenFrame(Bytes::from(jpeg))).await;
                }
                Err(e) => warn!("dropping undecodable screen frame: {e}"),
            },
            Ok(None) => {
                info!("screen stream closed by host");
                break;
            }
            Err(e) => {
                warn!("screen receive error: {e}");
                break;
            }
        }
    }
    let _ = events
        .send(SessionEvent::PeerDisconnected { channel: ChannelKind::Screen })
        .await;
}
