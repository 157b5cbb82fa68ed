//! Video channel — duplex, encrypted; each peer may run a sender and/or a
//! receiver independently.
//!
//! A sender listens once, accepts one peer, then streams JPEG frames
//! sleep-paced at the configured rate while the video toggle is set.  A
//! receiver connects once and surfaces each decoded frame.  The client's
//! sender port is announced to the host through the chat control payload
//! (`video_port`) because there is no independent signaling channel; the
//! host dials back on receipt, tolerating arbitrary timing relative to
//! the other channels.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use pairview_core::device::WebcamSource;
use pairview_core::{ChannelKind, SessionEvent};
use pairview_transport::{recv_frame, send_frame, SessionCrypto};

use crate::engine::{self, StopRx};

/// Sender half: accept exactly one peer on the pre-bound listener, then
/// stream frames.  Returns when the peer goes away or the session stops —
/// no replacement accept.
pub(crate) async fn sender(
    listener: TcpListener,
    crypto: SessionCrypto,
    mut webcam: Box<dyn WebcamSource>,
    toggle: Arc<AtomicBool>,
    frame_interval: Duration,
    events: mpsc::Sender<SessionEvent>,
    mut stop: StopRx,
) {
    let Some((mut stream, addr)) = engine::accept_or_stop(&listener, &mut stop).await else {
        return;
    };
    drop(listener);
    info!("video peer connected: {addr}");
    let _ = events
        .send(SessionEvent::PeerConnected { channel: ChannelKind::Video, addr })
        .await;

    let mut ticker = tokio::time::interval(frame_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = engine::stopped(&mut stop) => return,
            _ = ticker.tick() => {}
        }
        if !toggle.load(Ordering::Relaxed) {
            continue;
        }

        let frame = match webcam.next_frame().await {
            Ok(f) => f,
            Err(e) => {
                warn!("webcam capture failed: {e}");
                continue;
            }
        };
        let ciphertext = match crypto.encrypt(&frame) {
            Ok(c) => c,
            Err(e) => {
                warn!("video encrypt failed: {e}");
                continue;
            }
        };
        if let Err(e) = send_frame(&mut stream, &ciphertext).await {
            debug!("video send ended: {e}");
            let _ = events
                .send(SessionEvent::PeerDisconnected { channel: ChannelKind::Video })
                .await;
            return;
        }
    }
}

/// Receiver half over an established connection: decode loop, one
/// [`SessionEvent::VideoFrame`] per frame.  Decrypt failures drop the
/// frame, not the loop.
pub(crate) async fn receiver(
    mut stream: TcpStream,
    crypto: SessionCrypto,
    events: mpsc::Sender<SessionEvent>,
    mut stop: StopRx,
) {
    loop {
        let frame = tokio::select! {
            _ = engine::stopped(&mut stop) => return,
            res = recv_frame(&mut stream) => res,
        };

        match frame {
            Ok(Some(ciphertext)) => match crypto.decrypt(&ciphertext) {
                Ok(jpeg) => {
                    let _ = events.send(SessionEvent::VideoFrame(Bytes::from(jpeg))).await;
                }
                Err(e) => warn!("dropping undecryptable video frame: {e}"),
            },
            Ok(None) => {
                info!("video stream closed");
                break;
            }
            Err(e) => {
                warn!("video receive error: {e}");
                break;
            }
        }
    }
    let _ = events
        .send(SessionEvent::PeerDisconnected { channel: ChannelKind::Video })
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pairview_core::DeviceError;
    use pairview_transport::SessionCredentials;
    use tokio::sync::watch;

    struct StaticWebcam;

    #[async_trait]
    impl WebcamSource for StaticWebcam {
        async fn next_frame(&mut self) -> Result<Vec<u8>, DeviceError> {
            Ok(vec![0xFF, 0xD8, 0x01, 0x02])
        }
    }

    #[tokio::test]
    async fn sender_streams_to_receiver_while_toggled() {
        let crypto = SessionCredentials::with_password("pw").crypto().unwrap();
        let listener = engine::bind("127.0.0.1", 0).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = watch::channel(false);
        let toggle = Arc::new(AtomicBool::new(true));
        let (events_tx, mut events_rx) = mpsc::channel(64);

        tokio::spawn(sender(
            listener,
            crypto,
            Box::new(StaticWebcam),
            Arc::clone(&toggle),
            Duration::from_millis(5),
            events_tx.clone(),
            stop_rx.clone(),
        ));

        let stream = engine::connect_once(addr.ip(), addr.port()).await.unwrap();
        tokio::spawn(receiver(stream, crypto, events_tx, stop_rx));

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        let jpeg = loop {
            assert!(std::time::Instant::now() < deadline, "no video frame arrived");
            match events_rx.recv().await.unwrap() {
                SessionEvent::VideoFrame(f) => break f,
                _ => continue,
            }
        };
        assert_eq!(&jpeg[..], &[0xFF, 0xD8, 0x01, 0x02]);

        stop_tx.send(true).unwrap();
    }
}
