//! Audio channel — duplex via two independent sockets, encrypted.
//!
//! Each side runs both halves: an accept-loop receiver that plays PCM
//! blocks as they arrive (no jitter buffer), and a connect-once sender
//! that captures fixed-size mono f32 blocks at the block interval.  The
//! audio toggle gates transmission only — capture keeps running while the
//! toggle is cleared so re-enabling is instant.

use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use pairview_core::device::{AudioSink, AudioSource};
use pairview_core::{ChannelKind, ProtocolError, SessionConfig, SessionEvent};
use pairview_transport::{recv_frame, send_frame, SessionCrypto};

use crate::engine::{self, StopRx};

// MARK: - PCM codec

/// Mono f32 little-endian, matching the legacy block layout.
pub(crate) fn pcm_to_bytes(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 4);
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

pub(crate) fn bytes_to_pcm(data: &[u8]) -> Result<Vec<f32>, ProtocolError> {
    if data.len() % 4 != 0 {
        return Err(ProtocolError::Decode(format!(
            "PCM block length {} is not a multiple of 4",
            data.len()
        )));
    }
    Ok(data
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

// MARK: - Receiver

/// Accept loop + play loop.  Runs on both roles, each listening on its
/// own audio port.
pub(crate) async fn receiver_loop(
    cfg: SessionConfig,
    crypto: SessionCrypto,
    mut sink: Box<dyn AudioSink>,
    events: mpsc::Sender<SessionEvent>,
    mut stop: StopRx,
) {
    let listener = match engine::bind(&cfg.bind_ip, cfg.audio_port).await {
        Ok(l) => l,
        Err(e) => {
            warn!("audio listener failed: {e}");
            return;
        }
    };
    info!("audio channel listening on {}:{}", cfg.bind_ip, cfg.audio_port);

    while let Some((mut stream, addr)) = engine::accept_or_stop(&listener, &mut stop).await {
        info!("audio peer connected: {addr}");
        let _ = events
            .send(SessionEvent::PeerConnected { channel: ChannelKind::Audio, addr })
            .await;

        loop {
            let frame = tokio::select! {
                _ = engine::stopped(&mut stop) => return,
                res = recv_frame(&mut stream) => res,
            };

            match frame {
                Ok(Some(ciphertext)) => {
                    match crypto.decrypt(&ciphertext).and_then(|p| bytes_to_pcm(&p)) {
                        Ok(samples) => sink.play(&samples),
                        Err(e) => warn!("dropping undecodable audio block: {e}"),
                    }
                }
                Ok(None) => {
                    info!("audio peer disconnected");
                    break;
                }
                Err(e) => {
                    warn!("audio receive error: {e}");
                    break;
                }
            }
        }

        let _ = events
            .send(SessionEvent::PeerDisconnected { channel: ChannelKind::Audio })
            .await;
    }
}

// MARK: - Sender

/// Capture/send loop over an established connection (client side connects
/// during session start; the host dials back via [`host_sender`]).
pub(crate) async fn send_blocks(
    mut stream: TcpStream,
    crypto: SessionCrypto,
    mut source: Box<dyn AudioSource>,
    toggle: Arc<AtomicBool>,
    mut stop: StopRx,
    block_interval: Duration,
) {
    let mut ticker = tokio::time::interval(block_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = engine::stopped(&mut stop) => return,
            _ = ticker.tick() => {}
        }

        // Capture regardless of the toggle; transmit only while set.
        let block = match source.record_block().await {
            Ok(b) => b,
            Err(e) => {
                warn!("audio capture failed: {e}");
                continue;
            }
        };
        if !toggle.load(Ordering::Relaxed) {
            continue;
        }

        let ciphertext = match crypto.encrypt(&pcm_to_bytes(&block)) {
            Ok(c) => c,
            Err(e) => {
                warn!("audio encrypt failed: {e}");
                continue;
            }
        };
        if let Err(e) = send_frame(&mut stream, &ciphertext).await {
            debug!("audio send ended: {e}");
            return;
        }
    }
}

/// Host side sender: waits for the handshake to publish the client's
/// address, dials the client's audio port, then streams blocks.
pub(crate) async fn host_sender(
    cfg: SessionConfig,
    crypto: SessionCrypto,
    source: Box<dyn AudioSource>,
    toggle: Arc<AtomicBool>,
    mut peer_rx: watch::Receiver<Option<IpAddr>>,
    mut stop: StopRx,
) {
    let Some(stream) = engine::connect_back(&mut peer_rx, cfg.audio_port, &mut stop).await else {
        warn!("audio dial-back never completed");
        return;
    };
    let interval = cfg.audio_block_interval();
    send_blocks(stream, crypto, source, toggle, stop, interval).await;
}
