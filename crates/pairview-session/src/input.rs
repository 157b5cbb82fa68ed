//! Input-replay channel — client push, encrypted.
//!
//! The client serialises one [`InputEvent`] per UI callback and sends it
//! immediately (no polling).  The host decodes and drives the OS pointer
//! and keyboard controllers through the [`InputInjector`] seam.  A
//! decrypt or decode failure drops that event, never the loop.

use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use pairview_core::device::InputInjector;
use pairview_core::input::wheel_to_scroll_units;
use pairview_core::{ChannelKind, InputEvent, MouseButton, SessionConfig, SessionEvent};
use pairview_transport::{recv_frame, send_frame, SessionCrypto};

use crate::engine::{self, StopRx};

/// Host side: accept loop + decode/inject loop.
pub(crate) async fn host_loop(
    cfg: SessionConfig,
    crypto: SessionCrypto,
    mut injector: Box<dyn InputInjector>,
    events: mpsc::Sender<SessionEvent>,
    mut stop: StopRx,
) {
    let listener = match engine::bind(&cfg.bind_ip, cfg.input_port).await {
        Ok(l) => l,
        Err(e) => {
            warn!("input listener failed: {e}");
            return;
        }
    };
    info!("input channel listening on {}:{}", cfg.bind_ip, cfg.input_port);

    while let Some((mut stream, addr)) = engine::accept_or_stop(&listener, &mut stop).await {
        info!("input client connected: {addr}");
        let _ = events
            .send(SessionEvent::PeerConnected { channel: ChannelKind::Input, addr })
            .await;

        loop {
            let frame = tokio::select! {
                _ = engine::stopped(&mut stop) => return,
                res = recv_frame(&mut stream) => res,
            };

            match frame {
                Ok(Some(ciphertext)) => match decode(&crypto, &ciphertext) {
                    Ok(event) => apply_event(injector.as_mut(), &event),
                    Err(e) => warn!("dropping undecodable input event: {e}"),
                },
                Ok(None) => {
                    info!("input client disconnected");
                    break;
                }
                Err(e) => {
                    warn!("input receive error: {e}");
                    break;
                }
            }
        }

        let _ = events
            .send(SessionEvent::PeerDisconnected { channel: ChannelKind::Input })
            .await;
    }
}

fn decode(crypto: &SessionCrypto, ciphertext: &[u8]) -> anyhow::Result<InputEvent> {
    let plain = crypto.decrypt(ciphertext)?;
    Ok(serde_json::from_slice(&plain)?)
}

/// Translate one event into injector calls: normalised coordinates ×
/// host resolution, button indices {0,1,2} → {left,middle,right}, wheel
/// delta → scroll units.
pub(crate) fn apply_event(injector: &mut dyn InputInjector, event: &InputEvent) {
    let (width, height) = injector.screen_size();

    if let Some([x, y]) = event.mouse_pos {
        injector.move_pointer(x * width as f64, y * height as f64);
    }
    if let Some(index) = event.mouse_down {
        match MouseButton::from_index(index) {
            Some(button) => injector.press_button(button),
            None => debug!("ignoring unknown button index {index}"),
        }
    }
    if let Some(index) = event.mouse_up {
        match MouseButton::from_index(index) {
            Some(button) => injector.release_button(button),
            None => debug!("ignoring unknown button index {index}"),
        }
    }
    if let Some(delta) = event.wheel {
        let units = wheel_to_scroll_units(delta);
        if units != 0 {
            injector.scroll(units);
        }
    }
    if let Some(code) = event.keydown {
        injector.press_key(code);
    }
    if let Some(code) = event.keyup {
        injector.release_key(code);
    }
}

/// Client side: owns the socket; UI callbacks feed events through the
/// `mpsc` sender held by the session manager.
pub(crate) async fn client_sender(
    mut stream: TcpStream,
    crypto: SessionCrypto,
    mut rx: mpsc::Receiver<InputEvent>,
    mut stop: StopRx,
) {
    loop {
        let event = tokio::select! {
            _ = engine::stopped(&mut stop) => return,
            ev = rx.recv() => match ev {
                Some(ev) => ev,
                None => return,
            },
        };

        let json = match serde_json::to_vec(&event) {
            Ok(j) => j,
            Err(e) => {
                warn!("unserialisable input event: {e}");
                continue;
            }
        };
        let ciphertext = match crypto.encrypt(&json) {
            Ok(c) => c,
            Err(e) => {
                warn!("input encrypt failed: {e}");
                continue;
            }
        };
        if let Err(e) = send_frame(&mut stream, &ciphertext).await {
            warn!("input send failed — channel closed: {e}");
            return;
        }
    }
}
