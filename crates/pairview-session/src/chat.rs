//! Chat channel — duplex over one shared connection per direction,
//! encrypted.
//!
//! The receive side demultiplexes the control sub-protocol: a
//! `video_port` payload goes to the rendezvous dispatcher, never to the
//! chat-display event.  Outbound text (and control announcements) arrive
//! through an `mpsc` held by the session manager.  Reads run in their own
//! task owning the read half of the socket — `recv_frame` is not
//! cancel-safe, so it must never be raced inside a `select!` where a
//! concurrent write could cancel it mid-frame and desync the stream.

use std::net::{IpAddr, SocketAddr};

use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{info, warn};

use pairview_core::{
    ChannelKind, ChatEnvelope, ChatPayload, ControlMessage, SessionConfig, SessionEvent,
};
use pairview_transport::{recv_frame, send_frame, SessionCrypto};

use crate::engine::{self, StopRx};

/// Why one served connection ended.
enum ServeEnd {
    /// Stop signal fired or the manager dropped the outbound sender.
    Stopped,
    /// Peer went away; the host loops back to accept a replacement.
    Disconnected,
}

#[derive(Clone)]
pub(crate) struct ChatContext {
    pub crypto: SessionCrypto,
    /// Legacy `ip` field stamped on outgoing envelopes.
    pub local_ip: String,
    pub events: mpsc::Sender<SessionEvent>,
    /// Control payloads, tagged with the peer they came from.
    pub control_tx: mpsc::Sender<(IpAddr, ControlMessage)>,
}

/// Host side: accept loop; one live chat connection at a time.
pub(crate) async fn host_loop(
    cfg: SessionConfig,
    ctx: ChatContext,
    mut outbound: mpsc::Receiver<ChatPayload>,
    mut stop: StopRx,
) {
    let listener = match engine::bind(&cfg.bind_ip, cfg.chat_port).await {
        Ok(l) => l,
        Err(e) => {
            warn!("chat listener failed: {e}");
            return;
        }
    };
    info!("chat channel listening on {}:{}", cfg.bind_ip, cfg.chat_port);

    while let Some((stream, addr)) = engine::accept_or_stop(&listener, &mut stop).await {
        info!("chat client connected: {addr}");
        let _ = ctx
            .events
            .send(SessionEvent::PeerConnected { channel: ChannelKind::Chat, addr })
            .await;

        // Stamp outgoing envelopes with the address this connection
        // actually uses, not the wildcard the listener was bound to.
        let mut conn_ctx = ctx.clone();
        if let Ok(local) = stream.local_addr() {
            conn_ctx.local_ip = local.ip().to_string();
        }

        match serve(stream, addr, &conn_ctx, &mut outbound, &mut stop).await {
            ServeEnd::Stopped => return,
            ServeEnd::Disconnected => {
                let _ = ctx
                    .events
                    .send(SessionEvent::PeerDisconnected { channel: ChannelKind::Chat })
                    .await;
            }
        }
    }
}

/// Client side: the manager connected the stream; serve it once.
pub(crate) async fn client_loop(
    stream: TcpStream,
    addr: SocketAddr,
    ctx: ChatContext,
    mut outbound: mpsc::Receiver<ChatPayload>,
    mut stop: StopRx,
) {
    if let ServeEnd::Disconnected = serve(stream, addr, &ctx, &mut outbound, &mut stop).await {
        let _ = ctx
            .events
            .send(SessionEvent::PeerDisconnected { channel: ChannelKind::Chat })
            .await;
    }
}

async fn serve(
    stream: TcpStream,
    peer: SocketAddr,
    ctx: &ChatContext,
    outbound: &mut mpsc::Receiver<ChatPayload>,
    stop: &mut StopRx,
) -> ServeEnd {
    let (rd, mut wr) = stream.into_split();
    let mut reader = tokio::spawn(read_loop(rd, peer, ctx.clone()));

    let end = loop {
        tokio::select! {
            _ = engine::stopped(stop) => break ServeEnd::Stopped,

            payload = outbound.recv() => {
                let Some(payload) = payload else { break ServeEnd::Stopped };
                let envelope = ChatEnvelope { ip: ctx.local_ip.clone(), msg: payload };
                let json = match serde_json::to_vec(&envelope) {
                    Ok(j) => j,
                    Err(e) => { warn!("unserialisable chat envelope: {e}"); continue; }
                };
                let ciphertext = match ctx.crypto.encrypt(&json) {
                    Ok(c) => c,
                    Err(e) => { warn!("chat encrypt failed: {e}"); continue; }
                };
                if let Err(e) = send_frame(&mut wr, &ciphertext).await {
                    warn!("chat send failed: {e}");
                    break ServeEnd::Disconnected;
                }
            }

            _ = &mut reader => break ServeEnd::Disconnected,
        }
    };
    reader.abort();
    end
}

/// Owns the read half for the connection's lifetime; a frame is never
/// abandoned part-way through.
async fn read_loop(mut rd: OwnedReadHalf, peer: SocketAddr, ctx: ChatContext) {
    loop {
        match recv_frame(&mut rd).await {
            Ok(Some(ciphertext)) => dispatch(&ctx, peer, &ciphertext).await,
            Ok(None) => {
                info!("chat peer disconnected");
                return;
            }
            Err(e) => {
                warn!("chat receive error: {e}");
                return;
            }
        }
    }
}

/// Decrypt, parse, and demultiplex one inbound chat frame.  Control
/// payloads go to the rendezvous dispatcher; only text reaches the
/// chat-display event.  Bad frames are dropped, never fatal.
async fn dispatch(ctx: &ChatContext, peer: SocketAddr, ciphertext: &[u8]) {
    let plain = match ctx.crypto.decrypt(ciphertext) {
        Ok(p) => p,
        Err(e) => {
            warn!("dropping undecryptable chat frame: {e}");
            return;
        }
    };
    let envelope: ChatEnvelope = match serde_json::from_slice(&plain) {
        Ok(env) => env,
        Err(e) => {
            warn!("dropping malformed chat envelope: {e}");
            return;
        }
    };

    match envelope.msg {
        ChatPayload::Text(text) => {
            let _ = ctx.events.send(SessionEvent::ChatMessage(text)).await;
        }
        ChatPayload::Control(control) => {
            info!("chat control from {}: {control:?}", peer.ip());
            let _ = ctx.control_tx.send((peer.ip(), control)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tokio::sync::watch;
    use tokio::time::timeout;

    use pairview_transport::SessionCredentials;

    fn test_ctx() -> (
        ChatContext,
        mpsc::Receiver<SessionEvent>,
        mpsc::Receiver<(IpAddr, ControlMessage)>,
    ) {
        let (events_tx, events_rx) = mpsc::channel(16);
        let (control_tx, control_rx) = mpsc::channel(16);
        let ctx = ChatContext {
            crypto: SessionCredentials::with_password("pw").crypto().unwrap(),
            local_ip: "127.0.0.1".into(),
            events: events_tx,
            control_tx,
        };
        (ctx, events_rx, control_rx)
    }

    fn peer() -> SocketAddr {
        "10.0.0.2:55555".parse().unwrap()
    }

    #[tokio::test]
    async fn text_reaches_display_event() {
        let (ctx, mut events_rx, _control_rx) = test_ctx();
        let envelope = ChatEnvelope::text("10.0.0.2", "hello");
        let ct = ctx.crypto.encrypt(&serde_json::to_vec(&envelope).unwrap()).unwrap();

        dispatch(&ctx, peer(), &ct).await;

        match events_rx.recv().await.unwrap() {
            SessionEvent::ChatMessage(text) => assert_eq!(text, "hello"),
            other => panic!("expected chat message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn control_payload_never_reaches_display() {
        let (ctx, mut events_rx, mut control_rx) = test_ctx();
        let envelope =
            ChatEnvelope::control("10.0.0.2", ControlMessage::VideoPort { port: 9001 });
        let ct = ctx.crypto.encrypt(&serde_json::to_vec(&envelope).unwrap()).unwrap();

        dispatch(&ctx, peer(), &ct).await;

        let (ip, control) = control_rx.recv().await.unwrap();
        assert_eq!(ip, peer().ip());
        assert_eq!(control, ControlMessage::VideoPort { port: 9001 });
        assert!(events_rx.try_recv().is_err(), "control must not surface as chat text");
    }

    #[tokio::test]
    async fn garbage_frame_is_dropped_quietly() {
        let (ctx, mut events_rx, mut control_rx) = test_ctx();
        dispatch(&ctx, peer(), b"not even ciphertext of json").await;
        assert!(events_rx.try_recv().is_err());
        assert!(control_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn outbound_send_during_partial_inbound_frame_loses_nothing() {
        let (ctx, mut events_rx, _control_rx) = test_ctx();
        let crypto = ctx.crypto;
        let listener = engine::bind("127.0.0.1", 0).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let (out_tx, mut out_rx) = mpsc::channel(8);

        let server = tokio::spawn(async move {
            let (stream, peer) = listener.accept().await.unwrap();
            serve(stream, peer, &ctx, &mut out_rx, &mut stop_rx).await
        });

        let mut remote = engine::connect_once(addr.ip(), addr.port()).await.unwrap();
        let envelope = ChatEnvelope::text("10.0.0.2", "hello");
        let ct = crypto.encrypt(&serde_json::to_vec(&envelope).unwrap()).unwrap();
        let mut wire = (ct.len() as u32).to_be_bytes().to_vec();
        wire.extend_from_slice(&ct);

        // Deliver the length prefix plus two payload bytes, then stall
        // with the frame open.
        remote.write_all(&wire[..6]).await.unwrap();
        remote.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // An outbound message goes out while the inbound frame is still
        // incomplete.
        out_tx.send(ChatPayload::Text("outbound".into())).await.unwrap();
        let sent = timeout(Duration::from_secs(1), recv_frame(&mut remote))
            .await
            .expect("outbound frame within deadline")
            .unwrap()
            .expect("open stream");
        let sent_env: ChatEnvelope =
            serde_json::from_slice(&crypto.decrypt(&sent).unwrap()).unwrap();
        assert_eq!(sent_env.msg, ChatPayload::Text("outbound".into()));

        // The rest of the inbound frame still dispatches intact.
        remote.write_all(&wire[6..]).await.unwrap();
        remote.flush().await.unwrap();
        match timeout(Duration::from_secs(1), events_rx.recv())
            .await
            .expect("inbound message within deadline")
            .expect("event channel open")
        {
            SessionEvent::ChatMessage(text) => assert_eq!(text, "hello"),
            other => panic!("expected chat text, got {other:?}"),
        }

        stop_tx.send(true).unwrap();
        let _ = server.await.unwrap();
    }

    #[tokio::test]
    async fn host_stamps_envelopes_with_connection_local_ip() {
        let (mut ctx, _events_rx, _control_rx) = test_ctx();
        ctx.local_ip = "0.0.0.0".into();
        let crypto = ctx.crypto;
        let cfg = SessionConfig::with_base_port(45710);
        let (stop_tx, stop_rx) = watch::channel(false);
        let (out_tx, out_rx) = mpsc::channel(8);

        tokio::spawn(host_loop(cfg.clone(), ctx, out_rx, stop_rx));
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut remote = engine::connect_once("127.0.0.1".parse().unwrap(), cfg.chat_port)
            .await
            .unwrap();
        out_tx.send(ChatPayload::Text("hi".into())).await.unwrap();

        let frame = timeout(Duration::from_secs(1), recv_frame(&mut remote))
            .await
            .expect("frame within deadline")
            .unwrap()
            .expect("open stream");
        let env: ChatEnvelope = serde_json::from_slice(&crypto.decrypt(&frame).unwrap()).unwrap();
        assert_eq!(env.ip, "127.0.0.1", "envelope must carry the connection address");

        stop_tx.send(true).unwrap();
    }
}
