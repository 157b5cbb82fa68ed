//! Session lifecycle orchestrator.
//!
//! One [`SessionManager`] value owns all session state — role,
//! credentials, the shared stop signal, channel task handles — and passes
//! it explicitly into every channel task at start; nothing lives in
//! ambient globals.  The presentation shell drives `start_host` /
//! `connect` / `stop_host` / `disconnect` and consumes [`SessionEvent`]s.

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use pairview_core::device::{AudioSink, AudioSource, InputInjector, ScreenSource, WebcamSource};
use pairview_core::{
    ChannelKind, ChatPayload, ControlMessage, InputEvent, PairViewError, SessionConfig,
    SessionEvent,
};
use pairview_transport::{handshake, SessionCredentials, SessionCrypto};

use crate::chat::ChatContext;
use crate::engine::{self, StopRx};
use crate::{audio, chat, input, screen, video};

/// Per-task join budget during teardown; a task still running after this
/// is abandoned, not forcibly terminated.
const JOIN_TIMEOUT: Duration = Duration::from_millis(300);

// MARK: - Role

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    None,
    Host,
    Client,
}

// MARK: - Device bundles

/// Devices a hosting session drives.
pub struct HostDevices {
    pub screen: Box<dyn ScreenSource>,
    pub input: Box<dyn InputInjector>,
    pub audio_source: Box<dyn AudioSource>,
    pub audio_sink: Box<dyn AudioSink>,
    pub webcam: Box<dyn WebcamSource>,
}

/// Devices a connecting session drives.
pub struct ClientDevices {
    pub audio_source: Box<dyn AudioSource>,
    pub audio_sink: Box<dyn AudioSink>,
    pub webcam: Box<dyn WebcamSource>,
}

// MARK: - SessionManager

pub struct SessionManager {
    config: SessionConfig,
    events: mpsc::Sender<SessionEvent>,
    role: Role,
    credentials: Option<SessionCredentials>,
    stop_tx: Option<watch::Sender<bool>>,
    handles: Vec<(ChannelKind, JoinHandle<()>)>,
    chat_tx: Option<mpsc::Sender<ChatPayload>>,
    input_tx: Option<mpsc::Sender<InputEvent>>,
    audio_enabled: Arc<AtomicBool>,
    video_enabled: Arc<AtomicBool>,
}

impl SessionManager {
    pub fn new(config: SessionConfig, events: mpsc::Sender<SessionEvent>) -> Self {
        Self {
            config,
            events,
            role: Role::None,
            credentials: None,
            stop_tx: None,
            handles: Vec::new(),
            chat_tx: None,
            input_tx: None,
            audio_enabled: Arc::new(AtomicBool::new(false)),
            video_enabled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Generated once, lazily, the first time they are requested; reset
    /// only by process restart.
    pub fn credentials(&mut self) -> &SessionCredentials {
        self.credentials.get_or_insert_with(SessionCredentials::generate)
    }

    /// Replace the generated credentials (user-chosen password).  Only
    /// meaningful before `start_host`.
    pub fn set_credentials(&mut self, credentials: SessionCredentials) {
        self.credentials = Some(credentials);
    }

    // ── Hosting ───────────────────────────────────────────────────────────

    /// Start all channel listeners.  No-op when a session is already
    /// running.  Channel-level faults after start (a port in use, a
    /// failing device) are isolated to their task and logged, never
    /// propagated.
    pub fn start_host(&mut self, devices: HostDevices) -> Result<(), PairViewError> {
        if self.role != Role::None {
            info!("start_host ignored — session already active ({:?})", self.role);
            return Ok(());
        }

        let creds = self.credentials().clone();
        let crypto = creds.crypto()?;
        let cfg = self.config.clone();
        let events = self.events.clone();

        let (stop_tx, stop_rx) = watch::channel(false);
        let (peer_tx, peer_rx) = watch::channel(None::<IpAddr>);
        let (control_tx, control_rx) = mpsc::channel(16);
        let (chat_tx, chat_rx) = mpsc::channel(64);

        let mut handles = Vec::new();

        handles.push((
            ChannelKind::Screen,
            tokio::spawn(screen::host_loop(
                cfg.clone(),
                creds,
                devices.screen,
                peer_tx,
                events.clone(),
                stop_rx.clone(),
            )),
        ));

        handles.push((
            ChannelKind::Input,
            tokio::spawn(input::host_loop(
                cfg.clone(),
                crypto,
                devices.input,
                events.clone(),
                stop_rx.clone(),
            )),
        ));

        let chat_ctx = ChatContext {
            crypto,
            local_ip: cfg.bind_ip.clone(),
            events: events.clone(),
            control_tx,
        };
        handles.push((
            ChannelKind::Chat,
            tokio::spawn(chat::host_loop(cfg.clone(), chat_ctx, chat_rx, stop_rx.clone())),
        ));

        handles.push((
            ChannelKind::Chat,
            tokio::spawn(control_dispatcher(
                control_rx,
                crypto,
                events.clone(),
                stop_rx.clone(),
            )),
        ));

        handles.push((
            ChannelKind::Audio,
            tokio::spawn(audio::receiver_loop(
                cfg.clone(),
                crypto,
                devices.audio_sink,
                events.clone(),
                stop_rx.clone(),
            )),
        ));

        handles.push((
            ChannelKind::Audio,
            tokio::spawn(audio::host_sender(
                cfg.clone(),
                crypto,
                devices.audio_source,
                Arc::clone(&self.audio_enabled),
                peer_rx,
                stop_rx.clone(),
            )),
        ));

        // Host video sender: bind inside the task so a dead port stays a
        // channel-local fault.
        let video_toggle = Arc::clone(&self.video_enabled);
        let video_events = events.clone();
        let video_stop = stop_rx.clone();
        let video_cfg = cfg.clone();
        handles.push((
            ChannelKind::Video,
            tokio::spawn(async move {
                match engine::bind(&video_cfg.bind_ip, video_cfg.video_host_port).await {
                    Ok(listener) => {
                        video::sender(
                            listener,
                            crypto,
                            devices.webcam,
                            video_toggle,
                            video_cfg.video_frame_interval(),
                            video_events,
                            video_stop,
                        )
                        .await;
                    }
                    Err(e) => warn!("video sender listener failed: {e}"),
                }
            }),
        ));

        self.stop_tx = Some(stop_tx);
        self.chat_tx = Some(chat_tx);
        self.handles = handles;
        self.role = Role::Host;
        info!("hosting session started ({} channel tasks)", self.handles.len());
        Ok(())
    }

    /// Stop the hosting session.  Idempotent: stopping when not hosting
    /// is a no-op and raises no error.
    pub async fn stop_host(&mut self) {
        if self.role != Role::Host {
            debug!("stop_host ignored — not hosting");
            return;
        }
        self.shutdown().await;
        info!("hosting session stopped");
    }

    // ── Connecting ────────────────────────────────────────────────────────

    /// Authenticate against `ip` and bring up all client channels.
    ///
    /// The handshake runs first; on success the derived key material is
    /// propagated to the input/chat/audio/video channels, which are
    /// connected in sequence.  A failure partway returns that error and
    /// does not roll back channels that already connected (their tasks
    /// wind down with the dropped stop handle).
    pub async fn connect(
        &mut self,
        ip: IpAddr,
        password: &str,
        devices: ClientDevices,
    ) -> Result<(), PairViewError> {
        if self.role != Role::None {
            warn!("connect ignored — session already active ({:?})", self.role);
            return Ok(());
        }
        let cfg = self.config.clone();
        let events = self.events.clone();

        // 1. Screen + authentication.
        let mut screen_stream = engine::connect_once(ip, cfg.screen_port).await?;
        let nonce = handshake::initiate(&mut screen_stream, password).await?;
        let crypto = SessionCrypto::derive(password, &nonce)?;
        info!("authenticated to {ip} — key material established");

        let (stop_tx, stop_rx) = watch::channel(false);
        let mut handles = Vec::new();

        handles.push((
            ChannelKind::Screen,
            tokio::spawn(screen::client_loop(screen_stream, events.clone(), stop_rx.clone())),
        ));

        // 2. Input.
        let input_stream = engine::connect_once(ip, cfg.input_port).await?;
        let (input_tx, input_rx) = mpsc::channel(256);
        handles.push((
            ChannelKind::Input,
            tokio::spawn(input::client_sender(input_stream, crypto, input_rx, stop_rx.clone())),
        ));

        // 3. Chat (+ control dispatcher for host-originated signaling).
        let chat_stream = engine::connect_once(ip, cfg.chat_port).await?;
        let local_ip = chat_stream
            .local_addr()
            .map(|a| a.ip().to_string())
            .unwrap_or_default();
        let (chat_tx, chat_rx) = mpsc::channel(64);
        let (control_tx, control_rx) = mpsc::channel(16);
        let chat_ctx = ChatContext {
            crypto,
            local_ip,
            events: events.clone(),
            control_tx,
        };
        let chat_peer = SocketAddr::new(ip, cfg.chat_port);
        handles.push((
            ChannelKind::Chat,
            tokio::spawn(chat::client_loop(
                chat_stream,
                chat_peer,
                chat_ctx,
                chat_rx,
                stop_rx.clone(),
            )),
        ));
        handles.push((
            ChannelKind::Chat,
            tokio::spawn(control_dispatcher(
                control_rx,
                crypto,
                events.clone(),
                stop_rx.clone(),
            )),
        ));

        // 4. Audio: own receiver listener + connect-once sender.
        handles.push((
            ChannelKind::Audio,
            tokio::spawn(audio::receiver_loop(
                cfg.clone(),
                crypto,
                devices.audio_sink,
                events.clone(),
                stop_rx.clone(),
            )),
        ));
        let audio_stream = engine::connect_once(ip, cfg.audio_port).await?;
        handles.push((
            ChannelKind::Audio,
            tokio::spawn(audio::send_blocks(
                audio_stream,
                crypto,
                devices.audio_source,
                Arc::clone(&self.audio_enabled),
                stop_rx.clone(),
                cfg.audio_block_interval(),
            )),
        ));

        // 5. Video: receive the host's stream; open our own sender and
        //    announce its port over chat so the host can dial back.
        let video_stream = engine::connect_once(ip, cfg.video_host_port).await?;
        handles.push((
            ChannelKind::Video,
            tokio::spawn(video::receiver(video_stream, crypto, events.clone(), stop_rx.clone())),
        ));

        match engine::bind(&cfg.bind_ip, cfg.video_client_port).await {
            Ok(listener) => {
                let port = listener
                    .local_addr()
                    .map(|a| a.port())
                    .unwrap_or(cfg.video_client_port);
                handles.push((
                    ChannelKind::Video,
                    tokio::spawn(video::sender(
                        listener,
                        crypto,
                        devices.webcam,
                        Arc::clone(&self.video_enabled),
                        cfg.video_frame_interval(),
                        events.clone(),
                        stop_rx.clone(),
                    )),
                ));
                if chat_tx.send(ChatPayload::Control(ControlMessage::VideoPort { port })).await.is_err() {
                    warn!("could not announce video port — chat channel gone");
                }
            }
            Err(e) => warn!("video sender listener failed: {e}"),
        }

        self.stop_tx = Some(stop_tx);
        self.chat_tx = Some(chat_tx);
        self.input_tx = Some(input_tx);
        self.handles = handles;
        self.role = Role::Client;
        info!("connected to {ip} ({} channel tasks)", self.handles.len());
        Ok(())
    }

    /// Tear down the client session, closing every channel independently;
    /// individual teardown failures are logged, never propagated.
    pub async fn disconnect(&mut self) {
        if self.role != Role::Client {
            debug!("disconnect ignored — not connected");
            return;
        }
        self.shutdown().await;
        info!("disconnected");
    }

    // ── In-session operations ─────────────────────────────────────────────

    /// Queue one chat message to the peer.  `false` when no chat
    /// connection is up.
    pub fn send_chat(&self, text: impl Into<String>) -> bool {
        let Some(tx) = &self.chat_tx else {
            return false;
        };
        match tx.try_send(ChatPayload::Text(text.into())) {
            Ok(()) => true,
            Err(e) => {
                warn!("chat send failed: {e}");
                false
            }
        }
    }

    /// Forward one UI input callback to the host (client role only).
    pub fn send_input(&self, event: InputEvent) -> bool {
        let Some(tx) = &self.input_tx else {
            return false;
        };
        match tx.try_send(event) {
            Ok(()) => true,
            Err(e) => {
                warn!("input send failed: {e}");
                false
            }
        }
    }

    /// Gate audio transmission; capture keeps running while disabled.
    pub fn set_audio_enabled(&self, enabled: bool) {
        self.audio_enabled.store(enabled, Ordering::Relaxed);
    }

    /// Gate video transmission; capture keeps running while disabled.
    pub fn set_video_enabled(&self, enabled: bool) {
        self.video_enabled.store(enabled, Ordering::Relaxed);
    }

    // ── Teardown ──────────────────────────────────────────────────────────

    async fn shutdown(&mut self) {
        if let Some(stop) = self.stop_tx.take() {
            let _ = stop.send(true);
        }
        // Dropping the senders closes the chat connection's outbound side
        // and the input pipe, on top of the stop signal.
        self.chat_tx = None;
        self.input_tx = None;

        for (kind, handle) in self.handles.drain(..) {
            match tokio::time::timeout(JOIN_TIMEOUT, handle).await {
                Ok(Ok(())) => debug!("{kind} channel task closed"),
                Ok(Err(e)) => warn!("{kind} channel task panicked: {e}"),
                Err(_) => warn!("{kind} channel task exceeded join timeout — abandoned"),
            }
        }
        self.role = Role::None;
    }
}

// MARK: - Control dispatcher

/// Reacts to control payloads demultiplexed off the chat channel.  A
/// `video_port` announcement triggers an outbound dial to the announcing
/// peer; the spawned receiver observes the same session stop signal.
async fn control_dispatcher(
    mut control_rx: mpsc::Receiver<(IpAddr, ControlMessage)>,
    crypto: SessionCrypto,
    events: mpsc::Sender<SessionEvent>,
    mut stop: StopRx,
) {
    loop {
        let msg = tokio::select! {
            _ = engine::stopped(&mut stop) => return,
            m = control_rx.recv() => m,
        };
        let Some((ip, control)) = msg else { return };

        match control {
            ControlMessage::VideoPort { port } => {
                info!("video rendezvous: dialing back {ip}:{port}");
                match engine::connect_once(ip, port).await {
                    Ok(stream) => {
                        tokio::spawn(video::receiver(stream, crypto, events.clone(), stop.clone()));
                    }
                    Err(e) => warn!("video dial-back to {ip}:{port} failed: {e}"),
                }
            }
        }
    }
}
