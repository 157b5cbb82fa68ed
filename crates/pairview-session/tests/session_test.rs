//! End-to-end session tests: one host and one client manager on
//! localhost, real sockets, mock devices.  Each test uses its own port
//! base so they can run in parallel.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

use pairview_core::device::{AudioSink, AudioSource, InputInjector, ScreenSource, WebcamSource};
use pairview_core::{DeviceError, MouseButton, PairViewError};
use pairview_session::{
    ClientDevices, HostDevices, Role, SessionConfig, SessionEvent, SessionManager,
};
use pairview_transport::SessionCredentials;

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

// ── Mock devices ──────────────────────────────────────────────────────────

struct TestScreen;

#[async_trait]
impl ScreenSource for TestScreen {
    async fn next_frame(&mut self) -> Result<Vec<u8>, DeviceError> {
        // Slow trickle keeps the push loop from flooding the test.
        sleep(Duration::from_millis(20)).await;
        Ok(vec![0xFF, 0xD8, 0xFF, 0xE0])
    }
}

struct NullInjector;

impl InputInjector for NullInjector {
    fn screen_size(&self) -> (u32, u32) {
        (1920, 1080)
    }
    fn move_pointer(&mut self, _x: f64, _y: f64) {}
    fn press_button(&mut self, _button: MouseButton) {}
    fn release_button(&mut self, _button: MouseButton) {}
    fn scroll(&mut self, _units: i32) {}
    fn press_key(&mut self, _code: u32) {}
    fn release_key(&mut self, _code: u32) {}
}

struct SilentSource;

#[async_trait]
impl AudioSource for SilentSource {
    async fn record_block(&mut self) -> Result<Vec<f32>, DeviceError> {
        Ok(vec![0.0; 64])
    }
}

struct NullSink;

impl AudioSink for NullSink {
    fn play(&mut self, _samples: &[f32]) {}
}

struct TestWebcam {
    frame: Vec<u8>,
}

#[async_trait]
impl WebcamSource for TestWebcam {
    async fn next_frame(&mut self) -> Result<Vec<u8>, DeviceError> {
        Ok(self.frame.clone())
    }
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn host_devices() -> HostDevices {
    HostDevices {
        screen: Box::new(TestScreen),
        input: Box::new(NullInjector),
        audio_source: Box::new(SilentSource),
        audio_sink: Box::new(NullSink),
        webcam: Box::new(TestWebcam { frame: vec![0xFF, 0xD8, 0xAA] }),
    }
}

fn client_devices() -> ClientDevices {
    ClientDevices {
        audio_source: Box::new(SilentSource),
        audio_sink: Box::new(NullSink),
        webcam: Box::new(TestWebcam { frame: vec![0xFF, 0xD8, 0xBB] }),
    }
}

async fn next_chat(rx: &mut mpsc::Receiver<SessionEvent>) -> String {
    loop {
        let event = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("chat message within deadline")
            .expect("event channel open");
        if let SessionEvent::ChatMessage(text) = event {
            return text;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn chat_flows_both_ways() {
    init_logging();
    let cfg = SessionConfig::with_base_port(45100);
    let (host_events, mut host_rx) = mpsc::channel(256);
    let mut host = SessionManager::new(cfg.clone(), host_events);
    host.set_credentials(SessionCredentials::with_password("P@ss1234"));
    host.start_host(host_devices()).unwrap();
    assert_eq!(host.role(), Role::Host);
    sleep(Duration::from_millis(200)).await;

    let (client_events, mut client_rx) = mpsc::channel(256);
    let mut client = SessionManager::new(cfg, client_events);
    client
        .connect(LOCALHOST, "P@ss1234", client_devices())
        .await
        .unwrap();
    assert_eq!(client.role(), Role::Client);
    sleep(Duration::from_millis(200)).await;

    assert!(host.send_chat("hello"));
    assert_eq!(next_chat(&mut client_rx).await, "hello");

    assert!(client.send_chat("hi back"));
    assert_eq!(next_chat(&mut host_rx).await, "hi back");

    // The authenticated screen stream reaches the client as decoded JPEG.
    let frame = loop {
        match timeout(Duration::from_secs(5), client_rx.recv())
            .await
            .expect("screen frame within deadline")
            .expect("event channel open")
        {
            SessionEvent::ScreenFrame(f) => break f,
            _ => continue,
        }
    };
    assert_eq!(&frame[..], &[0xFF, 0xD8, 0xFF, 0xE0]);

    client.disconnect().await;
    host.stop_host().await;
    assert_eq!(host.role(), Role::None);
    assert_eq!(client.role(), Role::None);
}

#[tokio::test]
async fn wrong_password_is_rejected_and_host_survives() {
    init_logging();
    let cfg = SessionConfig::with_base_port(45200);
    let (host_events, _host_rx) = mpsc::channel(256);
    let mut host = SessionManager::new(cfg.clone(), host_events);
    host.set_credentials(SessionCredentials::with_password("correct horse"));
    host.start_host(host_devices()).unwrap();
    sleep(Duration::from_millis(200)).await;

    let (client_events, _client_rx) = mpsc::channel(256);
    let mut client = SessionManager::new(cfg, client_events);
    match client.connect(LOCALHOST, "battery staple", client_devices()).await {
        Err(PairViewError::Authentication(_)) => {}
        other => panic!("expected an authentication error, got {other:?}"),
    }
    assert_eq!(client.role(), Role::None);
    assert!(!client.send_chat("should go nowhere"));

    // A rejection must not wedge the listener; the right password works.
    client
        .connect(LOCALHOST, "correct horse", client_devices())
        .await
        .unwrap();
    assert_eq!(client.role(), Role::Client);

    client.disconnect().await;
    host.stop_host().await;
}

#[tokio::test]
async fn video_rendezvous_reaches_host_without_leaking_into_chat() {
    init_logging();
    let cfg = SessionConfig::with_base_port(45300);
    let (host_events, mut host_rx) = mpsc::channel(256);
    let mut host = SessionManager::new(cfg.clone(), host_events);
    host.start_host(host_devices()).unwrap();
    sleep(Duration::from_millis(200)).await;

    let password = host.credentials().password.clone();
    let (client_events, _client_rx) = mpsc::channel(256);
    let mut client = SessionManager::new(cfg, client_events);
    client.connect(LOCALHOST, &password, client_devices()).await.unwrap();

    // The client announced its sender port over chat; the host dials back
    // and frames flow once the client enables video.
    client.set_video_enabled(true);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    let frame = loop {
        let event = timeout(Duration::from_secs(5), host_rx.recv())
            .await
            .expect("video frame within deadline")
            .expect("event channel open");
        assert!(tokio::time::Instant::now() < deadline, "no video frame arrived");
        match event {
            SessionEvent::VideoFrame(f) => break f,
            SessionEvent::ChatMessage(text) => {
                panic!("control payload surfaced as chat text: {text:?}")
            }
            _ => continue,
        }
    };
    assert_eq!(&frame[..], &[0xFF, 0xD8, 0xBB]);

    client.disconnect().await;
    host.stop_host().await;
}

#[tokio::test]
async fn stop_is_idempotent_and_releases_listeners() {
    init_logging();
    let cfg = SessionConfig::with_base_port(45400);
    let (host_events, _host_rx) = mpsc::channel(256);
    let mut host = SessionManager::new(cfg.clone(), host_events);
    host.start_host(host_devices()).unwrap();
    sleep(Duration::from_millis(200)).await;

    host.stop_host().await;
    assert_eq!(host.role(), Role::None);
    // Second stop is a quiet no-op.
    host.stop_host().await;

    // Every listener port must be free again.
    for port in [cfg.screen_port, cfg.input_port, cfg.chat_port, cfg.audio_port] {
        let probe = tokio::net::TcpListener::bind((cfg.bind_ip.as_str(), port))
            .await
            .unwrap_or_else(|e| panic!("port {port} still held after stop: {e}"));
        drop(probe);
    }

    // And the manager can host again on the same ports.
    host.start_host(host_devices()).unwrap();
    assert_eq!(host.role(), Role::Host);
    sleep(Duration::from_millis(100)).await;
    host.stop_host().await;
}

#[tokio::test]
async fn start_host_is_a_noop_while_active() {
    init_logging();
    let cfg = SessionConfig::with_base_port(45500);
    let (host_events, _host_rx) = mpsc::channel(256);
    let mut host = SessionManager::new(cfg, host_events);
    host.start_host(host_devices()).unwrap();
    sleep(Duration::from_millis(100)).await;

    // Re-starting while hosting must not error or double-bind.
    host.start_host(host_devices()).unwrap();
    assert_eq!(host.role(), Role::Host);

    host.stop_host().await;
}
