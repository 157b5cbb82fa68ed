use serde::{Deserialize, Serialize};

// MARK: - ChannelKind

/// One logical stream with its own port, direction, and codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Screen,
    Input,
    Chat,
    Audio,
    Video,
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Screen => write!(f, "screen"),
            Self::Input => write!(f, "input"),
            Self::Chat => write!(f, "chat"),
            Self::Audio => write!(f, "audio"),
            Self::Video => write!(f, "video"),
        }
    }
}

// MARK: - ChannelDirection

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelDirection {
    /// Host captures and pushes, client receives (screen).
    HostPush,
    /// Client pushes, host receives (input replay).
    ClientPush,
    /// Both peers may send (chat, audio, video).
    Duplex,
}

impl ChannelKind {
    pub fn direction(&self) -> ChannelDirection {
        match self {
            Self::Screen => ChannelDirection::HostPush,
            Self::Input => ChannelDirection::ClientPush,
            Self::Chat | Self::Audio | Self::Video => ChannelDirection::Duplex,
        }
    }

    /// Every channel except the screen rides the session stream cipher.
    pub fn encrypted(&self) -> bool {
        !matches!(self, Self::Screen)
    }
}

// MARK: - SessionConfig

/// Per-session channel configuration.  Fixed at session start; ports are
/// overridable so tests can run several sessions on one machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Address listeners bind to.
    pub bind_ip: String,
    /// Screen streaming + authentication handshake.
    pub screen_port: u16,
    /// Input replay (client → host).
    pub input_port: u16,
    /// Chat + control signaling.
    pub chat_port: u16,
    /// Audio blocks, both directions (each side listens on its own).
    pub audio_port: u16,
    /// Legacy webcam port, reserved (superseded by the video channel).
    pub webcam_port: u16,
    /// Host-initiated video stream.
    pub video_host_port: u16,
    /// Client-announced video stream (rendezvous via chat control message).
    pub video_client_port: u16,
    /// Target capture resolution, for `ScreenSource` implementations to
    /// downsize to before JPEG encoding.  The session loops themselves
    /// treat frames as opaque and never read these.
    pub screen_width: u32,
    pub screen_height: u32,
    /// Target video frame rate (sleep-paced sender).
    pub video_fps: u32,
    /// PCM block size in samples, mono f32 at `audio_sample_rate`.
    pub audio_block_size: usize,
    pub audio_sample_rate: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            bind_ip: "0.0.0.0".to_owned(),
            screen_port: 7000,
            input_port: 6969,
            chat_port: 7001,
            audio_port: 7003,
            webcam_port: 7002,
            video_host_port: 9000,
            video_client_port: 9001,
            screen_width: 1800,
            screen_height: 900,
            video_fps: 20,
            audio_block_size: 1024,
            audio_sample_rate: 44_100,
        }
    }
}

impl SessionConfig {
    /// Shift every channel port by a fixed offset from `base` — lets
    /// parallel test sessions coexist on one machine.
    pub fn with_base_port(base: u16) -> Self {
        Self {
            bind_ip: "127.0.0.1".to_owned(),
            screen_port: base,
            input_port: base + 1,
            chat_port: base + 2,
            webcam_port: base + 3,
            audio_port: base + 4,
            video_host_port: base + 5,
            video_client_port: base + 6,
            ..Self::default()
        }
    }

    /// Interval between video frames at the configured rate.
    pub fn video_frame_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(1_000 / self.video_fps.max(1) as u64)
    }

    /// Interval between audio blocks at the configured rate.
    pub fn audio_block_interval(&self) -> std::time::Duration {
        let us = self.audio_block_size as u64 * 1_000_000 / self.audio_sample_rate.max(1) as u64;
        std::time::Duration::from_micros(us)
    }
}
