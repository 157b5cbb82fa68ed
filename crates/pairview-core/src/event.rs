//! Events surfaced to the presentation layer.
//!
//! The core pushes these over an `mpsc` channel; the excluded UI shell
//! polls or awaits them (the callback seam of the protocol).

use bytes::Bytes;

use crate::config::ChannelKind;

#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// One decoded screen frame (JPEG bytes).
    ScreenFrame(Bytes),
    /// One decoded video frame (JPEG bytes).
    VideoFrame(Bytes),
    /// User-visible chat text (control payloads never appear here).
    ChatMessage(String),
    /// A peer connected to one of the host's channel listeners.
    PeerConnected { channel: ChannelKind, addr: std::net::SocketAddr },
    /// A channel's peer went away; the host keeps listening for a new one.
    PeerDisconnected { channel: ChannelKind },
}
