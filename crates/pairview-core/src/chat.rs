//! Chat envelopes and the control-message sub-protocol.
//!
//! Every chat frame carries a [`ChatEnvelope`].  The `msg` field is either
//! user-visible text or a reserved control object; control payloads are
//! demultiplexed by the receiving chat loop and never reach the
//! chat-display event.

use serde::{Deserialize, Serialize};

// MARK: - ChatEnvelope

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEnvelope {
    /// Sender's view of the session peer address (legacy field, display only).
    pub ip: String,
    pub msg: ChatPayload,
}

impl ChatEnvelope {
    pub fn text(ip: impl Into<String>, msg: impl Into<String>) -> Self {
        Self { ip: ip.into(), msg: ChatPayload::Text(msg.into()) }
    }

    pub fn control(ip: impl Into<String>, control: ControlMessage) -> Self {
        Self { ip: ip.into(), msg: ChatPayload::Control(control) }
    }
}

// MARK: - ChatPayload

/// `msg` is either plain chat text or a nested control object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatPayload {
    Control(ControlMessage),
    Text(String),
}

// MARK: - ControlMessage

/// Tagged control messages piggybacked on the chat channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    /// The client announces the port its video sender is listening on so
    /// the host can dial back (there is no independent signaling channel).
    VideoPort { port: u16 },
}
