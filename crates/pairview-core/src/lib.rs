pub mod chat;
pub mod config;
pub mod device;
pub mod errors;
pub mod event;
pub mod input;

pub use chat::{ChatEnvelope, ChatPayload, ControlMessage};
pub use config::{ChannelDirection, ChannelKind, SessionConfig};
pub use errors::{
    AuthenticationError, ConnectionError, DeviceError, PairViewError, ProtocolError,
};
pub use event::SessionEvent;
pub use input::{InputEvent, MouseButton};
