//! Channel engines and the session lifecycle orchestrator.
//!
//! One spawned task per channel per direction, all observing one shared
//! stop signal; see [`SessionManager`] for the host/connect lifecycle.

pub mod audio;
pub mod chat;
pub mod engine;
pub mod input;
pub mod manager;
pub mod screen;
pub mod video;

pub use manager::{ClientDevices, HostDevices, Role, SessionManager};
pub use pairview_core::{InputEvent, SessionConfig, SessionEvent};
