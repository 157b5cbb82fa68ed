//! Input replay events.
//!
//! Serialised as JSON and sent encrypted over the input channel on every
//! UI input callback (not polled).  Every field is optional — a message
//! carries only the deltas the callback produced.
//!
//! The receiving host never evaluates payload text; events go through this
//! explicit serde codec and nothing else.

use serde::{Deserialize, Serialize};

// MARK: - InputEvent

/// One input delta from the client.  Mouse coordinates are normalised to
/// `[0.0, 1.0]` and scaled by the host's real resolution on injection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputEvent {
    /// Normalised cursor position, `[x, y]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mouse_pos: Option<[f64; 2]>,

    /// Button index pressed this event: 0 = left, 1 = middle, 2 = right.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mouse_down: Option<u8>,

    /// Button index released this event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mouse_up: Option<u8>,

    /// Key code pressed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keydown: Option<u32>,

    /// Key code released.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyup: Option<u32>,

    /// Raw wheel delta from the UI event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wheel: Option<f64>,
}

impl InputEvent {
    pub fn mouse_move(x: f64, y: f64) -> Self {
        Self { mouse_pos: Some([x, y]), ..Self::default() }
    }

    pub fn mouse_down(x: f64, y: f64, button: u8) -> Self {
        Self { mouse_pos: Some([x, y]), mouse_down: Some(button), ..Self::default() }
    }

    pub fn mouse_up(x: f64, y: f64, button: u8) -> Self {
        Self { mouse_pos: Some([x, y]), mouse_up: Some(button), ..Self::default() }
    }

    pub fn key_down(code: u32) -> Self {
        Self { keydown: Some(code), ..Self::default() }
    }

    pub fn key_up(code: u32) -> Self {
        Self { keyup: Some(code), ..Self::default() }
    }

    pub fn wheel(delta: f64) -> Self {
        Self { wheel: Some(delta), ..Self::default() }
    }
}

// MARK: - MouseButton

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

impl MouseButton {
    /// Wire button indices: 0 = left, 1 = middle, 2 = right.
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Left),
            1 => Some(Self::Middle),
            2 => Some(Self::Right),
            _ => None,
        }
    }
}

/// Wheel-delta → scroll-units conversion used on the injecting side.
///
/// Matches the legacy protocol: a delta of ±120 per notch maps to ∓1.5
/// scroll units (`-180 / delta`).  A zero delta scrolls nothing.
pub fn wheel_to_scroll_units(delta: f64) -> i32 {
    if delta == 0.0 {
        return 0;
    }
    (-180.0 / delta) as i32
}
