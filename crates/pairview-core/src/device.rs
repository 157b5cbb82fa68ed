//! Seams to the excluded device collaborators.
//!
//! The session core never touches capture or injection hardware directly;
//! it drives these traits.  Real implementations wrap the OS screen
//! grabber, uinput/SendInput, the audio stack, and the webcam; tests plug
//! in mocks.

use async_trait::async_trait;

use crate::errors::DeviceError;

// MARK: - ScreenSource

/// Produces screen frames already downsized to the session's target
/// resolution and JPEG-encoded (covers capture + encode in one call).
///
/// The screen channel has no queue: a slow peer throttles the next
/// `next_frame` call.
#[async_trait]
pub trait ScreenSource: Send {
    async fn next_frame(&mut self) -> Result<Vec<u8>, DeviceError>;
}

// MARK: - InputInjector

/// Drives the host's OS-level pointer and keyboard controllers.
pub trait InputInjector: Send {
    /// Host screen resolution used to scale normalised coordinates.
    fn screen_size(&self) -> (u32, u32);

    fn move_pointer(&mut self, x: f64, y: f64);
    fn press_button(&mut self, button: crate::input::MouseButton);
    fn release_button(&mut self, button: crate::input::MouseButton);
    fn scroll(&mut self, units: i32);
    fn press_key(&mut self, code: u32);
    fn release_key(&mut self, code: u32);
}

// MARK: - Audio

/// Produces fixed-size mono f32 PCM blocks from the microphone.
#[async_trait]
pub trait AudioSource: Send {
    async fn record_block(&mut self) -> Result<Vec<f32>, DeviceError>;
}

/// Plays PCM blocks as they arrive — no jitter buffer.
pub trait AudioSink: Send {
    fn play(&mut self, samples: &[f32]);
}

// MARK: - WebcamSource

/// Produces JPEG-encoded webcam frames.
#[async_trait]
pub trait WebcamSource: Send {
    async fn next_frame(&mut self) -> Result<Vec<u8>, DeviceError>;
}
