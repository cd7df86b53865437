//! Microphone capture pipeline.
//!
//! An [`AudioSource`] acquires an input device and delivers fixed-size mono
//! frames at the wire sample rate to a single callback until stopped. The
//! production implementation is [`MicrophoneCapture`] (cpal); tests plug in
//! their own sources through the same trait.
//!
//! # Frame format
//!
//! - 4096 samples per frame
//! - 24kHz, mono, f32 in [-1, 1]
//! - Delivered in capture order

mod framer;
mod microphone;

use std::sync::Arc;

use thiserror::Error;

pub use framer::FrameAssembler;
pub use microphone::{MicrophoneCapture, list_input_devices};

/// Capture sample rate (matches the wire format).
pub const CAPTURE_SAMPLE_RATE: u32 = 24000;

/// Samples per emitted frame.
pub const CAPTURE_FRAME_SIZE: usize = 4096;

// =============================================================================
// Error Types
// =============================================================================

/// Errors raised while acquiring or running a capture device.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// No input device is present (or the requested one is missing)
    #[error("No audio input device available")]
    NoDevice,

    /// Permission denied or the device could not be opened
    #[error("Audio input device access failed: {0}")]
    DeviceAccess(String),
}

/// Result type for capture operations.
pub type CaptureResult<T> = Result<T, CaptureError>;

// =============================================================================
// Frames and Options
// =============================================================================

/// One block of captured audio.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    /// Mono samples at [`CAPTURE_SAMPLE_RATE`]
    pub samples: Vec<f32>,
    /// Monotonic frame counter, starting at 0 for each capture run
    pub sequence: u64,
}

/// Device selection and processing flags for a capture run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOptions {
    /// Input device name; `None` selects the host default
    pub device_name: Option<String>,
    /// Request acoustic echo cancellation
    pub echo_cancellation: bool,
    /// Request noise suppression
    pub noise_suppression: bool,
    /// Request automatic gain control
    pub auto_gain_control: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            device_name: None,
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

// =============================================================================
// Callback Types
// =============================================================================

/// Receives each captured frame. Invoked on the capture thread.
pub type FrameCallback = Arc<dyn Fn(AudioFrame) + Send + Sync>;

/// Receives runtime stream failures after a successful start.
pub type CaptureErrorCallback = Arc<dyn Fn(CaptureError) + Send + Sync>;

// =============================================================================
// Base Trait
// =============================================================================

/// A source of microphone frames.
///
/// `start` blocks until the device is acquired (or fails); call it from a
/// blocking context. `stop` is idempotent and safe when never started.
pub trait AudioSource: Send + Sync {
    /// Acquire the device and begin delivering frames.
    fn start(&self, on_frame: FrameCallback, on_error: CaptureErrorCallback) -> CaptureResult<()>;

    /// Stop delivery and release the device.
    fn stop(&self);

    /// Whether frames are currently being delivered.
    fn is_capturing(&self) -> bool;
}
