//! Wire and container transforms for realtime audio.
//!
//! The realtime channel carries audio as base64-encoded PCM 16-bit signed
//! little-endian mono at 24kHz. Inbound chunks are wrapped in a minimal WAV
//! container before they are handed to a decoder for playback.
//!
//! Everything in this module is a pure function; there is no shared state.

mod container;
mod resample;
mod wire;

use thiserror::Error;

pub use container::{
    CONTAINER_HEADER_LEN, DecodedAudio, container_header, decode_container, wrap_as_container,
};
pub use resample::{LinearResampler, resample_linear};
pub use wire::{
    ENCODE_WINDOW_BYTES, decode_frame, encode_frame, pcm16_samples, pcm16_to_f32, sample_to_pcm16,
};

/// Sample rate of every PCM payload exchanged with the realtime service.
pub const WIRE_SAMPLE_RATE: u32 = 24000;

/// Channel count of wire audio.
pub const WIRE_CHANNELS: u16 = 1;

/// Bit depth of wire audio.
pub const WIRE_BITS_PER_SAMPLE: u16 = 16;

/// Errors produced while decoding audio payloads.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Base64 payload could not be decoded
    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Container could not be parsed
    #[error("Decode failed: {0}")]
    Decode(String),
}

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
