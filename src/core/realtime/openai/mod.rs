//! Realtime protocol definitions.
//!
//! # Audio Format
//!
//! - Input: PCM 16-bit signed little-endian, 24kHz, mono, base64 in JSON
//! - Output: same format, delivered as `response.audio.delta` events
//!
//! # Session handshake
//!
//! 1. Server sends `session.created`
//! 2. Client replies with `session.update`
//! 3. Server acknowledges with `session.updated`; audio may flow from here on

mod config;
mod messages;

pub use config::{
    AUDIO_FORMAT_PCM16, DEFAULT_CONNECT_TIMEOUT, DEFAULT_INSTRUCTIONS, DEFAULT_REALTIME_MODEL,
    REALTIME_SAMPLE_RATE, REALTIME_URL, RealtimeVoice, SessionSettings, TRANSCRIPTION_MODEL,
    VadSettings,
};
pub use messages::{
    ApiError, ClientEvent, ContentPart, ConversationItem, InputAudioTranscription, MaxTokens,
    RealtimeEnvelope, ResponseInfo, ServerEvent, SessionConfig, SessionInfo, TurnDetection,
};
