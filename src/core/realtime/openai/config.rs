//! Realtime protocol constants and session settings.
//!
//! This module contains:
//! - Endpoint and model defaults
//! - Voice selection
//! - `SessionSettings`, which renders the `session.update` payload

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::messages::{InputAudioTranscription, MaxTokens, SessionConfig, TurnDetection};

/// Realtime WebSocket endpoint.
pub const REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";

/// Default realtime model.
pub const DEFAULT_REALTIME_MODEL: &str = "gpt-4o-realtime-preview-2024-12-17";

/// Wire sample rate for pcm16 audio.
pub const REALTIME_SAMPLE_RATE: u32 = 24000;

/// Persona used when the caller supplies none.
pub const DEFAULT_INSTRUCTIONS: &str = "You are a helpful, friendly voice assistant. \
Keep answers short and conversational.";

/// Input transcription model.
pub const TRANSCRIPTION_MODEL: &str = "whisper-1";

/// Audio format used in both directions.
pub const AUDIO_FORMAT_PCM16: &str = "pcm16";

/// Default bound for credential fetch and channel open.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// Voices
// =============================================================================

/// Voices accepted by the realtime service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RealtimeVoice {
    #[default]
    Alloy,
    Ash,
    Ballad,
    Coral,
    Echo,
    Sage,
    Shimmer,
    Verse,
}

impl RealtimeVoice {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alloy => "alloy",
            Self::Ash => "ash",
            Self::Ballad => "ballad",
            Self::Coral => "coral",
            Self::Echo => "echo",
            Self::Sage => "sage",
            Self::Shimmer => "shimmer",
            Self::Verse => "verse",
        }
    }

    /// Parse a voice name; unknown names fall back to [`RealtimeVoice::Alloy`].
    pub fn from_str_or_default(s: &str) -> Self {
        s.parse().unwrap_or_else(|_| {
            warn!(voice = %s, "Unknown voice, falling back to alloy");
            Self::default()
        })
    }

    pub fn all() -> &'static [RealtimeVoice] {
        &[
            Self::Alloy,
            Self::Ash,
            Self::Ballad,
            Self::Coral,
            Self::Echo,
            Self::Sage,
            Self::Shimmer,
            Self::Verse,
        ]
    }
}

impl FromStr for RealtimeVoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|voice| voice.as_str() == wanted)
            .ok_or_else(|| format!("unknown voice '{s}'"))
    }
}

impl std::fmt::Display for RealtimeVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Turn Detection
// =============================================================================

/// Server-side voice activity detection tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VadSettings {
    pub threshold: f32,
    pub prefix_padding_ms: u32,
    pub silence_duration_ms: u32,
}

impl Default for VadSettings {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            prefix_padding_ms: 300,
            silence_duration_ms: 1000,
        }
    }
}

// =============================================================================
// Session Settings
// =============================================================================

/// Everything a controller needs to open and configure a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    /// Base WebSocket URL; the model is appended as a query parameter
    pub realtime_url: String,
    pub model: String,
    /// Voice used when `init` is given none
    pub default_voice: RealtimeVoice,
    /// Persona used when `init` is given none
    pub default_instructions: Option<String>,
    pub vad: VadSettings,
    pub temperature: f32,
    /// Bound applied separately to credential fetch and channel open
    pub connect_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            realtime_url: REALTIME_URL.to_string(),
            model: DEFAULT_REALTIME_MODEL.to_string(),
            default_voice: RealtimeVoice::default(),
            default_instructions: None,
            vad: VadSettings::default(),
            temperature: 0.8,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl SessionSettings {
    /// Resolve the voice for a session, preferring the caller's choice.
    pub fn resolve_voice(&self, requested: Option<&str>) -> RealtimeVoice {
        requested
            .map(RealtimeVoice::from_str_or_default)
            .unwrap_or(self.default_voice)
    }

    /// Resolve the persona for a session, preferring the caller's choice.
    pub fn resolve_instructions(&self, requested: Option<String>) -> String {
        requested
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.default_instructions.clone())
            .unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string())
    }

    /// Build the `session.update` payload.
    pub fn session_config(&self, instructions: &str, voice: RealtimeVoice) -> SessionConfig {
        SessionConfig {
            modalities: Some(vec!["text".to_string(), "audio".to_string()]),
            instructions: Some(instructions.to_string()),
            voice: Some(voice.as_str().to_string()),
            input_audio_format: Some(AUDIO_FORMAT_PCM16.to_string()),
            output_audio_format: Some(AUDIO_FORMAT_PCM16.to_string()),
            input_audio_transcription: Some(InputAudioTranscription {
                model: TRANSCRIPTION_MODEL.to_string(),
            }),
            turn_detection: Some(TurnDetection::ServerVad {
                threshold: Some(self.vad.threshold),
                prefix_padding_ms: Some(self.vad.prefix_padding_ms),
                silence_duration_ms: Some(self.vad.silence_duration_ms),
            }),
            temperature: Some(self.temperature),
            max_response_output_tokens: Some(MaxTokens::Infinite("inf".to_string())),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
