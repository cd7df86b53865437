//! Realtime WebSocket message types.
//!
//! All events are JSON objects discriminated by their `type` field.
//!
//! # Protocol Overview
//!
//! Client events (sent to server):
//! - session.update - Configure the session
//! - input_audio_buffer.append - Append microphone audio
//! - conversation.item.create - Add a typed user message
//! - response.create - Ask for a response
//!
//! Server events the controller acts on or surfaces:
//! - session.created / session.updated
//! - input_audio_buffer.speech_started / speech_stopped
//! - conversation.item.input_audio_transcription.completed
//! - response.audio_transcript.delta / done
//! - response.audio.delta / done
//! - response.done
//! - error
//!
//! Anything else parses as [`ServerEvent::Unknown`] and is still forwarded
//! through [`RealtimeEnvelope`] with its raw payload.

use base64::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Session Configuration
// =============================================================================

/// Payload of `session.update`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_format: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_format: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<InputAudioTranscription>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_detection: Option<TurnDetection>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_response_output_tokens: Option<MaxTokens>,
}

/// Maximum tokens configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaxTokens {
    Number(i32),
    /// The literal `"inf"`
    Infinite(String),
}

/// Input audio transcription configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputAudioTranscription {
    pub model: String,
}

/// Turn detection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnDetection {
    #[serde(rename = "server_vad")]
    ServerVad {
        #[serde(skip_serializing_if = "Option::is_none")]
        threshold: Option<f32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        prefix_padding_ms: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        silence_duration_ms: Option<u32>,
    },
    #[serde(rename = "none")]
    None {},
}

// =============================================================================
// Conversation Items
// =============================================================================

/// Conversation item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Item type (`message` for typed text)
    #[serde(rename = "type", default)]
    pub item_type: String,
    /// Role (user, assistant, system)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<ContentPart>>,
}

impl ConversationItem {
    /// A user message with a single `input_text` part.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            id: None,
            item_type: "message".to_string(),
            role: Some("user".to_string()),
            content: Some(vec![ContentPart {
                content_type: "input_text".to_string(),
                text: Some(text.into()),
                transcript: None,
            }]),
        }
    }
}

/// Content part within a conversation item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPart {
    /// Content type (input_text, input_audio, text, audio)
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
}

// =============================================================================
// Client Events (sent to server)
// =============================================================================

/// Events sent to the realtime service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },

    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend {
        /// Base64-encoded pcm16 audio
        audio: String,
    },

    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ConversationItem },

    #[serde(rename = "response.create")]
    ResponseCreate,
}

impl ClientEvent {
    /// Wrap an already-encoded audio frame.
    pub fn audio_append(encoded: String) -> Self {
        ClientEvent::InputAudioBufferAppend { audio: encoded }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        ClientEvent::ConversationItemCreate {
            item: ConversationItem::user_text(text),
        }
    }

    /// Wire tag of this event.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SessionUpdate { .. } => "session.update",
            Self::InputAudioBufferAppend { .. } => "input_audio_buffer.append",
            Self::ConversationItemCreate { .. } => "conversation.item.create",
            Self::ResponseCreate => "response.create",
        }
    }
}

// =============================================================================
// Server Events (received from server)
// =============================================================================

/// Events received from the realtime service.
///
/// Fields are lenient: missing identifiers default to empty so that sparse
/// events still dispatch.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        error: ApiError,
    },

    #[serde(rename = "session.created")]
    SessionCreated { session: Option<SessionInfo> },

    #[serde(rename = "session.updated")]
    SessionUpdated { session: Option<SessionInfo> },

    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted {
        audio_start_ms: Option<u64>,
        item_id: Option<String>,
    },

    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped {
        audio_end_ms: Option<u64>,
        item_id: Option<String>,
    },

    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    TranscriptionCompleted {
        item_id: Option<String>,
        #[serde(default)]
        transcript: String,
    },

    #[serde(rename = "response.audio_transcript.delta")]
    AudioTranscriptDelta {
        response_id: Option<String>,
        item_id: Option<String>,
        #[serde(default)]
        delta: String,
    },

    #[serde(rename = "response.audio_transcript.done")]
    AudioTranscriptDone {
        response_id: Option<String>,
        item_id: Option<String>,
        #[serde(default)]
        transcript: String,
    },

    #[serde(rename = "response.audio.delta")]
    AudioDelta {
        response_id: Option<String>,
        item_id: Option<String>,
        /// Base64-encoded pcm16 audio
        #[serde(default)]
        delta: String,
    },

    #[serde(rename = "response.audio.done")]
    AudioDone {
        response_id: Option<String>,
        item_id: Option<String>,
    },

    #[serde(rename = "response.done")]
    ResponseDone { response: Option<ResponseInfo> },

    /// Any other event type
    #[serde(other)]
    Unknown,
}

impl ServerEvent {
    /// Decode base64 audio from an AudioDelta event.
    pub fn decode_audio_delta(delta: &str) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64_STANDARD.decode(delta)
    }
}

// =============================================================================
// Supporting Types
// =============================================================================

/// Error details carried by an `error` event.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ApiError {
    #[serde(rename = "type", default)]
    pub error_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
}

/// Session information from `session.created` / `session.updated`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SessionInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub voice: Option<String>,
}

/// Response summary from `response.done`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResponseInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
}

// =============================================================================
// Envelope
// =============================================================================

/// A parsed server event together with its original JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeEnvelope {
    pub event: ServerEvent,
    pub raw: Value,
}

impl RealtimeEnvelope {
    /// Parse a text frame.
    ///
    /// Fails only when the frame is not a JSON object. A known tag with an
    /// unexpected shape degrades to [`ServerEvent::Unknown`].
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let raw: Value = serde_json::from_str(text)?;
        if !raw.is_object() {
            return Err(serde::de::Error::custom("realtime event is not a JSON object"));
        }
        let event = ServerEvent::deserialize(&raw).unwrap_or(ServerEvent::Unknown);
        Ok(Self { event, raw })
    }

    /// The `type` tag of the raw payload.
    pub fn event_type(&self) -> &str {
        self.raw.get("type").and_then(Value::as_str).unwrap_or("")
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_text_serialization() {
        let json = serde_json::to_value(ClientEvent::user_text("hello")).unwrap();
        assert_eq!(json["type"], "conversation.item.create");
        assert_eq!(json["item"]["type"], "message");
        assert_eq!(json["item"]["role"], "user");
        assert_eq!(json["item"]["content"][0]["type"], "input_text");
        assert_eq!(json["item"]["content"][0]["text"], "hello");
    }

    #[test]
    fn test_response_create_serialization() {
        let json = serde_json::to_string(&ClientEvent::ResponseCreate).unwrap();
        assert_eq!(json, r#"{"type":"response.create"}"#);
    }

    #[test]
    fn test_audio_append_serialization() {
        let event = ClientEvent::audio_append("AAAA".to_string());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "input_audio_buffer.append");
        assert_eq!(json["audio"], "AAAA");
        assert_eq!(event.event_type(), "input_audio_buffer.append");
    }

    #[test]
    fn test_parse_sparse_session_created() {
        let envelope = RealtimeEnvelope::parse(r#"{"type":"session.created"}"#).unwrap();
        assert_eq!(envelope.event, ServerEvent::SessionCreated { session: None });
        assert_eq!(envelope.event_type(), "session.created");
    }

    #[test]
    fn test_parse_session_created_with_id() {
        let envelope = RealtimeEnvelope::parse(
            r#"{"type":"session.created","session":{"id":"sess_1","model":"m"}}"#,
        )
        .unwrap();
        match envelope.event {
            ServerEvent::SessionCreated { session: Some(info) } => assert_eq!(info.id, "sess_1"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_parse_audio_delta() {
        let envelope = RealtimeEnvelope::parse(
            r#"{"type":"response.audio.delta","response_id":"r","item_id":"i","output_index":0,"content_index":0,"delta":"AAA="}"#,
        )
        .unwrap();
        match envelope.event {
            ServerEvent::AudioDelta { delta, .. } => {
                assert_eq!(ServerEvent::decode_audio_delta(&delta).unwrap(), vec![0, 0]);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_unknown_event_keeps_raw_payload() {
        let envelope =
            RealtimeEnvelope::parse(r#"{"type":"rate_limits.updated","rate_limits":[]}"#).unwrap();
        assert_eq!(envelope.event, ServerEvent::Unknown);
        assert_eq!(envelope.event_type(), "rate_limits.updated");
        assert!(envelope.raw["rate_limits"].is_array());
    }

    #[test]
    fn test_malformed_known_event_degrades_to_unknown() {
        let envelope =
            RealtimeEnvelope::parse(r#"{"type":"response.audio.delta","delta":42}"#).unwrap();
        assert_eq!(envelope.event, ServerEvent::Unknown);
    }

    #[test]
    fn test_parse_rejects_non_objects() {
        assert!(RealtimeEnvelope::parse("not json").is_err());
        assert!(RealtimeEnvelope::parse("[1,2]").is_err());
    }

    #[test]
    fn test_parse_error_event() {
        let envelope = RealtimeEnvelope::parse(
            r#"{"type":"error","error":{"type":"invalid_request_error","message":"bad"}}"#,
        )
        .unwrap();
        match envelope.event {
            ServerEvent::Error { error } => {
                assert_eq!(error.error_type, "invalid_request_error");
                assert_eq!(error.message, "bad");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
