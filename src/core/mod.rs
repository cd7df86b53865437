pub mod capture;
pub mod codec;
pub mod playback;
pub mod realtime;

// Re-export commonly used types for convenience
pub use capture::{
    AudioFrame, AudioSource, CaptureError, CaptureOptions, CaptureResult, MicrophoneCapture,
    list_input_devices,
};

pub use codec::{CodecError, CodecResult, DecodedAudio, encode_frame, wrap_as_container};

pub use playback::{
    AudioOutput, ChunkDecoder, PlaybackError, PlaybackQueue, PlaybackState, SpeakerOutput,
    WavDecoder,
};

pub use realtime::{
    CredentialError, CredentialProvider, ErrorCallback, HttpCredentialProvider, MessageCallback,
    RealtimeEnvelope, RealtimeVoice, SessionController, SessionError, SessionResult,
    SessionSettings, SessionState,
};
