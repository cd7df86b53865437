//! Realtime voice sessions.
//!
//! A [`SessionController`] connects the microphone and speaker to a realtime
//! speech model over one WebSocket channel:
//!
//! - fetches an ephemeral credential from a trusted backend
//! - opens the channel and completes the session handshake
//! - streams microphone frames once the session is configured
//! - plays inbound audio deltas in order and forwards every event
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use voice_session::config::VoiceConfig;
//! use voice_session::core::realtime::SessionController;
//!
//! let config = VoiceConfig::from_env()?;
//! let controller = SessionController::from_config(
//!     &config,
//!     Arc::new(|envelope| Box::pin(async move {
//!         println!("{}", envelope.event_type());
//!     })),
//!     Arc::new(|error| Box::pin(async move {
//!         eprintln!("session failed: {error}");
//!     })),
//! );
//!
//! controller.init(Some("Be terse.".into()), Some("verse".into())).await?;
//! controller.send_text("Hello!");
//! controller.disconnect().await;
//! ```

mod base;
mod channel;
mod credential;
pub mod openai;
mod session;

pub use base::{ErrorCallback, MessageCallback, SessionError, SessionResult, SessionState};
pub use channel::{RealtimeStream, WS_CHANNEL_CAPACITY, open_channel, realtime_url};
pub use credential::{
    CredentialError, CredentialProvider, EphemeralCredential, HttpCredentialProvider,
};
pub use openai::{
    ClientEvent, DEFAULT_INSTRUCTIONS, RealtimeEnvelope, RealtimeVoice, ServerEvent,
    SessionSettings,
};
pub use session::SessionController;
