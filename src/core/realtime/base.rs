//! Base types for realtime voice sessions.
//!
//! Errors, the session state machine and the callback signatures shared by
//! the controller and its connection task.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use thiserror::Error;
use tokio::sync::watch;

use super::credential::CredentialError;
use super::openai::RealtimeEnvelope;
use crate::core::capture::CaptureError;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during a realtime session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Microphone could not be acquired
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    /// Credential fetch failed
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    /// WebSocket handshake failed
    #[error("Channel open failed: {0}")]
    ChannelOpen(String),

    /// Transport failure on an open channel
    #[error("Channel error: {0}")]
    Channel(String),

    /// Operation timed out
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// `init` was called on a controller that already left `Uninitialized`
    #[error("Session already started (state: {0})")]
    AlreadyStarted(SessionState),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

// =============================================================================
// Session State
// =============================================================================

/// Lifecycle of a session controller.
///
/// `Closed` and `Errored` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SessionState {
    #[default]
    Uninitialized = 0,
    /// Fetching a credential and opening the channel
    Connecting = 1,
    /// `session.created` received, `session.update` sent
    Configuring = 2,
    /// `session.updated` received; audio flows
    Active = 3,
    Closed = 4,
    Errored = 5,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Uninitialized,
            1 => Self::Connecting,
            2 => Self::Configuring,
            3 => Self::Active,
            4 => Self::Closed,
            _ => Self::Errored,
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Errored)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Connecting => "connecting",
            Self::Configuring => "configuring",
            Self::Active => "active",
            Self::Closed => "closed",
            Self::Errored => "errored",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single owner of the session state.
///
/// Writes are serialized through the watch channel's lock so subscribers see
/// transitions in order; the atomic mirror gives lock-free reads on the
/// capture thread.
#[derive(Debug)]
pub(crate) struct StateCell {
    value: AtomicU8,
    tx: watch::Sender<SessionState>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::Uninitialized);
        Self {
            value: AtomicU8::new(SessionState::Uninitialized as u8),
            tx,
        }
    }

    #[inline]
    pub(crate) fn get(&self) -> SessionState {
        SessionState::from_u8(self.value.load(Ordering::SeqCst))
    }

    /// Move `from -> to`. Returns false if the current state is not `from`.
    pub(crate) fn transition(&self, from: SessionState, to: SessionState) -> bool {
        self.tx.send_if_modified(|current| {
            if *current != from {
                return false;
            }
            *current = to;
            self.value.store(to as u8, Ordering::SeqCst);
            true
        })
    }

    /// Move into terminal state `to` unless already terminal.
    pub(crate) fn finish(&self, to: SessionState) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_terminal() {
                return false;
            }
            *current = to;
            self.value.store(to as u8, Ordering::SeqCst);
            true
        })
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }
}

// =============================================================================
// Callback Types
// =============================================================================

/// Receives every inbound event.
pub type MessageCallback =
    Arc<dyn Fn(RealtimeEnvelope) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Receives fatal mid-session errors. Fires at most once per controller.
pub type ErrorCallback =
    Arc<dyn Fn(String) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

// =============================================================================
// Tests
// =============================================================================
