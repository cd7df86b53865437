//! Mock providers for integration tests
//!
//! - `realtime_mock`: WebSocket server playing the realtime service
//! - `fake_audio`: test-driven microphone and a recording audio output
//!
//! Plus small helpers shared by the test files.

// Each test binary uses a different subset of these helpers
#![allow(dead_code)]

pub mod fake_audio;
pub mod realtime_mock;

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use voice_session::core::realtime::{CredentialError, CredentialProvider, EphemeralCredential};

/// Poll `condition` every 10ms until it holds or `timeout` elapses.
pub async fn wait_for<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Credential provider with a scripted outcome
pub struct StaticCredentials {
    outcome: Result<String, fn() -> CredentialError>,
    delay: Duration,
    pub calls: AtomicUsize,
    pub last_request: parking_lot::Mutex<Option<(Option<String>, String)>>,
}

impl StaticCredentials {
    pub fn token(token: &str) -> Arc<Self> {
        Arc::new(Self {
            outcome: Ok(token.to_string()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            last_request: parking_lot::Mutex::new(None),
        })
    }

    pub fn failing(error: fn() -> CredentialError) -> Arc<Self> {
        Arc::new(Self {
            outcome: Err(error),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            last_request: parking_lot::Mutex::new(None),
        })
    }

    /// Succeeds, but only after `delay`
    pub fn slow(token: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            outcome: Ok(token.to_string()),
            delay,
            calls: AtomicUsize::new(0),
            last_request: parking_lot::Mutex::new(None),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn fetch(
        &self,
        instructions: Option<&str>,
        voice: &str,
    ) -> Result<EphemeralCredential, CredentialError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock() = Some((instructions.map(str::to_string), voice.to_string()));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.outcome {
            Ok(token) => Ok(EphemeralCredential::new(token.clone())),
            Err(make_error) => Err(make_error()),
        }
    }
}
