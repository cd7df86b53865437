//! Session controller.
//!
//! Owns one realtime conversation: credential fetch, channel open, the
//! `session.created -> session.update -> session.updated` handshake,
//! microphone streaming, inbound audio playback and teardown.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized -> Connecting -> Configuring -> Active -> Closed
//!                      \             \            \
//!                       `-------------`------------`--> Errored
//! ```
//!
//! Microphone frames are sent only while the state is `Active`, the handshake
//! has completed and the channel is open. Frames captured earlier are
//! dropped, not buffered.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::base::{
    ErrorCallback, MessageCallback, SessionError, SessionResult, SessionState, StateCell,
};
use super::channel::{RealtimeStream, WS_CHANNEL_CAPACITY, open_channel, realtime_url};
use super::credential::{CredentialProvider, HttpCredentialProvider};
use super::openai::{ClientEvent, RealtimeEnvelope, RealtimeVoice, ServerEvent, SessionSettings};
use crate::config::VoiceConfig;
use crate::core::capture::{
    AudioFrame, AudioSource, CaptureError, CaptureErrorCallback, FrameCallback, MicrophoneCapture,
};
use crate::core::codec::encode_frame;
use crate::core::playback::{AudioOutput, PlaybackQueue, SpeakerOutput};

/// How long `disconnect` waits for the connection task before aborting it.
const CLOSE_GRACE_PERIOD: Duration = Duration::from_secs(2);

type RealtimeSink = SplitSink<RealtimeStream, Message>;

/// State shared between the controller, the connection task and the
/// capture thread.
struct SessionShared {
    state: StateCell,
    handshake_complete: AtomicBool,
    session_id: RwLock<Option<String>>,
    ws_sender: Mutex<Option<mpsc::Sender<ClientEvent>>>,
    shutdown: CancellationToken,
    error_callback: ErrorCallback,
    error_reported: AtomicBool,
}

impl SessionShared {
    fn audio_gate_open(&self) -> bool {
        self.state.get() == SessionState::Active
            && self.handshake_complete.load(Ordering::SeqCst)
            && self.ws_sender.lock().is_some()
    }

    /// Queue an outbound event without blocking.
    fn try_send(&self, event: ClientEvent) -> bool {
        let guard = self.ws_sender.lock();
        let Some(tx) = guard.as_ref() else {
            return false;
        };
        match tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(
                    event_type = event.event_type(),
                    "Outbound queue full, dropping event"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Mark the session errored and notify the caller once.
    async fn fail(&self, message: String) {
        if !self.state.finish(SessionState::Errored) {
            debug!(error = %message, "Ignoring failure on finished session");
            return;
        }
        error!(error = %message, "Realtime session failed");
        if !self.error_reported.swap(true, Ordering::SeqCst) {
            (self.error_callback)(message).await;
        }
    }
}

fn frame_callback(shared: Arc<SessionShared>) -> FrameCallback {
    Arc::new(move |frame: AudioFrame| {
        if !shared.audio_gate_open() {
            return;
        }
        let event = ClientEvent::audio_append(encode_frame(&frame.samples));
        if !shared.try_send(event) {
            trace!(sequence = frame.sequence, "Audio frame not sent");
        }
    })
}

fn capture_error_callback(shared: Arc<SessionShared>, runtime: Handle) -> CaptureErrorCallback {
    Arc::new(move |err: CaptureError| {
        let shared = shared.clone();
        runtime.spawn(async move {
            shared.fail(format!("microphone stream failed: {err}")).await;
            shared.shutdown.cancel();
        });
    })
}

/// Reader/writer loop for one open channel.
struct ConnectionTask {
    shared: Arc<SessionShared>,
    playback: PlaybackQueue,
    microphone: Arc<dyn AudioSource>,
    on_message: MessageCallback,
    /// Pre-serialized `session.update`
    session_update: String,
}

impl ConnectionTask {
    async fn run(self, ws: RealtimeStream, mut outbound: mpsc::Receiver<ClientEvent>) {
        let (mut sink, mut stream) = ws.split();

        loop {
            tokio::select! {
                biased;

                _ = self.shared.shutdown.cancelled() => {
                    // The peer may already be gone.
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }

                Some(event) = outbound.recv() => {
                    let json = match serde_json::to_string(&event) {
                        Ok(json) => json,
                        Err(e) => {
                            error!(error = %e, "Failed to serialize event");
                            continue;
                        }
                    };
                    if let Err(e) = sink.send(Message::Text(json.into())).await {
                        self.shared
                            .fail(format!("failed to send {}: {e}", event.event_type()))
                            .await;
                        break;
                    }
                }

                msg = stream.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        let envelope = match RealtimeEnvelope::parse(&text) {
                            Ok(envelope) => envelope,
                            Err(e) => {
                                warn!(error = %e, "Failed to parse server event");
                                continue;
                            }
                        };
                        if let Err(e) = self.dispatch(&envelope, &mut sink).await {
                            self.shared.fail(format!("failed to send session.update: {e}")).await;
                            break;
                        }
                        (self.on_message)(envelope).await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = sink.send(Message::Pong(data)).await {
                            error!(error = %e, "Failed to send pong");
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!(frame = ?frame, "Realtime channel closed by server");
                        self.shared.state.finish(SessionState::Closed);
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        self.shared.fail(format!("channel error: {e}")).await;
                        break;
                    }
                    None => {
                        info!("Realtime channel ended");
                        self.shared.state.finish(SessionState::Closed);
                        break;
                    }
                },
            }
        }

        self.shared.ws_sender.lock().take();
        self.shared.handshake_complete.store(false, Ordering::SeqCst);

        if !self.shared.shutdown.is_cancelled() {
            // Ended from the remote side; drop queued audio and release the
            // microphone.
            self.playback.clear();
            let microphone = self.microphone.clone();
            if let Err(e) = tokio::task::spawn_blocking(move || microphone.stop()).await {
                warn!(error = %e, "Failed to stop microphone");
            }
        }

        info!(state = %self.shared.state.get(), "Realtime connection task ended");
    }

    /// Act on an inbound event before it is forwarded to the caller.
    async fn dispatch(
        &self,
        envelope: &RealtimeEnvelope,
        sink: &mut RealtimeSink,
    ) -> Result<(), tungstenite::Error> {
        match &envelope.event {
            ServerEvent::SessionCreated { session } => {
                let id = session
                    .as_ref()
                    .map(|s| s.id.clone())
                    .filter(|id| !id.is_empty());
                if let Some(id) = &id {
                    *self.shared.session_id.write() = Some(id.clone());
                }

                if self
                    .shared
                    .state
                    .transition(SessionState::Connecting, SessionState::Configuring)
                {
                    sink.send(Message::Text(self.session_update.clone().into()))
                        .await?;
                    info!(
                        session_id = id.as_deref().unwrap_or("unknown"),
                        "Session created, configuration sent"
                    );
                } else {
                    debug!(state = %self.shared.state.get(), "Ignoring repeated session.created");
                }
            }
            ServerEvent::SessionUpdated { .. } => {
                if self
                    .shared
                    .state
                    .transition(SessionState::Configuring, SessionState::Active)
                {
                    self.shared.handshake_complete.store(true, Ordering::SeqCst);
                    info!("Session configured, streaming microphone audio");
                } else {
                    debug!("Session settings updated");
                }
            }
            ServerEvent::AudioDelta { delta, .. } => {
                match ServerEvent::decode_audio_delta(delta) {
                    Ok(bytes) => {
                        debug!(bytes = bytes.len(), "Queued assistant audio");
                        self.playback.enqueue(Bytes::from(bytes));
                    }
                    Err(e) => warn!(error = %e, "Failed to decode audio delta"),
                }
            }
            ServerEvent::Error { error } => {
                error!(
                    error_type = %error.error_type,
                    code = ?error.code,
                    message = %error.message,
                    "Realtime service reported an error"
                );
            }
            ServerEvent::SpeechStarted { audio_start_ms, .. } => {
                debug!(audio_start_ms = ?audio_start_ms, "User speech started");
            }
            ServerEvent::SpeechStopped { audio_end_ms, .. } => {
                debug!(audio_end_ms = ?audio_end_ms, "User speech stopped");
            }
            ServerEvent::TranscriptionCompleted { transcript, .. } => {
                debug!(transcript = %transcript, "User transcript");
            }
            ServerEvent::AudioTranscriptDone { transcript, .. } => {
                debug!(transcript = %transcript, "Assistant transcript");
            }
            ServerEvent::ResponseDone { response } => {
                debug!(
                    response_id = response.as_ref().map(|r| r.id.as_str()).unwrap_or(""),
                    "Response done"
                );
            }
            ServerEvent::Unknown => {
                trace!(event_type = envelope.event_type(), "Unhandled realtime event");
            }
            ServerEvent::AudioTranscriptDelta { .. } | ServerEvent::AudioDone { .. } => {}
        }
        Ok(())
    }
}

/// Drives one realtime voice conversation.
///
/// A controller is single-use: once it reaches `Closed` or `Errored`, build a
/// new one to reconnect.
pub struct SessionController {
    settings: SessionSettings,
    credentials: Arc<dyn CredentialProvider>,
    microphone: Arc<dyn AudioSource>,
    playback: PlaybackQueue,
    on_message: MessageCallback,
    shared: Arc<SessionShared>,
    connection_handle: Mutex<Option<JoinHandle<()>>>,
}

impl SessionController {
    pub fn new(
        settings: SessionSettings,
        credentials: Arc<dyn CredentialProvider>,
        microphone: Arc<dyn AudioSource>,
        output: Arc<dyn AudioOutput>,
        on_message: MessageCallback,
        on_error: ErrorCallback,
    ) -> Self {
        Self {
            settings,
            credentials,
            microphone,
            playback: PlaybackQueue::with_output(output),
            on_message,
            shared: Arc::new(SessionShared {
                state: StateCell::new(),
                handshake_complete: AtomicBool::new(false),
                session_id: RwLock::new(None),
                ws_sender: Mutex::new(None),
                shutdown: CancellationToken::new(),
                error_callback: on_error,
                error_reported: AtomicBool::new(false),
            }),
            connection_handle: Mutex::new(None),
        }
    }

    /// Controller wired to the HTTP credential backend, the default
    /// microphone and the default speaker.
    pub fn from_config(
        config: &VoiceConfig,
        on_message: MessageCallback,
        on_error: ErrorCallback,
    ) -> Self {
        let credentials = Arc::new(HttpCredentialProvider::new(
            config.credential_url.clone(),
            config.backend_api_key.clone(),
        ));
        let microphone = Arc::new(MicrophoneCapture::new(config.capture_options()));
        let output = Arc::new(SpeakerOutput::default());

        Self::new(
            config.session_settings(),
            credentials,
            microphone,
            output,
            on_message,
            on_error,
        )
    }

    /// Start the session.
    ///
    /// Resolves once the channel is open and the microphone is running; the
    /// handshake completes in the background. Any failure leaves the
    /// controller `Errored` with everything released.
    pub async fn init(
        &self,
        instructions: Option<String>,
        voice: Option<String>,
    ) -> SessionResult<()> {
        if !self
            .shared
            .state
            .transition(SessionState::Uninitialized, SessionState::Connecting)
        {
            return Err(SessionError::AlreadyStarted(self.shared.state.get()));
        }

        let voice = self.settings.resolve_voice(voice.as_deref());
        let instructions = self.settings.resolve_instructions(instructions);
        info!(model = %self.settings.model, voice = %voice, "Starting realtime session");

        match self.connect(&instructions, voice).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.shared.state.finish(SessionState::Errored);
                error!(error = %e, "Failed to start realtime session");
                self.disconnect().await;
                Err(e)
            }
        }
    }

    async fn connect(&self, instructions: &str, voice: RealtimeVoice) -> SessionResult<()> {
        let timeout = self.settings.connect_timeout;
        let url = realtime_url(&self.settings.realtime_url, &self.settings.model)?;
        let session_update = serde_json::to_string(&ClientEvent::SessionUpdate {
            session: self.settings.session_config(instructions, voice),
        })
        .map_err(|e| SessionError::Serialization(e.to_string()))?;

        let credential = tokio::time::timeout(
            timeout,
            self.credentials.fetch(Some(instructions), voice.as_str()),
        )
        .await
        .map_err(|_| SessionError::Timeout(format!("credential fetch exceeded {timeout:?}")))??;

        let ws = tokio::time::timeout(timeout, open_channel(&url, &credential))
            .await
            .map_err(|_| SessionError::Timeout(format!("channel open exceeded {timeout:?}")))??;
        drop(credential);

        if self.shared.state.get() != SessionState::Connecting {
            return Err(SessionError::Channel(
                "session was closed while connecting".to_string(),
            ));
        }

        let (tx, rx) = mpsc::channel::<ClientEvent>(WS_CHANNEL_CAPACITY);
        *self.shared.ws_sender.lock() = Some(tx);

        let task = ConnectionTask {
            shared: self.shared.clone(),
            playback: self.playback.clone(),
            microphone: self.microphone.clone(),
            on_message: self.on_message.clone(),
            session_update,
        };
        let handle = tokio::spawn(task.run(ws, rx));
        *self.connection_handle.lock() = Some(handle);

        let microphone = self.microphone.clone();
        let on_frame = frame_callback(self.shared.clone());
        let on_error = capture_error_callback(self.shared.clone(), Handle::current());
        tokio::task::spawn_blocking(move || microphone.start(on_frame, on_error))
            .await
            .map_err(|e| SessionError::Capture(CaptureError::DeviceAccess(e.to_string())))??;

        // A disconnect or remote failure during start already stopped a mic
        // that was not yet running.
        if self.shared.shutdown.is_cancelled() || self.shared.state.get().is_terminal() {
            let microphone = self.microphone.clone();
            if let Err(e) = tokio::task::spawn_blocking(move || microphone.stop()).await {
                warn!(error = %e, "Failed to stop microphone");
            }
            return Err(SessionError::Channel(
                "session was closed while connecting".to_string(),
            ));
        }

        info!("Microphone running, waiting for session handshake");
        Ok(())
    }

    /// Send a typed user message and request a response.
    ///
    /// Dropped with a warning when the channel is not open.
    pub fn send_text(&self, text: &str) {
        if !self.is_open() {
            warn!("Channel not open, dropping text message");
            return;
        }
        if self.shared.try_send(ClientEvent::user_text(text)) {
            self.shared.try_send(ClientEvent::ResponseCreate);
            debug!(chars = text.chars().count(), "Sent text message");
        }
    }

    /// Stop capture, drop queued audio and close the channel. Idempotent.
    pub async fn disconnect(&self) {
        let microphone = self.microphone.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || microphone.stop()).await {
            warn!(error = %e, "Failed to stop microphone");
        }

        self.playback.close_output().await;
        self.shared.ws_sender.lock().take();
        self.shared.shutdown.cancel();

        let handle = self.connection_handle.lock().take();
        if let Some(mut handle) = handle {
            if tokio::time::timeout(CLOSE_GRACE_PERIOD, &mut handle)
                .await
                .is_err()
            {
                warn!("Connection task did not stop in time, aborting");
                handle.abort();
            }
        }

        self.shared.handshake_complete.store(false, Ordering::SeqCst);
        if self.shared.state.finish(SessionState::Closed) {
            info!(session_id = ?self.session_id(), "Session closed");
        }
    }

    pub fn state(&self) -> SessionState {
        self.shared.state.get()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    pub fn session_id(&self) -> Option<String> {
        self.shared.session_id.read().clone()
    }

    /// Whether the channel is open and the session not finished.
    pub fn is_open(&self) -> bool {
        let state = self.shared.state.get();
        state != SessionState::Uninitialized
            && !state.is_terminal()
            && self.shared.ws_sender.lock().is_some()
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn playback(&self) -> &PlaybackQueue {
        &self.playback
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::capture::CaptureResult;
    use crate::core::codec::DecodedAudio;
    use crate::core::playback::PlaybackResult;
    use crate::core::realtime::credential::{CredentialError, EphemeralCredential};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct FailingCredentials;

    #[async_trait]
    impl CredentialProvider for FailingCredentials {
        async fn fetch(
            &self,
            _instructions: Option<&str>,
            _voice: &str,
        ) -> Result<EphemeralCredential, CredentialError> {
            Err(CredentialError::MissingToken)
        }
    }

    #[derive(Default)]
    struct IdleMicrophone {
        stops: AtomicUsize,
    }

    impl AudioSource for IdleMicrophone {
        fn start(&self, _on_frame: FrameCallback, _on_error: CaptureErrorCallback) -> CaptureResult<()> {
            Ok(())
        }

        fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }

        fn is_capturing(&self) -> bool {
            false
        }
    }

    struct NullOutput;

    #[async_trait]
    impl AudioOutput for NullOutput {
        async fn play(&self, _audio: DecodedAudio) -> PlaybackResult<()> {
            Ok(())
        }

        async fn close(&self) {}
    }

    fn controller(credentials: Arc<dyn CredentialProvider>) -> SessionController {
        SessionController::new(
            SessionSettings::default(),
            credentials,
            Arc::new(IdleMicrophone::default()),
            Arc::new(NullOutput),
            Arc::new(|_| Box::pin(async {})),
            Arc::new(|_| Box::pin(async {})),
        )
    }

    #[tokio::test]
    async fn test_new_controller_is_uninitialized() {
        let controller = controller(Arc::new(FailingCredentials));
        assert_eq!(controller.state(), SessionState::Uninitialized);
        assert!(!controller.is_open());
        assert!(controller.session_id().is_none());
    }

    #[tokio::test]
    async fn test_credential_failure_marks_errored() {
        let controller = controller(Arc::new(FailingCredentials));
        let result = controller.init(None, None).await;

        assert!(matches!(
            result,
            Err(SessionError::Credential(CredentialError::MissingToken))
        ));
        assert_eq!(controller.state(), SessionState::Errored);
    }

    #[tokio::test]
    async fn test_init_after_failure_is_rejected() {
        let controller = controller(Arc::new(FailingCredentials));
        let _ = controller.init(None, None).await;

        assert!(matches!(
            controller.init(None, None).await,
            Err(SessionError::AlreadyStarted(SessionState::Errored))
        ));
    }

    #[tokio::test]
    async fn test_disconnect_without_init() {
        let controller = controller(Arc::new(FailingCredentials));
        controller.disconnect().await;
        controller.disconnect().await;

        assert_eq!(controller.state(), SessionState::Closed);
        assert!(controller.playback().is_closed());
    }

    #[tokio::test]
    async fn test_send_text_before_init_is_dropped() {
        let controller = controller(Arc::new(FailingCredentials));
        controller.send_text("hello");
        assert_eq!(controller.state(), SessionState::Uninitialized);
    }
}
