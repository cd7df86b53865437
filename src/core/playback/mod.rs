//! Sequential playback of inbound audio chunks.
//!
//! Chunks arrive as raw wire PCM. Each one is wrapped in a WAV container,
//! decoded and handed to an [`AudioOutput`]. Chunks play strictly one after
//! another in arrival order; a chunk that fails to decode is logged and
//! skipped without stalling the rest of the queue.
//!
//! [`PlaybackQueue::clear`] bumps a generation counter. A play loop that
//! belongs to an older generation stops pulling chunks as soon as its current
//! chunk finishes, so a stale completion can never start the next chunk.

mod speaker;

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::core::codec::{CodecError, CodecResult, DecodedAudio, decode_container, wrap_as_container};

pub use speaker::SpeakerOutput;

/// Errors raised by playback outputs.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("Decode error: {0}")]
    Decode(#[from] CodecError),

    #[error("Audio output error: {0}")]
    Output(String),

    #[error("Audio output is closed")]
    Closed,
}

/// Result type for playback operations.
pub type PlaybackResult<T> = Result<T, PlaybackError>;

/// Whether a chunk is currently being played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
}

/// Turns a container-wrapped chunk into playable samples.
pub trait ChunkDecoder: Send + Sync {
    fn decode(&self, container: &[u8]) -> CodecResult<DecodedAudio>;
}

/// Decodes WAV containers with hound.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavDecoder;

impl ChunkDecoder for WavDecoder {
    fn decode(&self, container: &[u8]) -> CodecResult<DecodedAudio> {
        decode_container(container)
    }
}

/// Destination for decoded audio.
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Play `audio`, resolving once it has finished playing.
    async fn play(&self, audio: DecodedAudio) -> PlaybackResult<()>;

    /// Release the output device. Idempotent.
    async fn close(&self);
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<Bytes>,
    playing: bool,
    generation: u64,
    closed: bool,
}

struct QueueInner {
    state: Mutex<QueueState>,
    decoder: Arc<dyn ChunkDecoder>,
    output: Arc<dyn AudioOutput>,
}

impl QueueInner {
    /// Pop the next chunk for a loop of `generation`.
    ///
    /// A loop from an older generation gets `None` and leaves `playing`
    /// alone, since that flag now belongs to the current generation.
    fn next_chunk(&self, generation: u64) -> Option<Bytes> {
        let mut state = self.state.lock();
        if state.generation != generation {
            return None;
        }
        match state.pending.pop_front() {
            Some(chunk) => Some(chunk),
            None => {
                state.playing = false;
                None
            }
        }
    }

    async fn play_loop(self: Arc<Self>, generation: u64) {
        while let Some(chunk) = self.next_chunk(generation) {
            let container = wrap_as_container(&chunk);
            let audio = match self.decoder.decode(&container) {
                Ok(audio) => audio,
                Err(e) => {
                    warn!(error = %e, bytes = chunk.len(), "Skipping undecodable audio chunk");
                    continue;
                }
            };

            let pending = self.state.lock().pending.len();
            trace!(
                duration_ms = audio.duration().as_millis() as u64,
                pending,
                "Playing audio chunk"
            );
            if let Err(e) = self.output.play(audio).await {
                warn!(error = %e, "Audio chunk playback failed");
            }
        }
        debug!(generation, "Playback loop idle");
    }
}

/// FIFO of inbound audio chunks with single-chunk-at-a-time playback.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct PlaybackQueue {
    inner: Arc<QueueInner>,
}

impl PlaybackQueue {
    pub fn new(decoder: Arc<dyn ChunkDecoder>, output: Arc<dyn AudioOutput>) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState::default()),
                decoder,
                output,
            }),
        }
    }

    /// Queue using the WAV decoder.
    pub fn with_output(output: Arc<dyn AudioOutput>) -> Self {
        Self::new(Arc::new(WavDecoder), output)
    }

    /// Append a chunk and start playback if idle.
    ///
    /// Must be called within a tokio runtime.
    pub fn enqueue(&self, chunk: Bytes) {
        let generation = {
            let mut state = self.inner.state.lock();
            if state.closed {
                debug!("Playback closed, dropping audio chunk");
                return;
            }
            state.pending.push_back(chunk);
            if state.playing {
                return;
            }
            state.playing = true;
            state.generation
        };

        let inner = self.inner.clone();
        tokio::spawn(inner.play_loop(generation));
    }

    /// Drop all pending chunks.
    ///
    /// A chunk already handed to the output keeps playing; nothing queued
    /// before the clear plays after it.
    pub fn clear(&self) {
        let mut state = self.inner.state.lock();
        let dropped = state.pending.len();
        state.pending.clear();
        state.playing = false;
        state.generation = state.generation.wrapping_add(1);
        if dropped > 0 {
            debug!(dropped, "Cleared playback queue");
        }
    }

    /// Clear the queue, refuse further chunks and close the output.
    pub async fn close_output(&self) {
        {
            let mut state = self.inner.state.lock();
            state.closed = true;
        }
        self.clear();
        self.inner.output.close().await;
    }

    pub fn state(&self) -> PlaybackState {
        if self.inner.state.lock().playing {
            PlaybackState::Playing
        } else {
            PlaybackState::Idle
        }
    }

    pub fn pending_len(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }
}

impl std::fmt::Debug for PlaybackQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("PlaybackQueue")
            .field("pending", &state.pending.len())
            .field("playing", &state.playing)
            .field("generation", &state.generation)
            .field("closed", &state.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingOutput {
        played: AtomicUsize,
        closed: AtomicBool,
    }

    #[async_trait]
    impl AudioOutput for CountingOutput {
        async fn play(&self, _audio: DecodedAudio) -> PlaybackResult<()> {
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.played.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    async fn wait_idle(queue: &PlaybackQueue) {
        for _ in 0..200 {
            if queue.state() == PlaybackState::Idle && queue.pending_len() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("queue never drained");
    }

    #[tokio::test]
    async fn test_plays_every_chunk() {
        let output = Arc::new(CountingOutput::default());
        let queue = PlaybackQueue::with_output(output.clone());

        for _ in 0..3 {
            queue.enqueue(Bytes::from_static(&[0, 0, 1, 0]));
        }
        wait_idle(&queue).await;

        assert_eq!(output.played.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_close_output_rejects_new_chunks() {
        let output = Arc::new(CountingOutput::default());
        let queue = PlaybackQueue::with_output(output.clone());

        queue.close_output().await;
        queue.enqueue(Bytes::from_static(&[0, 0]));

        assert!(queue.is_closed());
        assert!(output.closed.load(Ordering::SeqCst));
        assert_eq!(queue.pending_len(), 0);
        assert_eq!(queue.state(), PlaybackState::Idle);
    }

    #[tokio::test]
    async fn test_clear_on_empty_queue() {
        let queue = PlaybackQueue::with_output(Arc::new(CountingOutput::default()));
        queue.clear();
        queue.clear();
        assert_eq!(queue.state(), PlaybackState::Idle);
    }
}
