//! Fake audio devices
//!
//! `FakeMicrophone` lets a test push frames through the same callback the
//! real capture thread would use. `RecordingOutput` records every played
//! chunk with its start and end time.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use voice_session::core::capture::{
    AudioFrame, AudioSource, CaptureError, CaptureErrorCallback, CaptureResult, FrameCallback,
};
use voice_session::core::codec::DecodedAudio;
use voice_session::core::playback::{AudioOutput, PlaybackError, PlaybackResult};

/// Microphone driven by the test
#[derive(Default)]
pub struct FakeMicrophone {
    callbacks: Mutex<Option<(FrameCallback, CaptureErrorCallback)>>,
    fail_start: Option<CaptureError>,
    start_delay: Duration,
    capturing: AtomicBool,
    sequence: AtomicUsize,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
}

impl FakeMicrophone {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A microphone whose `start` fails with `error`
    pub fn failing(error: CaptureError) -> Arc<Self> {
        Arc::new(Self {
            fail_start: Some(error),
            ..Self::default()
        })
    }

    /// A microphone whose `start` blocks for `delay` before capturing
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            start_delay: delay,
            ..Self::default()
        })
    }

    /// Deliver one frame. Returns false when not capturing.
    pub fn emit(&self, samples: Vec<f32>) -> bool {
        let callbacks = self.callbacks.lock().clone();
        match callbacks {
            Some((on_frame, _)) if self.capturing.load(Ordering::SeqCst) => {
                let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) as u64;
                on_frame(AudioFrame { samples, sequence });
                true
            }
            _ => false,
        }
    }

    /// Report a runtime stream failure
    pub fn fail(&self, error: CaptureError) {
        let callbacks = self.callbacks.lock().clone();
        if let Some((_, on_error)) = callbacks {
            on_error(error);
        }
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl AudioSource for FakeMicrophone {
    fn start(&self, on_frame: FrameCallback, on_error: CaptureErrorCallback) -> CaptureResult<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.fail_start {
            return Err(error.clone());
        }
        if !self.start_delay.is_zero() {
            std::thread::sleep(self.start_delay);
        }
        *self.callbacks.lock() = Some((on_frame, on_error));
        self.capturing.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.capturing.store(false, Ordering::SeqCst);
        self.callbacks.lock().take();
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }
}

/// One chunk handed to the output
#[derive(Debug, Clone)]
pub struct PlayedChunk {
    pub samples: Vec<f32>,
    pub started: Instant,
    pub finished: Instant,
}

/// Output that records what it plays
pub struct RecordingOutput {
    play_time: Duration,
    pub played: Mutex<Vec<PlayedChunk>>,
    active: AtomicUsize,
    pub max_concurrent: AtomicUsize,
    pub closed: AtomicBool,
    pub close_calls: AtomicUsize,
}

impl RecordingOutput {
    /// Each `play` takes `play_time` to resolve
    pub fn new(play_time: Duration) -> Arc<Self> {
        Arc::new(Self {
            play_time,
            played: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_concurrent: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
        })
    }

    pub fn played(&self) -> Vec<PlayedChunk> {
        self.played.lock().clone()
    }

    pub fn played_count(&self) -> usize {
        self.played.lock().len()
    }
}

#[async_trait]
impl AudioOutput for RecordingOutput {
    async fn play(&self, audio: DecodedAudio) -> PlaybackResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PlaybackError::Closed);
        }

        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(active, Ordering::SeqCst);

        let started = Instant::now();
        tokio::time::sleep(self.play_time).await;
        let finished = Instant::now();

        self.active.fetch_sub(1, Ordering::SeqCst);
        self.played.lock().push(PlayedChunk {
            samples: audio.samples,
            started,
            finished,
        });
        Ok(())
    }

    async fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
    }
}
