//! Default speaker output over cpal.
//!
//! The output stream is opened lazily on the first chunk and owned by a
//! dedicated thread. Decoded audio is resampled to the device rate and pushed
//! into a shared sample buffer that the device callback drains; `play`
//! resolves once the callback has consumed every sample it pushed.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::{AudioOutput, PlaybackError, PlaybackResult};
use crate::core::codec::{DecodedAudio, resample_linear};

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Default)]
struct SampleBuffer {
    samples: VecDeque<f32>,
    queued: u64,
}

/// Handle to a running output stream.
struct SpeakerStream {
    buffer: Arc<Mutex<SampleBuffer>>,
    played: Arc<AtomicU64>,
    sample_rate: u32,
    stop_tx: mpsc::Sender<()>,
}

impl SpeakerStream {
    fn open(device_name: Option<String>) -> PlaybackResult<Self> {
        let buffer = Arc::new(Mutex::new(SampleBuffer::default()));
        let played = Arc::new(AtomicU64::new(0));
        let (ready_tx, ready_rx) = mpsc::channel::<PlaybackResult<u32>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread_buffer = buffer.clone();
        let thread_played = played.clone();
        std::thread::Builder::new()
            .name("speaker-output".to_string())
            .spawn(move || {
                let stream =
                    match build_output_stream(device_name.as_deref(), thread_buffer, thread_played)
                    {
                        Ok((stream, sample_rate)) => {
                            let _ = ready_tx.send(Ok(sample_rate));
                            stream
                        }
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };

                let _ = stop_rx.recv();
                drop(stream);
                debug!("Speaker stream released");
            })
            .map_err(|e| PlaybackError::Output(format!("failed to spawn output thread: {e}")))?;

        let sample_rate = ready_rx
            .recv()
            .map_err(|_| PlaybackError::Output("output thread exited early".to_string()))??;

        Ok(Self {
            buffer,
            played,
            sample_rate,
            stop_tx,
        })
    }

    /// Queue mono samples; returns the played-count that marks their end.
    fn push(&self, samples: &[f32]) -> u64 {
        let mut buffer = self.buffer.lock();
        buffer.samples.extend(samples.iter().copied());
        buffer.queued += samples.len() as u64;
        buffer.queued
    }

    fn played(&self) -> u64 {
        self.played.load(Ordering::Acquire)
    }
}

impl Drop for SpeakerStream {
    fn drop(&mut self) {
        self.buffer.lock().samples.clear();
        let _ = self.stop_tx.send(());
    }
}

fn build_output_stream(
    device_name: Option<&str>,
    buffer: Arc<Mutex<SampleBuffer>>,
    played: Arc<AtomicU64>,
) -> PlaybackResult<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = match device_name {
        Some(name) => host
            .output_devices()
            .map_err(|e| PlaybackError::Output(e.to_string()))?
            .find(|device| device.name().map(|n| n == name).unwrap_or(false)),
        None => host.default_output_device(),
    }
    .ok_or_else(|| PlaybackError::Output("No audio output device available".to_string()))?;

    let supported = device
        .default_output_config()
        .map_err(|e| PlaybackError::Output(e.to_string()))?;
    let sample_rate = supported.sample_rate();
    let channels = (supported.channels() as usize).max(1);
    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();

    let err_fn = |err: cpal::StreamError| warn!(error = %err, "Speaker stream error");

    // Each callback fills every channel of a frame with the next mono sample.
    let next_sample = move |count: usize, out: &mut dyn FnMut(usize, f32)| {
        let mut buf = buffer.lock();
        let mut consumed = 0u64;
        for frame in 0..count {
            let sample = match buf.samples.pop_front() {
                Some(sample) => {
                    consumed += 1;
                    sample
                }
                None => 0.0,
            };
            out(frame, sample);
        }
        drop(buf);
        if consumed > 0 {
            played.fetch_add(consumed, Ordering::Release);
        }
    };

    let stream = match sample_format {
        cpal::SampleFormat::F32 => device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                next_sample(data.len() / channels, &mut |frame: usize, sample: f32| {
                    data[frame * channels..(frame + 1) * channels].fill(sample);
                });
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::I16 => device.build_output_stream(
            &config,
            move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                next_sample(data.len() / channels, &mut |frame: usize, sample: f32| {
                    let value = (sample.clamp(-1.0, 1.0) * 32767.0) as i16;
                    data[frame * channels..(frame + 1) * channels].fill(value);
                });
            },
            err_fn,
            None,
        ),
        other => {
            return Err(PlaybackError::Output(format!(
                "unsupported output sample format: {other:?}"
            )));
        }
    }
    .map_err(|e| PlaybackError::Output(e.to_string()))?;

    stream
        .play()
        .map_err(|e| PlaybackError::Output(e.to_string()))?;

    info!(sample_rate, channels, "Speaker output opened");
    Ok((stream, sample_rate))
}

fn downmix(audio: &DecodedAudio) -> Vec<f32> {
    let channels = usize::from(audio.channels.max(1));
    if channels == 1 {
        return audio.samples.clone();
    }
    audio
        .samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Plays decoded chunks on the system speaker.
pub struct SpeakerOutput {
    device_name: Option<String>,
    stream: Mutex<Option<Arc<SpeakerStream>>>,
    closed: AtomicBool,
}

impl SpeakerOutput {
    /// Output on the named device, or the host default when `None`.
    pub fn new(device_name: Option<String>) -> Self {
        Self {
            device_name,
            stream: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    async fn stream(&self) -> PlaybackResult<Arc<SpeakerStream>> {
        let existing = self.stream.lock().clone();
        if let Some(stream) = existing {
            return Ok(stream);
        }

        let device_name = self.device_name.clone();
        let opened = tokio::task::spawn_blocking(move || SpeakerStream::open(device_name))
            .await
            .map_err(|e| PlaybackError::Output(e.to_string()))??;

        let mut slot = self.stream.lock();
        if self.closed.load(Ordering::SeqCst) {
            return Err(PlaybackError::Closed);
        }
        Ok(slot.get_or_insert_with(|| Arc::new(opened)).clone())
    }
}

impl Default for SpeakerOutput {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl AudioOutput for SpeakerOutput {
    async fn play(&self, audio: DecodedAudio) -> PlaybackResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PlaybackError::Closed);
        }
        if audio.is_empty() {
            return Ok(());
        }

        let stream = self.stream().await?;
        let mono = downmix(&audio);
        let samples = resample_linear(&mono, audio.sample_rate, stream.sample_rate);
        let target = stream.push(&samples);

        while stream.played() < target {
            if self.closed.load(Ordering::SeqCst) {
                return Err(PlaybackError::Closed);
            }
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }
        Ok(())
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.stream.lock().take().is_some() {
            info!("Speaker output closed");
        }
    }
}
