//! Re-blocks device callbacks into fixed-size wire frames.

use super::{AudioFrame, CAPTURE_FRAME_SIZE, CAPTURE_SAMPLE_RATE};
use crate::core::codec::LinearResampler;

/// Converts arbitrary device buffers into fixed-size mono frames.
///
/// Device callbacks arrive with host-chosen sizes, channel counts and sample
/// rates. The assembler downmixes, resamples to the capture rate and emits a
/// frame each time `frame_size` samples have accumulated.
#[derive(Debug)]
pub struct FrameAssembler {
    resampler: LinearResampler,
    pending: Vec<f32>,
    frame_size: usize,
    sequence: u64,
}

impl FrameAssembler {
    /// Assembler producing standard 24kHz, 4096-sample frames.
    pub fn new(source_rate: u32) -> Self {
        Self::with_frame_size(source_rate, CAPTURE_SAMPLE_RATE, CAPTURE_FRAME_SIZE)
    }

    pub fn with_frame_size(source_rate: u32, target_rate: u32, frame_size: usize) -> Self {
        let frame_size = frame_size.max(1);
        Self {
            resampler: LinearResampler::new(source_rate, target_rate),
            pending: Vec::with_capacity(frame_size * 2),
            frame_size,
            sequence: 0,
        }
    }

    /// Push interleaved samples with `channels` channels.
    pub fn push_interleaved(&mut self, data: &[f32], channels: usize) -> Vec<AudioFrame> {
        if channels <= 1 {
            return self.push_mono(data);
        }

        let mono: Vec<f32> = data
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect();
        self.push_mono(&mono)
    }

    /// Push mono samples at the source rate.
    pub fn push_mono(&mut self, data: &[f32]) -> Vec<AudioFrame> {
        let resampled = self.resampler.process(data);
        self.pending.extend_from_slice(&resampled);

        let mut frames = Vec::with_capacity(self.pending.len() / self.frame_size);
        while self.pending.len() >= self.frame_size {
            let rest = self.pending.split_off(self.frame_size);
            let samples = std::mem::replace(&mut self.pending, rest);
            frames.push(AudioFrame {
                samples,
                sequence: self.sequence,
            });
            self.sequence += 1;
        }
        frames
    }

    /// Samples buffered toward the next frame.
    pub fn pending_samples(&self) -> usize {
        self.pending.len()
    }

    /// Drop the partial frame and resampler history.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.resampler.reset();
        self.sequence = 0;
    }
}
