//! Minimal WAV container framing for inbound PCM chunks.

use std::io::Cursor;
use std::time::Duration;

use super::{CodecError, CodecResult, WIRE_BITS_PER_SAMPLE, WIRE_CHANNELS, WIRE_SAMPLE_RATE};

/// Length of the canonical RIFF/WAVE header.
pub const CONTAINER_HEADER_LEN: usize = 44;

/// Build a 44-byte PCM WAV header.
///
/// # Arguments
/// * `data_len` - Size of the PCM payload in bytes
/// * `sample_rate` - Sample rate in Hz
/// * `channels` - Number of interleaved channels
/// * `bits_per_sample` - Bit depth (16 for wire audio)
pub fn container_header(
    data_len: u32,
    sample_rate: u32,
    channels: u16,
    bits_per_sample: u16,
) -> [u8; CONTAINER_HEADER_LEN] {
    let block_align = channels * bits_per_sample / 8;
    let byte_rate = sample_rate * u32::from(block_align);

    let mut header = [0u8; CONTAINER_HEADER_LEN];

    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&data_len.saturating_add(36).to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes()); // PCM
    header[22..24].copy_from_slice(&channels.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&bits_per_sample.to_le_bytes());

    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_len.to_le_bytes());

    header
}

/// Wrap raw wire PCM (16-bit LE, mono, 24kHz) in a WAV container.
///
/// An odd trailing byte cannot form a sample and is dropped before wrapping.
pub fn wrap_as_container(pcm: &[u8]) -> Vec<u8> {
    let payload = &pcm[..pcm.len() & !1];
    let data_len = u32::try_from(payload.len()).unwrap_or(u32::MAX & !1);

    let header = container_header(
        data_len,
        WIRE_SAMPLE_RATE,
        WIRE_CHANNELS,
        WIRE_BITS_PER_SAMPLE,
    );

    let mut wav = Vec::with_capacity(CONTAINER_HEADER_LEN + payload.len());
    wav.extend_from_slice(&header);
    wav.extend_from_slice(payload);
    wav
}

/// Audio decoded from a container, normalized to f32.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    /// Interleaved samples in [-1, 1)
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: u16,
}

impl DecodedAudio {
    /// Playback length of the decoded audio.
    pub fn duration(&self) -> Duration {
        let frames = self.samples.len() / usize::from(self.channels.max(1));
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(frames as f64 / f64::from(self.sample_rate))
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Decode a WAV container into normalized samples.
pub fn decode_container(bytes: &[u8]) -> CodecResult<DecodedAudio> {
    let reader =
        hound::WavReader::new(Cursor::new(bytes)).map_err(|e| CodecError::Decode(e.to_string()))?;
    let spec = reader.spec();

    let samples = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => reader
            .into_samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32768.0))
            .collect::<Result<Vec<_>, _>>(),
        (hound::SampleFormat::Float, 32) => reader.into_samples::<f32>().collect(),
        (format, bits) => {
            return Err(CodecError::Decode(format!(
                "Unsupported sample format: {format:?} at {bits} bits"
            )));
        }
    }
    .map_err(|e| CodecError::Decode(e.to_string()))?;

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}
