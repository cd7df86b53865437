//! Float frames to base64 PCM16 and back.

use base64::prelude::*;

use super::CodecResult;

/// Size of the PCM window encoded per base64 pass.
pub const ENCODE_WINDOW_BYTES: usize = 32 * 1024;

/// Samples per window. Rounded down so every window is a multiple of
/// 3 bytes, which keeps concatenated base64 output free of inner padding.
const SAMPLES_PER_WINDOW: usize = (ENCODE_WINDOW_BYTES / 6) * 3;

/// Convert one float sample to signed 16-bit PCM.
///
/// Samples are clamped to [-1, 1]; negative values scale by 32768 and
/// non-negative values by 32767 so both extremes map exactly onto the i16 range.
#[inline]
pub fn sample_to_pcm16(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// Encode a float frame as base64 PCM16 little-endian.
///
/// Large frames are packed and encoded window by window, so the intermediate
/// byte buffer never exceeds [`ENCODE_WINDOW_BYTES`].
pub fn encode_frame(frame: &[f32]) -> String {
    let mut encoded = String::with_capacity(frame.len().div_ceil(3) * 8);
    let mut window = Vec::with_capacity(SAMPLES_PER_WINDOW.min(frame.len()) * 2);

    for chunk in frame.chunks(SAMPLES_PER_WINDOW) {
        window.clear();
        for &sample in chunk {
            window.extend_from_slice(&sample_to_pcm16(sample).to_le_bytes());
        }
        BASE64_STANDARD.encode_string(&window, &mut encoded);
    }

    encoded
}

/// Read little-endian PCM16 samples. A trailing odd byte is dropped.
pub fn pcm16_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Scale PCM16 samples back into [-1, 1).
pub fn pcm16_to_f32(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / 32768.0).collect()
}

/// Decode a base64 PCM16 payload into samples.
pub fn decode_frame(encoded: &str) -> CodecResult<Vec<i16>> {
    let bytes = BASE64_STANDARD.decode(encoded)?;
    Ok(pcm16_samples(&bytes))
}
