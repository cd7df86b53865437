//! Linear-interpolation resampling.

/// Resample a complete buffer from `from_rate` to `to_rate`.
pub fn resample_linear(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || input.is_empty() || from_rate == 0 || to_rate == 0 {
        return input.to_vec();
    }

    let ratio = f64::from(from_rate) / f64::from(to_rate);
    let out_len = ((input.len() as f64) / ratio).floor() as usize;
    let mut output = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let src_idx = i as f64 * ratio;
        let idx0 = src_idx.floor() as usize;
        let frac = (src_idx - idx0 as f64) as f32;
        let s0 = input.get(idx0).copied().unwrap_or(0.0);
        let s1 = input.get(idx0 + 1).copied().unwrap_or(s0);
        output.push(s0 + frac * (s1 - s0));
    }

    output
}

/// Streaming linear resampler.
///
/// Keeps the fractional read position and the last input sample between
/// calls, so feeding a signal in arbitrary pieces yields the same output as
/// feeding it at once (minus the final sample, which waits for its successor).
#[derive(Debug, Clone)]
pub struct LinearResampler {
    from_rate: u32,
    to_rate: u32,
    step: f64,
    /// Next output position relative to the start of the next input block.
    /// `-1.0..0.0` addresses the gap between `previous` and that block.
    position: f64,
    previous: Option<f32>,
}

impl LinearResampler {
    pub fn new(from_rate: u32, to_rate: u32) -> Self {
        let step = if to_rate == 0 {
            1.0
        } else {
            f64::from(from_rate) / f64::from(to_rate)
        };
        Self {
            from_rate,
            to_rate,
            step,
            position: 0.0,
            previous: None,
        }
    }

    pub fn is_passthrough(&self) -> bool {
        self.from_rate == self.to_rate || self.from_rate == 0 || self.to_rate == 0
    }

    /// Resample the next block of a continuous signal.
    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        if self.is_passthrough() {
            return input.to_vec();
        }
        if input.is_empty() {
            return Vec::new();
        }

        let len = input.len() as f64;
        let mut output = Vec::with_capacity((len / self.step).ceil() as usize + 1);

        loop {
            let base = self.position.floor();
            let next = base + 1.0;
            if next >= len {
                break;
            }

            let s0 = if base < 0.0 {
                match self.previous {
                    Some(sample) => sample,
                    None => input[0],
                }
            } else {
                input[base as usize]
            };
            let s1 = input[next as usize];
            let frac = (self.position - base) as f32;

            output.push(s0 + frac * (s1 - s0));
            self.position += self.step;
        }

        self.position -= len;
        self.previous = input.last().copied();
        output
    }

    /// Forget stream history.
    pub fn reset(&mut self) {
        self.position = 0.0;
        self.previous = None;
    }
}
