//! Format normalization: arbitrary input rate and channel layout to the
//! canonical mono 16 kHz float stream.
//!
//! These are pure functions of the format metadata, so they are testable
//! with synthetic buffers and never need real hardware. The stateful
//! `SincResampler` is preferred on live capture paths; the linear variants
//! are the stateless fallback.

use std::borrow::Cow;

use rubato::{FftFixedIn, Resampler as RubatoResampler};

/// Downmix interleaved samples to mono by averaging channels.
pub fn downmix_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    let mut output = Vec::with_capacity(samples.len() / channels);
    let inv = 1.0 / channels as f32;
    for frame in samples.chunks_exact(channels) {
        output.push(frame.iter().sum::<f32>() * inv);
    }
    output
}

/// Stateless linear-interpolation resampling.
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    let ratio = to_rate as f64 / from_rate as f64;
    let new_len = (samples.len() as f64 * ratio) as usize;
    let mut output = Vec::with_capacity(new_len);
    for i in 0..new_len {
        let src = i as f64 / ratio;
        let idx = src.floor() as usize;
        let frac = src.fract() as f32;
        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else if idx < samples.len() {
            samples[idx]
        } else {
            0.0
        };
        output.push(sample);
    }
    output
}

/// Downmix and resample in one pass, borrowing when no work is needed.
pub fn normalize(samples: &[f32], channels: usize, from_rate: u32, to_rate: u32) -> Cow<'_, [f32]> {
    match (channels > 1, from_rate != to_rate) {
        (false, false) => Cow::Borrowed(samples),
        (true, false) => Cow::Owned(downmix_mono(samples, channels)),
        (false, true) => Cow::Owned(resample_linear(samples, from_rate, to_rate)),
        (true, true) => {
            let mono = downmix_mono(samples, channels);
            Cow::Owned(resample_linear(&mono, from_rate, to_rate))
        }
    }
}

/// Stateful sinc resampler over `rubato::FftFixedIn`, with an internal carry
/// buffer so callers can feed variable-size capture buffers.
pub struct SincResampler {
    resampler: FftFixedIn<f32>,
    carry: Vec<f32>,
    chunk_size: usize,
}

impl SincResampler {
    /// Returns `None` when rubato rejects the rate pair.
    pub fn new(from_rate: u32, to_rate: u32) -> Option<Self> {
        let chunk_size = 256;
        let resampler =
            FftFixedIn::<f32>::new(from_rate as usize, to_rate as usize, chunk_size, 2, 1).ok()?;
        Some(Self {
            resampler,
            carry: Vec::with_capacity(chunk_size * 2),
            chunk_size,
        })
    }

    /// Feed mono samples, returning whatever full chunks produced. Input
    /// smaller than the chunk size is carried to the next call.
    pub fn process(&mut self, samples: &[f32]) -> Vec<f32> {
        self.carry.extend_from_slice(samples);

        let mut output = Vec::new();
        while self.carry.len() >= self.chunk_size {
            let chunk: Vec<f32> = self.carry.drain(..self.chunk_size).collect();
            if let Ok(resampled) = self.resampler.process(&[chunk], None) {
                if let Some(channel) = resampled.first() {
                    output.extend_from_slice(channel);
                }
            }
        }
        output
    }
}

/// Normalize a capture buffer with an optional stateful resampler.
pub(crate) fn normalize_with_resampler(
    samples: &[f32],
    channels: usize,
    resampler: Option<&mut SincResampler>,
) -> Vec<f32> {
    let mono = if channels > 1 {
        downmix_mono(samples, channels)
    } else {
        samples.to_vec()
    };
    match resampler {
        Some(r) => r.process(&mono),
        None => mono,
    }
}
