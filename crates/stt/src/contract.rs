use std::path::Path;

use crate::{Result, SttError, STT_SAMPLE_RATE};

/// Segments shorter than this may come back empty with zero confidence
/// instead of erroring.
pub const MIN_SEGMENT_SECS: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TranscriptionSegment {
    pub text: String,
    pub start_time: f64,
    pub end_time: f64,
    pub confidence: f32,
    pub is_final: bool,
}

impl TranscriptionSegment {
    /// The empty, zero-confidence result permitted for very short input.
    pub fn empty(start_time: f64, end_time: f64) -> Self {
        Self {
            text: String::new(),
            start_time,
            end_time,
            confidence: 0.0,
            is_final: true,
        }
    }
}

/// Pluggable transcription engine.
///
/// Input is always mono 16 kHz float. Engines accumulate their results
/// internally; `transcriptions` returns everything produced so far and
/// `reset` starts a new session. Implementations use interior mutability so
/// one engine can be shared behind an `Arc` across chunk tasks.
pub trait Transcriber: Send + Sync {
    fn initialize(&self) -> Result<()>;

    /// Transcribe one segment of audio covering `[start_time, end_time]`
    /// seconds of the session.
    fn process_segment(
        &self,
        samples: &[f32],
        start_time: f64,
        end_time: f64,
    ) -> Result<TranscriptionSegment>;

    /// Clear accumulated state for a new session.
    fn reset(&self);

    /// Flush and return any remaining segments.
    fn finalize(&self) -> Vec<TranscriptionSegment>;

    /// All segments produced so far.
    fn transcriptions(&self) -> Vec<TranscriptionSegment>;
}

/// Read a WAV file as mono f32 at the contract rate, downmixing and
/// linearly resampling as needed.
pub fn read_wav_mono_f32_16k(path: &Path) -> Result<Vec<f32>> {
    let mut reader =
        hound::WavReader::open(path).map_err(|e| SttError::ProcessFailed(e.to_string()))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let mono: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let raw: Vec<i16> = reader
                .samples::<i16>()
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| SttError::ProcessFailed(e.to_string()))?;
            downmix(&raw.iter().map(|&s| s as f32 / 32768.0).collect::<Vec<_>>(), channels)
        }
        hound::SampleFormat::Float => {
            let raw: Vec<f32> = reader
                .samples::<f32>()
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| SttError::ProcessFailed(e.to_string()))?;
            downmix(&raw, channels)
        }
    };

    if spec.sample_rate == STT_SAMPLE_RATE {
        return Ok(mono);
    }
    Ok(resample_linear(&mono, spec.sample_rate, STT_SAMPLE_RATE))
}

fn downmix(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels == 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
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
