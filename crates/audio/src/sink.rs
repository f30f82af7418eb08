//! Append-only WAV sink for the mixed session stream.
//!
//! The mixed/resampled output is written continuously for the session's
//! duration. A write failure is fatal to the session and must be surfaced
//! by the caller; the sink itself never retries.

use hound::{WavSpec, WavWriter};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::{AudioError, Result, SAMPLE_RATE};

pub struct WavSink {
    writer: Option<WavWriter<BufWriter<File>>>,
    path: PathBuf,
    samples_written: u64,
}

impl WavSink {
    /// Create the output file, mono 16 kHz, 16-bit PCM.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let spec = WavSpec {
            channels: 1,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let file = File::create(path.as_ref())
            .map_err(|e| AudioError::SinkError(format!("failed to create file: {e}")))?;
        let writer = WavWriter::new(BufWriter::new(file), spec)
            .map_err(|e| AudioError::SinkError(format!("failed to create wav writer: {e}")))?;
        Ok(Self {
            writer: Some(writer),
            path: path.as_ref().to_path_buf(),
            samples_written: 0,
        })
    }

    /// Append one buffer of f32 samples, converted to i16 with clamping.
    pub fn write(&mut self, samples: &[f32]) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| AudioError::SinkError("sink already finalized".to_string()))?;
        for &sample in samples {
            let int_sample = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(int_sample)
                .map_err(|e| AudioError::SinkError(format!("failed to write sample: {e}")))?;
        }
        self.samples_written += samples.len() as u64;
        Ok(())
    }

    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples_written as f64 / SAMPLE_RATE as f64
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush headers and close the file, returning its path.
    pub fn finalize(mut self) -> Result<PathBuf> {
        if let Some(writer) = self.writer.take() {
            writer
                .finalize()
                .map_err(|e| AudioError::SinkError(format!("failed to finalize wav: {e}")))?;
        }
        Ok(self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_finalize_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.wav");

        let mut sink = WavSink::create(&path).unwrap();
        sink.write(&[0.0, 0.5, -0.5, 1.0]).unwrap();
        assert_eq!(sink.samples_written(), 4);
        let written_path = sink.finalize().unwrap();

        let reader = hound::WavReader::open(&written_path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, SAMPLE_RATE);
        assert_eq!(reader.len(), 4);
    }

    #[test]
    fn test_duration_tracks_sample_count() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = WavSink::create(dir.path().join("d.wav")).unwrap();
        sink.write(&vec![0.0; 16000]).unwrap();
        assert!((sink.duration_secs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_create_fails_in_missing_directory() {
        let result = WavSink::create("/nonexistent-dir/deeper/out.wav");
        assert!(matches!(result, Err(AudioError::SinkError(_))));
    }
}
