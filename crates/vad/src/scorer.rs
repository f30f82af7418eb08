//! Frame-level speech probability scoring.
//!
//! `SpeechScorer` is the seam where a neural VAD would plug in; the default
//! `EnergyScorer` maps frame energy against an adaptive noise floor, which
//! is deterministic and dependency-free.

use crate::Result;

pub trait SpeechScorer: Send {
    /// Score one frame, returning a speech probability in [0, 1].
    fn score(&mut self, frame: &[f32]) -> Result<f32>;

    /// Clear adaptive state for a fresh pass.
    fn reset(&mut self);
}

/// Initial noise-floor estimate in dBFS.
const INITIAL_FLOOR_DBFS: f32 = -60.0;

/// How fast the floor drifts up toward sustained louder input.
const FLOOR_RISE_RATE: f32 = 0.02;

/// SNR (dB above floor) at which probability starts rising from 0.
const SNR_LOW_DB: f32 = 6.0;

/// SNR at which probability saturates at 1.
const SNR_HIGH_DB: f32 = 18.0;

/// Anything below this is silence regardless of the floor.
const ABSOLUTE_SILENCE_DBFS: f32 = -70.0;

pub struct EnergyScorer {
    noise_floor_dbfs: f32,
}

impl EnergyScorer {
    pub fn new() -> Self {
        Self {
            noise_floor_dbfs: INITIAL_FLOOR_DBFS,
        }
    }

    fn rms_dbfs(frame: &[f32]) -> f32 {
        if frame.is_empty() {
            return -100.0;
        }
        let sum_sq: f32 = frame.iter().map(|s| s * s).sum();
        let rms = (sum_sq / frame.len() as f32).sqrt();
        if rms > 0.0 {
            20.0 * rms.log10()
        } else {
            -100.0
        }
    }
}

impl Default for EnergyScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechScorer for EnergyScorer {
    fn score(&mut self, frame: &[f32]) -> Result<f32> {
        let level = Self::rms_dbfs(frame);

        // Track the floor: instantly downward, slowly upward, so brief
        // speech bursts do not drag the floor up with them.
        if level < self.noise_floor_dbfs {
            self.noise_floor_dbfs = level;
        } else {
            self.noise_floor_dbfs += FLOOR_RISE_RATE * (level - self.noise_floor_dbfs);
        }

        if level < ABSOLUTE_SILENCE_DBFS {
            return Ok(0.0);
        }

        let snr = level - self.noise_floor_dbfs;
        Ok(((snr - SNR_LOW_DB) / (SNR_HIGH_DB - SNR_LOW_DB)).clamp(0.0, 1.0))
    }

    fn reset(&mut self) {
        self.noise_floor_dbfs = INITIAL_FLOOR_DBFS;
    }
}
