//! Voice activity detection: a frame-level speech scorer plus the two
//! consumers built on it — the session-long segment tracker and the
//! per-chunk admission gate.

mod gate;
mod scorer;
mod tracker;

pub use gate::{ChunkGate, GateDecision};
pub use scorer::{EnergyScorer, SpeechScorer};
pub use tracker::SegmentTracker;

/// Canonical sample rate for all VAD input.
pub const SAMPLE_RATE: usize = 16000;

/// Analysis frame length in milliseconds.
pub const FRAME_MS: usize = 256;

/// Samples per analysis frame at the canonical rate.
pub const FRAME_SAMPLES: usize = SAMPLE_RATE * FRAME_MS / 1000;

/// A frame with probability above this counts as speech.
pub const SPEECH_PROBABILITY_THRESHOLD: f32 = 0.5;

/// A chunk is admitted for analysis only when its speech-frame fraction
/// strictly exceeds this.
pub const CHUNK_SPEECH_FRACTION: f32 = 0.3;

#[derive(Debug, thiserror::Error)]
pub enum VadError {
    #[error("scoring failed: {0}")]
    ScoringFailed(String),
}

pub type Result<T> = std::result::Result<T, VadError>;

/// One stretch of detected speech, in seconds relative to session start.
/// `end_time` is `None` while the segment is still open.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SpeechSegment {
    pub start_time: f64,
    pub end_time: Option<f64>,
}
