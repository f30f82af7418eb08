//! Per-chunk admission gate.
//!
//! Each completed chunk gets an independent, freshly reset scoring pass.
//! The chunk is admitted for expensive analysis only when the fraction of
//! speech-like frames strictly exceeds `CHUNK_SPEECH_FRACTION`.

use crate::scorer::{EnergyScorer, SpeechScorer};
use crate::{CHUNK_SPEECH_FRACTION, FRAME_SAMPLES, SPEECH_PROBABILITY_THRESHOLD};

#[derive(Debug, Clone, Copy)]
pub struct GateDecision {
    pub accepted: bool,
    pub speech_fraction: f32,
    pub speech_frames: usize,
    pub total_frames: usize,
}

pub struct ChunkGate<S: SpeechScorer = EnergyScorer> {
    scorer: S,
}

impl ChunkGate<EnergyScorer> {
    pub fn new() -> Self {
        Self::with_scorer(EnergyScorer::new())
    }
}

impl Default for ChunkGate<EnergyScorer> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: SpeechScorer> ChunkGate<S> {
    pub fn with_scorer(scorer: S) -> Self {
        Self { scorer }
    }

    /// Run a fresh pass over one chunk. A scoring failure counts the frame
    /// as speech (fail open) so a broken scorer never drops real audio.
    pub fn evaluate(&mut self, samples: &[f32]) -> GateDecision {
        self.scorer.reset();

        let mut speech_frames = 0usize;
        let mut total_frames = 0usize;
        for frame in samples.chunks_exact(FRAME_SAMPLES) {
            total_frames += 1;
            let probability = match self.scorer.score(frame) {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!("chunk gate scoring failed, failing open: {e}");
                    1.0
                }
            };
            if probability > SPEECH_PROBABILITY_THRESHOLD {
                speech_frames += 1;
            }
        }

        let speech_fraction = if total_frames == 0 {
            0.0
        } else {
            speech_frames as f32 / total_frames as f32
        };

        GateDecision {
            accepted: speech_fraction > CHUNK_SPEECH_FRACTION,
            speech_fraction,
            speech_frames,
            total_frames,
        }
    }
}
