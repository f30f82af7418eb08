//! Speaker diarization contract.
//!
//! Like the transcription contract, inference internals stay behind the
//! trait. Segment processing needs enough audio to embed speakers reliably,
//! so calls below the minimum duration fail fast with `AudioTooShort`.

use std::path::Path;

/// Shortest segment a diarizer will accept, in seconds.
pub const MIN_SEGMENT_SECS: f64 = 3.0;

#[derive(Debug, thiserror::Error)]
pub enum DiarizationError {
    #[error("engine initialization failed: {0}")]
    InitFailed(String),
    #[error("engine not initialized")]
    NotInitialized,
    #[error("audio too short: {duration_secs:.2}s, need at least {MIN_SEGMENT_SECS}s")]
    AudioTooShort { duration_secs: f64 },
    #[error("diarization failed: {0}")]
    ProcessFailed(String),
}

pub type Result<T> = std::result::Result<T, DiarizationError>;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SpeakerSegment {
    pub speaker_id: String,
    pub start_time: f64,
    pub end_time: f64,
    pub confidence: f32,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct DiarizationResult {
    pub segments: Vec<SpeakerSegment>,
    pub num_speakers: usize,
}

/// Pluggable diarization engine.
///
/// Speaker identities are tracked across `process_segment` calls within one
/// session; `reset` clears that tracking so a new session's speaker IDs
/// start over. Implementations use interior mutability so one engine can be
/// shared behind an `Arc` across chunk tasks.
pub trait Diarizer: Send + Sync {
    fn initialize(&self) -> Result<()>;

    /// Assign speaker labels within one segment covering
    /// `[start_time, end_time]` seconds of the session. Fails with
    /// `AudioTooShort` when the duration is below `MIN_SEGMENT_SECS`.
    fn process_segment(
        &self,
        samples: &[f32],
        start_time: f64,
        end_time: f64,
    ) -> Result<Vec<SpeakerSegment>>;

    /// Offline/batch diarization of a whole recording.
    fn process_file(&self, path: &Path) -> Result<DiarizationResult>;

    /// Clear speaker-identity tracking for a new session.
    fn reset(&self);

    /// Flush and return any remaining segments.
    fn finalize(&self) -> Vec<SpeakerSegment>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_too_short_error_reports_duration() {
        let err = DiarizationError::AudioTooShort { duration_secs: 1.5 };
        let message = err.to_string();
        assert!(message.contains("1.50"));
        assert!(message.contains("3"));
    }

    #[test]
    fn test_speaker_segment_serde_roundtrip() {
        let seg = SpeakerSegment {
            speaker_id: "speaker_0".to_string(),
            start_time: 1.0,
            end_time: 2.5,
            confidence: 0.87,
        };
        let json = serde_json::to_string(&seg).unwrap();
        let back: SpeakerSegment = serde_json::from_str(&json).unwrap();
        assert_eq!(back, seg);
    }
}
