use std::path::PathBuf;

use quorum_diarization::SpeakerSegment;
use quorum_stt::TranscriptionSegment;

use crate::error::ErrorCode;

/// Everything produced for one accepted analysis chunk. Emitted in strict
/// index order; rejected chunks consume an index but emit nothing.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChunkResult {
    pub index: u32,
    /// Session-relative bounds of the audio the chunk covers, seconds.
    /// Padding added for diarization never extends `end_time`.
    pub start_time: f64,
    pub end_time: f64,
    /// Mic-only speech segments whose close time fell inside this chunk's
    /// window, as `(start, end)` pairs.
    pub mic_speech_segments: Vec<(f64, f64)>,
    pub transcription: Option<TranscriptionSegment>,
    pub speaker_segments: Vec<SpeakerSegment>,
    /// Set on the last chunk of a session, including the synthetic
    /// zero-length marker emitted when no remainder was worth analyzing.
    pub is_final_chunk: bool,
}

/// Aggregate returned by a clean stop.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SessionResult {
    pub session_id: uuid::Uuid,
    pub transcriptions: Vec<TranscriptionSegment>,
    pub speaker_segments: Vec<SpeakerSegment>,
    pub duration_secs: f64,
    pub output_path: PathBuf,
}

/// Live event stream for one session: chunk results as they resolve, plus
/// structured errors for failures that do not tear the session down.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Chunk(ChunkResult),
    Error { code: ErrorCode, message: String },
}
