//! Transcription contract.
//!
//! Model loading and neural inference live behind `Transcriber`; the session
//! core only ever talks to this trait. Implementations may wrap blocking,
//! non-cancellable native calls — callers must await in-flight work to
//! completion before releasing the engine (never abort it).

mod contract;

pub use contract::{read_wav_mono_f32_16k, Transcriber, TranscriptionSegment, MIN_SEGMENT_SECS};

/// Sample rate every `process_segment` call expects.
pub const STT_SAMPLE_RATE: u32 = 16000;

#[derive(Debug, thiserror::Error)]
pub enum SttError {
    #[error("engine initialization failed: {0}")]
    InitFailed(String),
    #[error("engine not initialized")]
    NotInitialized,
    #[error("transcription failed: {0}")]
    ProcessFailed(String),
    #[error("invalid audio format")]
    InvalidAudioFormat,
}

pub type Result<T> = std::result::Result<T, SttError>;
