#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("a recording session is already in progress")]
    AlreadyInProgress,
    #[error("invalid session state for {0}")]
    InvalidState(&'static str),
    #[error("invalid session config: {0}")]
    InvalidConfig(String),
    #[error("initialization failed: {0}")]
    InitFailed(String),
    #[error("session file i/o failed: {0}")]
    FileIo(String),
    #[error("audio error: {0}")]
    Audio(#[from] quorum_audio::AudioError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("internal session failure: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// Stable error categories carried on the event channel, so consumers can
/// react to a failure class without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    FileIo,
    Transcription,
    Diarization,
}
