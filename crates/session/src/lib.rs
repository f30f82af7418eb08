//! Session core: ties capture, mixing, voice activity detection, and the
//! chunked analysis pipeline into one recording lifecycle.

mod capture;
mod config;
mod coordinator;
mod error;
mod pipeline;
mod types;

pub use capture::{CaptureBackend, CaptureChannels, CpalBackend};
pub use config::SessionConfig;
pub use coordinator::{SessionCoordinator, SessionStart, SessionState};
pub use error::{ErrorCode, Result, SessionError};
pub use pipeline::ChunkPipeline;
pub use types::{ChunkResult, SessionEvent, SessionResult};
