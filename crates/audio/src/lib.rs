mod capture;
mod device;
mod mixer;
mod resample;
mod ring_buffer;
mod sink;

pub use capture::{
    CaptureSource, CaptureState, MicrophoneCapture, SampleSink, SystemAudioCapture,
};
pub use device::{
    find_device_by_id, find_virtual_device, get_default_device, list_devices, AudioDevice,
    DeviceKind,
};
pub use mixer::Mixer;
pub use resample::{downmix_mono, normalize, resample_linear, SincResampler};
pub use ring_buffer::{RingConsumer, RingProducer, SpscRing};
pub use sink::WavSink;

/// Canonical internal sample rate. Every capture path converts to this
/// before handing buffers downstream.
pub const SAMPLE_RATE: u32 = 16000;

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("capture initialization failed: {0}")]
    InitFailed(String),
    #[error("invalid capture state: cannot {operation} while {state:?}")]
    InvalidState {
        operation: &'static str,
        state: CaptureState,
    },
    #[error("stream error: {0}")]
    StreamError(String),
    #[error("audio sink error: {0}")]
    SinkError(String),
    #[error("device error: {0}")]
    DeviceError(#[from] cpal::DevicesError),
    #[error("build stream error: {0}")]
    BuildStreamError(#[from] cpal::BuildStreamError),
}

pub type Result<T> = std::result::Result<T, AudioError>;
