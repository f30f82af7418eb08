//! Capture sources: microphone and system-audio paths behind one state
//! machine and one canonical sample stream.
//!
//! The cpal callback is the only code that runs on the audio driver's
//! real-time thread. It converts the buffer to mono 16 kHz and hands it to
//! the injected sink; everything else (mixing, chunking, analysis) runs off
//! that thread. The callback never blocks, never panics on delivery failure,
//! and while paused it drops converted data instead of buffering it.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::resample::{normalize, normalize_with_resampler, SincResampler};
use crate::ring_buffer::RingProducer;
use crate::{AudioError, Result, SAMPLE_RATE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CaptureState {
    Idle,
    Listening,
    Paused,
    Stopped,
}

impl CaptureState {
    fn check_start(self) -> Result<()> {
        match self {
            CaptureState::Idle | CaptureState::Stopped => Ok(()),
            state => Err(AudioError::InvalidState {
                operation: "start",
                state,
            }),
        }
    }

    fn check_pause(self) -> Result<()> {
        match self {
            CaptureState::Listening => Ok(()),
            state => Err(AudioError::InvalidState {
                operation: "pause",
                state,
            }),
        }
    }

    fn check_resume(self) -> Result<()> {
        match self {
            CaptureState::Paused => Ok(()),
            state => Err(AudioError::InvalidState {
                operation: "resume",
                state,
            }),
        }
    }
}

/// Destination for canonical-format buffers produced by a capture source.
///
/// `push` must be non-blocking; it is invoked from the driver callback.
/// Returning false signals that the consumer has gone away.
pub trait SampleSink: Send + 'static {
    fn push(&self, samples: Vec<f32>) -> bool;
}

impl SampleSink for tokio::sync::mpsc::UnboundedSender<Vec<f32>> {
    fn push(&self, samples: Vec<f32>) -> bool {
        self.send(samples).is_ok()
    }
}

impl SampleSink for crossbeam_channel::Sender<Vec<f32>> {
    fn push(&self, samples: Vec<f32>) -> bool {
        self.send(samples).is_ok()
    }
}

impl SampleSink for RingProducer {
    fn push(&self, samples: Vec<f32>) -> bool {
        let written = self.write(&samples);
        if written < samples.len() {
            // Ring full: the overflow is dropped rather than blocking the
            // driver thread.
            tracing::trace!(dropped = samples.len() - written, "ring overflow");
        }
        true
    }
}

pub trait CaptureSource {
    /// Open the hardware path and begin pushing canonical buffers to `sink`.
    /// Fails with `InvalidState` unless Idle or Stopped, or `InitFailed`
    /// when the hardware path cannot be opened.
    fn start_listening(&mut self, sink: Box<dyn SampleSink>) -> Result<()>;

    /// Keep capturing but suppress delivery. Data is dropped, not buffered.
    fn pause(&mut self) -> Result<()>;

    fn resume(&mut self) -> Result<()>;

    /// Release all hardware resources. No-op from Idle or Stopped.
    fn stop_listening(&mut self);

    fn state(&self) -> CaptureState;
}

/// Microphone capture via the default (or named) cpal input device.
pub struct MicrophoneCapture {
    device_id: Option<String>,
    inner: CaptureInner,
}

impl MicrophoneCapture {
    pub fn new(device_id: Option<String>) -> Self {
        Self {
            device_id,
            inner: CaptureInner::new(),
        }
    }
}

impl CaptureSource for MicrophoneCapture {
    fn start_listening(&mut self, sink: Box<dyn SampleSink>) -> Result<()> {
        self.inner.state.check_start()?;
        let device = open_input_device(self.device_id.as_deref(), false)?;
        self.inner.start(device, sink, "microphone")
    }

    fn pause(&mut self) -> Result<()> {
        self.inner.pause()
    }

    fn resume(&mut self) -> Result<()> {
        self.inner.resume()
    }

    fn stop_listening(&mut self) {
        self.inner.stop("microphone");
    }

    fn state(&self) -> CaptureState {
        self.inner.state
    }
}

/// System-output capture via a loopback/virtual input device.
pub struct SystemAudioCapture {
    device_id: Option<String>,
    inner: CaptureInner,
}

impl SystemAudioCapture {
    pub fn new(device_id: Option<String>) -> Self {
        Self {
            device_id,
            inner: CaptureInner::new(),
        }
    }
}

impl CaptureSource for SystemAudioCapture {
    fn start_listening(&mut self, sink: Box<dyn SampleSink>) -> Result<()> {
        self.inner.state.check_start()?;
        let device = open_input_device(self.device_id.as_deref(), true)?;
        self.inner.start(device, sink, "system audio")
    }

    fn pause(&mut self) -> Result<()> {
        self.inner.pause()
    }

    fn resume(&mut self) -> Result<()> {
        self.inner.resume()
    }

    fn stop_listening(&mut self) {
        self.inner.stop("system audio");
    }

    fn state(&self) -> CaptureState {
        self.inner.state
    }
}

struct CaptureInner {
    state: CaptureState,
    stream: Option<Stream>,
    paused: Arc<AtomicBool>,
}

impl CaptureInner {
    fn new() -> Self {
        Self {
            state: CaptureState::Idle,
            stream: None,
            paused: Arc::new(AtomicBool::new(false)),
        }
    }

    fn start(&mut self, device: Device, sink: Box<dyn SampleSink>, label: &str) -> Result<()> {
        self.paused.store(false, Ordering::SeqCst);
        let stream = build_capture_stream(&device, sink, Arc::clone(&self.paused))
            .map_err(|e| AudioError::InitFailed(format!("{label}: {e}")))?;
        self.stream = Some(stream);
        self.state = CaptureState::Listening;
        tracing::info!(source = label, "capture started");
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.state.check_pause()?;
        self.paused.store(true, Ordering::SeqCst);
        self.state = CaptureState::Paused;
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        self.state.check_resume()?;
        self.paused.store(false, Ordering::SeqCst);
        self.state = CaptureState::Listening;
        Ok(())
    }

    fn stop(&mut self, label: &str) {
        match self.state {
            CaptureState::Listening | CaptureState::Paused => {
                // Dropping the stream stops the driver callback and releases
                // the hardware path.
                self.stream = None;
                self.state = CaptureState::Stopped;
                tracing::info!(source = label, "capture stopped");
            }
            CaptureState::Idle | CaptureState::Stopped => {}
        }
    }
}

fn open_input_device(device_id: Option<&str>, prefer_virtual: bool) -> Result<Device> {
    let host = cpal::default_host();
    match device_id {
        Some(id) => host
            .input_devices()?
            .find(|d| d.name().ok().as_deref() == Some(id))
            .ok_or_else(|| AudioError::DeviceNotFound(id.to_string())),
        None if prefer_virtual => host
            .input_devices()?
            .find(|d| {
                d.name()
                    .map(|n| crate::device::is_virtual_name(&n))
                    .unwrap_or(false)
            })
            .ok_or_else(|| {
                AudioError::DeviceNotFound(
                    "no virtual loopback device found (BlackHole/Soundflower)".to_string(),
                )
            }),
        None => host
            .default_input_device()
            .ok_or_else(|| AudioError::DeviceNotFound("default".to_string())),
    }
}

fn build_capture_stream(
    device: &Device,
    sink: Box<dyn SampleSink>,
    paused: Arc<AtomicBool>,
) -> Result<Stream> {
    let config = device
        .default_input_config()
        .map_err(|e| AudioError::StreamError(format!("failed to get default config: {e}")))?;

    let sample_rate = config.sample_rate().0;
    let channels = config.channels() as usize;
    let resampler = if sample_rate != SAMPLE_RATE {
        SincResampler::new(sample_rate, SAMPLE_RATE).map(|r| Arc::new(Mutex::new(r)))
    } else {
        None
    };

    tracing::debug!(sample_rate, channels, format = ?config.sample_format(), "building capture stream");

    let stream = match config.sample_format() {
        SampleFormat::F32 => {
            let paused = Arc::clone(&paused);
            device.build_input_stream(
                &config.into(),
                move |data: &[f32], _| {
                    if paused.load(Ordering::Relaxed) {
                        return;
                    }
                    let samples = convert(data, channels, sample_rate, resampler.as_deref());
                    if !samples.is_empty() {
                        sink.push(samples);
                    }
                },
                |err| tracing::error!("capture stream error: {}", err),
                None,
            )?
        }
        SampleFormat::I16 => {
            let paused = Arc::clone(&paused);
            device.build_input_stream(
                &config.into(),
                move |data: &[i16], _| {
                    if paused.load(Ordering::Relaxed) {
                        return;
                    }
                    let float: Vec<f32> = data.iter().map(|&s| s as f32 / 32768.0).collect();
                    let samples = convert(&float, channels, sample_rate, resampler.as_deref());
                    if !samples.is_empty() {
                        sink.push(samples);
                    }
                },
                |err| tracing::error!("capture stream error: {}", err),
                None,
            )?
        }
        format => {
            return Err(AudioError::StreamError(format!(
                "unsupported sample format: {format:?}"
            )));
        }
    };

    stream
        .play()
        .map_err(|e| AudioError::StreamError(format!("failed to start stream: {e}")))?;

    Ok(stream)
}

fn convert(
    data: &[f32],
    channels: usize,
    sample_rate: u32,
    resampler: Option<&Mutex<SincResampler>>,
) -> Vec<f32> {
    match resampler {
        Some(r) => match r.lock() {
            Ok(mut r) => normalize_with_resampler(data, channels, Some(&mut r)),
            // Poisoned lock: fall back to the stateless path rather than
            // panicking on the driver thread.
            Err(_) => normalize(data, channels, sample_rate, SAMPLE_RATE).into_owned(),
        },
        None => normalize(data, channels, sample_rate, SAMPLE_RATE).into_owned(),
    }
}
