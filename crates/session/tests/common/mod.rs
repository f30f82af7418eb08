#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use quorum_diarization::{DiarizationResult, Diarizer, SpeakerSegment};
use quorum_session::{CaptureBackend, CaptureChannels};
use quorum_stt::{SttError, Transcriber, TranscriptionSegment};

pub const SAMPLE_RATE: usize = 16000;

pub fn tone(secs: f64) -> Vec<f32> {
    let n = (secs * SAMPLE_RATE as f64).round() as usize;
    (0..n).map(|i| 0.5 * (i as f32 * 0.3).sin()).collect()
}

pub fn silence(secs: f64) -> Vec<f32> {
    vec![0.0; (secs * SAMPLE_RATE as f64).round() as usize]
}

/// Records every call; optionally sleeps to simulate slow inference. With
/// jitter on, the delay varies per call so chunk work overlaps differently
/// at each index without any real randomness.
pub struct MockTranscriber {
    pub started: AtomicUsize,
    pub completed: AtomicUsize,
    /// (samples, start_time, end_time) per call, in call order.
    pub calls: Mutex<Vec<(usize, f64, f64)>>,
    delay: Duration,
    jitter: bool,
    segments: Mutex<Vec<TranscriptionSegment>>,
}

impl MockTranscriber {
    pub fn new() -> Self {
        Self {
            started: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
            jitter: false,
            segments: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }

    pub fn with_jitter() -> Self {
        Self {
            jitter: true,
            ..Self::new()
        }
    }
}

impl Transcriber for MockTranscriber {
    fn initialize(&self) -> quorum_stt::Result<()> {
        Ok(())
    }

    fn process_segment(
        &self,
        samples: &[f32],
        start_time: f64,
        end_time: f64,
    ) -> quorum_stt::Result<TranscriptionSegment> {
        let n = self.started.fetch_add(1, Ordering::SeqCst);
        if self.jitter {
            std::thread::sleep(Duration::from_millis(((n * 37 + 13) % 50) as u64));
        } else if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let segment = TranscriptionSegment {
            text: format!("segment {n}"),
            start_time,
            end_time,
            confidence: 0.9,
            is_final: true,
        };
        self.calls
            .lock()
            .unwrap()
            .push((samples.len(), start_time, end_time));
        self.segments.lock().unwrap().push(segment.clone());
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(segment)
    }

    fn reset(&self) {
        self.segments.lock().unwrap().clear();
    }

    fn finalize(&self) -> Vec<TranscriptionSegment> {
        self.segments.lock().unwrap().clone()
    }

    fn transcriptions(&self) -> Vec<TranscriptionSegment> {
        self.segments.lock().unwrap().clone()
    }
}

/// Always fails segment processing; used to exercise the error channel.
pub struct FailingTranscriber;

impl Transcriber for FailingTranscriber {
    fn initialize(&self) -> quorum_stt::Result<()> {
        Ok(())
    }

    fn process_segment(
        &self,
        _samples: &[f32],
        _start_time: f64,
        _end_time: f64,
    ) -> quorum_stt::Result<TranscriptionSegment> {
        Err(SttError::ProcessFailed("engine fell over".to_string()))
    }

    fn reset(&self) {}

    fn finalize(&self) -> Vec<TranscriptionSegment> {
        Vec::new()
    }

    fn transcriptions(&self) -> Vec<TranscriptionSegment> {
        Vec::new()
    }
}

/// Enforces the real engine's minimum-duration requirement against the
/// sample count it is handed, so padding behavior is observable.
pub struct MockDiarizer {
    pub calls: Mutex<Vec<(usize, f64, f64)>>,
}

impl MockDiarizer {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl Diarizer for MockDiarizer {
    fn initialize(&self) -> quorum_diarization::Result<()> {
        Ok(())
    }

    fn process_segment(
        &self,
        samples: &[f32],
        start_time: f64,
        end_time: f64,
    ) -> quorum_diarization::Result<Vec<SpeakerSegment>> {
        self.calls
            .lock()
            .unwrap()
            .push((samples.len(), start_time, end_time));
        let min_samples =
            (quorum_diarization::MIN_SEGMENT_SECS * SAMPLE_RATE as f64).round() as usize;
        if samples.len() < min_samples {
            return Err(quorum_diarization::DiarizationError::AudioTooShort {
                duration_secs: samples.len() as f64 / SAMPLE_RATE as f64,
            });
        }
        Ok(vec![SpeakerSegment {
            speaker_id: "speaker_0".to_string(),
            start_time,
            end_time,
            confidence: 0.8,
        }])
    }

    fn process_file(&self, _path: &std::path::Path) -> quorum_diarization::Result<DiarizationResult> {
        Ok(DiarizationResult::default())
    }

    fn reset(&self) {}

    fn finalize(&self) -> Vec<SpeakerSegment> {
        Vec::new()
    }
}

/// Replays a fixed sample script over the mic channel from its own thread,
/// in small batches, the way a driver callback would.
pub struct SyntheticBackend {
    script: Vec<f32>,
    batch: usize,
    stop: Arc<std::sync::atomic::AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl SyntheticBackend {
    pub fn new(script: Vec<f32>) -> Self {
        Self {
            script,
            batch: 1600,
            stop: Arc::new(std::sync::atomic::AtomicBool::new(false)),
            thread: None,
        }
    }
}

impl CaptureBackend for SyntheticBackend {
    fn start(&mut self, channels: CaptureChannels) -> quorum_session::Result<()> {
        let script = self.script.clone();
        let batch = self.batch;
        let stop = Arc::clone(&self.stop);
        self.thread = Some(std::thread::spawn(move || {
            let mic = channels.mic;
            for chunk in script.chunks(batch) {
                if stop.load(Ordering::SeqCst) {
                    break;
                }
                if mic.send(chunk.to_vec()).is_err() {
                    break;
                }
                std::thread::sleep(Duration::from_micros(200));
            }
            // The sender drops here, which ends the session's feed loop.
        }));
        Ok(())
    }

    fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Backend whose start always fails, for exercising the error state.
pub struct FailingBackend;

impl CaptureBackend for FailingBackend {
    fn start(&mut self, _channels: CaptureChannels) -> quorum_session::Result<()> {
        Err(quorum_session::SessionError::InitFailed(
            "no capture hardware".to_string(),
        ))
    }

    fn stop(&mut self) {}
}
