//! Chunked analysis pipeline.
//!
//! Mixed audio accumulates until a whole chunk is available, then the chunk
//! is dispatched onto a task chained behind the previous chunk's task, so
//! results always resolve in index order no matter how long each analysis
//! takes. Within one chunk, transcription and diarization run concurrently.
//!
//! Cancellation is cooperative: a cancelled pipeline stops dispatching and
//! suppresses emission, but in-flight engine calls are always awaited to
//! completion because the native inference they wrap cannot be interrupted
//! safely.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use quorum_audio::SAMPLE_RATE;
use quorum_diarization::{Diarizer, SpeakerSegment};
use quorum_stt::{Transcriber, TranscriptionSegment};
use quorum_vad::{ChunkGate, SegmentTracker};

use crate::config::SessionConfig;
use crate::error::ErrorCode;
use crate::types::{ChunkResult, SessionEvent};

/// Remainders shorter than this are discarded at drain time.
const MIN_REMAINDER_SECS: f64 = 1.0;

pub struct ChunkPipeline {
    accumulator: Vec<f32>,
    chunk_samples: usize,
    min_chunk_samples: usize,
    chunk_duration_secs: f64,
    next_index: u32,
    /// Session time covered by chunks dispatched so far, seconds.
    cursor_secs: f64,
    finished: bool,
    /// Tail of the task chain; each new chunk task awaits this first.
    chain: Option<JoinHandle<()>>,
    shared: Arc<PipelineShared>,
}

struct PipelineShared {
    transcriber: Option<Arc<dyn Transcriber>>,
    diarizer: Option<Arc<dyn Diarizer>>,
    tracker: Arc<Mutex<SegmentTracker>>,
    events: mpsc::UnboundedSender<SessionEvent>,
    cancelled: Arc<AtomicBool>,
    transcriptions: Mutex<Vec<TranscriptionSegment>>,
    speaker_segments: Mutex<Vec<SpeakerSegment>>,
}

impl ChunkPipeline {
    pub fn new(
        config: &SessionConfig,
        transcriber: Option<Arc<dyn Transcriber>>,
        diarizer: Option<Arc<dyn Diarizer>>,
        tracker: Arc<Mutex<SegmentTracker>>,
        events: mpsc::UnboundedSender<SessionEvent>,
        cancelled: Arc<AtomicBool>,
    ) -> Self {
        Self {
            accumulator: Vec::new(),
            chunk_samples: (config.chunk_duration_secs * SAMPLE_RATE as f64).round() as usize,
            min_chunk_samples: (config.min_chunk_duration_secs * SAMPLE_RATE as f64).round()
                as usize,
            chunk_duration_secs: config.chunk_duration_secs,
            next_index: 0,
            cursor_secs: 0.0,
            finished: false,
            chain: None,
            shared: Arc::new(PipelineShared {
                transcriber,
                diarizer,
                tracker,
                events,
                cancelled,
                transcriptions: Mutex::new(Vec::new()),
                speaker_segments: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Feed mixed audio. Every time a whole chunk accumulates it is
    /// dispatched immediately; a partial tail is carried.
    pub fn push_samples(&mut self, samples: &[f32]) {
        if self.finished || self.shared.cancelled.load(Ordering::SeqCst) {
            return;
        }
        self.accumulator.extend_from_slice(samples);
        while self.accumulator.len() >= self.chunk_samples {
            let chunk: Vec<f32> = self.accumulator.drain(..self.chunk_samples).collect();
            let start = self.cursor_secs;
            self.cursor_secs += self.chunk_duration_secs;
            self.dispatch(chunk, start, self.cursor_secs, false);
        }
    }

    fn dispatch(&mut self, samples: Vec<f32>, start: f64, end: f64, is_final: bool) {
        let index = self.next_index;
        self.next_index += 1;

        let prev = self.chain.take();
        let shared = Arc::clone(&self.shared);
        self.chain = Some(tokio::spawn(async move {
            if let Some(prev) = prev {
                if let Err(e) = prev.await {
                    tracing::error!(index, "previous chunk task failed: {e}");
                }
            }
            process_chunk(shared, index, samples, start, end, is_final).await;
        }));
    }

    /// Flush on a clean stop: dispatch any remaining whole chunks and the
    /// remainder (discarded below one second, zero-padded to the diarizer
    /// minimum when diarization is on), then wait for the chain to resolve.
    /// If no remainder was worth analyzing, a synthetic zero-length final
    /// marker is emitted so consumers always see `is_final_chunk`.
    pub async fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;

        while self.accumulator.len() >= self.chunk_samples {
            let chunk: Vec<f32> = self.accumulator.drain(..self.chunk_samples).collect();
            let start = self.cursor_secs;
            self.cursor_secs += self.chunk_duration_secs;
            self.dispatch(chunk, start, self.cursor_secs, false);
        }

        let remainder_secs = self.accumulator.len() as f64 / SAMPLE_RATE as f64;
        let mut final_dispatched = false;
        if !self.accumulator.is_empty() {
            if remainder_secs < MIN_REMAINDER_SECS {
                tracing::debug!(remainder_secs, "discarding sub-second remainder");
                self.accumulator.clear();
            } else {
                let mut chunk: Vec<f32> = std::mem::take(&mut self.accumulator);
                if chunk.len() < self.min_chunk_samples && self.shared.diarizer.is_some() {
                    tracing::debug!(
                        from = chunk.len(),
                        to = self.min_chunk_samples,
                        "zero-padding final chunk to diarizer minimum"
                    );
                    chunk.resize(self.min_chunk_samples, 0.0);
                }
                let start = self.cursor_secs;
                // Timing reflects the real audio, not the padding.
                self.cursor_secs += remainder_secs;
                self.dispatch(chunk, start, self.cursor_secs, true);
                final_dispatched = true;
            }
        }

        if let Some(chain) = self.chain.take() {
            if let Err(e) = chain.await {
                tracing::error!("chunk chain failed during drain: {e}");
            }
        }

        if !final_dispatched && !self.shared.cancelled.load(Ordering::SeqCst) {
            let index = self.next_index;
            self.next_index += 1;
            let marker = ChunkResult {
                index,
                start_time: self.cursor_secs,
                end_time: self.cursor_secs,
                mic_speech_segments: Vec::new(),
                transcription: None,
                speaker_segments: Vec::new(),
                is_final_chunk: true,
            };
            let _ = self.shared.events.send(SessionEvent::Chunk(marker));
        }
    }

    /// Tear down without analyzing buffered audio. In-flight chunk tasks are
    /// awaited, never aborted; their results are suppressed and accumulated
    /// results discarded.
    pub async fn cancel(&mut self) {
        self.finished = true;
        self.shared.cancelled.store(true, Ordering::SeqCst);
        self.accumulator.clear();

        if let Some(chain) = self.chain.take() {
            if let Err(e) = chain.await {
                tracing::error!("chunk chain failed during cancel: {e}");
            }
        }

        self.lock_transcriptions().clear();
        self.lock_speakers().clear();
    }

    /// Drain everything accumulated across the session so far.
    pub fn take_results(&mut self) -> (Vec<TranscriptionSegment>, Vec<SpeakerSegment>) {
        let transcriptions = std::mem::take(&mut *self.lock_transcriptions());
        let speakers = std::mem::take(&mut *self.lock_speakers());
        (transcriptions, speakers)
    }

    pub fn chunks_dispatched(&self) -> u32 {
        self.next_index
    }

    fn lock_transcriptions(&self) -> std::sync::MutexGuard<'_, Vec<TranscriptionSegment>> {
        self.shared
            .transcriptions
            .lock()
            .expect("transcription results mutex poisoned")
    }

    fn lock_speakers(&self) -> std::sync::MutexGuard<'_, Vec<SpeakerSegment>> {
        self.shared
            .speaker_segments
            .lock()
            .expect("speaker results mutex poisoned")
    }
}

async fn process_chunk(
    shared: Arc<PipelineShared>,
    index: u32,
    samples: Vec<f32>,
    start: f64,
    end: f64,
    is_final: bool,
) {
    if shared.cancelled.load(Ordering::SeqCst) {
        tracing::debug!(index, "chunk skipped, session cancelled");
        return;
    }

    // Each chunk gets a fresh gate pass so one chunk's scoring state never
    // bleeds into the next.
    let decision = ChunkGate::new().evaluate(&samples);
    if !decision.accepted && !is_final {
        tracing::debug!(
            index,
            speech_fraction = decision.speech_fraction,
            "chunk rejected by speech gate"
        );
        return;
    }

    let mut transcription = None;
    let mut speakers = Vec::new();
    if decision.accepted {
        let samples = Arc::new(samples);
        let transcribe = run_transcription(&shared, Arc::clone(&samples), index, start, end);
        let diarize = run_diarization(&shared, samples, index, start, end);
        let (t, d) = tokio::join!(transcribe, diarize);
        transcription = t;
        speakers = d;
    }

    let mic_speech_segments = shared
        .tracker
        .lock()
        .map(|tracker| tracker.completed_in(start, end))
        .unwrap_or_default();

    // Re-check after the (possibly long) engine calls: a cancel that landed
    // mid-analysis waits for us but must not observe our output.
    if shared.cancelled.load(Ordering::SeqCst) {
        tracing::debug!(index, "chunk result suppressed, session cancelled");
        return;
    }

    if let Some(segment) = &transcription {
        shared
            .transcriptions
            .lock()
            .expect("transcription results mutex poisoned")
            .push(segment.clone());
    }
    shared
        .speaker_segments
        .lock()
        .expect("speaker results mutex poisoned")
        .extend(speakers.iter().cloned());

    tracing::debug!(
        index,
        start,
        end,
        is_final,
        speakers = speakers.len(),
        "chunk resolved"
    );
    let _ = shared.events.send(SessionEvent::Chunk(ChunkResult {
        index,
        start_time: start,
        end_time: end,
        mic_speech_segments,
        transcription,
        speaker_segments: speakers,
        is_final_chunk: is_final,
    }));
}

async fn run_transcription(
    shared: &PipelineShared,
    samples: Arc<Vec<f32>>,
    index: u32,
    start: f64,
    end: f64,
) -> Option<TranscriptionSegment> {
    let transcriber = Arc::clone(shared.transcriber.as_ref()?);
    let result =
        tokio::task::spawn_blocking(move || transcriber.process_segment(&samples, start, end))
            .await;
    match result {
        Ok(Ok(segment)) => Some(segment),
        Ok(Err(e)) => {
            tracing::warn!(index, "transcription failed: {e}");
            let _ = shared.events.send(SessionEvent::Error {
                code: ErrorCode::Transcription,
                message: e.to_string(),
            });
            None
        }
        Err(e) => {
            tracing::error!(index, "transcription task panicked: {e}");
            let _ = shared.events.send(SessionEvent::Error {
                code: ErrorCode::Transcription,
                message: e.to_string(),
            });
            None
        }
    }
}

async fn run_diarization(
    shared: &PipelineShared,
    samples: Arc<Vec<f32>>,
    index: u32,
    start: f64,
    end: f64,
) -> Vec<SpeakerSegment> {
    let Some(diarizer) = shared.diarizer.as_ref().map(Arc::clone) else {
        return Vec::new();
    };
    let result =
        tokio::task::spawn_blocking(move || diarizer.process_segment(&samples, start, end)).await;
    match result {
        Ok(Ok(segments)) => segments,
        Ok(Err(e)) => {
            tracing::warn!(index, "diarization failed: {e}");
            let _ = shared.events.send(SessionEvent::Error {
                code: ErrorCode::Diarization,
                message: e.to_string(),
            });
            Vec::new()
        }
        Err(e) => {
            tracing::error!(index, "diarization task panicked: {e}");
            let _ = shared.events.send(SessionEvent::Error {
                code: ErrorCode::Diarization,
                message: e.to_string(),
            });
            Vec::new()
        }
    }
}
