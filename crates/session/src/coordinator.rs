//! Session lifecycle coordinator.
//!
//! One coordinator owns the capture backend, the analysis engines, and at
//! most one active session. A session runs a single feed loop: every mic
//! buffer is mixed with buffered system audio, appended to the WAV sink,
//! scored by the mic segment tracker, and fed to the chunk pipeline. The
//! loop ends when the backend drops the mic sender.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use quorum_audio::{Mixer, SpscRing, WavSink, SAMPLE_RATE};
use quorum_diarization::Diarizer;
use quorum_stt::Transcriber;
use quorum_vad::SegmentTracker;

use crate::capture::{CaptureBackend, CaptureChannels};
use crate::config::SessionConfig;
use crate::error::{ErrorCode, Result, SessionError};
use crate::pipeline::ChunkPipeline;
use crate::types::{SessionEvent, SessionResult};

/// Elasticity of the system-audio ring; absorbs clock drift between the two
/// capture devices.
const SYSTEM_RING_SECS: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    Preparing,
    Recording,
    Stopping,
    /// A fatal failure was recorded; the next lifecycle call observes it and
    /// the coordinator returns to `Idle`.
    Error(String),
}

/// Returned by a successful start: the live event stream plus enough to
/// identify the session.
#[derive(Debug)]
pub struct SessionStart {
    pub session_id: Uuid,
    pub output_path: PathBuf,
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
}

pub struct SessionCoordinator {
    state: SessionState,
    backend: Box<dyn CaptureBackend>,
    transcriber: Option<Arc<dyn Transcriber>>,
    diarizer: Option<Arc<dyn Diarizer>>,
    output_dir: PathBuf,
    active: Option<ActiveSession>,
}

struct ActiveSession {
    session_id: Uuid,
    cancelled: Arc<AtomicBool>,
    feed: JoinHandle<FeedOutcome>,
    tracker: Arc<Mutex<SegmentTracker>>,
}

/// What the feed loop hands back once the mic stream closes.
struct FeedOutcome {
    pipeline: ChunkPipeline,
    sink: WavSink,
    io_error: Option<String>,
}

impl SessionCoordinator {
    pub fn new(backend: Box<dyn CaptureBackend>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            state: SessionState::Idle,
            backend,
            transcriber: None,
            diarizer: None,
            output_dir: output_dir.into(),
            active: None,
        }
    }

    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    pub fn with_diarizer(mut self, diarizer: Arc<dyn Diarizer>) -> Self {
        self.diarizer = Some(diarizer);
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Begin a new session. Must be called from within a Tokio runtime.
    ///
    /// Fails with `AlreadyInProgress` unless idle. Any preparation failure
    /// (engine init, output file, capture start) aborts the whole start and
    /// leaves nothing running.
    pub fn start(&mut self, config: SessionConfig) -> Result<SessionStart> {
        self.observe_error();
        if self.state != SessionState::Idle {
            return Err(SessionError::AlreadyInProgress);
        }
        config.validate()?;

        self.state = SessionState::Preparing;
        match self.prepare(&config) {
            Ok(start) => {
                tracing::info!(session_id = %start.session_id, "session recording");
                self.state = SessionState::Recording;
                Ok(start)
            }
            Err(e) => {
                tracing::error!("session start failed: {e}");
                self.state = SessionState::Error(e.to_string());
                Err(e)
            }
        }
    }

    fn prepare(&mut self, config: &SessionConfig) -> Result<SessionStart> {
        let session_id = Uuid::new_v4();
        std::fs::create_dir_all(&self.output_dir)?;
        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let output_path = self.output_dir.join(format!("session_{timestamp}.wav"));

        let transcriber = self.engine_for(config.enable_transcription, &self.transcriber);
        if let Some(transcriber) = &transcriber {
            transcriber
                .initialize()
                .map_err(|e| SessionError::InitFailed(e.to_string()))?;
            transcriber.reset();
        }
        let diarizer = self.engine_for(config.enable_diarization, &self.diarizer);
        if let Some(diarizer) = &diarizer {
            diarizer
                .initialize()
                .map_err(|e| SessionError::InitFailed(e.to_string()))?;
            // Speaker identities restart per session.
            diarizer.reset();
        }

        let sink = WavSink::create(&output_path)?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let cancelled = Arc::new(AtomicBool::new(false));
        let tracker = Arc::new(Mutex::new(SegmentTracker::new()));

        let (mic_tx, mic_rx) = mpsc::unbounded_channel::<Vec<f32>>();
        let (system_producer, system_consumer) = if config.enable_system_audio {
            let (producer, consumer) = SpscRing::split(SAMPLE_RATE as usize * SYSTEM_RING_SECS);
            (Some(producer), Some(consumer))
        } else {
            (None, None)
        };
        let mut mixer = Mixer::new(system_consumer);

        self.backend.start(CaptureChannels {
            mic: mic_tx,
            system: system_producer,
        })?;
        // Discard system audio buffered while capture was spinning up.
        mixer.reset();

        let pipeline = ChunkPipeline::new(
            config,
            transcriber,
            diarizer,
            Arc::clone(&tracker),
            events_tx.clone(),
            Arc::clone(&cancelled),
        );
        let feed = tokio::spawn(feed_loop(
            mic_rx,
            mixer,
            sink,
            Arc::clone(&tracker),
            pipeline,
            events_tx,
        ));

        self.active = Some(ActiveSession {
            session_id,
            cancelled,
            feed,
            tracker,
        });
        Ok(SessionStart {
            session_id,
            output_path,
            events: events_rx,
        })
    }

    fn engine_for<E: ?Sized>(&self, enabled: bool, engine: &Option<Arc<E>>) -> Option<Arc<E>> {
        if !enabled {
            return None;
        }
        if engine.is_none() {
            tracing::warn!("analysis stage enabled but no engine installed, skipping");
        }
        engine.clone()
    }

    /// Stop cleanly: capture ends, buffered audio drains through the
    /// pipeline (including the final remainder), and the aggregate result
    /// comes back.
    pub async fn stop(&mut self) -> Result<SessionResult> {
        self.observe_error();
        if self.state != SessionState::Recording {
            return Err(SessionError::InvalidState("stop"));
        }
        let active = self
            .active
            .take()
            .ok_or(SessionError::InvalidState("stop"))?;
        self.state = SessionState::Stopping;
        tracing::info!(session_id = %active.session_id, "stopping session");

        self.backend.stop();
        let outcome = match active.feed.await {
            Ok(outcome) => outcome,
            Err(e) => {
                let message = format!("feed task failed: {e}");
                self.state = SessionState::Error(message.clone());
                return Err(SessionError::Internal(message));
            }
        };
        let FeedOutcome {
            mut pipeline,
            sink,
            io_error,
        } = outcome;

        // Close a trailing open mic segment so the final chunk reports it.
        if let Ok(mut tracker) = active.tracker.lock() {
            tracker.finalize();
        }

        if let Some(message) = io_error {
            pipeline.cancel().await;
            let _ = sink.finalize();
            self.state = SessionState::Error(message.clone());
            return Err(SessionError::FileIo(message));
        }

        pipeline.finish().await;
        let (transcriptions, speaker_segments) = pipeline.take_results();
        let duration_secs = sink.duration_secs();
        let output_path = match sink.finalize() {
            Ok(path) => path,
            Err(e) => {
                self.state = SessionState::Error(e.to_string());
                return Err(e.into());
            }
        };

        self.state = SessionState::Idle;
        tracing::info!(
            session_id = %active.session_id,
            duration_secs,
            transcriptions = transcriptions.len(),
            "session stopped"
        );
        Ok(SessionResult {
            session_id: active.session_id,
            transcriptions,
            speaker_segments,
            duration_secs,
            output_path,
        })
    }

    /// Abandon the session without analyzing buffered audio. In-flight
    /// chunk work is awaited, never aborted; its results are discarded.
    /// A no-op when idle.
    pub async fn cancel(&mut self) -> Result<()> {
        self.observe_error();
        match self.state {
            SessionState::Idle => return Ok(()),
            SessionState::Recording => {}
            _ => return Err(SessionError::InvalidState("cancel")),
        }
        let active = self
            .active
            .take()
            .ok_or(SessionError::InvalidState("cancel"))?;
        self.state = SessionState::Stopping;
        tracing::info!(session_id = %active.session_id, "cancelling session");

        // Suppress dispatch and emission before anything else winds down.
        active.cancelled.store(true, Ordering::SeqCst);
        self.backend.stop();
        match active.feed.await {
            Ok(FeedOutcome {
                mut pipeline, sink, ..
            }) => {
                pipeline.cancel().await;
                if let Err(e) = sink.finalize() {
                    tracing::warn!("finalizing cancelled session file failed: {e}");
                }
            }
            Err(e) => tracing::error!("feed task failed during cancel: {e}"),
        }

        self.state = SessionState::Idle;
        Ok(())
    }

    /// A recorded fatal error has been surfaced once the next lifecycle
    /// call runs; fold back to idle.
    fn observe_error(&mut self) {
        if matches!(self.state, SessionState::Error(_)) {
            self.state = SessionState::Idle;
        }
    }
}

async fn feed_loop(
    mut mic_rx: mpsc::UnboundedReceiver<Vec<f32>>,
    mut mixer: Mixer,
    mut sink: WavSink,
    tracker: Arc<Mutex<SegmentTracker>>,
    mut pipeline: ChunkPipeline,
    events: mpsc::UnboundedSender<SessionEvent>,
) -> FeedOutcome {
    let mut io_error = None;
    while let Some(mic) = mic_rx.recv().await {
        let mixed = mixer.mix(&mic);
        if let Err(e) = sink.write(&mixed) {
            tracing::error!("session file write failed, tearing down: {e}");
            let _ = events.send(SessionEvent::Error {
                code: ErrorCode::FileIo,
                message: e.to_string(),
            });
            io_error = Some(e.to_string());
            break;
        }
        // The tracker sees the raw mic stream; the pipeline sees the mix.
        if let Ok(mut tracker) = tracker.lock() {
            tracker.push(&mic);
        }
        pipeline.push_samples(&mixed);
    }
    FeedOutcome {
        pipeline,
        sink,
        io_error,
    }
}
