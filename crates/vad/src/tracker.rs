//! Session-long speech segment tracking over the raw mic stream.
//!
//! Unlike the chunk gate, the tracker is never reset mid-session: it
//! accumulates a monotonically growing list of completed segments and keeps
//! the current in-progress segment observable at any time.

use crate::scorer::{EnergyScorer, SpeechScorer};
use crate::{SpeechSegment, FRAME_SAMPLES, SAMPLE_RATE, SPEECH_PROBABILITY_THRESHOLD};

/// Consecutive silence frames before an open segment is closed (512 ms).
const END_SILENCE_FRAMES: u32 = 2;

pub struct SegmentTracker<S: SpeechScorer = EnergyScorer> {
    scorer: S,
    pending: Vec<f32>,
    samples_processed: u64,
    silence_run: u32,
    current_start: Option<f64>,
    completed: Vec<SpeechSegment>,
}

impl SegmentTracker<EnergyScorer> {
    pub fn new() -> Self {
        Self::with_scorer(EnergyScorer::new())
    }
}

impl Default for SegmentTracker<EnergyScorer> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: SpeechScorer> SegmentTracker<S> {
    pub fn with_scorer(scorer: S) -> Self {
        Self {
            scorer,
            pending: Vec::with_capacity(FRAME_SAMPLES * 2),
            samples_processed: 0,
            silence_run: 0,
            current_start: None,
            completed: Vec::new(),
        }
    }

    /// Feed raw mic samples. Whole frames are scored immediately; a partial
    /// tail is carried until the next call.
    pub fn push(&mut self, samples: &[f32]) {
        self.pending.extend_from_slice(samples);
        while self.pending.len() >= FRAME_SAMPLES {
            let frame: Vec<f32> = self.pending.drain(..FRAME_SAMPLES).collect();
            self.process_frame(&frame);
        }
    }

    fn process_frame(&mut self, frame: &[f32]) {
        let frame_start = self.samples_processed as f64 / SAMPLE_RATE as f64;
        self.samples_processed += FRAME_SAMPLES as u64;

        let probability = match self.scorer.score(frame) {
            Ok(p) => p,
            Err(e) => {
                // Fail open: an unscorable frame is treated as speech so
                // real speech is never silently dropped.
                tracing::warn!("speech scoring failed, treating frame as speech: {e}");
                1.0
            }
        };

        if probability > SPEECH_PROBABILITY_THRESHOLD {
            self.silence_run = 0;
            if self.current_start.is_none() {
                tracing::debug!(start_time = frame_start, "speech segment started");
                self.current_start = Some(frame_start);
            }
        } else if self.current_start.is_some() {
            self.silence_run += 1;
            if self.silence_run >= END_SILENCE_FRAMES {
                // Close at the point silence began, not at the current frame.
                let silence_samples = self.silence_run as u64 * FRAME_SAMPLES as u64;
                let end = (self.samples_processed - silence_samples) as f64 / SAMPLE_RATE as f64;
                self.close_segment(end);
            }
        }
    }

    fn close_segment(&mut self, end_time: f64) {
        if let Some(start_time) = self.current_start.take() {
            tracing::debug!(start_time, end_time, "speech segment ended");
            self.completed.push(SpeechSegment {
                start_time,
                end_time: Some(end_time),
            });
            self.silence_run = 0;
        }
    }

    /// All segments closed so far, in order.
    pub fn completed(&self) -> &[SpeechSegment] {
        &self.completed
    }

    /// The in-progress segment, if speech is currently active.
    pub fn current(&self) -> Option<SpeechSegment> {
        self.current_start.map(|start_time| SpeechSegment {
            start_time,
            end_time: None,
        })
    }

    /// Completed segments whose close time falls within `(start, end]`.
    pub fn completed_in(&self, start: f64, end: f64) -> Vec<(f64, f64)> {
        self.completed
            .iter()
            .filter_map(|s| s.end_time.map(|e| (s.start_time, e)))
            .filter(|&(_, e)| e > start && e <= end)
            .collect()
    }

    /// Seconds of audio processed so far (whole frames only).
    pub fn processed_secs(&self) -> f64 {
        self.samples_processed as f64 / SAMPLE_RATE as f64
    }

    /// Force an open segment closed at the current processed-sample time.
    /// Call once at session stop so a trailing segment is not lost.
    pub fn finalize(&mut self) {
        let end = self.samples_processed as f64 / SAMPLE_RATE as f64;
        self.close_segment(end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Result;

    /// Scorer that replays a fixed probability per frame index.
    struct ScriptedScorer {
        probabilities: Vec<f32>,
        next: usize,
    }

    impl ScriptedScorer {
        fn new(probabilities: Vec<f32>) -> Self {
            Self {
                probabilities,
                next: 0,
            }
        }
    }

    impl SpeechScorer for ScriptedScorer {
        fn score(&mut self, _frame: &[f32]) -> Result<f32> {
            let p = self.probabilities.get(self.next).copied().unwrap_or(0.0);
            self.next += 1;
            Ok(p)
        }

        fn reset(&mut self) {
            self.next = 0;
        }
    }

    fn frames(n: usize) -> Vec<f32> {
        vec![0.0; n * FRAME_SAMPLES]
    }

    const FRAME_SECS: f64 = FRAME_SAMPLES as f64 / SAMPLE_RATE as f64;

    #[test]
    fn test_segment_opens_and_closes() {
        // speech frames 2..5, then silence long enough to close.
        let probs = vec![0.0, 0.0, 0.9, 0.9, 0.9, 0.0, 0.0, 0.0];
        let mut tracker = SegmentTracker::with_scorer(ScriptedScorer::new(probs));
        tracker.push(&frames(8));

        assert_eq!(tracker.completed().len(), 1);
        let seg = tracker.completed()[0];
        assert!((seg.start_time - 2.0 * FRAME_SECS).abs() < 1e-9);
        assert!((seg.end_time.unwrap() - 5.0 * FRAME_SECS).abs() < 1e-9);
        assert!(tracker.current().is_none());
    }

    #[test]
    fn test_single_silence_frame_does_not_close() {
        let probs = vec![0.9, 0.0, 0.9, 0.9];
        let mut tracker = SegmentTracker::with_scorer(ScriptedScorer::new(probs));
        tracker.push(&frames(4));

        assert!(tracker.completed().is_empty());
        assert!(tracker.current().is_some());
    }

    #[test]
    fn test_current_reports_open_segment() {
        let probs = vec![0.0, 0.9, 0.9];
        let mut tracker = SegmentTracker::with_scorer(ScriptedScorer::new(probs));
        tracker.push(&frames(3));

        let current = tracker.current().expect("segment should be open");
        assert!((current.start_time - FRAME_SECS).abs() < 1e-9);
        assert_eq!(current.end_time, None);
    }

    #[test]
    fn test_finalize_closes_open_segment() {
        let probs = vec![0.9, 0.9, 0.9];
        let mut tracker = SegmentTracker::with_scorer(ScriptedScorer::new(probs));
        tracker.push(&frames(3));
        tracker.finalize();

        assert!(tracker.current().is_none());
        assert_eq!(tracker.completed().len(), 1);
        let seg = tracker.completed()[0];
        assert!((seg.end_time.unwrap() - 3.0 * FRAME_SECS).abs() < 1e-9);
    }

    #[test]
    fn test_finalize_without_open_segment_is_noop() {
        let mut tracker = SegmentTracker::with_scorer(ScriptedScorer::new(vec![0.0; 4]));
        tracker.push(&frames(4));
        tracker.finalize();
        assert!(tracker.completed().is_empty());
    }

    #[test]
    fn test_completed_in_filters_by_close_time() {
        // Two segments: one closing around frame 4, one around frame 9.
        let probs = vec![0.9, 0.9, 0.0, 0.0, 0.9, 0.9, 0.9, 0.0, 0.0, 0.0];
        let mut tracker = SegmentTracker::with_scorer(ScriptedScorer::new(probs));
        tracker.push(&frames(10));
        assert_eq!(tracker.completed().len(), 2);

        let first_close = 2.0 * FRAME_SECS;
        let in_first_window = tracker.completed_in(0.0, first_close + 0.01);
        assert_eq!(in_first_window.len(), 1);

        let all = tracker.completed_in(0.0, 10.0 * FRAME_SECS);
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_partial_frames_carried_across_pushes() {
        let probs = vec![0.9; 4];
        let mut tracker = SegmentTracker::with_scorer(ScriptedScorer::new(probs));
        // Push one frame's worth of samples split over uneven batches.
        tracker.push(&vec![0.0; FRAME_SAMPLES / 2]);
        assert!(tracker.current().is_none());
        tracker.push(&vec![0.0; FRAME_SAMPLES / 2 + 10]);
        assert!(tracker.current().is_some());
    }
}
