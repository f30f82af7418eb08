//! Real-time mixer for the microphone reference stream and buffered system
//! audio.
//!
//! The microphone defines timing: every mic buffer pulls an equal number of
//! samples out of the system-audio ring, and any shortfall is treated as
//! silence. Clock drift between the two hardware sources is absorbed
//! entirely by the ring's elasticity; no time-stretching happens here.

use crate::ring_buffer::RingConsumer;

pub struct Mixer {
    system: Option<RingConsumer>,
    mic_gain: f32,
    system_gain: f32,
    scratch: Vec<f32>,
}

impl Mixer {
    /// Create a mixer. Pass `None` for `system` to run in mic-passthrough
    /// mode (system-audio mixing disabled).
    pub fn new(system: Option<RingConsumer>) -> Self {
        Self {
            system,
            mic_gain: 1.0,
            system_gain: 1.0,
            scratch: Vec::new(),
        }
    }

    pub fn with_gains(mut self, mic_gain: f32, system_gain: f32) -> Self {
        self.mic_gain = mic_gain;
        self.system_gain = system_gain;
        self
    }

    pub fn system_enabled(&self) -> bool {
        self.system.is_some()
    }

    /// Mix one reference buffer. With system audio enabled, each output
    /// sample is `clamp(mic * mic_gain + sys * system_gain, -1.0, 1.0)`;
    /// missing system samples read as silence. With system audio disabled,
    /// the reference passes through gain-scaled and otherwise unchanged.
    pub fn mix(&mut self, mic: &[f32]) -> Vec<f32> {
        let Some(ref system) = self.system else {
            return mic.iter().map(|&s| s * self.mic_gain).collect();
        };

        self.scratch.resize(mic.len(), 0.0);
        let read = system.read(&mut self.scratch);
        if read < mic.len() {
            tracing::trace!(
                wanted = mic.len(),
                read,
                "system audio underrun, padding with silence"
            );
        }

        mic.iter()
            .zip(self.scratch.iter())
            .map(|(&m, &s)| (m * self.mic_gain + s * self.system_gain).clamp(-1.0, 1.0))
            .collect()
    }

    /// Discard buffered system pre-roll. Called once when a new session
    /// starts so stale audio captured before the session does not leak in.
    pub fn reset(&mut self) {
        if let Some(ref system) = self.system {
            system.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring_buffer::SpscRing;

    #[test]
    fn test_passthrough_equals_gain_scaled_mic() {
        let mut mixer = Mixer::new(None).with_gains(0.5, 1.0);
        let mic = [0.2, -0.4, 0.8, -1.0];
        let out = mixer.mix(&mic);
        assert_eq!(out, vec![0.1, -0.2, 0.4, -0.5]);
    }

    #[test]
    fn test_mix_sums_both_streams() {
        let (producer, consumer) = SpscRing::split(64);
        producer.write(&[0.25, 0.25, 0.25]);

        let mut mixer = Mixer::new(Some(consumer));
        let out = mixer.mix(&[0.25, -0.5, 0.0]);
        assert_eq!(out, vec![0.5, -0.25, 0.25]);
    }

    #[test]
    fn test_output_is_clamped() {
        let (producer, consumer) = SpscRing::split(64);
        producer.write(&[0.9, -0.9]);

        let mut mixer = Mixer::new(Some(consumer));
        let out = mixer.mix(&[0.9, -0.9]);
        assert_eq!(out, vec![1.0, -1.0]);
    }

    #[test]
    fn test_underrun_reads_as_silence() {
        let (producer, consumer) = SpscRing::split(64);
        producer.write(&[0.5]);

        let mut mixer = Mixer::new(Some(consumer));
        let out = mixer.mix(&[0.1, 0.1, 0.1]);
        assert_eq!(out, vec![0.6, 0.1, 0.1]);
    }

    #[test]
    fn test_reset_discards_preroll() {
        let (producer, consumer) = SpscRing::split(64);
        producer.write(&[0.7; 10]);

        let mut mixer = Mixer::new(Some(consumer));
        mixer.reset();
        let out = mixer.mix(&[0.0, 0.0]);
        assert_eq!(out, vec![0.0, 0.0]);
    }
}
