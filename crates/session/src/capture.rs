//! Capture backend seam between the coordinator and the hardware.
//!
//! cpal streams are not `Send`, so the real backend owns them on a dedicated
//! thread for the session's lifetime; tests drive the coordinator with a
//! synthetic backend instead of hardware.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use quorum_audio::{CaptureSource, MicrophoneCapture, RingProducer, SystemAudioCapture};

use crate::error::{Result, SessionError};

/// Delivery endpoints handed to a backend at session start. Mic buffers go
/// over the channel that drives session timing; system audio, when enabled,
/// is written into the mixer's ring.
pub struct CaptureChannels {
    pub mic: tokio::sync::mpsc::UnboundedSender<Vec<f32>>,
    pub system: Option<RingProducer>,
}

pub trait CaptureBackend: Send {
    /// Open the capture paths and begin delivery. Must not return until
    /// delivery is actually running or has failed.
    fn start(&mut self, channels: CaptureChannels) -> Result<()>;

    /// Stop delivery and release the hardware. Dropping the mic sender is
    /// part of the contract: it is what ends the session's feed loop.
    fn stop(&mut self);
}

/// Hardware backend over cpal input devices.
pub struct CpalBackend {
    mic_device_id: Option<String>,
    system_device_id: Option<String>,
    stop_flag: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl CpalBackend {
    pub fn new(mic_device_id: Option<String>, system_device_id: Option<String>) -> Self {
        Self {
            mic_device_id,
            system_device_id,
            stop_flag: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }
}

impl CaptureBackend for CpalBackend {
    fn start(&mut self, channels: CaptureChannels) -> Result<()> {
        if self.thread.is_some() {
            return Err(SessionError::InvalidState("start capture"));
        }
        self.stop_flag.store(false, Ordering::SeqCst);

        let stop_flag = Arc::clone(&self.stop_flag);
        let mic_id = self.mic_device_id.clone();
        let system_id = self.system_device_id.clone();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();

        let thread = std::thread::spawn(move || {
            let mut mic = MicrophoneCapture::new(mic_id);
            if let Err(e) = mic.start_listening(Box::new(channels.mic)) {
                let _ = ready_tx.send(Err(e));
                return;
            }

            let mut system = None;
            if let Some(producer) = channels.system {
                let mut source = SystemAudioCapture::new(system_id);
                if let Err(e) = source.start_listening(Box::new(producer)) {
                    mic.stop_listening();
                    let _ = ready_tx.send(Err(e));
                    return;
                }
                system = Some(source);
            }
            let _ = ready_tx.send(Ok(()));

            // Streams deliver via driver callbacks; this thread only keeps
            // them alive until asked to stop.
            while !stop_flag.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(20));
            }
            if let Some(mut source) = system {
                source.stop_listening();
            }
            mic.stop_listening();
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.thread = Some(thread);
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(SessionError::Audio(e))
            }
            Err(_) => {
                let _ = thread.join();
                Err(SessionError::InitFailed(
                    "capture thread died during startup".to_string(),
                ))
            }
        }
    }

    fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("capture thread panicked during shutdown");
            }
        }
    }
}
