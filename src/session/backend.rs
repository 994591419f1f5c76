//! Factories for the native handles a [`Session`](super::Session) owns.

use std::time::Duration;

use crate::audio::{AudioDevice, AudioError, CpalAudioDevice, DEFAULT_READ_TIMEOUT};
use crate::stt::{EngineConfig, SpeechEngine, SttError, WhisperKeywordEngine};

/// The device ring holds this many reads' worth of audio.
pub const RING_READS: usize = 8;

/// Opens audio devices and speech engines.
///
/// A session calls `open_audio` first and only calls `open_engine` when the
/// device opened; the returned boxes are released by `Drop`.
pub trait Backend: Send + Sync {
    fn open_audio(
        &self,
        device_name: Option<&str>,
        sample_rate: u32,
        capture_buffer_size: usize,
    ) -> Result<Box<dyn AudioDevice>, AudioError>;

    fn open_engine(&self, config: &EngineConfig) -> Result<Box<dyn SpeechEngine>, SttError>;
}

/// [`Backend`] using cpal for capture and whisper for decoding.
#[derive(Debug, Clone)]
pub struct DefaultBackend {
    read_timeout: Duration,
}

impl DefaultBackend {
    pub fn new(read_timeout: Duration) -> Self {
        Self { read_timeout }
    }
}

impl Default for DefaultBackend {
    fn default() -> Self {
        Self::new(DEFAULT_READ_TIMEOUT)
    }
}

impl Backend for DefaultBackend {
    fn open_audio(
        &self,
        device_name: Option<&str>,
        sample_rate: u32,
        capture_buffer_size: usize,
    ) -> Result<Box<dyn AudioDevice>, AudioError> {
        let ring_frames = capture_buffer_size.saturating_mul(RING_READS);
        let device = CpalAudioDevice::open(device_name, sample_rate, ring_frames, self.read_timeout)?;
        Ok(Box::new(device))
    }

    fn open_engine(&self, config: &EngineConfig) -> Result<Box<dyn SpeechEngine>, SttError> {
        Ok(Box::new(WhisperKeywordEngine::open(config)?))
    }
}

// ---------------------------------------------------------------------------
// MockBackend  (test-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
pub use mock::MockBackend;
