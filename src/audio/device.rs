//! The [`AudioDevice`] collaborator interface.
//!
//! A device is opened by a [`Backend`](crate::session::Backend) and owned by
//! a [`Session`](crate::session::Session).  While a runner is active the
//! capture thread is the only caller.  Closing the device is `Drop`.
//!
//! [`MockAudioDevice`] (available under `#[cfg(test)]`) plays back a scripted
//! list of reads so the runner can be tested without a microphone.

use thiserror::Error;

// ---------------------------------------------------------------------------
// AudioError
// ---------------------------------------------------------------------------

/// Errors raised while opening or driving an audio input device.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("input device '{0}' not found")]
    DeviceNotFound(String),

    #[error("failed to enumerate input devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("failed to pause audio stream: {0}")]
    PauseStream(#[from] cpal::PauseStreamError),

    /// The stream reported an error after it was started.
    #[error("audio stream error: {0}")]
    Stream(String),

    #[error("device is not recording")]
    NotRecording,

    /// The thread owning the stream is gone.
    #[error("audio stream thread disconnected")]
    Disconnected,

    #[error("failed to spawn audio stream thread: {0}")]
    Spawn(String),
}

// ---------------------------------------------------------------------------
// AudioDevice trait
// ---------------------------------------------------------------------------

/// A recording device delivering mono 16-bit PCM at the rate it was opened
/// with.
pub trait AudioDevice: Send {
    /// Begin capturing.  Samples captured before this call are discarded.
    fn start_recording(&mut self) -> Result<(), AudioError>;

    /// Stop capturing.
    fn stop_recording(&mut self) -> Result<(), AudioError>;

    /// Fill `buf` with up to `buf.len()` frames, blocking for at most the
    /// device's read timeout.
    ///
    /// `Ok(0)` means nothing arrived before the timeout; it is not an error.
    fn read(&mut self, buf: &mut [i16]) -> Result<usize, AudioError>;
}

// Compile-time assertion: Box<dyn AudioDevice> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn AudioDevice>) {}
};

// ---------------------------------------------------------------------------
// MockAudioDevice  (test-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
pub use mock::{DeviceProbe, MockAudioDevice, MockRead};


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn mock_reads_follow_the_script() {
        let mut device = MockAudioDevice::new(vec![
            MockRead::Frames(vec![1, 2, 3]),
            MockRead::Fail,
        ]);
        let mut buf = [0i16; 8];

        device.start_recording().unwrap();
        assert_eq!(device.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);
        assert!(device.read(&mut buf).is_err());
        // Exhausted script behaves like a timeout.
        assert_eq!(device.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn mock_read_truncates_to_buffer() {
        let mut device = MockAudioDevice::new(vec![MockRead::Frames(vec![7; 10])]);
        let mut buf = [0i16; 4];
        device.start_recording().unwrap();
        assert_eq!(device.read(&mut buf).unwrap(), 4);
    }

    #[test]
    fn mock_read_without_recording_fails() {
        let mut device = MockAudioDevice::silent();
        let mut buf = [0i16; 4];
        assert!(matches!(device.read(&mut buf), Err(AudioError::NotRecording)));
    }

    #[test]
    fn counters_track_live_recordings_and_drop() {
        let device = MockAudioDevice::silent();
        let probe = device.probe();
        let mut boxed: Box<dyn AudioDevice> = Box::new(device);

        boxed.start_recording().unwrap();
        assert_eq!(probe.live.load(Ordering::SeqCst), 1);
        boxed.stop_recording().unwrap();
        assert_eq!(probe.live.load(Ordering::SeqCst), 0);
        assert_eq!(probe.max_live.load(Ordering::SeqCst), 1);

        drop(boxed);
        assert!(probe.dropped.load(Ordering::SeqCst));
    }

    #[test]
    fn audio_error_display() {
        let e = AudioError::DeviceNotFound("USB Mic".into());
        assert!(e.to_string().contains("USB Mic"));
    }
}
