//! Audio input: the [`AudioDevice`] interface and its cpal implementation.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → downmix_to_mono → resample_linear → f32_to_i16
//!           → RingBuffer<i16> ──(condvar)──▶ CpalAudioDevice::read → runner
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use kws_runner::audio::{AudioDevice, CpalAudioDevice, DEFAULT_READ_TIMEOUT};
//!
//! let mut mic = CpalAudioDevice::open(None, 16_000, 16_384, DEFAULT_READ_TIMEOUT).unwrap();
//! mic.start_recording().unwrap();
//!
//! let mut frames = vec![0i16; 2048];
//! loop {
//!     let n = mic.read(&mut frames).unwrap();
//!     println!("received {n} frames");
//! }
//! ```

pub mod buffer;
pub mod capture;
pub mod device;
pub mod resample;

pub use buffer::RingBuffer;
pub use capture::{CpalAudioDevice, DEFAULT_READ_TIMEOUT};
pub use device::{AudioDevice, AudioError};
pub use resample::{downmix_to_mono, f32_to_i16, i16_to_f32, resample_linear};

#[cfg(test)]
pub use device::{DeviceProbe, MockAudioDevice, MockRead};
