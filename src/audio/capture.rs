//! Microphone capture via `cpal`, exposed as a blocking [`AudioDevice`].
//!
//! cpal pushes audio from its own callback thread, while the runner wants to
//! *pull* a fixed number of frames per iteration.  [`CpalAudioDevice`]
//! bridges the two: the callback converts each buffer to mono 16-bit PCM at
//! the requested rate and appends it to a [`RingBuffer`]; [`read`] waits on a
//! condition variable until samples arrive or the read timeout elapses.
//!
//! `cpal::Stream` is not `Send` on every platform, so the stream lives on a
//! dedicated `kws-audio-stream` thread that obeys play/pause commands sent
//! over a channel.  Dropping the device closes the channel, which ends that
//! thread and drops the stream.
//!
//! [`read`]: AudioDevice::read

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::buffer::RingBuffer;
use super::device::{AudioDevice, AudioError};
use super::resample::{downmix_to_mono, f32_to_i16, resample_linear};

/// Default upper bound on how long [`AudioDevice::read`] blocks.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// Shared capture state
// ---------------------------------------------------------------------------

struct Captured {
    ring: RingBuffer<i16>,
    /// First stream error since recording started.
    fault: Option<String>,
}

struct Shared {
    captured: Mutex<Captured>,
    ready: Condvar,
    recording: AtomicBool,
}

impl Shared {
    fn new(ring_frames: usize) -> Self {
        Self {
            captured: Mutex::new(Captured {
                ring: RingBuffer::new(ring_frames.max(1)),
                fault: None,
            }),
            ready: Condvar::new(),
            recording: AtomicBool::new(false),
        }
    }

    // Samples are plain integers; a poisoned lock still guards valid data.
    fn lock(&self) -> MutexGuard<'_, Captured> {
        self.captured.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

type Reply = mpsc::Sender<Result<(), AudioError>>;

enum StreamCommand {
    Play(Reply),
    Pause(Reply),
}

// ---------------------------------------------------------------------------
// CpalAudioDevice
// ---------------------------------------------------------------------------

/// Blocking-read microphone built on top of `cpal`.
///
/// ```rust,no_run
/// use kws_runner::audio::{AudioDevice, CpalAudioDevice, DEFAULT_READ_TIMEOUT};
///
/// let mut mic = CpalAudioDevice::open(None, 16_000, 16_384, DEFAULT_READ_TIMEOUT).unwrap();
/// mic.start_recording().unwrap();
/// let mut frames = [0i16; 2048];
/// let n = mic.read(&mut frames).unwrap();
/// println!("read {n} frames from {}", mic.device_name());
/// ```
pub struct CpalAudioDevice {
    shared: Arc<Shared>,
    commands: Option<mpsc::Sender<StreamCommand>>,
    stream_thread: Option<JoinHandle<()>>,
    read_timeout: Duration,
    device_name: String,
}

impl CpalAudioDevice {
    /// Open `device_name` (or the system default input when `None`) and
    /// prepare a paused stream delivering `sample_rate` Hz mono PCM.
    ///
    /// `ring_frames` bounds how much audio is kept while nobody reads.
    ///
    /// # Errors
    ///
    /// [`AudioError::NoDevice`] / [`AudioError::DeviceNotFound`] when no
    /// matching input exists, or the cpal error that prevented building the
    /// stream.
    pub fn open(
        device_name: Option<&str>,
        sample_rate: u32,
        ring_frames: usize,
        read_timeout: Duration,
    ) -> Result<Self, AudioError> {
        let shared = Arc::new(Shared::new(ring_frames));
        let (command_tx, command_rx) = mpsc::channel::<StreamCommand>();
        let (opened_tx, opened_rx) = mpsc::channel::<Result<String, AudioError>>();

        let requested = device_name.map(str::to_owned);
        let stream_shared = Arc::clone(&shared);

        let stream_thread = thread::Builder::new()
            .name("kws-audio-stream".into())
            .spawn(move || {
                let stream = match build_stream(requested.as_deref(), sample_rate, stream_shared) {
                    Ok((stream, name)) => {
                        let _ = opened_tx.send(Ok(name));
                        stream
                    }
                    Err(e) => {
                        let _ = opened_tx.send(Err(e));
                        return;
                    }
                };

                // Exits once the owning CpalAudioDevice drops its sender.
                while let Ok(command) = command_rx.recv() {
                    match command {
                        StreamCommand::Play(reply) => {
                            let _ = reply.send(stream.play().map_err(AudioError::from));
                        }
                        StreamCommand::Pause(reply) => {
                            let _ = reply.send(stream.pause().map_err(AudioError::from));
                        }
                    }
                }
            })
            .map_err(|e| AudioError::Spawn(e.to_string()))?;

        let opened = opened_rx.recv().unwrap_or(Err(AudioError::Disconnected));
        match opened {
            Ok(device_name) => {
                log::info!("audio device opened: {device_name} @ {sample_rate} Hz");
                Ok(Self {
                    shared,
                    commands: Some(command_tx),
                    stream_thread: Some(stream_thread),
                    read_timeout,
                    device_name,
                })
            }
            Err(e) => {
                let _ = stream_thread.join();
                Err(e)
            }
        }
    }

    /// Name reported by the underlying input device.
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Names of all input devices on the default host.
    pub fn list_devices() -> Result<Vec<String>, AudioError> {
        let host = cpal::default_host();
        Ok(host
            .input_devices()?
            .filter_map(|d| d.name().ok())
            .collect())
    }

    fn send(&self, command: fn(Reply) -> StreamCommand) -> Result<(), AudioError> {
        let commands = self.commands.as_ref().ok_or(AudioError::Disconnected)?;
        let (reply_tx, reply_rx) = mpsc::channel();
        commands
            .send(command(reply_tx))
            .map_err(|_| AudioError::Disconnected)?;
        reply_rx.recv().map_err(|_| AudioError::Disconnected)?
    }
}

impl AudioDevice for CpalAudioDevice {
    fn start_recording(&mut self) -> Result<(), AudioError> {
        {
            let mut captured = self.shared.lock();
            captured.ring.clear();
            captured.fault = None;
        }
        self.shared.recording.store(true, Ordering::Release);

        if let Err(e) = self.send(StreamCommand::Play) {
            self.shared.recording.store(false, Ordering::Release);
            return Err(e);
        }
        Ok(())
    }

    fn stop_recording(&mut self) -> Result<(), AudioError> {
        self.shared.recording.store(false, Ordering::Release);
        // Wake a reader blocked in `read` so it notices promptly.
        self.shared.ready.notify_all();
        self.send(StreamCommand::Pause)
    }

    fn read(&mut self, buf: &mut [i16]) -> Result<usize, AudioError> {
        if !self.shared.recording.load(Ordering::Acquire) {
            return Err(AudioError::NotRecording);
        }
        if buf.is_empty() {
            return Ok(0);
        }

        let captured = self.shared.lock();
        let (mut captured, _timeout) = self
            .shared
            .ready
            .wait_timeout_while(captured, self.read_timeout, |c| {
                c.ring.is_empty() && c.fault.is_none()
            })
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(fault) = captured.fault.take() {
            return Err(AudioError::Stream(fault));
        }
        Ok(captured.ring.pop_into(buf))
    }
}

impl Drop for CpalAudioDevice {
    fn drop(&mut self) {
        self.shared.recording.store(false, Ordering::Release);
        // Closing the command channel ends the stream thread.
        drop(self.commands.take());
        if let Some(handle) = self.stream_thread.take() {
            if handle.join().is_err() {
                log::error!("audio stream thread panicked");
            }
        }
        log::debug!("audio device closed: {}", self.device_name);
    }
}

// ---------------------------------------------------------------------------
// Stream construction (runs on the stream thread)
// ---------------------------------------------------------------------------

fn find_device(host: &cpal::Host, name: Option<&str>) -> Result<cpal::Device, AudioError> {
    match name {
        Some(name) => host
            .input_devices()?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| AudioError::DeviceNotFound(name.to_owned())),
        None => host.default_input_device().ok_or(AudioError::NoDevice),
    }
}

fn build_stream(
    name: Option<&str>,
    target_rate: u32,
    shared: Arc<Shared>,
) -> Result<(cpal::Stream, String), AudioError> {
    let host = cpal::default_host();
    let device = find_device(&host, name)?;
    let device_name = device.name().unwrap_or_else(|_| "unknown input device".into());

    let supported = device.default_input_config()?;
    let channels = supported.channels();
    let native_rate = supported.sample_rate().0;
    let config: cpal::StreamConfig = supported.into();

    log::debug!("{device_name}: native {native_rate} Hz, {channels} ch → {target_rate} Hz mono");

    let error_shared = Arc::clone(&shared);
    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            if !shared.recording.load(Ordering::Acquire) {
                return;
            }
            let mono = downmix_to_mono(data, channels);
            let pcm = f32_to_i16(&resample_linear(&mono, native_rate, target_rate));

            let overwritten = shared.lock().ring.push_slice(&pcm);
            if overwritten > 0 {
                log::trace!("capture ring full, overwrote {overwritten} samples");
            }
            shared.ready.notify_all();
        },
        move |err: cpal::StreamError| {
            log::error!("cpal stream error: {err}");
            {
                let mut captured = error_shared.lock();
                if captured.fault.is_none() {
                    captured.fault = Some(err.to_string());
                }
            }
            error_shared.ready.notify_all();
        },
        None,
    )?;

    // Some hosts start streams on creation; stay silent until start_recording.
    if let Err(e) = stream.pause() {
        log::debug!("{device_name}: initial pause not supported: {e}");
    }

    Ok((stream, device_name))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
