//! Runner: drives one background capture/decode thread.
//!
//! [`Runner`] owns at most one `kws-capture` thread.  The thread locks the
//! attached [`SharedSession`] for the whole run, reads audio from the
//! session's device, feeds it to the session's engine and pushes every
//! detected keyword into the attached [`SharedQueue`].
//!
//! # Capture flow
//!
//! ```text
//! start_recording ─err─▶ RecStart ───────────────────────────────┐
//!   └─ start_utterance ─err─▶ UttStart ──────────────────────┐   │
//!        └─ while active:                                   │   │
//!             read ─err─▶ AudioRead (end utterance) ──────┐  │   │
//!             process → hypothesis?                       │  │   │
//!               └─ push → end → start ─err─▶ UttRestart ──┤  │   │
//!           end_utterance                                 ▼  ▼   │
//!      stop_recording ─err─▶ RecStop (unless already failed)     │
//!   last_error = result, active = false, notify listener ◀───────┘
//! ```
//!
//! The thread only ever talks to its owner through the active flag, the
//! queue, the `last_error` cell and the optional [`RunOutcome`] listener.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use log::{debug, error, info, warn};

use crate::audio::AudioDevice;
use crate::error::ErrorKind;
use crate::session::{Handles, SharedSession};
use crate::stt::SpeechEngine;

use super::queue::SharedQueue;
use super::state::RunnerState;

/// Frames requested per device read unless configured otherwise.
pub const DEFAULT_BUFFER_SIZE: usize = 2_048;

/// Name of the background thread.
pub const CAPTURE_THREAD_NAME: &str = "kws-capture";

/// Summary sent to the listener when a run ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    /// `None` when the run was stopped without a failure.
    pub error: Option<ErrorKind>,
    /// Keywords successfully queued during the run.
    pub keywords: u64,
}

type ErrorCell = Arc<Mutex<Option<ErrorKind>>>;

/// Starts, stops and observes the capture thread.
///
/// ```rust,no_run
/// use kws_runner::pipeline::{KeywordQueue, Runner};
/// use kws_runner::session::Session;
///
/// let mut session = Session::new();
/// session.set_model_dir("/opt/kws/model");
/// session.set_dictionary_file("/opt/kws/words.dict");
/// session.set_keyword_list_file("/opt/kws/keywords.list");
/// session.init().unwrap();
///
/// let queue = KeywordQueue::shared(100);
/// let mut runner = Runner::new();
/// runner.set_session(Some(session.into_shared()));
/// runner.set_queue(Some(queue.clone()));
/// runner.start().unwrap();
///
/// while runner.running() {
///     if let Some(keyword) = queue.pop_front() {
///         println!("heard {keyword}");
///     }
/// }
/// runner.stop();
/// ```
pub struct Runner {
    session: Option<SharedSession>,
    queue: Option<SharedQueue>,
    buffer_size: usize,
    active: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    last_error: ErrorCell,
    listener: Option<mpsc::Sender<RunOutcome>>,
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("state", &self.state())
            .field("buffer_size", &self.buffer_size)
            .field("has_session", &self.session.is_some())
            .field("has_queue", &self.queue.is_some())
            .field("last_error", &self.last_error())
            .finish_non_exhaustive()
    }
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    /// An idle runner with nothing attached.
    pub fn new() -> Self {
        Self {
            session: None,
            queue: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
            active: Arc::new(AtomicBool::new(false)),
            worker: None,
            last_error: Arc::new(Mutex::new(None)),
            listener: None,
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Spawn the capture thread, stopping any previous one first.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::UndefinedConfig`]: no session attached, the session is
    ///   not initialised, or the thread could not be spawned.
    /// - [`ErrorKind::UndefinedQueue`]: no queue attached.
    pub fn start(&mut self) -> Result<(), ErrorKind> {
        let Some(session) = self.session.clone() else {
            error!("runner: no session attached");
            return Err(ErrorKind::UndefinedConfig);
        };
        let Some(queue) = self.queue.clone() else {
            error!("runner: no keyword queue attached");
            return Err(ErrorKind::UndefinedQueue);
        };

        self.stop();

        if !lock(&session).is_initialized() {
            error!("runner: session is not initialised");
            return Err(ErrorKind::UndefinedConfig);
        }

        *lock(&self.last_error) = None;
        self.active.store(true, Ordering::Release);

        let capture = Capture {
            session,
            queue,
            buffer_size: self.buffer_size,
            active: Arc::clone(&self.active),
            last_error: Arc::clone(&self.last_error),
            listener: self.listener.clone(),
        };

        match thread::Builder::new()
            .name(CAPTURE_THREAD_NAME.into())
            .spawn(move || capture.run())
        {
            Ok(handle) => {
                self.worker = Some(handle);
                info!("runner: started ({} frames per read)", self.buffer_size);
                Ok(())
            }
            Err(e) => {
                self.active.store(false, Ordering::Release);
                error!("runner: cannot spawn capture thread: {e}");
                Err(ErrorKind::UndefinedConfig)
            }
        }
    }

    /// Signal the capture thread and wait for it to exit.  No-op when idle.
    pub fn stop(&mut self) {
        let Some(handle) = self.worker.take() else {
            return;
        };
        self.active.store(false, Ordering::Release);
        if handle.join().is_err() {
            error!("runner: capture thread panicked");
        }
        info!("runner: stopped");
    }

    /// `true` while the capture thread is listening.
    pub fn running(&self) -> bool {
        self.state() == RunnerState::Running
    }

    /// A thread that ended on its own reports [`RunnerState::Idle`] even
    /// before it is joined.
    pub fn state(&self) -> RunnerState {
        let alive = self.worker.as_ref().is_some_and(|h| !h.is_finished());
        RunnerState::derive(alive, self.active.load(Ordering::Acquire))
    }

    /// Failure that ended the latest run, if any.
    pub fn last_error(&self) -> Option<ErrorKind> {
        *lock(&self.last_error)
    }

    pub fn reset_last_error(&self) {
        *lock(&self.last_error) = None;
    }

    // -----------------------------------------------------------------------
    // Configuration (each setter stops a running thread first)
    // -----------------------------------------------------------------------

    pub fn set_session(&mut self, session: Option<SharedSession>) {
        self.stop();
        self.session = session;
    }

    pub fn set_queue(&mut self, queue: Option<SharedQueue>) {
        self.stop();
        self.queue = queue;
    }

    /// Frames requested per read.  Zero is rejected without stopping.
    pub fn set_buffer_size(&mut self, frames: usize) -> bool {
        if frames == 0 {
            warn!("runner: buffer size must be > 0");
            return false;
        }
        self.stop();
        self.buffer_size = frames;
        true
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn session(&self) -> Option<&SharedSession> {
        self.session.as_ref()
    }

    pub fn queue(&self) -> Option<&SharedQueue> {
        self.queue.as_ref()
    }

    /// Receive a [`RunOutcome`] whenever a run ends.  Applies from the next
    /// `start`.
    pub fn set_listener(&mut self, listener: Option<mpsc::Sender<RunOutcome>>) {
        self.listener = listener;
    }
}

impl Drop for Runner {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Capture thread
// ---------------------------------------------------------------------------

/// Everything the capture thread owns.
struct Capture {
    session: SharedSession,
    queue: SharedQueue,
    buffer_size: usize,
    active: Arc<AtomicBool>,
    last_error: ErrorCell,
    listener: Option<mpsc::Sender<RunOutcome>>,
}

impl Capture {
    fn run(self) {
        let mut session = lock(&self.session);

        let (error, keywords) = match session.handles_mut() {
            Some(handles) => self.recognize(handles),
            None => {
                error!("runner: session was released before capture began");
                (Some(ErrorKind::UndefinedConfig), 0)
            }
        };

        *lock(&self.last_error) = error;
        self.active.store(false, Ordering::Release);

        if let Some(listener) = &self.listener {
            // The receiver may be gone; the outcome stays in last_error.
            let _ = listener.send(RunOutcome { error, keywords });
        }
        drop(session);

        match error {
            Some(kind) => info!("runner: capture ended with {kind} after {keywords} keyword(s)"),
            None => info!("runner: capture ended after {keywords} keyword(s)"),
        }
    }

    fn recognize(&self, handles: &mut Handles) -> (Option<ErrorKind>, u64) {
        let Handles { engine, audio } = handles;

        if let Err(e) = audio.start_recording() {
            error!("runner: cannot start recording: {e}");
            return (Some(ErrorKind::RecStart), 0);
        }

        let (mut error, keywords) = match engine.start_utterance() {
            Ok(()) => self.decode_until_stopped(&mut **audio, &mut **engine),
            Err(e) => {
                error!("runner: cannot start utterance: {e}");
                (Some(ErrorKind::UttStart), 0)
            }
        };

        if let Err(e) = audio.stop_recording() {
            if error.is_none() {
                error!("runner: cannot stop recording: {e}");
                error = Some(ErrorKind::RecStop);
            } else {
                warn!("runner: cannot stop recording after earlier failure: {e}");
            }
        }

        (error, keywords)
    }

    fn decode_until_stopped(
        &self,
        audio: &mut dyn AudioDevice,
        engine: &mut dyn SpeechEngine,
    ) -> (Option<ErrorKind>, u64) {
        let mut frames = vec![0i16; self.buffer_size];
        let mut keywords = 0u64;

        while self.active.load(Ordering::Acquire) {
            let n = match audio.read(&mut frames) {
                Ok(n) => n,
                Err(e) => {
                    error!("runner: audio read failed: {e}");
                    if let Err(e) = engine.end_utterance() {
                        debug!("runner: ending utterance after read failure: {e}");
                    }
                    return (Some(ErrorKind::AudioRead), keywords);
                }
            };
            if n == 0 {
                continue;
            }

            engine.process(&frames[..n]);

            let Some(keyword) = engine.hypothesis().filter(|h| !h.is_empty()) else {
                continue;
            };

            if self.queue.push(keyword.as_str()) {
                keywords += 1;
                debug!("runner: keyword {keyword:?} queued");
            } else {
                warn!("runner: keyword queue full, dropped {keyword:?}");
            }

            if let Err(e) = engine.end_utterance() {
                warn!("runner: cannot end utterance: {e}");
            }
            if let Err(e) = engine.start_utterance() {
                error!("runner: cannot restart utterance: {e}");
                return (Some(ErrorKind::UttRestart), keywords);
            }
        }

        if let Err(e) = engine.end_utterance() {
            warn!("runner: cannot end utterance: {e}");
        }
        (None, keywords)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
