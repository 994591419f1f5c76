//! Keyword-spotting pipeline: the capture runner and its output queue.
//!
//! # Architecture
//!
//! ```text
//!              Runner::start()
//!                    │ spawn "kws-capture"
//!                    ▼
//! SharedSession ──lock──▶ AudioDevice::read ─▶ SpeechEngine::process
//!                                                   │ hypothesis
//!                                                   ▼
//!                                        KeywordQueue::push ──▶ consumers
//!                                                                pop_front()
//! last_error ◀── run result ──▶ RunOutcome listener (mpsc)
//! ```
//!
//! See [`Runner`] for a complete example.

pub mod queue;
pub mod runner;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use queue::{KeywordQueue, SharedQueue, DEFAULT_CAPACITY};
pub use runner::{RunOutcome, Runner, CAPTURE_THREAD_NAME, DEFAULT_BUFFER_SIZE};
pub use state::RunnerState;
