//! The [`SpeechEngine`] collaborator interface.
//!
//! # Overview
//!
//! A speech engine is a streaming decoder: the runner opens an utterance,
//! feeds it audio frames with [`SpeechEngine::process`], and polls
//! [`SpeechEngine::hypothesis`] after every step.  Once a keyword is reported
//! the runner ends the utterance and starts a fresh one.
//!
//! Engines are created by a [`Backend`](crate::session::Backend) from an
//! [`EngineConfig`](crate::stt::EngineConfig) and destroyed by `Drop`.
//!
//! [`MockSpeechEngine`] (available under `#[cfg(test)]`) returns scripted
//! hypotheses, which makes the runner testable without a model file.

use thiserror::Error;

// ---------------------------------------------------------------------------
// SttError
// ---------------------------------------------------------------------------

/// All errors that can arise from the speech engine subsystem.
#[derive(Debug, Clone, Error)]
pub enum SttError {
    /// No usable GGML model file was found.
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// `whisper_rs` failed to initialise a `WhisperContext` or `WhisperState`.
    #[error("Whisper context initialisation failed: {0}")]
    ContextInit(String),

    /// An error occurred during the inference pass.
    #[error("Transcription error: {0}")]
    Transcription(String),

    /// The keyword list could not be read or contains no usable phrase.
    #[error("Invalid keyword list: {0}")]
    KeywordList(String),

    /// The pronunciation dictionary could not be read.
    #[error("Invalid dictionary: {0}")]
    Dictionary(String),

    /// Starting or ending an utterance was refused.
    #[error("Utterance error: {0}")]
    Utterance(String),
}

// ---------------------------------------------------------------------------
// SpeechEngine trait
// ---------------------------------------------------------------------------

/// Streaming keyword decoder fed with mono 16-bit PCM.
///
/// Implementations are `Send` so a session can hand them to the capture
/// thread; they are never used from two threads at once.
pub trait SpeechEngine: Send {
    /// Begin a new utterance, discarding any previous hypothesis.
    fn start_utterance(&mut self) -> Result<(), SttError>;

    /// Finish the current utterance.
    fn end_utterance(&mut self) -> Result<(), SttError>;

    /// Feed one buffer of frames into the current utterance.
    fn process(&mut self, frames: &[i16]);

    /// The keyword detected in the current utterance, if any.
    fn hypothesis(&self) -> Option<String>;
}

// Compile-time assertion: Box<dyn SpeechEngine> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn SpeechEngine>) {}
};

// ---------------------------------------------------------------------------
// MockSpeechEngine  (test-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
pub use mock::{EngineProbe, MockSpeechEngine};

#[cfg(test)]
mod mock {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::{SpeechEngine, SttError};

    /// Counters shared between a [`MockSpeechEngine`] and the test body.
    #[derive(Debug, Default)]
    pub struct EngineProbe {
        pub utt_starts: AtomicUsize,
        pub utt_ends: AtomicUsize,
        pub processed_frames: AtomicUsize,
        pub dropped: AtomicBool,
    }

    /// A test double whose hypotheses follow a script.
    ///
    /// Each non-empty `process` call consumes one script entry; `Some(kw)`
    /// becomes the hypothesis until the utterance ends.
    pub struct MockSpeechEngine {
        script: VecDeque<Option<String>>,
        current: Option<String>,
        in_utterance: bool,
        /// Zero-based index of the `start_utterance` call that fails.
        fail_start_at: Option<usize>,
        probe: Arc<EngineProbe>,
    }

    impl MockSpeechEngine {
        pub fn new(script: Vec<Option<&str>>) -> Self {
            Self {
                script: script.into_iter().map(|s| s.map(str::to_owned)).collect(),
                current: None,
                in_utterance: false,
                fail_start_at: None,
                probe: Arc::new(EngineProbe::default()),
            }
        }

        /// Report each keyword on consecutive `process` calls.
        pub fn with_hypotheses(keywords: &[&str]) -> Self {
            Self::new(keywords.iter().map(|k| Some(*k)).collect())
        }

        /// An engine that never detects anything.
        pub fn deaf() -> Self {
            Self::new(Vec::new())
        }

        pub fn failing_start_at(mut self, call: usize) -> Self {
            self.fail_start_at = Some(call);
            self
        }

        pub fn probe(&self) -> Arc<EngineProbe> {
            Arc::clone(&self.probe)
        }
    }

    impl SpeechEngine for MockSpeechEngine {
        fn start_utterance(&mut self) -> Result<(), SttError> {
            let call = self.probe.utt_starts.fetch_add(1, Ordering::SeqCst);
            if self.fail_start_at == Some(call) {
                return Err(SttError::Utterance("mock start failure".into()));
            }
            self.in_utterance = true;
            self.current = None;
            Ok(())
        }

        fn end_utterance(&mut self) -> Result<(), SttError> {
            self.probe.utt_ends.fetch_add(1, Ordering::SeqCst);
            if !self.in_utterance {
                return Err(SttError::Utterance("no utterance in progress".into()));
            }
            self.in_utterance = false;
            self.current = None;
            Ok(())
        }

        fn process(&mut self, frames: &[i16]) {
            if !self.in_utterance || frames.is_empty() {
                return;
            }
            self.probe
                .processed_frames
                .fetch_add(frames.len(), Ordering::SeqCst);
            if let Some(Some(keyword)) = self.script.pop_front() {
                self.current = Some(keyword);
            }
        }

        fn hypothesis(&self) -> Option<String> {
            self.current.clone()
        }
    }

    impl Drop for MockSpeechEngine {
        fn drop(&mut self) {
            self.probe.dropped.store(true, Ordering::SeqCst);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
