//! Speech engine module: keyword spotting over streamed PCM.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                 SpeechEngine (trait)                  │
//! │                                                       │
//! │   ┌──────────────┐    ┌──────────────────────┐        │
//! │   │ EngineConfig │───▶│ WhisperKeywordEngine │        │
//! │   │ - model_dir  │    │ - ctx                │        │
//! │   │ - dictionary │    │ - KeywordList        │        │
//! │   │ - keywords   │    │ - sliding window     │        │
//! │   └──────────────┘    └──────────┬───────────┘        │
//! │                                  ▼                    │
//! │                       transcript → keyword match      │
//! └───────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod engine;
pub mod keywords;
pub mod model;
pub mod transcribe;
pub mod whisper;

// ── Public re-exports ──────────────────────────────────────────────────────

pub use config::{EngineConfig, EngineConfigError};
pub use engine::{SpeechEngine, SttError};
pub use keywords::{normalize, Dictionary, Keyword, KeywordList};
pub use model::find_model_file;
pub use transcribe::{SamplingStrategy, TranscribeParams};
pub use whisper::WhisperKeywordEngine;

#[cfg(test)]
pub use engine::{EngineProbe, MockSpeechEngine};
