//! [`WhisperKeywordEngine`]: keyword spotting on top of `whisper_rs`.
//!
//! Whisper is not a streaming recogniser, so the engine keeps a sliding
//! window of the current utterance and re-transcribes it every
//! `decode_interval_ms` of new audio.  The first keyword found in the
//! transcript becomes the hypothesis and decoding pauses until the utterance
//! is restarted.
//!
//! ```text
//! process(i16) → i16_to_f32 → resample to 16 kHz → window (≤ window_ms)
//!                                                    │ every interval
//!                                                    ▼
//!                                  whisper full() → normalize → KeywordList
//! ```

use std::path::Path;

use log::{debug, info, warn};
use whisper_rs::{FullParams, WhisperContext, WhisperContextParameters};

use crate::audio::{i16_to_f32, resample_linear};

use super::config::EngineConfig;
use super::engine::{SpeechEngine, SttError};
use super::keywords::{Dictionary, KeywordList};
use super::model::find_model_file;
use super::transcribe::{SamplingStrategy, TranscribeParams, MIN_WINDOW_MS};

/// Sample rate whisper.cpp expects.
pub const WHISPER_SAMPLE_RATE: u32 = 16_000;

/// whisper.cpp refuses input shorter than one second.
const MIN_DECODE_SAMPLES: usize = WHISPER_SAMPLE_RATE as usize;

// `window_samples` never trims below what a decode needs.
const _: () =
    assert!(MIN_WINDOW_MS as usize * WHISPER_SAMPLE_RATE as usize / 1_000 >= MIN_DECODE_SAMPLES);

/// Production [`SpeechEngine`] that wraps a `whisper_rs::WhisperContext`.
pub struct WhisperKeywordEngine {
    ctx: WhisperContext,
    params: TranscribeParams,
    keywords: KeywordList,
    /// Rate of the PCM handed to `process`.
    input_rate: u32,
    window: Vec<f32>,
    pending: usize,
    in_utterance: bool,
    hypothesis: Option<String>,
}

impl std::fmt::Debug for WhisperKeywordEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperKeywordEngine")
            .field("params", &self.params)
            .field("keywords", &self.keywords.len())
            .field("in_utterance", &self.in_utterance)
            .finish_non_exhaustive()
    }
}

impl WhisperKeywordEngine {
    /// Load the model, keyword list and dictionary named by `config`.
    ///
    /// # Errors
    ///
    /// - [`SttError::ModelNotFound`]: no `*.bin` in `config.model_dir`.
    /// - [`SttError::KeywordList`] / [`SttError::Dictionary`]: unreadable or
    ///   unusable word files.
    /// - [`SttError::ContextInit`]: whisper-rs failed to load the model.
    pub fn open(config: &EngineConfig) -> Result<Self, SttError> {
        let model = find_model_file(&config.model_dir)?;
        let keywords = KeywordList::load(&config.keyword_list)?;
        let dictionary = Dictionary::load(&config.dictionary)?;

        let missing = keywords.missing_from(&dictionary);
        if !missing.is_empty() {
            warn!(
                "Keywords use words missing from {}: {}",
                config.dictionary,
                missing.join(", ")
            );
        }

        let ctx = load_context(&model)?;
        info!(
            "Loaded {} keyword(s) with model {}",
            keywords.len(),
            model.display()
        );

        Ok(Self {
            ctx,
            params: config.params.clone(),
            keywords,
            input_rate: config.sample_rate,
            window: Vec::new(),
            pending: 0,
            in_utterance: false,
            hypothesis: None,
        })
    }

    fn decode_window(&mut self) {
        match self.transcribe(&self.window) {
            Ok(text) => {
                debug!("Window transcript: {text:?}");
                self.hypothesis = self.keywords.find_in(&text).map(str::to_owned);
            }
            Err(e) => warn!("Keyword decode failed: {e}"),
        }
    }

    /// Run one whisper pass over `audio` (16 kHz mono f32) and return the
    /// trimmed transcript.
    fn transcribe(&self, audio: &[f32]) -> Result<String, SttError> {
        use whisper_rs::SamplingStrategy as WS;
        let ws = match self.params.strategy {
            SamplingStrategy::Greedy { best_of } => WS::Greedy { best_of },
            SamplingStrategy::BeamSearch { beam_size, patience } => {
                WS::BeamSearch { beam_size, patience }
            }
        };

        let mut fp = FullParams::new(ws);
        let lang: Option<&str> = if self.params.language == "auto" {
            None
        } else {
            Some(self.params.language.as_str())
        };
        fp.set_language(lang);
        fp.set_n_threads(self.params.n_threads);
        fp.set_single_segment(true);
        fp.set_no_context(true);

        if self.params.suppress_progress {
            fp.set_print_progress(false);
            fp.set_print_realtime(false);
        }

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| SttError::ContextInit(e.to_string()))?;

        state
            .full(fp, audio)
            .map_err(|e| SttError::Transcription(e.to_string()))?;

        let n_segments = state
            .full_n_segments()
            .map_err(|e| SttError::Transcription(e.to_string()))?;

        let mut text = String::new();
        for i in 0..n_segments {
            let segment = state
                .full_get_segment_text(i)
                .map_err(|e| SttError::Transcription(format!("segment {i}: {e}")))?;
            text.push_str(&segment);
        }
        Ok(text.trim().to_string())
    }
}

impl SpeechEngine for WhisperKeywordEngine {
    fn start_utterance(&mut self) -> Result<(), SttError> {
        self.window.clear();
        self.pending = 0;
        self.hypothesis = None;
        self.in_utterance = true;
        Ok(())
    }

    fn end_utterance(&mut self) -> Result<(), SttError> {
        if !self.in_utterance {
            return Err(SttError::Utterance("no utterance in progress".into()));
        }
        self.in_utterance = false;
        self.window.clear();
        self.pending = 0;
        self.hypothesis = None;
        Ok(())
    }

    fn process(&mut self, frames: &[i16]) {
        // Once a keyword is reported the runner restarts the utterance.
        if !self.in_utterance || self.hypothesis.is_some() || frames.is_empty() {
            return;
        }

        let samples = resample_linear(&i16_to_f32(frames), self.input_rate, WHISPER_SAMPLE_RATE);
        self.pending += samples.len();
        self.window.extend_from_slice(&samples);

        let window_len = self.params.window_samples(WHISPER_SAMPLE_RATE);
        if self.window.len() > window_len {
            let excess = self.window.len() - window_len;
            self.window.drain(..excess);
        }

        if self.pending >= self.params.interval_samples(WHISPER_SAMPLE_RATE)
            && self.window.len() >= MIN_DECODE_SAMPLES
        {
            self.pending = 0;
            self.decode_window();
        }
    }

    fn hypothesis(&self) -> Option<String> {
        self.hypothesis.clone()
    }
}

fn load_context(model: &Path) -> Result<WhisperContext, SttError> {
    let path_str = model.to_str().ok_or_else(|| {
        SttError::ModelNotFound(format!(
            "model path contains non-UTF-8 characters: {}",
            model.display()
        ))
    })?;

    WhisperContext::new_with_params(path_str, WhisperContextParameters::default())
        .map_err(|e| SttError::ContextInit(e.to_string()))
}
