//! Whisper decoding parameters.
//!
//! [`TranscribeParams`] carries every setting that controls how
//! [`WhisperKeywordEngine`](crate::stt::WhisperKeywordEngine) runs inference
//! and how often it does so.

// ---------------------------------------------------------------------------
// SamplingStrategy
// ---------------------------------------------------------------------------

/// Mirrors `whisper_rs::SamplingStrategy` but is owned and `Clone`.
///
/// Greedy decoding keeps the sliding-window latency low; beam search is
/// available for slow, accurate setups.
#[derive(Debug, Clone, PartialEq)]
pub enum SamplingStrategy {
    /// Greedy (single-pass) decoding.
    Greedy {
        /// Number of candidate tokens evaluated per step.  1 is fastest.
        best_of: i32,
    },
    /// Beam-search decoding.
    BeamSearch {
        /// Number of beams to maintain in parallel.
        beam_size: i32,
        /// Beam-search patience factor (1.0 = standard beam search).
        patience: f32,
    },
}

impl Default for SamplingStrategy {
    fn default() -> Self {
        Self::Greedy { best_of: 1 }
    }
}

// ---------------------------------------------------------------------------
// TranscribeParams
// ---------------------------------------------------------------------------

/// Default length of audio handed to whisper per decode.
pub const DEFAULT_WINDOW_MS: u32 = 2_000;
/// Default amount of new audio between two decodes.
pub const DEFAULT_DECODE_INTERVAL_MS: u32 = 1_000;
/// Shortest usable window; whisper.cpp rejects less than one second.
pub const MIN_WINDOW_MS: u32 = 1_000;

/// All parameters for keyword decoding.
///
/// ```
/// use kws_runner::stt::TranscribeParams;
///
/// let params = TranscribeParams {
///     language: "de".into(),
///     ..TranscribeParams::default()
/// };
/// assert_eq!(params.window_ms, 2_000);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TranscribeParams {
    /// ISO-639-1 language code (e.g. `"en"`), or `"auto"` to let Whisper
    /// detect the language.
    pub language: String,

    pub strategy: SamplingStrategy,

    /// Number of CPU threads handed to Whisper.  Defaults to
    /// [`optimal_threads()`], capped at 8.
    pub n_threads: i32,

    /// Suppress Whisper's progress output to stderr.
    pub suppress_progress: bool,

    /// Length of the sliding window transcribed on each decode.  Values
    /// below [`MIN_WINDOW_MS`] are treated as [`MIN_WINDOW_MS`].
    pub window_ms: u32,

    /// New audio required before the window is decoded again.
    pub decode_interval_ms: u32,
}

impl Default for TranscribeParams {
    fn default() -> Self {
        Self {
            language: "en".into(),
            strategy: SamplingStrategy::default(),
            n_threads: optimal_threads(),
            suppress_progress: true,
            window_ms: DEFAULT_WINDOW_MS,
            decode_interval_ms: DEFAULT_DECODE_INTERVAL_MS,
        }
    }
}

impl TranscribeParams {
    /// Window length in samples at `sample_rate`, never shorter than
    /// [`MIN_WINDOW_MS`].
    pub fn window_samples(&self, sample_rate: u32) -> usize {
        ms_to_samples(self.window_ms.max(MIN_WINDOW_MS), sample_rate)
    }

    /// Decode interval in samples at `sample_rate`, never below one sample.
    pub fn interval_samples(&self, sample_rate: u32) -> usize {
        ms_to_samples(self.decode_interval_ms, sample_rate).max(1)
    }
}

fn ms_to_samples(ms: u32, sample_rate: u32) -> usize {
    (u64::from(ms) * u64::from(sample_rate) / 1_000) as usize
}

/// Returns the number of CPU threads to use for inference, capped at 8 to
/// avoid diminishing returns on Whisper.
pub(crate) fn optimal_threads() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get().min(8) as i32)
        .unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_greedy_english() {
        let p = TranscribeParams::default();
        assert_eq!(p.language, "en");
        assert_eq!(p.strategy, SamplingStrategy::Greedy { best_of: 1 });
        assert!(p.suppress_progress);
    }

    #[test]
    fn optimal_threads_in_range() {
        let n = optimal_threads();
        assert!((1..=8).contains(&n), "got {n}");
    }

    #[test]
    fn window_and_interval_convert_to_samples() {
        let p = TranscribeParams {
            window_ms: 1_500,
            decode_interval_ms: 250,
            ..TranscribeParams::default()
        };
        assert_eq!(p.window_samples(16_000), 24_000);
        assert_eq!(p.interval_samples(16_000), 4_000);
    }

    #[test]
    fn window_is_clamped_to_minimum() {
        let short = TranscribeParams {
            window_ms: 500,
            ..TranscribeParams::default()
        };
        assert_eq!(short.window_samples(16_000), 16_000);

        let exact = TranscribeParams {
            window_ms: MIN_WINDOW_MS,
            ..TranscribeParams::default()
        };
        assert_eq!(exact.window_samples(16_000), 16_000);
    }

    #[test]
    fn zero_interval_still_advances() {
        let p = TranscribeParams {
            decode_interval_ms: 0,
            ..TranscribeParams::default()
        };
        assert_eq!(p.interval_samples(16_000), 1);
    }
}
