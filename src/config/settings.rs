//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`.
//! Every section is `#[serde(default)]`, so a `settings.toml` only has to
//! name the values it changes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::audio::DEFAULT_READ_TIMEOUT;
use crate::pipeline::queue::DEFAULT_CAPACITY;
use crate::pipeline::runner::DEFAULT_BUFFER_SIZE;
use crate::stt::transcribe::{DEFAULT_DECODE_INTERVAL_MS, DEFAULT_WINDOW_MS, MIN_WINDOW_MS};
use crate::stt::TranscribeParams;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Locations of the recognition assets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Directory holding the GGML model (`*.bin`).
    pub model_dir: Option<PathBuf>,
    /// Pronunciation dictionary file.
    pub dictionary_file: Option<PathBuf>,
    /// Keyword list file, one phrase per line.
    pub keyword_list_file: Option<PathBuf>,
    /// Where assets are copied before loading.  `None` uses
    /// [`AppPaths::staging_dir`].
    pub staging_dir: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for audio capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Input device name; `None` means the system default.
    pub device: Option<String>,
    /// Sample rate delivered to the speech engine, in Hz.
    pub sample_rate: u32,
    /// Frames per device read; sizes the capture ring.
    pub capture_buffer_size: usize,
    /// Longest a device read blocks before returning zero frames.
    pub read_timeout_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: 16_000,
            capture_buffer_size: 2_048,
            read_timeout_ms: DEFAULT_READ_TIMEOUT.as_millis() as u64,
        }
    }
}

impl AudioConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// RunnerConfig / QueueConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Frames requested per read on the capture thread.
    pub buffer_size: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum number of undelivered keywords.
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

// ---------------------------------------------------------------------------
// SttConfig
// ---------------------------------------------------------------------------

/// Settings for the Whisper keyword engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// Speech language as an ISO-639-1 code, or `"auto"`.
    pub language: String,
    /// Audio length transcribed per decode.
    pub window_ms: u32,
    /// New audio required between decodes.
    pub decode_interval_ms: u32,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            language: "en".into(),
            window_ms: DEFAULT_WINDOW_MS,
            decode_interval_ms: DEFAULT_DECODE_INTERVAL_MS,
        }
    }
}

impl SttConfig {
    pub fn transcribe_params(&self) -> TranscribeParams {
        if self.window_ms < MIN_WINDOW_MS {
            log::warn!(
                "engine.window_ms = {} is below {MIN_WINDOW_MS}, using {MIN_WINDOW_MS}",
                self.window_ms
            );
        }
        TranscribeParams {
            language: self.language.clone(),
            window_ms: self.window_ms,
            decode_interval_ms: self.decode_interval_ms,
            ..TranscribeParams::default()
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use kws_runner::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// println!("queue capacity: {}", config.queue.capacity);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub session: SessionConfig,
    pub audio: AudioConfig,
    pub runner: RunnerConfig,
    pub queue: QueueConfig,
    pub engine: SttConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// The configured staging dir, or the platform default.
    pub fn staging_dir(&self) -> PathBuf {
        self.session
            .staging_dir
            .clone()
            .unwrap_or_else(|| AppPaths::new().staging_dir)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
