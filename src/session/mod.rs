//! Recognition session: the audio device and speech engine for one
//! configured set of assets.
//!
//! # Lifecycle
//!
//! ```text
//! Session::new()                       handles = None
//!   ├─ set_model_dir / set_dictionary_file / set_keyword_list_file
//!   ├─ init()
//!   │    ├─ stage assets under staging_dir
//!   │    ├─ EngineConfig::from_paths(staged)
//!   │    ├─ backend.open_audio()        ── error ─▶ nothing opened
//!   │    └─ backend.open_engine()       ── error ─▶ audio dropped
//!   │                                    handles = Some(engine, audio)
//!   └─ drop / release()                  engine dropped, then audio
//! ```
//!
//! A session is shared with a [`Runner`](crate::pipeline::Runner) as a
//! [`SharedSession`]; the capture thread holds its lock for a whole run.

pub mod backend;
pub mod staging;

pub use backend::{Backend, DefaultBackend, RING_READS};
pub use staging::{FileStaging, FsStaging};

#[cfg(test)]
pub use backend::MockBackend;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::{error, info, warn};

use crate::audio::AudioDevice;
use crate::config::{AppPaths, AudioConfig, SessionConfig};
use crate::error::ErrorKind;
use crate::stt::{EngineConfig, EngineConfigError, SpeechEngine, TranscribeParams};

/// Default sample rate delivered to the engine.
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;
/// Default frames per device read.
pub const DEFAULT_CAPTURE_BUFFER_SIZE: usize = 2_048;

/// Thread-safe handle to a [`Session`].
pub type SharedSession = Arc<Mutex<Session>>;

/// The opened device and engine.  Fields drop in declaration order, so the
/// engine is released before the device it was fed from.
pub(crate) struct Handles {
    pub(crate) engine: Box<dyn SpeechEngine>,
    pub(crate) audio: Box<dyn AudioDevice>,
}

/// Configuration plus, once initialised, the native handles.
pub struct Session {
    model_dir: Option<PathBuf>,
    dictionary_file: Option<PathBuf>,
    keyword_list_file: Option<PathBuf>,
    device_name: Option<String>,
    sample_rate: u32,
    capture_buffer_size: usize,
    staging_dir: PathBuf,
    params: TranscribeParams,
    backend: Box<dyn Backend>,
    staging: Box<dyn FileStaging>,
    handles: Option<Handles>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("model_dir", &self.model_dir)
            .field("dictionary_file", &self.dictionary_file)
            .field("keyword_list_file", &self.keyword_list_file)
            .field("device_name", &self.device_name)
            .field("sample_rate", &self.sample_rate)
            .field("capture_buffer_size", &self.capture_buffer_size)
            .field("staging_dir", &self.staging_dir)
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// An empty session using cpal, whisper and the real filesystem.
    pub fn new() -> Self {
        Self::with_backend(Box::new(DefaultBackend::default()), Box::new(FsStaging))
    }

    /// An empty session with custom handle factories.
    pub fn with_backend(backend: Box<dyn Backend>, staging: Box<dyn FileStaging>) -> Self {
        Self {
            model_dir: None,
            dictionary_file: None,
            keyword_list_file: None,
            device_name: None,
            sample_rate: DEFAULT_SAMPLE_RATE,
            capture_buffer_size: DEFAULT_CAPTURE_BUFFER_SIZE,
            staging_dir: AppPaths::new().staging_dir,
            params: TranscribeParams::default(),
            backend,
            staging,
            handles: None,
        }
    }

    /// Build a session from loaded settings, applying every value through
    /// the validating setters.  Rejected values are logged and skipped.
    pub fn from_config(session: &SessionConfig, audio: &AudioConfig) -> Self {
        let mut s = Self::with_backend(
            Box::new(DefaultBackend::new(audio.read_timeout())),
            Box::new(FsStaging),
        );
        s.apply_config(session, audio);
        s
    }

    fn apply_config(&mut self, session: &SessionConfig, audio: &AudioConfig) {
        if let Some(dir) = &session.model_dir {
            self.set_model_dir(dir);
        }
        if let Some(file) = &session.dictionary_file {
            self.set_dictionary_file(file);
        }
        if let Some(file) = &session.keyword_list_file {
            self.set_keyword_list_file(file);
        }
        if let Some(dir) = &session.staging_dir {
            self.set_staging_dir(dir);
        }
        self.set_device_name(audio.device.clone());
        self.set_sample_rate(audio.sample_rate);
        self.set_capture_buffer_size(audio.capture_buffer_size);
    }

    /// Wrap the session for sharing with a runner.
    pub fn into_shared(self) -> SharedSession {
        Arc::new(Mutex::new(self))
    }

    // -----------------------------------------------------------------------
    // Setters
    // -----------------------------------------------------------------------

    /// Set the model directory.  Rejected unless `path` is a directory.
    pub fn set_model_dir(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        if !path.is_dir() {
            error!("session: model dir {} does not exist", path.display());
            return false;
        }
        self.model_dir = Some(path.to_path_buf());
        true
    }

    /// Set the pronunciation dictionary.  Rejected unless `path` is a file.
    pub fn set_dictionary_file(&mut self, path: impl AsRef<Path>) -> bool {
        match existing_file(path.as_ref(), "dictionary") {
            Some(p) => {
                self.dictionary_file = Some(p);
                true
            }
            None => false,
        }
    }

    /// Set the keyword list.  Rejected unless `path` is a file.
    pub fn set_keyword_list_file(&mut self, path: impl AsRef<Path>) -> bool {
        match existing_file(path.as_ref(), "keyword list") {
            Some(p) => {
                self.keyword_list_file = Some(p);
                true
            }
            None => false,
        }
    }

    /// `None` selects the system default input.
    pub fn set_device_name(&mut self, name: Option<String>) {
        self.device_name = name;
    }

    pub fn set_sample_rate(&mut self, rate: u32) -> bool {
        if rate == 0 {
            error!("session: sample rate must be > 0");
            return false;
        }
        self.sample_rate = rate;
        true
    }

    pub fn set_capture_buffer_size(&mut self, frames: usize) -> bool {
        if frames == 0 {
            error!("session: capture buffer size must be > 0");
            return false;
        }
        self.capture_buffer_size = frames;
        true
    }

    pub fn set_staging_dir(&mut self, dir: impl Into<PathBuf>) {
        self.staging_dir = dir.into();
    }

    pub fn set_transcribe_params(&mut self, params: TranscribeParams) {
        self.params = params;
    }

    // -----------------------------------------------------------------------
    // Getters
    // -----------------------------------------------------------------------

    pub fn model_dir(&self) -> Option<&Path> {
        self.model_dir.as_deref()
    }

    pub fn dictionary_file(&self) -> Option<&Path> {
        self.dictionary_file.as_deref()
    }

    pub fn keyword_list_file(&self) -> Option<&Path> {
        self.keyword_list_file.as_deref()
    }

    pub fn device_name(&self) -> Option<&str> {
        self.device_name.as_deref()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn capture_buffer_size(&self) -> usize {
        self.capture_buffer_size
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    // -----------------------------------------------------------------------
    // Handles
    // -----------------------------------------------------------------------

    /// Stage the assets and open the audio device and speech engine.
    ///
    /// On failure nothing opened by this call survives, and handles from an
    /// earlier successful `init` are kept.
    ///
    /// # Errors
    ///
    /// In check order: [`ErrorKind::UndefinedFiles`],
    /// [`ErrorKind::UserDirMake`], [`ErrorKind::UserDirCopy`],
    /// [`ErrorKind::MultibyteStr`] / [`ErrorKind::MemAlloc`] /
    /// [`ErrorKind::ConfigCreate`], [`ErrorKind::AudioDeviceOpen`],
    /// [`ErrorKind::DecoderCreate`].
    pub fn init(&mut self) -> Result<(), ErrorKind> {
        let (Some(model_dir), Some(dictionary), Some(keyword_list)) = (
            self.model_dir.as_deref(),
            self.dictionary_file.as_deref(),
            self.keyword_list_file.as_deref(),
        ) else {
            error!("session: model dir, dictionary and keyword list must all be set");
            return Err(ErrorKind::UndefinedFiles);
        };

        if !self.staging.ensure_dir(&self.staging_dir) {
            return Err(ErrorKind::UserDirMake);
        }
        let copied = self.staging.copy_dir_recursive(model_dir, &self.staging_dir)
            && self.staging.copy_file(dictionary, &self.staging_dir)
            && self.staging.copy_file(keyword_list, &self.staging_dir);
        if !copied {
            return Err(ErrorKind::UserDirCopy);
        }

        let config = EngineConfig::from_paths(
            &self.staged(model_dir)?,
            &self.staged(dictionary)?,
            &self.staged(keyword_list)?,
            self.sample_rate,
            self.params.clone(),
        )
        .map_err(|e| {
            error!("session: engine configuration rejected: {e}");
            match e {
                EngineConfigError::NonUtf8(_) => ErrorKind::MultibyteStr,
                EngineConfigError::Alloc => ErrorKind::MemAlloc,
                EngineConfigError::Invalid(_) => ErrorKind::ConfigCreate,
            }
        })?;

        let audio = self
            .backend
            .open_audio(
                self.device_name.as_deref(),
                self.sample_rate,
                self.capture_buffer_size,
            )
            .map_err(|e| {
                error!("session: cannot open audio device: {e}");
                ErrorKind::AudioDeviceOpen
            })?;

        let engine = match self.backend.open_engine(&config) {
            Ok(engine) => engine,
            Err(e) => {
                error!("session: cannot create decoder: {e}");
                drop(audio);
                return Err(ErrorKind::DecoderCreate);
            }
        };

        if self.handles.replace(Handles { engine, audio }).is_some() {
            warn!("session: re-initialised, previous handles released");
        }
        info!(
            "session: ready ({} Hz, {} frames per read, staged in {})",
            self.sample_rate,
            self.capture_buffer_size,
            self.staging_dir.display()
        );
        Ok(())
    }

    /// Release the engine, then the audio device.
    pub fn release(&mut self) {
        if self.handles.take().is_some() {
            info!("session: released");
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.handles.is_some()
    }

    pub(crate) fn handles_mut(&mut self) -> Option<&mut Handles> {
        self.handles.as_mut()
    }

    fn staged(&self, src: &Path) -> Result<PathBuf, ErrorKind> {
        src.file_name()
            .map(|name| self.staging_dir.join(name))
            .ok_or(ErrorKind::UserDirCopy)
    }
}

fn existing_file(path: &Path, what: &str) -> Option<PathBuf> {
    if path.is_file() {
        Some(path.to_path_buf())
    } else {
        error!("session: {what} {} does not exist", path.display());
        None
    }
}

// ---------------------------------------------------------------------------
// Test fixtures
// ---------------------------------------------------------------------------


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::testing::{mock_session, Assets};
    use super::*;
    use crate::audio::MockAudioDevice;
    use crate::stt::{find_model_file, MockSpeechEngine};
    use std::sync::atomic::Ordering;

    fn backend() -> MockBackend {
        MockBackend::new(MockAudioDevice::silent(), MockSpeechEngine::deaf())
    }

    /// Staging that fails at a chosen step.
    struct BrokenStaging {
        fail_mkdir: bool,
    }

    impl FileStaging for BrokenStaging {
        fn ensure_dir(&self, _dir: &Path) -> bool {
            !self.fail_mkdir
        }
        fn copy_file(&self, _src: &Path, _dst_dir: &Path) -> bool {
            false
        }
        fn copy_dir_recursive(&self, _src: &Path, _dst_dir: &Path) -> bool {
            true
        }
    }

    // ---- setters -----------------------------------------------------------

    #[test]
    fn setters_reject_missing_paths_and_keep_prior_value() {
        let assets = Assets::new();
        let mut s = mock_session(backend());
        assert!(s.set_model_dir(assets.dir.path().join("model")));

        assert!(!s.set_model_dir(assets.dir.path().join("absent")));
        assert_eq!(s.model_dir(), Some(assets.dir.path().join("model").as_path()));

        assert!(!s.set_dictionary_file(assets.dir.path().join("model")));
        assert!(s.dictionary_file().is_none());
        assert!(!s.set_keyword_list_file("/nonexistent/keywords.list"));
        assert!(s.keyword_list_file().is_none());
    }

    #[test]
    fn zero_rate_and_buffer_are_rejected() {
        let mut s = mock_session(backend());
        assert!(!s.set_sample_rate(0));
        assert!(!s.set_capture_buffer_size(0));
        assert_eq!(s.sample_rate(), DEFAULT_SAMPLE_RATE);
        assert_eq!(s.capture_buffer_size(), DEFAULT_CAPTURE_BUFFER_SIZE);

        assert!(s.set_sample_rate(8_000));
        assert!(s.set_capture_buffer_size(512));
        assert_eq!(s.sample_rate(), 8_000);
        assert_eq!(s.capture_buffer_size(), 512);
    }

    #[test]
    fn from_config_applies_valid_values() {
        let assets = Assets::new();
        let root = assets.dir.path();
        let session_cfg = SessionConfig {
            model_dir: Some(root.join("model")),
            dictionary_file: Some(root.join("words.dict")),
            keyword_list_file: Some(root.join("absent.list")),
            staging_dir: Some(root.join("stage")),
        };
        let audio_cfg = AudioConfig {
            device: Some("USB Mic".into()),
            capture_buffer_size: 0,
            ..AudioConfig::default()
        };

        let s = Session::from_config(&session_cfg, &audio_cfg);
        assert_eq!(s.model_dir(), Some(root.join("model").as_path()));
        assert!(s.keyword_list_file().is_none());
        assert_eq!(s.device_name(), Some("USB Mic"));
        assert_eq!(s.capture_buffer_size(), DEFAULT_CAPTURE_BUFFER_SIZE);
        assert_eq!(s.staging_dir(), root.join("stage"));
        assert!(!s.is_initialized());
    }

    // ---- init --------------------------------------------------------------

    #[test]
    fn init_without_files_is_undefined_files() {
        let mut s = mock_session(backend());
        assert_eq!(s.init(), Err(ErrorKind::UndefinedFiles));
        assert!(!s.is_initialized());
    }

    #[test]
    fn init_stages_assets_and_opens_handles() {
        let assets = Assets::new();
        let mut s = mock_session(backend());
        assets.configure(&mut s);

        assert_eq!(s.init(), Ok(()));
        assert!(s.is_initialized());

        let stage = assets.dir.path().join("stage");
        assert!(stage.join("model/ggml-tiny.bin").is_file());
        assert!(stage.join("words.dict").is_file());
        assert!(stage.join("keywords.list").is_file());
    }

    #[test]
    fn engine_config_points_at_staged_copies() {
        let assets = Assets::new();
        let backend = Arc::new(backend());
        let mut s = Session::with_backend(Box::new(Arc::clone(&backend)), Box::new(FsStaging));
        assets.configure(&mut s);
        s.set_device_name(Some("Mic".into()));
        s.set_capture_buffer_size(1_024);
        s.init().unwrap();

        let stage = assets.dir.path().join("stage");
        let config = backend.engine_config().unwrap();
        assert_eq!(config.model_dir, stage.join("model").to_str().unwrap());
        assert_eq!(config.dictionary, stage.join("words.dict").to_str().unwrap());
        assert_eq!(config.keyword_list, stage.join("keywords.list").to_str().unwrap());
        assert_eq!(config.sample_rate, DEFAULT_SAMPLE_RATE);
        assert_eq!(backend.audio_opens(), 1);
        assert_eq!(
            backend.audio_request(),
            Some((Some("Mic".into()), DEFAULT_SAMPLE_RATE, 1_024))
        );
    }

    #[test]
    fn restaging_replaces_a_previous_model_dir() {
        let assets = Assets::new();
        let stage = assets.dir.path().join("stage");
        let other = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(other.path().join("model")).unwrap();
        std::fs::write(other.path().join("model/ggml-base.bin"), b"old").unwrap();

        let mut first = mock_session(backend());
        assets.configure(&mut first);
        assert!(first.set_model_dir(other.path().join("model")));
        first.init().unwrap();
        assert!(stage.join("model/ggml-base.bin").is_file());

        // Same staging dir, different model dir with the same name.
        let mut second = mock_session(backend());
        assets.configure(&mut second);
        second.init().unwrap();

        assert!(!stage.join("model/ggml-base.bin").exists());
        assert_eq!(
            find_model_file(stage.join("model")).unwrap(),
            stage.join("model/ggml-tiny.bin")
        );
    }

    #[test]
    fn staging_dir_failure_is_user_dir_make() {
        let assets = Assets::new();
        let backend = Arc::new(backend());
        let mut s = Session::with_backend(
            Box::new(Arc::clone(&backend)),
            Box::new(BrokenStaging { fail_mkdir: true }),
        );
        assets.configure(&mut s);
        assert_eq!(s.init(), Err(ErrorKind::UserDirMake));
        assert_eq!(backend.audio_opens(), 0);
    }

    #[test]
    fn copy_failure_is_user_dir_copy() {
        let assets = Assets::new();
        let backend = Arc::new(backend());
        let mut s = Session::with_backend(
            Box::new(Arc::clone(&backend)),
            Box::new(BrokenStaging { fail_mkdir: false }),
        );
        assets.configure(&mut s);
        assert_eq!(s.init(), Err(ErrorKind::UserDirCopy));
        assert!(!s.is_initialized());
        assert_eq!(backend.audio_opens(), 0);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn non_utf8_staging_dir_is_multibyte_str() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let assets = Assets::new();
        let backend = Arc::new(backend());
        let mut s = Session::with_backend(Box::new(Arc::clone(&backend)), Box::new(FsStaging));
        assets.configure(&mut s);
        s.set_staging_dir(assets.dir.path().join(OsStr::from_bytes(b"stage-\xff")));

        assert_eq!(s.init(), Err(ErrorKind::MultibyteStr));
        assert!(!s.is_initialized());
        assert_eq!(backend.audio_opens(), 0);
    }

    #[test]
    fn audio_failure_is_audio_device_open() {
        let assets = Assets::new();
        let backend = Arc::new(backend().failing_audio());
        let mut s = Session::with_backend(Box::new(Arc::clone(&backend)), Box::new(FsStaging));
        assets.configure(&mut s);
        assert_eq!(s.init(), Err(ErrorKind::AudioDeviceOpen));
        assert!(!s.is_initialized());
        assert_eq!(backend.audio_opens(), 1);
        assert!(backend.engine_config().is_none(), "engine must not be opened");
    }

    #[test]
    fn engine_failure_rolls_back_audio_device() {
        let assets = Assets::new();
        let device = MockAudioDevice::silent();
        let probe = device.probe();
        let mut s = mock_session(MockBackend::new(device, MockSpeechEngine::deaf()).failing_engine());
        assets.configure(&mut s);

        assert_eq!(s.init(), Err(ErrorKind::DecoderCreate));
        assert!(!s.is_initialized());
        assert!(probe.dropped.load(Ordering::SeqCst), "audio must be released");
    }

    #[test]
    fn failed_reinit_keeps_previous_handles() {
        let assets = Assets::new();
        let device = MockAudioDevice::silent();
        let probe = device.probe();
        // The mock hands out one device, so the second init cannot open audio.
        let mut s = mock_session(MockBackend::new(device, MockSpeechEngine::deaf()));
        assets.configure(&mut s);

        s.init().unwrap();
        assert_eq!(s.init(), Err(ErrorKind::AudioDeviceOpen));
        assert!(s.is_initialized());
        assert!(!probe.dropped.load(Ordering::SeqCst));
    }

    #[test]
    fn release_drops_both_handles() {
        let assets = Assets::new();
        let device = MockAudioDevice::silent();
        let engine = MockSpeechEngine::deaf();
        let (dev_probe, eng_probe) = (device.probe(), engine.probe());
        let mut s = mock_session(MockBackend::new(device, engine));
        assets.configure(&mut s);
        s.init().unwrap();

        s.release();
        assert!(!s.is_initialized());
        assert!(dev_probe.dropped.load(Ordering::SeqCst));
        assert!(eng_probe.dropped.load(Ordering::SeqCst));
    }

    #[test]
    fn shared_session_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SharedSession>();
    }
}
