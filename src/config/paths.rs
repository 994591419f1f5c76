//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Windows: %APPDATA%\kws-runner\
//!   macOS:   ~/Library/Application Support/kws-runner/
//!   Linux:   ~/.config/kws-runner/
//!
//! Staging dir (copied model, dictionary and keyword list):
//!   Windows: %LOCALAPPDATA%\kws-runner\stt\
//!   macOS:   ~/Library/Application Support/kws-runner/stt/
//!   Linux:   ~/.local/share/kws-runner/stt/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Writable directory that session assets are staged into.
    pub staging_dir: PathBuf,
}

impl AppPaths {
    pub const APP_NAME: &'static str = "kws-runner";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");
        let staging_dir = data_dir.join("stt");

        Self {
            config_dir,
            settings_file,
            staging_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
