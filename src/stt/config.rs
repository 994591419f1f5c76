//! [`EngineConfig`]: the owned, validated inputs a speech engine opens from.

use std::path::Path;

use thiserror::Error;

use super::transcribe::TranscribeParams;

/// Why an [`EngineConfig`] could not be built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineConfigError {
    /// A path is not representable as UTF-8.
    #[error("path is not valid UTF-8: {0}")]
    NonUtf8(String),

    /// Storage for a path string could not be reserved.
    #[error("out of memory while copying path")]
    Alloc,

    /// The values are well-formed but unusable.
    #[error("invalid engine configuration: {0}")]
    Invalid(&'static str),
}

/// Paths and parameters handed to
/// [`Backend::open_engine`](crate::session::Backend::open_engine).
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub model_dir: String,
    pub dictionary: String,
    pub keyword_list: String,
    /// Rate of the PCM passed to `process`.
    pub sample_rate: u32,
    pub params: TranscribeParams,
}

impl EngineConfig {
    /// Build a configuration from staged paths.
    ///
    /// # Errors
    ///
    /// - [`EngineConfigError::NonUtf8`] when any path is not UTF-8.
    /// - [`EngineConfigError::Alloc`] when path storage cannot be reserved.
    /// - [`EngineConfigError::Invalid`] on an empty path or zero sample rate.
    pub fn from_paths(
        model_dir: &Path,
        dictionary: &Path,
        keyword_list: &Path,
        sample_rate: u32,
        params: TranscribeParams,
    ) -> Result<Self, EngineConfigError> {
        let config = Self {
            model_dir: owned_path(model_dir)?,
            dictionary: owned_path(dictionary)?,
            keyword_list: owned_path(keyword_list)?,
            sample_rate,
            params,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), EngineConfigError> {
        if self.sample_rate == 0 {
            return Err(EngineConfigError::Invalid("sample rate is zero"));
        }
        if self.model_dir.is_empty() || self.dictionary.is_empty() || self.keyword_list.is_empty()
        {
            return Err(EngineConfigError::Invalid("empty path"));
        }
        Ok(())
    }
}

fn owned_path(path: &Path) -> Result<String, EngineConfigError> {
    let s = path
        .to_str()
        .ok_or_else(|| EngineConfigError::NonUtf8(path.display().to_string()))?;
    let mut owned = String::new();
    owned
        .try_reserve_exact(s.len())
        .map_err(|_| EngineConfigError::Alloc)?;
    owned.push_str(s);
    Ok(owned)
}
