//! Locating the GGML model inside a staged model directory.

use std::path::{Path, PathBuf};

use super::engine::SttError;

/// File extension of GGML model weights.
pub const MODEL_EXTENSION: &str = "bin";

/// Return the first `*.bin` file in `model_dir`, in file-name order.
///
/// Sub-directories are not searched.
///
/// # Errors
///
/// [`SttError::ModelNotFound`] when the directory cannot be read or holds no
/// model file.
pub fn find_model_file(model_dir: impl AsRef<Path>) -> Result<PathBuf, SttError> {
    let dir = model_dir.as_ref();
    let entries = std::fs::read_dir(dir)
        .map_err(|e| SttError::ModelNotFound(format!("{}: {e}", dir.display())))?;

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(MODEL_EXTENSION)
        })
        .collect();
    candidates.sort();

    candidates.into_iter().next().ok_or_else(|| {
        SttError::ModelNotFound(format!("no *.{MODEL_EXTENSION} file in {}", dir.display()))
    })
}
