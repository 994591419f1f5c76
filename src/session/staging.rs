//! Copying recognition assets into a writable staging directory.
//!
//! The engine never opens files where the user configured them; a
//! [`Session`](crate::session::Session) first copies the model directory,
//! the dictionary and the keyword list under its staging dir.  Every
//! operation reports success as a `bool` and logs the cause on failure, so
//! the session can map it onto a single
//! [`ErrorKind`](crate::ErrorKind).

use std::fs;
use std::io;
use std::path::Path;

/// Filesystem operations used to stage session assets.
pub trait FileStaging: Send + Sync {
    /// Create `dir` and its parents if missing.
    fn ensure_dir(&self, dir: &Path) -> bool;

    /// Copy `src` to `dst_dir/<file name>`.
    fn copy_file(&self, src: &Path, dst_dir: &Path) -> bool;

    /// Replace `dst_dir/<dir name>` with a copy of the tree at `src`.
    fn copy_dir_recursive(&self, src: &Path, dst_dir: &Path) -> bool;
}

/// [`FileStaging`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStaging;

impl FileStaging for FsStaging {
    fn ensure_dir(&self, dir: &Path) -> bool {
        match fs::create_dir_all(dir) {
            Ok(()) => true,
            Err(e) => {
                log::error!("staging: cannot create {}: {e}", dir.display());
                false
            }
        }
    }

    fn copy_file(&self, src: &Path, dst_dir: &Path) -> bool {
        let Some(name) = src.file_name() else {
            log::error!("staging: {} has no file name", src.display());
            return false;
        };
        let dst = dst_dir.join(name);
        match fs::copy(src, &dst) {
            Ok(bytes) => {
                log::debug!("staging: {} -> {} ({bytes} bytes)", src.display(), dst.display());
                true
            }
            Err(e) => {
                log::error!(
                    "staging: copy {} -> {} failed: {e}",
                    src.display(),
                    dst.display()
                );
                false
            }
        }
    }

    fn copy_dir_recursive(&self, src: &Path, dst_dir: &Path) -> bool {
        let Some(name) = src.file_name() else {
            log::error!("staging: {} has no directory name", src.display());
            return false;
        };
        let dst = dst_dir.join(name);
        if dst.starts_with(src) || src.starts_with(&dst) {
            log::error!(
                "staging: {} and {} overlap, refusing to copy",
                src.display(),
                dst.display()
            );
            return false;
        }
        // Files left over from an earlier staging must not survive.
        if dst.exists() {
            if let Err(e) = fs::remove_dir_all(&dst) {
                log::error!("staging: cannot clear {}: {e}", dst.display());
                return false;
            }
        }
        match copy_tree(src, &dst) {
            Ok(()) => {
                log::debug!("staging: {} -> {}", src.display(), dst.display());
                true
            }
            Err(e) => {
                log::error!(
                    "staging: copy {} -> {} failed: {e}",
                    src.display(),
                    dst.display()
                );
                false
            }
        }
    }
}

fn copy_tree(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
