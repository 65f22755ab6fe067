use std::io;
use std::path::{Path, PathBuf};

use crate::Mode;

/// The run-scoped working directory.
///
/// Created fresh at the start of a run (a stale one left by a killed process
/// is wiped first) and removed when the guard is dropped, whether the run
/// finished, failed or was cancelled. A preview run never creates it.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    created: bool,
}

impl ScratchDir {
    pub fn create(path: impl Into<PathBuf>, mode: Mode) -> io::Result<Self> {
        let path = path.into();
        if !mode.applies() {
            return Ok(Self { path, created: false });
        }
        match std::fs::remove_dir_all(&path) {
            Ok(()) => tracing::debug!(path = %path.display(), "Removed stale scratch directory"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {},
            Err(e) => return Err(e),
        }
        std::fs::create_dir_all(&path)?;
        Ok(Self { path, created: true })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if !self.created {
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Removed scratch directory"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {},
            Err(e) => tracing::warn!(path = %self.path.display(), error = %e, "Could not remove scratch directory"),
        }
    }
}
