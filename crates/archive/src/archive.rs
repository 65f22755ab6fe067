use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use zip::ZipArchive;
use zip::result::ZipError;

/// An opened ZIP archive.
pub struct Archive {
    path: PathBuf,
    inner: ZipArchive<BufReader<File>>,
}

impl std::fmt::Debug for Archive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive").field("path", &self.path).field("entries", &self.inner.len()).finish()
    }
}

impl Archive {
    /// Open the archive at `path` and read its central directory.
    ///
    /// Fails with [`ErrorKind::InvalidData`] when the file is not a readable
    /// ZIP archive (truncated downloads are the usual culprit).
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).or_raise(|| ErrorKind::Io)?;
        let inner = ZipArchive::new(BufReader::new(file)).map_err(raise_zip)?;
        tracing::trace!(path = %path.display(), entries = inner.len(), "Opened archive");
        Ok(Self { path, inner })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Relative paths of every file entry, in archive order. Directory
    /// entries are omitted.
    pub fn entries(&mut self) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::with_capacity(self.inner.len());
        for index in 0..self.inner.len() {
            let entry = self.inner.by_index_raw(index).map_err(raise_zip)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.enclosed_name().ok_or_raise(|| ErrorKind::UnsafeEntry(entry.name().to_string()))?;
            entries.push(name);
        }
        Ok(entries)
    }

    /// Extract every entry below `destination`, creating directories as
    /// needed. Returns the absolute paths of the extracted files.
    pub fn extract_to(&mut self, destination: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let destination = destination.as_ref();
        // Validate every entry before writing anything.
        let entries = self.entries()?;
        std::fs::create_dir_all(destination).or_raise(|| ErrorKind::Io)?;
        self.inner.extract(destination).map_err(raise_zip)?;
        tracing::debug!(
            archive = %self.path.display(),
            destination = %destination.display(),
            files = entries.len(),
            "Extracted archive",
        );
        Ok(entries.into_iter().map(|entry| destination.join(entry)).collect())
    }
}

fn raise_zip(err: ZipError) -> crate::error::Error {
    let kind = match &err {
        ZipError::Io(_) => ErrorKind::Io,
        ZipError::UnsupportedArchive(reason) => ErrorKind::UnsupportedFormat(reason.to_string()),
        _ => ErrorKind::InvalidData,
    };
    exn::Exn::from(err).raise(kind)
}
