use crate::ArchiveFormat;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

impl ArchiveFormat {
    /// Detect an archive from a file extension (case-insensitive).
    #[must_use]
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| match ext.to_lowercase().as_str() {
                "zip" => ArchiveFormat::Zip,
                _ => ArchiveFormat::None,
            })
            .unwrap_or(ArchiveFormat::None)
    }

    /// Detect an archive from magic bytes.
    ///
    /// Returns `None` variant if no magic bytes match or if the input
    /// is too short to detect any format.
    #[must_use]
    pub fn from_magic_bytes(bytes: &[u8]) -> Self {
        if bytes.starts_with(&ZIP_MAGIC) {
            return ArchiveFormat::Zip;
        }
        ArchiveFormat::None
    }

    /// Detect an archive by reading the first few bytes of the file at `path`,
    /// ignoring its extension entirely.
    pub fn sniff(path: impl AsRef<Path>) -> Result<Self> {
        let mut head = Vec::with_capacity(ZIP_MAGIC.len());
        File::open(path.as_ref())
            .and_then(|file| file.take(ZIP_MAGIC.len() as u64).read_to_end(&mut head))
            .or_raise(|| ErrorKind::Io)?;
        Ok(Self::from_magic_bytes(&head))
    }
}
