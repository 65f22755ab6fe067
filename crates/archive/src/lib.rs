//! Archive handling for memories exports.
//!
//! Exports arrive as a set of ZIP files, some of which are saved with the
//! wrong extension (an archive named like a JPEG is common). This crate
//! provides:
//!
//! - **Format detection** from file extensions ([`ArchiveFormat::from_path`])
//!   or magic bytes ([`ArchiveFormat::from_magic_bytes`], [`ArchiveFormat::sniff`])
//! - **Listing** archive entries without extracting them ([`Archive::entries`])
//! - **Extraction** of every entry into a directory ([`Archive::extract_to`])
//!
//! Entry paths are always relative and are rejected if they would escape the
//! extraction directory.

mod archive;
mod construct;
pub mod error;
mod util;

pub use crate::archive::Archive;

/// A recognised archive format.
///
/// Defaults to [`None`](Self::None) (not an archive).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    /// Not an archive
    #[default]
    None,
    /// ZIP archive (.zip)
    Zip,
}
