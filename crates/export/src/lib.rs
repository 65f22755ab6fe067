//! Memory records from a memories export.
//!
//! The export ships a `memories_history.html` page listing every memory with
//! its capture date, media type, optional location and download link. This
//! crate turns that page into a [`RecordTable`](models::RecordTable) keyed by
//! lower-cased [`Identifier`](models::Identifier), which is what produced
//! files are matched against when their metadata is restored.

mod consts;
pub mod error;
pub mod models;
mod parse;

use std::path::Path;

use exn::ResultExt;
use tracing::instrument;

use crate::error::{ErrorKind, Result};
use crate::models::RecordTable;
pub use crate::parse::parse;

/// Reads and parses the history page at `path`.
///
/// Accepts raw bytes instead of requiring valid UTF-8; invalid sequences are
/// replaced with U+FFFD before parsing.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load(path: impl AsRef<Path>) -> Result<RecordTable> {
    let bytes = std::fs::read(path.as_ref()).or_raise(|| ErrorKind::Io)?;
    let table = parse(&String::from_utf8_lossy(&bytes))?;
    tracing::info!(records = table.len(), "Loaded memory records");
    Ok(table)
}
