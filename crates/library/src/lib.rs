//! Rebuilding a media library from a memories export.
//!
//! A run is a strict sequence of phases over one output directory:
//!
//! 1. [`locate`] classifies everything under the input directory,
//! 2. [`plan`] turns that snapshot into immutable operation descriptors,
//! 3. [`execute`] applies them (archive extraction, copies, untyped renames,
//!    then concurrent composition of main/overlay pairs),
//! 4. [`reconcile`] writes capture time and location back into the results.
//!
//! Every phase takes a [`Mode`]. [`Mode::Preview`] walks exactly the same
//! plans and counting logic as [`Mode::Apply`] but never touches the
//! filesystem, so a dry run reports the same numbers a real run would.
//! [`Pipeline`] strings the phases together.

pub mod census;
mod consts;
pub mod error;
pub mod execute;
mod imaging;
pub mod locate;
mod pipeline;
pub mod plan;
pub mod reconcile;
mod scratch;
pub mod stats;

pub use crate::pipeline::{Pipeline, Request, Summary};
pub use crate::scratch::ScratchDir;
pub use crate::stats::{Counter, RunReport, RunStatistics};

/// Whether side effects are applied or only counted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Create directories, extract, copy, composite and tag.
    #[default]
    Apply,
    /// Report what [`Apply`](Self::Apply) would do without writing anything.
    Preview,
}

impl Mode {
    /// `true` when side effects should happen.
    #[inline]
    pub fn applies(&self) -> bool {
        matches!(self, Mode::Apply)
    }

    pub fn from_dry_run(dry_run: bool) -> Self {
        if dry_run { Mode::Preview } else { Mode::Apply }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Mode::Apply => "apply",
            Mode::Preview => "dry run",
        })
    }
}
