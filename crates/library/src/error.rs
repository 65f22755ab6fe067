//! Library Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Each phase module has its own
//! `ErrorKind`; the public entry points raise them into this one.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies which phase of a run failed.
///
/// ### Validation Errors (nothing has been touched yet)
/// - [`ErrorKind::InvalidInput`]
/// - [`ErrorKind::Export`]
///
/// ### Phase Errors
/// - [`ErrorKind::Output`]
/// - [`ErrorKind::Locate`]
/// - [`ErrorKind::Composite`]
/// - [`ErrorKind::Task`]
///
/// ### Cancellation
/// - [`ErrorKind::Interrupted`]
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input path is missing or not a directory.
    #[display("input is not a directory: {}", _0.display())]
    InvalidInput(#[error(not(source))] PathBuf),
    /// The export's history page could not be read or parsed.
    #[display("could not load memory records from the export")]
    Export,
    /// The output or scratch directory could not be prepared.
    #[display("could not prepare the output directory")]
    Output,
    /// The input tree could not be walked.
    #[display("could not scan the input directory")]
    Locate,
    /// A composition task failed and aborted the phase.
    #[display("composition failed")]
    Composite,
    /// A sequential phase's blocking thread panicked.
    #[display("blocking task did not complete")]
    Task,
    /// The run was cancelled between phases or items.
    #[display("interrupted")]
    Interrupted,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }

    /// `true` for errors raised before any phase started.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::Export)
    }
}
