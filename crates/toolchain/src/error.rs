//! Toolchain Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::time::Duration;

/// A toolchain error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for toolchain operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The executable is not installed (or not on `PATH`).
    #[display("{_0} not detected on your system")]
    NotFound(#[error(not(source))] &'static str),
    /// The process could not be started at all.
    #[display("could not start {_0}")]
    Spawn(#[error(not(source))] String),
    /// The process ran longer than allowed and was killed.
    #[display("{program} timed out after {}s", limit.as_secs())]
    Timeout { program: String, limit: Duration },
    /// The process exited unsuccessfully.
    /// A missing exit code means it was killed by a signal.
    #[display("{program} exited with code {code:?}: {stderr}")]
    Failed { program: String, code: Option<i32>, stderr: String },
    #[display("could not format timestamp")]
    Timestamp,
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Io)
    }
}
