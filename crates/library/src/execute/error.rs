use derive_more::{Display, Error};
use std::path::PathBuf;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Producing a specific output failed.
    #[display("could not composite {}", _0.display())]
    Composite(#[error(not(source))] PathBuf),
    #[display("could not decode or encode image")]
    Image,
    #[display("could not encode video")]
    Video,
    /// Video pairs exist but FFmpeg is not installed.
    #[display("FFmpeg is required to composite videos")]
    NoVideoEncoder,
    /// A blocking worker panicked or was cancelled.
    #[display("composition task did not complete")]
    Task,
    Io,
}

impl ErrorKind {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io | Self::Task)
    }
}
