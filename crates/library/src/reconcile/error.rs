use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("could not build EXIF data")]
    Exif,
    /// The file claims to be a JPEG but its segments don't parse.
    #[display("malformed JPEG")]
    InvalidJpeg,
    #[display("unsupported image format")]
    UnsupportedImage,
    #[display("could not convert image")]
    Image,
    /// Converting would replace a different file.
    #[display("conversion target already exists: {}", _0.display())]
    TargetExists(#[error(not(source))] std::path::PathBuf),
    #[display("could not write PNG text metadata")]
    Png,
    #[display("could not tag video")]
    Video,
    /// Neither ExifTool nor FFmpeg is available.
    #[display("no video metadata writer available")]
    NoVideoTool,
    #[display("could not format timestamp")]
    Timestamp,
    #[display("blocking task did not complete")]
    Task,
    Io,
}

impl ErrorKind {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io | Self::Task)
    }
}
