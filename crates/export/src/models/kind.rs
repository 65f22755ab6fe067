use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use crate::error::{Error, ErrorKind};

/// The two kinds of memory an export can contain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// A still photo (`.jpg`, `.jpeg` or `.png`).
    #[default]
    Image,
    /// A video clip (`.mp4`).
    Video,
}

impl MediaKind {
    /// Infers the kind from a file extension, with or without the leading dot.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.trim_start_matches('.').to_lowercase().as_str() {
            "jpg" | "jpeg" | "png" => Some(Self::Image),
            "mp4" => Some(Self::Video),
            _ => None,
        }
    }

    /// The extension produced for a composited memory of this kind, without
    /// the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Image => "jpg",
            Self::Video => "mp4",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

impl FromStr for MediaKind {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "image" | "photo" => Self::Image,
            "video" => Self::Video,
            _ => exn::bail!(ErrorKind::ParseError { field: "media type", value: s.to_string() }),
        })
    }
}

impl Display for MediaKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}
