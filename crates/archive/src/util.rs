use crate::ArchiveFormat;
use std::fmt::{Display, Formatter, Result as FmtResult};

impl Display for ArchiveFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl ArchiveFormat {
    /// Returns the conventional file extension for this format, including the
    /// leading dot.
    #[inline]
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::None => "",
            ArchiveFormat::Zip => ".zip",
        }
    }

    /// Returns the short name (for displaying to user)
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveFormat::None => "none",
            ArchiveFormat::Zip => "zip",
        }
    }

    #[inline]
    #[must_use]
    pub fn is_archive(&self) -> bool {
        !matches!(self, ArchiveFormat::None)
    }
}

#[cfg(test)]
mod tests {
    use crate::ArchiveFormat;
    use rstest::rstest;

    #[rstest]
    #[case(ArchiveFormat::None, "")]
    #[case(ArchiveFormat::Zip, ".zip")]
    fn test_extension(#[case] format: ArchiveFormat, #[case] expected: &str) {
        assert_eq!(format.extension(), expected);
    }

    #[test]
    fn test_display() {
        assert_eq!(ArchiveFormat::Zip.to_string(), "zip");
        assert!(ArchiveFormat::Zip.is_archive());
        assert!(!ArchiveFormat::None.is_archive());
    }
}
