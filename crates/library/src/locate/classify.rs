use std::path::Path;

use remem_archive::ArchiveFormat;
use remem_export::models::{Identifier, MediaKind};

use crate::consts::{COMBINED_MARKER, MAIN_SUFFIX, OVERLAY_SUFFIX};

/// What a file is, decided once per path.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum AssetClass {
    /// A ZIP archive, by extension or by content.
    Archive,
    /// `<identifier>-main.<ext>`: the base photo or video of a pair.
    Main { identifier: Identifier, kind: MediaKind },
    /// `<identifier>-overlay.png`: the transparent layer of a pair.
    Overlay { identifier: Identifier },
    /// No extension at all; treated as an image awaiting a `.jpg` name.
    Untyped,
    /// A video that is neither a main file nor an already-composited output.
    Standalone,
    Ignored,
}

/// The role a file plays in a memory, independent of where it lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssetRole {
    Main,
    Overlay,
    Standalone,
    Untyped,
}

impl AssetClass {
    pub fn role(&self) -> Option<AssetRole> {
        match self {
            AssetClass::Main { .. } => Some(AssetRole::Main),
            AssetClass::Overlay { .. } => Some(AssetRole::Overlay),
            AssetClass::Standalone => Some(AssetRole::Standalone),
            AssetClass::Untyped => Some(AssetRole::Untyped),
            AssetClass::Archive | AssetClass::Ignored => None,
        }
    }

    pub fn is_archive(&self) -> bool {
        matches!(self, AssetClass::Archive)
    }
}

/// Splits a main file name into its identifier and extension (with the dot).
///
/// Both halves are lower-cased, so `ABCfoo-main.JPG` and `abcfoo-main.jpg`
/// split identically into `("abcfoo", ".jpg")`. Returns `None` for anything
/// that isn't `<identifier>-main.<ext>`.
pub fn split_identifier(name: &str) -> Option<(Identifier, String)> {
    let lower = name.to_lowercase();
    let (stem, extension) = lower.rsplit_once('.')?;
    let identifier = stem.strip_suffix(MAIN_SUFFIX).filter(|id| !id.is_empty())?;
    if extension.is_empty() {
        return None;
    }
    Some((Identifier::new(identifier), format!(".{extension}")))
}

/// Classifies a file from its name alone.
pub fn classify_name(name: &str) -> AssetClass {
    if ArchiveFormat::from_path(name).is_archive() {
        return AssetClass::Archive;
    }
    if let Some((identifier, extension)) = split_identifier(name) {
        return match MediaKind::from_extension(&extension) {
            Some(kind) => AssetClass::Main { identifier, kind },
            None => AssetClass::Ignored,
        };
    }
    let lower = name.to_lowercase();
    if let Some(identifier) = lower.strip_suffix(OVERLAY_SUFFIX).filter(|id| !id.is_empty()) {
        return AssetClass::Overlay { identifier: Identifier::new(identifier) };
    }
    // Hidden files (`.DS_Store`) have no extension either, but aren't memories.
    if lower.starts_with('.') {
        return AssetClass::Ignored;
    }
    match Path::new(&lower).extension().and_then(|e| e.to_str()) {
        None => AssetClass::Untyped,
        Some("mp4") if !lower.contains(COMBINED_MARKER) => AssetClass::Standalone,
        Some(_) => AssetClass::Ignored,
    }
}

/// Classifies the file at `path`, reading its first bytes when the name
/// alone can't rule out an archive.
///
/// Main and overlay files are trusted by name; anything else that starts with
/// the ZIP signature is an archive whatever it's called.
pub fn classify(path: &Path) -> AssetClass {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return AssetClass::Ignored;
    };
    let class = classify_name(name);
    if matches!(class, AssetClass::Archive | AssetClass::Main { .. } | AssetClass::Overlay { .. }) {
        return class;
    }
    match ArchiveFormat::sniff(path) {
        Ok(ArchiveFormat::Zip) => AssetClass::Archive,
        Ok(ArchiveFormat::None) => class,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = ?e, "Could not sniff file contents");
            class
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn main(id: &str, kind: MediaKind) -> AssetClass {
        AssetClass::Main { identifier: Identifier::new(id), kind }
    }

    #[rstest]
    #[case("ABCfoo-main.jpg", "abcfoo", ".jpg")]
    #[case("abcfoo-main.JPG", "abcfoo", ".jpg")]
    #[case("0A1B-2c3d-main.mp4", "0a1b-2c3d", ".mp4")]
    #[case("x-main.weird", "x", ".weird")]
    fn splits_main_names(#[case] name: &str, #[case] identifier: &str, #[case] extension: &str) {
        let (id, ext) = split_identifier(name).unwrap();
        assert_eq!(id.as_str(), identifier);
        assert_eq!(ext, extension);
    }

    #[rstest]
    #[case("-main.jpg")]
    #[case("abc-main")]
    #[case("abc-main.")]
    #[case("abc-overlay.png")]
    #[case("abc.jpg")]
    fn rejects_non_main_names(#[case] name: &str) {
        assert!(split_identifier(name).is_none());
    }

    #[rstest]
    #[case("export.zip", AssetClass::Archive)]
    #[case("Export.ZIP", AssetClass::Archive)]
    #[case("a1-main.jpg", main("a1", MediaKind::Image))]
    #[case("A1-Main.JPEG", main("a1", MediaKind::Image))]
    #[case("c3-main.png", main("c3", MediaKind::Image))]
    #[case("b2-main.mp4", main("b2", MediaKind::Video))]
    #[case("b2-main.mov", AssetClass::Ignored)]
    #[case("a1-overlay.png", AssetClass::Overlay { identifier: Identifier::new("a1") })]
    #[case("A1-OVERLAY.PNG", AssetClass::Overlay { identifier: Identifier::new("a1") })]
    #[case("-overlay.png", AssetClass::Ignored)]
    #[case("noext1", AssetClass::Untyped)]
    #[case(".DS_Store", AssetClass::Ignored)]
    #[case("loose.mp4", AssetClass::Standalone)]
    #[case("LOOSE.MP4", AssetClass::Standalone)]
    #[case("a1_combined.mp4", AssetClass::Ignored)]
    #[case("memories_history.html", AssetClass::Ignored)]
    #[case("photo.jpg", AssetClass::Ignored)]
    fn classifies_by_name(#[case] name: &str, #[case] expected: AssetClass) {
        assert_eq!(classify_name(name), expected);
    }

    #[test]
    fn roles() {
        assert_eq!(main("a", MediaKind::Video).role(), Some(AssetRole::Main));
        assert_eq!(AssetClass::Untyped.role(), Some(AssetRole::Untyped));
        assert_eq!(AssetClass::Archive.role(), None);
        assert!(AssetClass::Archive.is_archive());
    }

    #[test]
    fn sniffs_mislabeled_archives() {
        let dir = tempfile::tempdir().unwrap();
        let mislabeled = dir.path().join("export.jpg");
        std::fs::write(&mislabeled, b"PK\x03\x04rest").unwrap();
        let untyped_zip = dir.path().join("noext");
        std::fs::write(&untyped_zip, b"PK\x03\x04rest").unwrap();
        let untyped = dir.path().join("noext2");
        std::fs::write(&untyped, b"\xFF\xD8\xFF").unwrap();
        // Trusted by name even with archive content.
        let main_file = dir.path().join("x-main.jpg");
        std::fs::write(&main_file, b"PK\x03\x04rest").unwrap();

        assert_eq!(classify(&mislabeled), AssetClass::Archive);
        assert_eq!(classify(&untyped_zip), AssetClass::Archive);
        assert_eq!(classify(&untyped), AssetClass::Untyped);
        assert_eq!(classify(&main_file), main("x", MediaKind::Image));
        assert_eq!(classify(&dir.path().join("missing.mp4")), AssetClass::Standalone);
    }
}
