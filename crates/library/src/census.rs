//! Before/after counts for the run summary.

use std::fmt;
use std::path::Path;

use walkdir::WalkDir;

use crate::locate::{AssetClass, Snapshot};

const MEMORY_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "mp4"];

/// What the input directory held when the run started.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InputBreakdown {
    pub archives: usize,
    pub untyped: usize,
    pub standalone_videos: usize,
    pub mains: usize,
    pub overlays: usize,
}

impl InputBreakdown {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        snapshot.assets().iter().fold(Self::default(), |mut breakdown, asset| {
            match asset.class {
                AssetClass::Archive if asset.is_top_level() => breakdown.archives += 1,
                AssetClass::Untyped => breakdown.untyped += 1,
                AssetClass::Standalone => breakdown.standalone_videos += 1,
                AssetClass::Main { .. } => breakdown.mains += 1,
                AssetClass::Overlay { .. } => breakdown.overlays += 1,
                _ => {},
            }
            breakdown
        })
    }
}

impl fmt::Display for InputBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} archives, {} untyped files, {} standalone videos, {} main files, {} overlays",
            self.archives, self.untyped, self.standalone_videos, self.mains, self.overlays
        )
    }
}

/// Counts photo and video files under `output`, ignoring the scratch
/// directory.
pub fn count_memories(output: &Path, scratch_name: &str) -> usize {
    WalkDir::new(output)
        .into_iter()
        .filter_entry(|entry| !(entry.depth() == 1 && entry.file_name() == scratch_name))
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| MEMORY_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    #[test]
    fn breakdown_of_a_snapshot() {
        let snapshot = Snapshot::from_entries(
            "/in",
            ["export.zip", "nested/inner.zip", "a1-main.jpg", "a1-overlay.png", "loose.mp4", "noext", "notes.txt"]
                .map(PathBuf::from),
        );
        assert_eq!(
            InputBreakdown::from_snapshot(&snapshot),
            InputBreakdown { archives: 1, untyped: 1, standalone_videos: 1, mains: 1, overlays: 1 }
        );
    }

    #[test]
    fn counts_output_media_outside_scratch() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a1.jpg", "b2.MP4", "nested/c3.png", "notes.txt", ".tmp_work/d4.jpg"] {
            let path = dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, b"x").unwrap();
        }
        assert_eq!(count_memories(dir.path(), ".tmp_work"), 3);
        assert_eq!(count_memories(&dir.path().join("missing"), ".tmp_work"), 0);
    }
}
