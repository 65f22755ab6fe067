use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use exn::ResultExt;
use tracing::instrument;
use walkdir::WalkDir;

use super::classify::{self, AssetClass};
use super::error::{ErrorKind, Result};

/// A classified file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Asset {
    pub path: PathBuf,
    /// Path relative to the snapshot root.
    pub relative: PathBuf,
    pub class: AssetClass,
}

impl Asset {
    /// Directly inside the snapshot root.
    pub fn is_top_level(&self) -> bool {
        self.relative.components().count() == 1
    }

    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}

/// A point-in-time listing of every file under a root, each classified once.
///
/// Assets are ordered by path, so everything built from a snapshot is
/// deterministic.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    root: PathBuf,
    assets: Vec<Asset>,
}

impl Snapshot {
    /// Walks `root` recursively, skipping the `exclude` subtree if given.
    ///
    /// Only top-level files are content-sniffed for the archive signature;
    /// deeper files are classified by name. Unreadable entries below the root
    /// are logged and skipped.
    #[instrument(skip_all, fields(root = %root.as_ref().display()))]
    pub fn scan(root: impl AsRef<Path>, exclude: Option<&Path>) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            exn::bail!(ErrorKind::NotADirectory(root.to_path_buf()));
        }

        let mut assets = Vec::new();
        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| exclude.is_none_or(|excluded| entry.path() != excluded));
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(e).or_raise(|| ErrorKind::Unreadable(root.to_path_buf()));
                },
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable entry");
                    continue;
                },
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            let class = if entry.depth() == 1 {
                classify::classify(entry.path())
            } else {
                entry.file_name().to_str().map_or(AssetClass::Ignored, classify::classify_name)
            };
            assets.push(Asset { path: entry.path().to_path_buf(), relative: relative.to_path_buf(), class });
        }
        tracing::debug!(files = assets.len(), "Scanned directory");
        Ok(Self { root: root.to_path_buf(), assets })
    }

    /// Builds a snapshot of files that don't exist yet, such as the entries an
    /// archive would extract, from their paths relative to `root`.
    ///
    /// Classification is by name only; duplicates are collapsed.
    pub fn from_entries(root: impl Into<PathBuf>, entries: impl IntoIterator<Item = PathBuf>) -> Self {
        let root = root.into();
        let unique: BTreeSet<PathBuf> = entries.into_iter().collect();
        let assets = unique
            .into_iter()
            .map(|relative| {
                let class =
                    relative.file_name().and_then(|n| n.to_str()).map_or(AssetClass::Ignored, classify::classify_name);
                Asset { path: root.join(&relative), relative, class }
            })
            .collect();
        Self { root, assets }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Every asset of a given class, in path order.
    pub fn matching<'a>(&'a self, predicate: impl Fn(&AssetClass) -> bool + 'a) -> impl Iterator<Item = &'a Asset> + 'a {
        self.assets.iter().filter(move |asset| predicate(&asset.class))
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.assets.iter().any(|asset| asset.path == path)
    }

    /// Points the asset at `from` to its new location after a rename.
    pub(crate) fn relocate(&mut self, from: &Path, to: PathBuf) {
        let root = self.root.clone();
        if let Some(asset) = self.assets.iter_mut().find(|asset| asset.path == from) {
            asset.relative = to.strip_prefix(&root).map(Path::to_path_buf).unwrap_or_else(|_| to.clone());
            asset.path = to;
        }
        self.assets.sort_by(|a, b| a.path.cmp(&b.path));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remem_export::models::{Identifier, MediaKind};
    use std::fs;

    fn touch(root: &Path, relative: &str, contents: &[u8]) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn scans_and_classifies() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "a1-main.jpg", b"jpg");
        touch(root, "a1-overlay.png", b"png");
        touch(root, "nested/loose.mp4", b"mp4");
        touch(root, "mislabeled.jpg", b"PK\x03\x04");
        touch(root, "nested/deep.jpg", b"PK\x03\x04");

        let snapshot = Snapshot::scan(root, None).unwrap();
        let classes: Vec<_> = snapshot.assets().iter().map(|a| (a.relative.clone(), a.class.clone())).collect();
        assert_eq!(
            classes,
            vec![
                (
                    PathBuf::from("a1-main.jpg"),
                    AssetClass::Main { identifier: Identifier::new("a1"), kind: MediaKind::Image }
                ),
                (PathBuf::from("a1-overlay.png"), AssetClass::Overlay { identifier: Identifier::new("a1") }),
                (PathBuf::from("mislabeled.jpg"), AssetClass::Archive),
                // Only top-level files are sniffed.
                (PathBuf::from("nested/deep.jpg"), AssetClass::Ignored),
                (PathBuf::from("nested/loose.mp4"), AssetClass::Standalone),
            ]
        );
        assert!(snapshot.assets()[0].is_top_level());
        assert!(!snapshot.assets()[4].is_top_level());
    }

    #[test]
    fn excluded_subtree_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "noext", b"x");
        touch(dir.path(), "output/noext.jpg", b"x");
        touch(dir.path(), "output/other", b"x");

        let snapshot = Snapshot::scan(dir.path(), Some(&dir.path().join("output"))).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.assets()[0].relative, PathBuf::from("noext"));
    }

    #[test]
    fn root_must_be_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file");
        fs::write(&file, b"x").unwrap();
        assert_eq!(*Snapshot::scan(&file, None).unwrap_err(), ErrorKind::NotADirectory(file));
    }

    #[test]
    fn entries_become_a_virtual_snapshot() {
        let snapshot = Snapshot::from_entries(
            "/scratch",
            ["export/c3-main.png", "export/c3-overlay.png", "export/c3-main.png"].map(PathBuf::from),
        );
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.assets()[0].path, PathBuf::from("/scratch/export/c3-main.png"));
        assert_eq!(snapshot.matching(|c| matches!(c, AssetClass::Overlay { .. })).count(), 1);
    }

    #[test]
    fn relocate_updates_paths() {
        let mut snapshot = Snapshot::from_entries("/in", [PathBuf::from("b.jpg"), PathBuf::from("c")]);
        snapshot.relocate(Path::new("/in/c"), PathBuf::from("/in/a.zip"));
        assert_eq!(snapshot.assets()[0].relative, PathBuf::from("a.zip"));
        assert!(snapshot.contains(Path::new("/in/a.zip")));
        assert!(!snapshot.contains(Path::new("/in/c")));
    }
}
