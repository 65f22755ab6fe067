use std::collections::HashSet;
use std::path::PathBuf;

use remem_archive::ArchiveFormat;
use tracing::instrument;

use super::snapshot::Snapshot;
use crate::Mode;

/// Gives every top-level archive that was only recognised by its contents the
/// `.zip` extension, so later phases only ever see normally named archives.
///
/// An existing destination is never overwritten; such archives keep their
/// name (they are still extracted, by content). Returns how many archives
/// were (or in preview, would be) renamed.
#[instrument(skip_all, fields(root = %snapshot.root().display(), %mode))]
pub fn repair_archives(snapshot: &mut Snapshot, mode: Mode) -> u64 {
    let candidates: Vec<PathBuf> = snapshot
        .assets()
        .iter()
        .filter(|asset| asset.is_top_level() && asset.class.is_archive())
        .filter(|asset| !ArchiveFormat::from_path(&asset.path).is_archive())
        .map(|asset| asset.path.clone())
        .collect();

    let mut claimed = HashSet::new();
    let mut repaired = 0;
    for path in candidates {
        let target = path.with_extension(ArchiveFormat::Zip.extension().trim_start_matches('.'));
        if target.exists() || snapshot.contains(&target) || !claimed.insert(target.clone()) {
            tracing::warn!(
                path = %path.display(),
                target = %target.display(),
                "Not renaming mislabeled archive; destination already exists",
            );
            continue;
        }
        if mode.applies() {
            if let Err(e) = std::fs::rename(&path, &target) {
                tracing::warn!(path = %path.display(), error = %e, "Could not rename mislabeled archive");
                continue;
            }
            tracing::info!(
                from = %path.display(),
                to = %target.display(),
                format = %ArchiveFormat::Zip,
                "Repaired archive extension",
            );
            snapshot.relocate(&path, target);
        }
        repaired += 1;
    }
    repaired
}
