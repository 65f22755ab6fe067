//! Operation plans.
//!
//! Every builder here is a pure function of a [`Snapshot`] (plus a look at
//! whether destinations already exist): nothing is executed while planning.
//! The same plans feed both [`Mode::Apply`](crate::Mode::Apply) and
//! [`Mode::Preview`](crate::Mode::Preview), which is what keeps their counts
//! identical.

use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use remem_export::models::{Identifier, MediaKind};

use crate::locate::{AssetClass, Snapshot};

/// Extract one archive, in full, into its own directory under scratch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractPlan {
    pub archive: PathBuf,
    pub destination: PathBuf,
}

/// Copy a standalone video, keeping its relative path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CopyPlan {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// Give an extensionless file its `.jpg` name at the destination.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenamePlan {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// Lay `overlay` over `main`, producing `output`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompositePlan {
    pub main: PathBuf,
    pub overlay: PathBuf,
    pub output: PathBuf,
    pub kind: MediaKind,
}

/// A plan that produces one file.
pub trait Planned {
    fn destination(&self) -> &Path;
}

impl Planned for CopyPlan {
    fn destination(&self) -> &Path {
        &self.destination
    }
}

impl Planned for RenamePlan {
    fn destination(&self) -> &Path {
        &self.destination
    }
}

impl Planned for CompositePlan {
    fn destination(&self) -> &Path {
        &self.output
    }
}

/// One plan per archive at the top level of the snapshot; nested archives are
/// left alone.
pub fn plan_extractions(snapshot: &Snapshot, scratch: &Path) -> Vec<ExtractPlan> {
    let mut used = HashSet::new();
    snapshot
        .matching(AssetClass::is_archive)
        .filter(|asset| asset.is_top_level())
        .map(|asset| {
            let stem = asset.path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
            let mut name = stem.clone();
            let mut n = 1;
            while !used.insert(name.clone()) {
                n += 1;
                name = format!("{stem}-{n}");
            }
            ExtractPlan { archive: asset.path.clone(), destination: scratch.join(name) }
        })
        .collect()
}

/// Every standalone video, destined to the same relative path under
/// `dest_root`. Videos already present at the destination are skipped.
pub fn plan_standalone_copies(snapshot: &Snapshot, dest_root: &Path) -> Vec<CopyPlan> {
    snapshot
        .matching(|class| matches!(class, AssetClass::Standalone))
        .map(|asset| CopyPlan { source: asset.path.clone(), destination: dest_root.join(&asset.relative) })
        .filter(|plan| !plan.destination.exists())
        .collect()
}

/// Every extensionless file, destined to `<relative path>.jpg` under
/// `dest_root`, except those inside `skip_subtree`. Files already renamed at
/// the destination are skipped.
pub fn plan_untyped_renames(snapshot: &Snapshot, dest_root: &Path, skip_subtree: Option<&Path>) -> Vec<RenamePlan> {
    snapshot
        .matching(|class| matches!(class, AssetClass::Untyped))
        .filter(|asset| skip_subtree.is_none_or(|skip| !asset.path.starts_with(skip)))
        .map(|asset| {
            let mut destination = OsString::from(dest_root.join(&asset.relative));
            destination.push(".jpg");
            RenamePlan { source: asset.path.clone(), destination: PathBuf::from(destination) }
        })
        .filter(|plan| !plan.destination.exists())
        .collect()
}

/// One plan per main file with an overlay of the same identifier in the same
/// directory. Main files without one are skipped silently; that's normal.
///
/// Outputs are flat under `dest_root`, named `<identifier>.<jpg|mp4>`. An
/// existing output is not filtered here: the executor checks right before
/// doing the expensive work.
pub fn plan_compositions(snapshot: &Snapshot, dest_root: &Path) -> Vec<CompositePlan> {
    let overlays: HashMap<(&Path, &Identifier), &Path> = snapshot
        .assets()
        .iter()
        .filter_map(|asset| match &asset.class {
            AssetClass::Overlay { identifier } => Some(((parent(&asset.path), identifier), asset.path.as_path())),
            _ => None,
        })
        .collect();

    snapshot
        .assets()
        .iter()
        .filter_map(|asset| {
            let AssetClass::Main { identifier, kind } = &asset.class else {
                return None;
            };
            let Some(overlay) = overlays.get(&(parent(&asset.path), identifier)) else {
                tracing::trace!(path = %asset.path.display(), "No overlay for main file");
                return None;
            };
            Some(CompositePlan {
                main: asset.path.clone(),
                overlay: overlay.to_path_buf(),
                output: dest_root.join(format!("{identifier}.{}", kind.extension())),
                kind: *kind,
            })
        })
        .collect()
}

/// Keeps the first plan for every destination, dropping any whose
/// destination is already in `claimed`.
///
/// A destination written by an earlier phase would be found existing by a
/// real run but not by a preview, so the two only agree when it is planned
/// once.
pub fn unclaimed<'a, P: Planned>(
    plans: impl IntoIterator<Item = P>,
    claimed: impl IntoIterator<Item = &'a Path>,
) -> Vec<P> {
    let mut seen: HashSet<PathBuf> = claimed.into_iter().map(Path::to_path_buf).collect();
    plans
        .into_iter()
        .filter(|plan| {
            let fresh = seen.insert(plan.destination().to_path_buf());
            if !fresh {
                tracing::debug!(destination = %plan.destination().display(), "Destination already planned");
            }
            fresh
        })
        .collect()
}

fn parent(path: &Path) -> &Path {
    path.parent().unwrap_or(Path::new(""))
}
