//! The sequential phases: extraction, copies and untyped renames.
//!
//! Individual failures are logged and left out of the counts; they never stop
//! the phase. Cancellation is checked between items, so these are meant to run
//! on a blocking thread.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use remem_archive::Archive;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::Mode;
use crate::plan::{CopyPlan, ExtractPlan, RenamePlan};
use crate::stats::{Counter, RunStatistics};

/// What the extraction phase produced.
#[derive(Debug, Default)]
pub struct Extraction {
    /// Every extracted (or, in preview, listed) file, relative to the scratch
    /// directory.
    pub entries: Vec<PathBuf>,
    /// The archives that were read successfully.
    pub archives: Vec<PathBuf>,
}

/// Extracts every archive in turn into its planned directory.
///
/// In preview the archives are only listed; the listing is what an
/// extraction would produce. A corrupt archive is skipped with a warning.
#[instrument(skip_all, fields(archives = plans.len(), %mode))]
pub fn extract_archives(
    plans: &[ExtractPlan],
    scratch: &Path,
    mode: Mode,
    stats: &RunStatistics,
    cancel: &CancellationToken,
) -> Extraction {
    let mut extraction = Extraction::default();
    for plan in plans {
        if cancel.is_cancelled() {
            tracing::debug!("Extraction cancelled");
            break;
        }
        match extract_one(plan, mode) {
            Ok(entries) => {
                tracing::info!(archive = %plan.archive.display(), entries = entries.len(), "Extracted archive");
                let prefix = plan.destination.strip_prefix(scratch).unwrap_or(&plan.destination);
                extraction.entries.extend(entries.into_iter().map(|entry| prefix.join(entry)));
                extraction.archives.push(plan.archive.clone());
                stats.increment(Counter::ArchivesExtracted);
            },
            Err(e) => {
                tracing::warn!(archive = %plan.archive.display(), error = ?e, "Skipping unreadable archive");
                if mode.applies() {
                    // Don't leave half an archive behind for the composition scan.
                    let _ = fs::remove_dir_all(&plan.destination);
                }
            },
        }
    }
    extraction
}

fn extract_one(plan: &ExtractPlan, mode: Mode) -> remem_archive::error::Result<Vec<PathBuf>> {
    let mut archive = Archive::open(&plan.archive)?;
    let entries = archive.entries()?;
    if mode.applies() {
        archive.extract_to(&plan.destination)?;
    }
    Ok(entries)
}

/// Copies standalone videos. Returns how many were copied.
#[instrument(skip_all, fields(plans = plans.len(), %mode))]
pub fn copy_files(plans: &[CopyPlan], mode: Mode, stats: &RunStatistics, cancel: &CancellationToken) -> u64 {
    let copied = transfer_all(plans.iter().map(|p| (&p.source, &p.destination)), mode, cancel);
    stats.add(Counter::StandaloneCopied, copied);
    copied
}

/// Gives extensionless files their `.jpg` name at the destination. The source
/// is left where it is. Returns how many were renamed.
#[instrument(skip_all, fields(plans = plans.len(), %mode))]
pub fn rename_files(plans: &[RenamePlan], mode: Mode, stats: &RunStatistics, cancel: &CancellationToken) -> u64 {
    let renamed = transfer_all(plans.iter().map(|p| (&p.source, &p.destination)), mode, cancel);
    stats.add(Counter::UntypedRenamed, renamed);
    renamed
}

fn transfer_all<'a>(
    pairs: impl Iterator<Item = (&'a PathBuf, &'a PathBuf)>,
    mode: Mode,
    cancel: &CancellationToken,
) -> u64 {
    let mut done = 0;
    for (source, destination) in pairs {
        if cancel.is_cancelled() {
            tracing::debug!(done, "Transfer cancelled");
            break;
        }
        if !mode.applies() {
            done += 1;
            continue;
        }
        if destination.exists() {
            tracing::debug!(destination = %destination.display(), "Already present");
            continue;
        }
        match transfer(source, destination) {
            Ok(()) => {
                tracing::debug!(source = %source.display(), destination = %destination.display(), "Copied");
                done += 1;
            },
            Err(e) => tracing::warn!(source = %source.display(), error = %e, "Could not copy file"),
        }
    }
    done
}

/// Copies `source` to `destination`, creating parent directories and carrying
/// over the modification time.
fn transfer(source: &Path, destination: &Path) -> io::Result<()> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(source, destination)?;
    let modified = FileTime::from_last_modification_time(&fs::metadata(source)?);
    filetime::set_file_mtime(destination, modified)?;
    Ok(())
}
