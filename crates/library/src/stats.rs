//! Run-wide counters.
//!
//! Every phase shares one [`RunStatistics`] behind an `Arc` and bumps counters
//! as work completes, from whichever task did it. The counters are plain
//! relaxed atomics: nothing reads them for synchronisation, only for the final
//! report.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// One counter per thing a run can do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Counter {
    ArchivesFound,
    ArchivesExtracted,
    ArchivesRepaired,
    ArchivesRemoved,
    UntypedRenamed,
    StandaloneCopied,
    ImagesComposited,
    VideosComposited,
    CompositesSkipped,
    CompositesFailed,
    ImagesTagged,
    VideosTagged,
    TagsFailed,
}

impl Counter {
    pub const ALL: [Counter; 13] = [
        Counter::ArchivesFound,
        Counter::ArchivesExtracted,
        Counter::ArchivesRepaired,
        Counter::ArchivesRemoved,
        Counter::UntypedRenamed,
        Counter::StandaloneCopied,
        Counter::ImagesComposited,
        Counter::VideosComposited,
        Counter::CompositesSkipped,
        Counter::CompositesFailed,
        Counter::ImagesTagged,
        Counter::VideosTagged,
        Counter::TagsFailed,
    ];

    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Default)]
pub struct RunStatistics {
    counters: [AtomicU64; Counter::ALL.len()],
}

impl RunStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn increment(&self, counter: Counter) {
        self.add(counter, 1);
    }

    #[inline]
    pub fn add(&self, counter: Counter, amount: u64) {
        self.counters[counter.index()].fetch_add(amount, Ordering::Relaxed);
    }

    #[inline]
    pub fn get(&self, counter: Counter) -> u64 {
        self.counters[counter.index()].load(Ordering::Relaxed)
    }

    /// A point-in-time copy of every counter.
    pub fn report(&self) -> RunReport {
        RunReport {
            archives_found: self.get(Counter::ArchivesFound),
            archives_extracted: self.get(Counter::ArchivesExtracted),
            archives_repaired: self.get(Counter::ArchivesRepaired),
            archives_removed: self.get(Counter::ArchivesRemoved),
            untyped_renamed: self.get(Counter::UntypedRenamed),
            standalone_copied: self.get(Counter::StandaloneCopied),
            images_composited: self.get(Counter::ImagesComposited),
            videos_composited: self.get(Counter::VideosComposited),
            composites_skipped: self.get(Counter::CompositesSkipped),
            composites_failed: self.get(Counter::CompositesFailed),
            images_tagged: self.get(Counter::ImagesTagged),
            videos_tagged: self.get(Counter::VideosTagged),
            tags_failed: self.get(Counter::TagsFailed),
        }
    }
}

/// Snapshot of [`RunStatistics`], comparable between runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunReport {
    pub archives_found: u64,
    pub archives_extracted: u64,
    pub archives_repaired: u64,
    pub archives_removed: u64,
    pub untyped_renamed: u64,
    pub standalone_copied: u64,
    pub images_composited: u64,
    pub videos_composited: u64,
    pub composites_skipped: u64,
    pub composites_failed: u64,
    pub images_tagged: u64,
    pub videos_tagged: u64,
    pub tags_failed: u64,
}

impl RunReport {
    pub fn composited(&self) -> u64 {
        self.images_composited + self.videos_composited
    }

    /// Whether a composition failed in a run that kept going. Tag failures
    /// don't count: they only cost metadata.
    pub fn composition_failed(&self) -> bool {
        self.composites_failed > 0
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Archives:     {} found, {} extracted, {} repaired, {} removed",
            self.archives_found, self.archives_extracted, self.archives_repaired, self.archives_removed
        )?;
        writeln!(f, "Copied:       {} standalone videos, {} untyped files", self.standalone_copied, self.untyped_renamed)?;
        writeln!(
            f,
            "Composited:   {} images, {} videos ({} already present, {} failed)",
            self.images_composited, self.videos_composited, self.composites_skipped, self.composites_failed
        )?;
        write!(
            f,
            "Tagged:       {} images, {} videos ({} failed)",
            self.images_tagged, self.videos_tagged, self.tags_failed
        )
    }
}
