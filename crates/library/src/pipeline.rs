use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use exn::ResultExt;
use remem_config::Config;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::Mode;
use crate::census::{self, InputBreakdown};
use crate::error::{Error, ErrorKind, Result};
use crate::execute::{self, Compositor, PoolLimits};
use crate::locate::{self, Snapshot};
use crate::plan::{self, Planned};
use crate::reconcile::{self, VideoTagger};
use crate::scratch::ScratchDir;
use crate::stats::{Counter, RunReport, RunStatistics};

/// The directories a run works on, as absolute paths.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    pub input: PathBuf,
    pub output: PathBuf,
    /// The export's `memories_history.html`, when metadata should be restored.
    pub export: Option<PathBuf>,
}

impl Request {
    /// Resolves the paths of a run; the output defaults to `<input>/output`.
    pub fn new(input: impl AsRef<Path>, output: Option<PathBuf>, export: Option<PathBuf>) -> Result<Self> {
        let input = absolute(input.as_ref())?;
        let output = match output {
            Some(output) => absolute(&output)?,
            None => input.join("output"),
        };
        let export = export.map(|export| absolute(&export)).transpose()?;
        Ok(Self { input, output, export })
    }

    /// The output directory, if it lives inside the input directory.
    fn nested_output(&self) -> Option<&Path> {
        self.output.starts_with(&self.input).then_some(self.output.as_path())
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).or_raise(|| ErrorKind::InvalidInput(path.to_path_buf()))
}

/// What a run did (or, in preview, would do).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Summary {
    pub mode: Mode,
    pub report: RunReport,
    pub input: InputBreakdown,
    /// Photos and videos in the output directory after the run.
    pub output_memories: usize,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.mode.applies() {
            writeln!(f, "Dry run: nothing was written.")?;
        }
        writeln!(f, "Input:        {}", self.input)?;
        writeln!(f, "{}", self.report)?;
        write!(f, "Output:       {} memories", self.output_memories)
    }
}

/// One rebuild of a memories library, in either [`Mode`].
pub struct Pipeline {
    config: Config,
    mode: Mode,
    compositor: Arc<dyn Compositor>,
    tagger: VideoTagger,
    stats: Arc<RunStatistics>,
    cancel: CancellationToken,
}

impl Pipeline {
    /// A pipeline that stops at the next item boundary once `cancel` fires.
    pub fn new(
        config: Config,
        mode: Mode,
        compositor: Arc<dyn Compositor>,
        tagger: VideoTagger,
        cancel: CancellationToken,
    ) -> Self {
        Self { config, mode, compositor, tagger, stats: Arc::new(RunStatistics::new()), cancel }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The counters of this pipeline; still readable after a failed or
    /// cancelled run.
    pub fn statistics(&self) -> Arc<RunStatistics> {
        Arc::clone(&self.stats)
    }

    /// Runs every phase in order.
    ///
    /// The file phases run on a blocking thread and stop between items once
    /// the run is cancelled. The scratch directory is removed however the run
    /// ends.
    #[instrument(skip_all, fields(input = %request.input.display(), output = %request.output.display(), mode = %self.mode))]
    pub async fn run(&self, request: &Request) -> Result<Summary> {
        let mode = self.mode;
        let output = request.output.clone();

        if !request.input.is_dir() || request.input == request.output {
            exn::bail!(ErrorKind::InvalidInput(request.input.clone()));
        }
        let records = match &request.export {
            Some(export) => Some(remem_export::load(export).or_raise(|| ErrorKind::Export)?),
            None => None,
        };
        self.checkpoint()?;

        if mode.applies() {
            std::fs::create_dir_all(&output).or_raise(|| ErrorKind::Output)?;
        }
        let scratch = ScratchDir::create(output.join(&self.config.scratch_dir), mode).or_raise(|| ErrorKind::Output)?;
        let scratch_path = scratch.path().to_path_buf();

        let (snapshot, breakdown, copies, renames) = {
            let input = request.input.clone();
            let exclude = request.nested_output().map(Path::to_path_buf);
            let output = output.clone();
            self.blocking(move |stats, cancel| {
                let mut snapshot = Snapshot::scan(&input, exclude.as_deref()).or_raise(|| ErrorKind::Locate)?;
                let breakdown = InputBreakdown::from_snapshot(&snapshot);
                tracing::info!(%breakdown, "Scanned input");
                stats.add(Counter::ArchivesRepaired, locate::repair_archives(&mut snapshot, mode));

                let copies = plan::plan_standalone_copies(&snapshot, &output);
                execute::copy_files(&copies, mode, stats, cancel);
                let renames = plan::plan_untyped_renames(&snapshot, &output, exclude.as_deref());
                let renames = plan::unclaimed(renames, copies.iter().map(Planned::destination));
                execute::rename_files(&renames, mode, stats, cancel);
                Ok((snapshot, breakdown, copies, renames))
            })
            .await?
        };

        let extractions = plan::plan_extractions(&snapshot, &scratch_path);
        self.stats.add(Counter::ArchivesFound, extractions.len() as u64);
        let (archives, extracted, copies, renames) = {
            let (scratch_path, output) = (scratch_path.clone(), output.clone());
            let (mut copies, mut renames) = (copies, renames);
            self.blocking(move |stats, cancel| {
                let extraction = execute::extract_archives(&extractions, &scratch_path, mode, stats, cancel);
                let extracted = if mode.applies() {
                    Snapshot::scan(&scratch_path, None).or_raise(|| ErrorKind::Locate)?
                } else {
                    Snapshot::from_entries(scratch_path.as_path(), extraction.entries)
                };

                let claimed = copies.iter().map(Planned::destination).chain(renames.iter().map(Planned::destination));
                let extracted_copies = plan::unclaimed(plan::plan_standalone_copies(&extracted, &output), claimed);
                execute::copy_files(&extracted_copies, mode, stats, cancel);
                let claimed = copies
                    .iter()
                    .map(Planned::destination)
                    .chain(renames.iter().map(Planned::destination))
                    .chain(extracted_copies.iter().map(Planned::destination));
                let extracted_renames = plan::unclaimed(plan::plan_untyped_renames(&extracted, &output, None), claimed);
                execute::rename_files(&extracted_renames, mode, stats, cancel);
                copies.extend(extracted_copies);
                renames.extend(extracted_renames);
                Ok((extraction.archives, extracted, copies, renames))
            })
            .await?
        };

        let compositions = plan::unclaimed(
            plan::plan_compositions(&snapshot, &output).into_iter().chain(plan::plan_compositions(&extracted, &output)),
            copies.iter().map(Planned::destination).chain(renames.iter().map(Planned::destination)),
        );
        let limits = PoolLimits { images: self.config.workers.images, videos: self.config.workers.videos };
        let planned_outputs: Vec<PathBuf> = compositions
            .iter()
            .map(|p| p.output.clone())
            .chain(copies.into_iter().map(|p| p.destination))
            .chain(renames.into_iter().map(|p| p.destination))
            .collect();
        let stats = self.stats.as_ref();
        self.cancellable(execute::composite_all(
            compositions,
            self.compositor.as_ref(),
            limits,
            self.config.composition.failure_policy,
            mode,
            stats,
        ))
        .await?
        .or_raise(|| ErrorKind::Composite)?;

        if let Some(records) = &records {
            let candidates = reconcile::candidates(&output, &self.config.scratch_dir, &planned_outputs, mode);
            self.cancellable(reconcile::reconcile_all(
                candidates,
                records,
                &self.tagger,
                self.config.workers.metadata,
                mode,
                stats,
            ))
            .await?;
        }

        if self.config.archives.remove_after_extract {
            remove_archives(&archives, mode, stats);
        }
        drop(scratch);

        let report = stats.report();
        let mut output_memories = census::count_memories(&output, &self.config.scratch_dir);
        if !mode.applies() {
            output_memories += (report.composited() + report.standalone_copied + report.untyped_renamed) as usize;
        }
        Ok(Summary { mode, report, input: breakdown, output_memories })
    }

    /// Runs file work on a blocking thread, then stops if the run was
    /// cancelled meanwhile.
    async fn blocking<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&RunStatistics, &CancellationToken) -> Result<T> + Send + 'static,
    {
        let stats = Arc::clone(&self.stats);
        let cancel = self.cancel.clone();
        let value = tokio::task::spawn_blocking(move || work(&stats, &cancel)).await.or_raise(|| ErrorKind::Task)??;
        self.checkpoint()?;
        Ok(value)
    }

    /// Drives `work` until it finishes or the run is cancelled.
    async fn cancellable<T>(&self, work: impl Future<Output = T>) -> Result<T> {
        tokio::select! {
            value = work => Ok(value),
            () = self.cancel.cancelled() => Err(interrupted()),
        }
    }

    fn checkpoint(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(interrupted());
        }
        Ok(())
    }
}

fn interrupted() -> Error {
    tracing::warn!("Run cancelled");
    exn::Exn::from(ErrorKind::Interrupted)
}

fn remove_archives(archives: &[PathBuf], mode: Mode, stats: &RunStatistics) {
    for archive in archives {
        if mode.applies() {
            if let Err(e) = std::fs::remove_file(archive) {
                tracing::warn!(archive = %archive.display(), error = %e, "Could not remove archive");
                continue;
            }
            tracing::info!(archive = %archive.display(), "Removed extracted archive");
        }
        stats.increment(Counter::ArchivesRemoved);
    }
}
