use std::collections::VecDeque;
use std::num::NonZeroUsize;

use async_trait::async_trait;
use exn::ResultExt;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use remem_config::FailurePolicy;
use remem_export::models::MediaKind;
use tracing::instrument;

use super::error::{ErrorKind, Result};
use crate::Mode;
use crate::plan::CompositePlan;
use crate::stats::{Counter, RunStatistics};

/// Produces the output of one composite plan.
///
/// Implementations may assume both inputs existed a moment ago and that the
/// output does not exist yet.
#[async_trait]
pub trait Compositor: Send + Sync {
    async fn composite(&self, plan: &CompositePlan) -> Result<()>;
}

/// Caller-supplied pool sizes; `None` means one worker per core, but never
/// more workers than tasks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolLimits {
    pub images: Option<usize>,
    pub videos: Option<usize>,
}

impl PoolLimits {
    fn workers(limit: Option<usize>, tasks: usize) -> usize {
        limit
            .unwrap_or_else(|| std::thread::available_parallelism().map_or(1, NonZeroUsize::get).min(tasks))
            .max(1)
    }
}

/// How a single plan ended, short of an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Composited(MediaKind),
    /// The output was already there; nothing to do.
    AlreadyPresent,
    /// An input disappeared between planning and execution.
    InputsMissing,
}

/// A queue of plans of one kind, drained into a bounded number of slots.
struct Pool {
    queue: VecDeque<CompositePlan>,
    workers: usize,
}

/// Composites every plan, images and videos in independently sized pools.
///
/// Results are collected as they complete. Under [`FailurePolicy::FailFast`]
/// the first failure is returned immediately and every composition still in
/// flight is dropped (killing its encoder process); under
/// [`FailurePolicy::Tolerant`] failures are counted and the rest carry on.
///
/// Preview performs the same pre-checks and counts without invoking the
/// compositor.
#[instrument(skip_all, fields(plans = plans.len(), %mode))]
pub async fn composite_all(
    plans: Vec<CompositePlan>,
    compositor: &dyn Compositor,
    limits: PoolLimits,
    policy: FailurePolicy,
    mode: Mode,
    stats: &RunStatistics,
) -> Result<()> {
    let total = plans.len();
    let (images, videos): (VecDeque<_>, VecDeque<_>) = plans.into_iter().partition(|p| p.kind == MediaKind::Image);
    let mut pools = [
        Pool { workers: PoolLimits::workers(limits.images, images.len()), queue: images },
        Pool { workers: PoolLimits::workers(limits.videos, videos.len()), queue: videos },
    ];
    tracing::info!(
        images = pools[0].queue.len(),
        image_workers = pools[0].workers,
        videos = pools[1].queue.len(),
        video_workers = pools[1].workers,
        "Compositing memories",
    );

    let mut processing = FuturesUnordered::new();
    for (slot, pool) in pools.iter_mut().enumerate() {
        let initial = pool.workers.min(pool.queue.len());
        processing.extend(pool.queue.drain(..initial).map(|plan| composite_one(slot, plan, compositor, mode)));
    }

    let mut done = 0;
    while let Some((slot, plan, result)) = processing.next().await {
        done += 1;
        match result {
            Ok(Outcome::Composited(kind)) => {
                tracing::debug!(output = %plan.output.display(), "Composited");
                stats.increment(match kind {
                    MediaKind::Image => Counter::ImagesComposited,
                    MediaKind::Video => Counter::VideosComposited,
                });
            },
            Ok(Outcome::AlreadyPresent) => {
                tracing::debug!(output = %plan.output.display(), "Output already present");
                stats.increment(Counter::CompositesSkipped);
            },
            Ok(Outcome::InputsMissing) => {
                tracing::warn!(main = %plan.main.display(), "Input disappeared before compositing; skipping");
            },
            Err(e) => {
                stats.increment(Counter::CompositesFailed);
                match policy {
                    FailurePolicy::FailFast => return Err(e).or_raise(|| ErrorKind::Composite(plan.output)),
                    FailurePolicy::Tolerant => {
                        tracing::warn!(output = %plan.output.display(), error = ?e, "Composition failed");
                    },
                }
            },
        }
        tracing::debug!(done, total, "Composition progress");
        if let Some(next) = pools[slot].queue.pop_front() {
            processing.push(composite_one(slot, next, compositor, mode));
        }
    }
    Ok(())
}

async fn composite_one(
    slot: usize,
    plan: CompositePlan,
    compositor: &dyn Compositor,
    mode: Mode,
) -> (usize, CompositePlan, Result<Outcome>) {
    let result = preflight(&plan, mode);
    let result = match result {
        None => compositor.composite(&plan).await.map(|()| Outcome::Composited(plan.kind)),
        Some(outcome) => Ok(outcome),
    };
    (slot, plan, result)
}

/// Decides a plan's outcome without compositing, when possible.
fn preflight(plan: &CompositePlan, mode: Mode) -> Option<Outcome> {
    if plan.output.exists() {
        return Some(Outcome::AlreadyPresent);
    }
    if !mode.applies() {
        return Some(Outcome::Composited(plan.kind));
    }
    if !plan.main.is_file() || !plan.overlay.is_file() {
        return Some(Outcome::InputsMissing);
    }
    None
}
