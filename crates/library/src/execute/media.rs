use std::path::Path;

use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use remem_export::models::MediaKind;
use remem_toolchain::{EncoderProfile, Ffmpeg};

use super::composite::Compositor;
use super::error::{ErrorKind, Result};
use crate::imaging;
use crate::plan::CompositePlan;

/// Composites images in-process and videos through FFmpeg, using the encoder
/// chosen for this run.
#[derive(Debug, Clone)]
pub struct MediaCompositor {
    ffmpeg: Option<Ffmpeg>,
    profile: EncoderProfile,
}

impl MediaCompositor {
    pub fn new(ffmpeg: Option<Ffmpeg>, profile: EncoderProfile) -> Self {
        Self { ffmpeg, profile }
    }

    pub fn profile(&self) -> &EncoderProfile {
        &self.profile
    }
}

#[async_trait]
impl Compositor for MediaCompositor {
    async fn composite(&self, plan: &CompositePlan) -> Result<()> {
        match plan.kind {
            MediaKind::Image => {
                let plan = plan.clone();
                tokio::task::spawn_blocking(move || composite_image(&plan.main, &plan.overlay, &plan.output))
                    .await
                    .or_raise(|| ErrorKind::Task)?
            },
            MediaKind::Video => {
                let ffmpeg = self.ffmpeg.as_ref().ok_or_raise(|| ErrorKind::NoVideoEncoder)?;
                ffmpeg
                    .overlay(&plan.main, &plan.overlay, &plan.output, &self.profile)
                    .await
                    .or_raise(|| ErrorKind::Video)
            },
        }
    }
}

fn composite_image(main: &Path, overlay: &Path, output: &Path) -> Result<()> {
    let main = imaging::open(main).or_raise(|| ErrorKind::Image)?;
    let overlay = imaging::open(overlay).or_raise(|| ErrorKind::Image)?;
    let jpeg = imaging::encode_jpeg(&imaging::composite(&main, &overlay)).or_raise(|| ErrorKind::Image)?;
    imaging::write_atomic(output, &jpeg).or_raise(|| ErrorKind::Io)
}
