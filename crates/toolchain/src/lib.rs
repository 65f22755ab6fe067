//! External tools used to produce and tag memories.
//!
//! - [`Ffmpeg`] composites overlays onto videos and rewrites MP4 containers.
//! - [`ExifTool`] writes richer video metadata when it's installed.
//! - [`EncoderProfile`] records which H.264 encoder a run should use, as
//!   decided by [`Ffmpeg::probe`].
//!
//! Tools are located on `PATH` via [`which`] and invoked as child processes
//! with a timeout; a child is killed if its future is dropped.

mod encoder;
pub mod error;
mod exiftool;
mod ffmpeg;
mod process;

pub use crate::encoder::{Codec, EncoderProfile};
pub use crate::exiftool::ExifTool;
pub use crate::ffmpeg::Ffmpeg;

/// Computes the encoder profile for a run.
///
/// With `hardware` disabled, or without FFmpeg, no probing happens and the
/// software profile is returned.
pub async fn select_encoder(ffmpeg: Option<&Ffmpeg>, hardware: bool) -> EncoderProfile {
    match (ffmpeg, hardware) {
        (Some(ffmpeg), true) => ffmpeg.probe().await,
        (_, false) => {
            tracing::info!("Hardware encoding disabled; using software encoding");
            EncoderProfile::software()
        },
        (None, true) => EncoderProfile::software(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_hardware_skips_probe() {
        // A bogus path would only be touched if probing happened.
        let ffmpeg = Ffmpeg::at("/definitely/not/here/ffmpeg");
        assert_eq!(select_encoder(Some(&ffmpeg), false).await, EncoderProfile::software());
        assert_eq!(select_encoder(None, true).await, EncoderProfile::software());
    }
}
