use crate::encoder::{Codec, EncoderProfile};
use crate::error::{ErrorKind, Result};
use crate::process::{Args, ensure_success, run};
use exn::ResultExt;
use remem_export::models::Location;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempPath;
use time::UtcDateTime;
use time::macros::format_description;
use tracing::instrument;

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const OVERLAY_TIMEOUT: Duration = Duration::from_secs(600);
const TAG_TIMEOUT: Duration = Duration::from_secs(120);

// Scale the overlay to the base video (whatever its size), then lay it on top
// for the full duration. Output is forced to yuv420p so every player copes.
const OVERLAY_FILTER: &str = "[1:v]format=rgba[ol];[ol][0:v]scale2ref=w=iw:h=ih[ols][base];\
                              [base][ols]overlay=0:0:format=auto,format=yuv420p[v]";

/// An FFmpeg executable.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    path: PathBuf,
}

impl Ffmpeg {
    pub fn discover() -> Result<Self> {
        match which::which("ffmpeg") {
            Ok(path) => {
                tracing::debug!(ffmpeg = %path.display(), "Discovered FFmpeg");
                Ok(Self { path })
            },
            Err(_) => {
                tracing::info!("FFmpeg executable not found in PATH");
                exn::bail!(ErrorKind::NotFound("ffmpeg"))
            },
        }
    }

    /// Use the executable at `path` without checking that it exists.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Works out which H.264 encoder to use for this run.
    ///
    /// Every hardware encoder FFmpeg claims to support is confirmed with a
    /// one-frame test encode before it is trusted, since drivers are routinely
    /// missing even when the encoder is compiled in. Any failure along the way
    /// just means "use software".
    #[instrument(skip(self), fields(ffmpeg = %self.path.display()))]
    pub async fn probe(&self) -> EncoderProfile {
        let encoders = Args::new().args(["-hide_banner", "-encoders"]).into_vec();
        let listing = match run(&self.path, &encoders, PROBE_TIMEOUT).await {
            Ok(output) if output.status.success() => String::from_utf8_lossy(&output.stdout).to_lowercase(),
            Ok(_) | Err(_) => {
                tracing::debug!("Could not list FFmpeg encoders; using software encoding");
                return EncoderProfile::software();
            },
        };
        for codec in Codec::HARDWARE.into_iter().filter(Codec::is_platform_supported) {
            if !listing.contains(codec.name()) {
                continue;
            }
            match self.test_encode(codec).await {
                Ok(()) => {
                    tracing::info!(codec = %codec, hwaccel = codec.hwaccel(), "Hardware encoder available");
                    return EncoderProfile::hardware(codec);
                },
                Err(e) => tracing::debug!(codec = %codec, error = %e, "Hardware encoder failed its test encode"),
            }
        }
        tracing::info!("No hardware encoder available; using software encoding");
        EncoderProfile::software()
    }

    async fn test_encode(&self, codec: Codec) -> Result<()> {
        let output = run(&self.path, &test_encode_args(codec), PROBE_TIMEOUT).await?;
        ensure_success(&self.path, &output)
    }

    /// Composites the transparent `overlay` image over every frame of `main`,
    /// writing an MP4 to `output`.
    ///
    /// The encode goes to a temporary file next to `output` first, so an
    /// interrupted encode never leaves a truncated video at the final path.
    #[instrument(skip_all, fields(main = %main.display(), codec = %profile.codec))]
    pub async fn overlay(&self, main: &Path, overlay: &Path, output: &Path, profile: &EncoderProfile) -> Result<()> {
        let staging = staging_path(output)?;
        let args = overlay_args(main, overlay, &staging, profile.codec);
        let result = run(&self.path, &args, OVERLAY_TIMEOUT).await?;
        ensure_success(&self.path, &result)?;
        staging.persist(output).or_raise(|| ErrorKind::Io)?;
        Ok(())
    }

    /// Rewrites the container of `path` (stream copy, no re-encode) with a
    /// creation time and, when known, a QuickTime location.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub async fn tag(&self, path: &Path, captured_at: UtcDateTime, location: Option<Location>) -> Result<()> {
        let staging = staging_path(path)?;
        let args = tag_args(path, &staging, captured_at, location)?;
        let result = run(&self.path, &args, TAG_TIMEOUT).await?;
        ensure_success(&self.path, &result)?;
        staging.persist(path).or_raise(|| ErrorKind::Io)?;
        Ok(())
    }
}

/// A temporary `.mp4` path in the same directory as `target`, removed on
/// drop unless persisted.
fn staging_path(target: &Path) -> Result<TempPath> {
    let directory = target.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let file = tempfile::Builder::new()
        .prefix(".remem-")
        .suffix(".mp4")
        .tempfile_in(directory)
        .or_raise(|| ErrorKind::Io)?;
    Ok(file.into_temp_path())
}

fn test_encode_args(codec: Codec) -> Vec<OsString> {
    Args::new()
        .args(["-hide_banner", "-loglevel", "error"])
        .args(["-f", "lavfi", "-i", "testsrc=duration=1:size=320x240:rate=1"])
        .args(["-c:v", codec.name(), "-frames:v", "1", "-f", "null", "-"])
        .into_vec()
}

pub(crate) fn overlay_args(main: &Path, overlay: &Path, output: &Path, codec: Codec) -> Vec<OsString> {
    Args::new()
        .args(["-hide_banner", "-loglevel", "error", "-y"])
        .arg("-i")
        .path(main)
        .args(["-loop", "1", "-i"])
        .path(overlay)
        .args(["-filter_complex", OVERLAY_FILTER])
        .args(["-map", "[v]", "-map", "0:a?", "-shortest"])
        .args(["-c:v", codec.name()])
        .args(codec.preset_args())
        .args(["-c:a", "aac", "-movflags", "+faststart", "-f", "mp4"])
        .path(output)
        .into_vec()
}

pub(crate) fn tag_args(
    input: &Path,
    output: &Path,
    captured_at: UtcDateTime,
    location: Option<Location>,
) -> Result<Vec<OsString>> {
    let created = captured_at
        .format(format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z"))
        .or_raise(|| ErrorKind::Timestamp)?;
    let mut args = Args::new()
        .args(["-hide_banner", "-loglevel", "error", "-y", "-i"])
        .path(input)
        .args(["-map", "0", "-c", "copy", "-map_metadata", "0"])
        .arg("-metadata")
        .arg(format!("creation_time={created}"));
    if let Some(location) = location {
        let iso = location.to_iso6709();
        args = args
            .arg("-metadata")
            .arg(format!("location={iso}"))
            .arg("-metadata")
            .arg(format!("com.apple.quicktime.location.ISO6709={iso}"));
    }
    Ok(args.args(["-movflags", "use_metadata_tags", "-f", "mp4"]).path(output).into_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn overlay_keeps_audio_and_uses_profile_codec() {
        let args = strings(&overlay_args(
            Path::new("in/a1-main.mp4"),
            Path::new("in/a1-overlay.png"),
            Path::new("out/a1.mp4"),
            Codec::Nvenc,
        ));
        let position = |needle: &str| args.iter().position(|a| a == needle).unwrap();
        assert_eq!(args[position("-c:v") + 1], "h264_nvenc");
        assert_eq!(args[position("-preset") + 1], "fast");
        assert_eq!(args[position("-c:a") + 1], "aac");
        assert!(args.windows(2).any(|w| w == ["-map", "0:a?"]));
        assert!(args.windows(2).any(|w| w == ["-i", "in/a1-main.mp4"]));
        assert!(args.windows(4).any(|w| w == ["-loop", "1", "-i", "in/a1-overlay.png"]));
        assert_eq!(args.last().map(String::as_str), Some("out/a1.mp4"));
    }

    #[test]
    fn software_overlay_uses_balanced_preset() {
        let args = strings(&overlay_args(Path::new("m"), Path::new("o"), Path::new("x"), Codec::Libx264));
        assert!(args.windows(2).any(|w| w == ["-preset", "medium"]));
    }

    #[test]
    fn tag_args_with_location() {
        let args = strings(
            &tag_args(
                Path::new("c3.mp4"),
                Path::new(".remem-1.mp4"),
                datetime!(2024-01-15 14:30:25).as_utc(),
                Location::new(37.7749, -122.4194),
            )
            .unwrap(),
        );
        assert!(args.contains(&"creation_time=2024-01-15T14:30:25Z".to_string()));
        assert!(args.contains(&"com.apple.quicktime.location.ISO6709=+37.77490-122.41940/".to_string()));
        assert!(args.windows(2).any(|w| w == ["-c", "copy"]));
    }

    #[test]
    fn tag_args_without_location() {
        let args = strings(
            &tag_args(Path::new("c3.mp4"), Path::new("t.mp4"), datetime!(2024-01-15 14:30:25).as_utc(), None)
                .unwrap(),
        );
        assert!(!args.iter().any(|a| a.contains("ISO6709")));
    }

    #[test]
    fn test_encode_is_a_single_frame() {
        let args = strings(&test_encode_args(Codec::Qsv));
        assert!(args.windows(2).any(|w| w == ["-frames:v", "1"]));
        assert!(args.windows(2).any(|w| w == ["-c:v", "h264_qsv"]));
    }

    #[tokio::test]
    async fn probe_without_ffmpeg_falls_back_to_software() {
        let ffmpeg = Ffmpeg::at("/definitely/not/here/ffmpeg");
        assert_eq!(ffmpeg.probe().await, EncoderProfile::software());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn probe_confirms_hardware_with_a_test_encode() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        // Lists NVENC and QSV, but only the QSV test encode succeeds.
        let script = dir.path().join("ffmpeg");
        std::fs::write(
            &script,
            "#!/bin/sh\ncase \"$*\" in\n  *-encoders*) echo ' V..... h264_nvenc' ; echo ' V..... h264_qsv' ;;\n  \
             *h264_qsv*) exit 0 ;;\n  *) exit 1 ;;\nesac\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let profile = Ffmpeg::at(&script).probe().await;
        assert_eq!(profile, EncoderProfile::hardware(Codec::Qsv));
    }
}
