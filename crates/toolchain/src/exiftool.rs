use crate::error::{ErrorKind, Result};
use crate::process::{Args, ensure_success, run};
use exn::ResultExt;
use regex::Regex;
use remem_export::models::Location;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::LazyLock;
use std::time::Duration;
use time::UtcDateTime;
use time::macros::format_description;
use tracing::instrument;

const TAG_TIMEOUT: Duration = Duration::from_secs(30);

static UPDATED_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+) image files? updated").unwrap());

/// An ExifTool executable; preferred over FFmpeg for videos because it can
/// write XMP and QuickTime user-data GPS atoms in place.
#[derive(Debug, Clone)]
pub struct ExifTool {
    path: PathBuf,
}

impl ExifTool {
    pub fn discover() -> Result<Self> {
        match which::which("exiftool") {
            Ok(path) => {
                tracing::debug!(exiftool = %path.display(), "Discovered ExifTool");
                Ok(Self { path })
            },
            Err(_) => {
                tracing::info!("ExifTool executable not found in PATH");
                exn::bail!(ErrorKind::NotFound("exiftool"))
            },
        }
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    pub async fn tag(&self, path: &Path, captured_at: UtcDateTime, location: Option<Location>) -> Result<()> {
        let output = run(&self.path, &tag_args(path, captured_at, location)?, TAG_TIMEOUT).await?;
        if output.status.success() || wrote_despite_warnings(&output) {
            return Ok(());
        }
        ensure_success(&self.path, &output)
    }
}

/// ExifTool exits non-zero on minor warnings even when it wrote the file;
/// only a non-zero "image files updated" count means it did.
fn wrote_despite_warnings(output: &Output) -> bool {
    let stdout = String::from_utf8_lossy(&output.stdout);
    UPDATED_REGEX
        .captures(&stdout)
        .and_then(|captures| captures[1].parse::<u64>().ok())
        .is_some_and(|updated| updated > 0)
}

fn tag_args(path: &Path, captured_at: UtcDateTime, location: Option<Location>) -> Result<Vec<OsString>> {
    let stamp = captured_at
        .format(format_description!("[year]:[month]:[day] [hour]:[minute]:[second]"))
        .or_raise(|| ErrorKind::Timestamp)?;
    let mut args = Args::new()
        .args(["-overwrite_original", "-api", "QuickTimeUTC=1"])
        .arg(format!("-CreateDate={stamp}"))
        .arg(format!("-DateTimeOriginal={stamp}"));
    if let Some(location) = location {
        args = args
            .arg(format!("-XMP:GPSLatitude={}", location.latitude))
            .arg(format!("-XMP:GPSLongitude={}", location.longitude))
            .arg(format!("-UserData:Location={}", location.to_iso6709()));
    }
    Ok(args.path(path).into_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn tag_args_with_location() {
        let args: Vec<String> = tag_args(
            Path::new("out/c3.mp4"),
            datetime!(2024-01-15 14:30:25).as_utc(),
            Location::new(37.7749, -122.4194),
        )
        .unwrap()
        .into_iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();
        assert_eq!(
            args,
            [
                "-overwrite_original",
                "-api",
                "QuickTimeUTC=1",
                "-CreateDate=2024:01:15 14:30:25",
                "-DateTimeOriginal=2024:01:15 14:30:25",
                "-XMP:GPSLatitude=37.7749",
                "-XMP:GPSLongitude=-122.4194",
                "-UserData:Location=+37.77490-122.41940/",
                "out/c3.mp4",
            ]
        );
    }

    #[tokio::test]
    async fn missing_exiftool_is_an_error() {
        let exiftool = ExifTool::at("/definitely/not/here/exiftool");
        let err = exiftool.tag(Path::new("x.mp4"), UtcDateTime::UNIX_EPOCH, None).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Spawn(_)));
    }

    #[cfg(unix)]
    fn fake_exiftool(dir: &Path, stdout: &str, code: i32) -> ExifTool {
        use std::os::unix::fs::PermissionsExt;
        let script = dir.join("exiftool");
        std::fs::write(&script, format!("#!/bin/sh\nprintf '{stdout}\\n'\nexit {code}\n")).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        ExifTool::at(script)
    }

    #[cfg(unix)]
    #[rstest::rstest]
    #[case("    1 image files updated", 0, true)]
    #[case("Warning: [minor] Trailer ignored\\n    1 image files updated", 1, true)]
    #[case("    0 image files updated\\n    1 files weren'\\''t updated due to errors", 1, false)]
    #[case("Error: File not found", 1, false)]
    #[tokio::test]
    async fn tag_trusts_only_a_non_zero_update_count(
        #[case] stdout: &str,
        #[case] code: i32,
        #[case] expected: bool,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let exiftool = fake_exiftool(dir.path(), stdout, code);
        let result = exiftool.tag(&dir.path().join("c3.mp4"), UtcDateTime::UNIX_EPOCH, None).await;
        assert_eq!(result.is_ok(), expected);
        if let Err(err) = result {
            assert!(matches!(&*err, ErrorKind::Failed { code: Some(1), .. }));
        }
    }
}
