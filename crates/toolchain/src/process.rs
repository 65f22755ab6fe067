use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::ffi::OsString;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

/// Runs `program` to completion, capturing its output.
///
/// The child is killed if it outlives `limit` or if the returned future is
/// dropped (cancelled runs must not leave encoders behind). The exit status
/// is *not* checked; see [`ensure_success`].
pub(crate) async fn run(program: &Path, args: &[OsString], limit: Duration) -> Result<Output> {
    let name = display_name(program);
    tracing::trace!(program = %name, ?args, "Spawning process");
    let mut command = Command::new(program);
    command.args(args).stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped()).kill_on_drop(true);
    tokio::time::timeout(limit, command.output())
        .await
        .or_raise(|| ErrorKind::Timeout { program: name.clone(), limit })?
        .or_raise(|| ErrorKind::Spawn(name.clone()))
}

/// Converts a non-zero exit into [`ErrorKind::Failed`], keeping the last line
/// of stderr (FFmpeg puts the actual reason there).
pub(crate) fn ensure_success(program: &Path, output: &Output) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    exn::bail!(ErrorKind::Failed {
        program: display_name(program),
        code: output.status.code(),
        stderr: stderr.lines().rev().find(|line| !line.trim().is_empty()).unwrap_or_default().trim().to_string(),
    })
}

fn display_name(program: &Path) -> String {
    program.file_name().unwrap_or(program.as_os_str()).to_string_lossy().into_owned()
}

/// Small helper for building argument lists that mix literals and paths.
#[derive(Debug, Default)]
pub(crate) struct Args(Vec<OsString>);

impl Args {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.0.push(arg.into());
        self
    }

    pub(crate) fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.0.extend(args.into_iter().map(Into::into));
        self
    }

    pub(crate) fn path(mut self, path: &Path) -> Self {
        self.0.push(path.as_os_str().to_owned());
        self
    }

    pub(crate) fn into_vec(self) -> Vec<OsString> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_program_fails_to_spawn() {
        let err = run(Path::new("/definitely/not/here/ffmpeg"), &[], Duration::from_secs(1)).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Spawn("ffmpeg".to_string()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_program_times_out() {
        let args = Args::new().arg("5").into_vec();
        let err = run(Path::new("sleep"), &args, Duration::from_millis(50)).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Timeout { program, .. } if program == "sleep"));
        assert!(err.is_retryable());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_reported() {
        let args = Args::new().args(["-c", "echo first >&2; echo 'the real reason' >&2; exit 3"]).into_vec();
        let output = run(Path::new("sh"), &args, Duration::from_secs(5)).await.unwrap();
        let err = ensure_success(Path::new("/bin/sh"), &output).unwrap_err();
        assert_eq!(
            *err,
            ErrorKind::Failed { program: "sh".to_string(), code: Some(3), stderr: "the real reason".to_string() }
        );
    }
}
