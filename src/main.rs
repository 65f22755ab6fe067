use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use remem_config::{Config, FailurePolicy};
use remem_library::execute::MediaCompositor;
use remem_library::reconcile::VideoTagger;
use remem_library::error::ErrorKind;
use remem_library::{Mode, Pipeline, Request, RunReport};
use remem_toolchain::{ExifTool, Ffmpeg};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const EXIT_FAILURE: u8 = 1;
const EXIT_INVALID: u8 = 2;
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Debug, Parser)]
#[command(name = "remem", version, about = "Rebuild a photo and video library from a Snapchat memories export")]
struct Cli {
    /// Folder holding the export: archives, loose files or both
    input: PathBuf,
    /// Where the library is written [default: <INPUT>/output]
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// The export's memories_history.html, to restore dates and locations
    #[arg(short = 'm', long = "metadata", value_name = "EXPORT_HTML")]
    export: Option<PathBuf>,
    /// Report what would happen without writing anything
    #[arg(long)]
    dry_run: bool,
    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    #[arg(long, value_name = "N")]
    image_workers: Option<usize>,
    #[arg(long, value_name = "N")]
    video_workers: Option<usize>,
    #[arg(long, value_name = "N")]
    metadata_workers: Option<usize>,
    /// Never probe for a hardware video encoder
    #[arg(long)]
    no_hardware: bool,
    /// Keep going when a composition fails
    #[arg(long)]
    tolerant: bool,
    /// Delete input archives once extracted
    #[arg(long)]
    remove_archives: bool,
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    /// Command-line flags win over every configuration source.
    fn override_config(&self, config: &mut Config) {
        if let Some(n) = self.image_workers {
            config.workers.images = Some(n);
        }
        if let Some(n) = self.video_workers {
            config.workers.videos = Some(n);
        }
        if let Some(n) = self.metadata_workers {
            config.workers.metadata = n;
        }
        if self.no_hardware {
            config.encoder.hardware = false;
        }
        if self.tolerant {
            config.composition.failure_policy = FailurePolicy::Tolerant;
        }
        if self.remove_archives {
            config.archives.remove_after_extract = true;
        }
    }

    fn log_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(match (self.verbose, self.quiet) {
                (true, _) => "debug",
                (_, true) => "error",
                _ => "info",
            })
        })
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt().with_env_filter(cli.log_filter()).with_writer(std::io::stderr).init();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("Invalid configuration: {err:?}");
            return ExitCode::from(EXIT_INVALID);
        },
    };
    cli.override_config(&mut config);
    if let Err(err) = config.validate() {
        tracing::error!("Invalid configuration: {err:?}");
        return ExitCode::from(EXIT_INVALID);
    }
    let request = match Request::new(&cli.input, cli.output.clone(), cli.export.clone()) {
        Ok(request) => request,
        Err(err) => {
            tracing::error!("{err:?}");
            return ExitCode::from(EXIT_INVALID);
        },
    };

    let ffmpeg = Ffmpeg::discover().inspect_err(|e| tracing::warn!("FFmpeg not found: {e}")).ok();
    let exiftool = ExifTool::discover().inspect_err(|e| tracing::debug!("ExifTool not found: {e}")).ok();
    let profile = remem_toolchain::select_encoder(ffmpeg.as_ref(), config.encoder.hardware).await;
    tracing::info!(encoder = %profile, "Selected video encoder");

    let mode = Mode::from_dry_run(cli.dry_run);
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted; stopping after the current item");
                cancel.cancel();
            }
        }
    });
    let compositor = MediaCompositor::new(ffmpeg.clone(), profile);
    let pipeline = Pipeline::new(config, mode, Arc::new(compositor), VideoTagger::new(exiftool, ffmpeg), cancel);

    match pipeline.run(&request).await {
        Ok(summary) => {
            println!("{summary}");
            ExitCode::from(exit_code(&summary.report))
        },
        Err(err) if *err == ErrorKind::Interrupted => {
            tracing::warn!("Interrupted; scratch files removed");
            println!("{}", pipeline.statistics().report());
            ExitCode::from(EXIT_INTERRUPTED)
        },
        Err(err) => {
            tracing::error!("Run failed: {err:?}");
            println!("{}", pipeline.statistics().report());
            ExitCode::from(if err.is_validation() { EXIT_INVALID } else { EXIT_FAILURE })
        },
    }
}

/// A finished run fails only when a composition failed; tag failures are
/// reported but leave the library usable.
fn exit_code(report: &RunReport) -> u8 {
    if report.composition_failed() { EXIT_FAILURE } else { 0 }
}
