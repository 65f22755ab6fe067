//! Layered configuration for remem.
//!
//! Values are merged (lowest to highest priority) from:
//!
//! 1. built-in defaults,
//! 2. the user config file (`config.toml`, `config.yaml` or `config.json` in
//!    the platform config directory, e.g. `~/.config/remem/`),
//! 3. an explicitly supplied config file,
//! 4. environment variables prefixed `REMEM_`, nested keys separated by `__`
//!    (`REMEM_WORKERS__VIDEOS=2`).
//!
//! Command-line flags are applied on top by the binary.

pub mod error;
mod load;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, Result};

pub const DEFAULT_SCRATCH_DIR: &str = ".tmp_work";
pub const DEFAULT_METADATA_WORKERS: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub workers: Workers,
    pub encoder: Encoder,
    pub composition: Composition,
    pub archives: Archives,
    /// Name of the run-scoped scratch directory created inside the output root.
    pub scratch_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: Workers::default(),
            encoder: Encoder::default(),
            composition: Composition::default(),
            archives: Archives::default(),
            scratch_dir: DEFAULT_SCRATCH_DIR.to_string(),
        }
    }
}

/// Pool sizes for the concurrent phases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Workers {
    /// Image composition pool; unset means one worker per core (capped by the
    /// number of images).
    pub images: Option<usize>,
    /// Video composition pool; unset means one worker per core (capped by the
    /// number of videos).
    pub videos: Option<usize>,
    pub metadata: usize,
}

impl Default for Workers {
    fn default() -> Self {
        Self { images: None, videos: None, metadata: DEFAULT_METADATA_WORKERS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Encoder {
    /// Probe for (and use) a hardware H.264 encoder.
    pub hardware: bool,
}

impl Default for Encoder {
    fn default() -> Self {
        Self { hardware: true }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Composition {
    pub failure_policy: FailurePolicy,
}

/// What a failed composition does to the rest of the composition phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// The first failure aborts the phase (and the run).
    #[default]
    FailFast,
    /// Failures are logged and counted; every other pair is still composited.
    Tolerant,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Archives {
    /// Delete the input archives once everything has been extracted.
    pub remove_after_extract: bool,
}

impl Config {
    /// Rejects values that would deadlock or escape the output directory.
    pub fn validate(&self) -> Result<()> {
        if self.workers.images == Some(0) {
            exn::bail!(ErrorKind::InvalidValue { key: "workers.images", reason: "must be at least 1" });
        }
        if self.workers.videos == Some(0) {
            exn::bail!(ErrorKind::InvalidValue { key: "workers.videos", reason: "must be at least 1" });
        }
        if self.workers.metadata == 0 {
            exn::bail!(ErrorKind::InvalidValue { key: "workers.metadata", reason: "must be at least 1" });
        }
        let scratch = self.scratch_dir.trim();
        if scratch.is_empty() || scratch == "." || scratch == ".." || scratch.contains(['/', '\\']) {
            exn::bail!(ErrorKind::InvalidValue { key: "scratch_dir", reason: "must be a plain directory name" });
        }
        Ok(())
    }
}
