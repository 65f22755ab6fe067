use crate::Config;
use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "REMEM_";

impl Config {
    /// Loads and validates the configuration from every layer, with `explicit`
    /// (if given) taking priority over the user config file.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config = Self::from_figment(Self::figment(explicit)?)?;
        config.validate()?;
        Ok(config)
    }

    /// The merged provider stack, before extraction.
    pub fn figment(explicit: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(dir) = user_config_dir() {
            tracing::trace!(dir = %dir.display(), "Looking for user configuration");
            // Missing files are silently skipped by figment.
            figment = figment
                .merge(Toml::file(dir.join("config.toml")))
                .merge(Yaml::file(dir.join("config.yaml")))
                .merge(Json::file(dir.join("config.json")));
        }
        if let Some(path) = explicit {
            if !path.is_file() {
                exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
            }
            let extension = path.extension().and_then(|e| e.to_str()).map(str::to_lowercase);
            figment = match extension.as_deref() {
                Some("toml") => figment.merge(Toml::file(path)),
                Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
                Some("json") => figment.merge(Json::file(path)),
                _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
            };
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        figment.extract().or_raise(|| ErrorKind::Load)
    }
}

fn user_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "remem").map(|dirs| dirs.config_dir().to_path_buf())
}
