//! Layered configuration for the `cpx` tool.
//!
//! Sources, later ones winning:
//!
//! 1. built-in defaults
//! 2. `config.toml` in the platform config directory, if present
//! 3. an explicitly named file (TOML, YAML or JSON, by extension)
//! 4. `CPX_*` environment variables

pub mod error;

use crate::error::{ErrorKind, Result};
use cpx_compress::Compression;
use directories::ProjectDirs;
use figment::Figment;
use figment::providers::{Env, Format, Json, Toml, Yaml};
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};

pub const ENV_PREFIX: &str = "CPX_";
const DEFAULT_BUFFER_SIZE: usize = 8 * 1024;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Format used by `cpx compress` when nothing else decides it.
    #[serde(deserialize_with = "deserialize_compression")]
    pub compression: Compression,
    /// Capacity of the buffered readers and writers around files.
    pub buffer_size: usize,
    /// Default log filter, in `tracing_subscriber::EnvFilter` syntax.
    pub log: String,
}

impl Default for Config {
    fn default() -> Self {
        Self { compression: Compression::Cpx, buffer_size: DEFAULT_BUFFER_SIZE, log: "info".to_string() }
    }
}

impl Config {
    /// Load configuration from every source.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::from_figment(&layered(Self::default_path().as_deref(), explicit)?)
    }

    /// Where the per-user config file lives on this platform.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "cpx").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Extract and validate a configuration from an assembled figment.
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let config: Config = match figment.extract() {
            Ok(config) => config,
            Err(err) => exn::bail!(ErrorKind::Invalid(err.to_string())),
        };
        if config.buffer_size == 0 {
            exn::bail!(ErrorKind::Invalid("buffer_size must be greater than zero".to_string()));
        }
        Ok(config)
    }
}

fn layered(default: Option<&Path>, explicit: Option<&Path>) -> Result<Figment> {
    let mut figment = Figment::new();
    if let Some(path) = default {
        // Missing files are skipped by the provider.
        figment = figment.merge(Toml::file(path));
    }
    if let Some(path) = explicit {
        if !path.is_file() {
            exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
        }
        tracing::debug!(path = %path.display(), "loading config file");
        figment = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
            Some("json") => figment.merge(Json::file(path)),
            _ => figment.merge(Toml::file(path)),
        };
    }
    Ok(figment.merge(Env::prefixed(ENV_PREFIX)))
}

fn deserialize_compression<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Compression, D::Error> {
    use serde::de::Error;
    let name = String::deserialize(deserializer)?;
    name.parse::<Compression>().map_err(|err| D::Error::custom(&*err))
}
