//! Resolve a [`RampartConfig`] from the environment, a config file or
//! built-in defaults.
//!
//! Lookup order:
//!
//! 1. `RAMPART_CONFIG_PATH`: path to a TOML or JSON file
//! 2. `RAMPART_CONFIG_JSON`: inline JSON payload
//! 3. the first of [`CANDIDATES`] that exists under the root directory
//! 4. [`RampartConfig::default`]
//!
//! `RAMPART_MODE` and `RAMPART_LOG` are applied on top of whichever source
//! won.

mod error;

pub use error::ConfigLoadError;

use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
};

use rampart_core::config::OrchestratorConfig;
use rampart_model::Mode;
use serde::{Deserialize, Serialize};

pub const CONFIG_PATH_VAR: &str = "RAMPART_CONFIG_PATH";
pub const CONFIG_JSON_VAR: &str = "RAMPART_CONFIG_JSON";
pub const MODE_VAR: &str = "RAMPART_MODE";
pub const LOG_VAR: &str = "RAMPART_LOG";

/// Files probed, relative to the root directory, when no variable points
/// at a configuration.
pub const CANDIDATES: &[&str] = &[
    "rampart.toml",
    "rampart.json",
    "config/rampart.toml",
    "config/rampart.json",
];

/// Everything `rampartctl` reads from its configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RampartConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
    pub orchestrator: OrchestratorConfig,
}

impl RampartConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigLoadError> {
        let contents =
            fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let origin = path.display().to_string();

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::parse_json(&contents, &origin),
            Some("toml") | Some("tml") => {
                toml::from_str(&contents).map_err(|err| {
                    ConfigLoadError::Parse {
                        origin,
                        message: err.to_string(),
                    }
                })
            }
            _ => Self::parse_from_str(&contents, &origin),
        }
    }

    pub fn parse_from_str(
        contents: &str,
        origin: &str,
    ) -> Result<Self, ConfigLoadError> {
        // Try TOML first, then JSON for convenience.
        toml::from_str(contents).or_else(|toml_err| {
            serde_json::from_str(contents).map_err(|json_err| {
                ConfigLoadError::Parse {
                    origin: origin.to_string(),
                    message: format!(
                        "toml error: {toml_err}; json error: {json_err}"
                    ),
                }
            })
        })
    }

    pub fn parse_json(raw: &str, origin: &str) -> Result<Self, ConfigLoadError> {
        serde_json::from_str(raw).map_err(|err| ConfigLoadError::Parse {
            origin: origin.to_string(),
            message: err.to_string(),
        })
    }
}

/// Where the loaded configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    EnvPath(PathBuf),
    EnvInline,
    File(PathBuf),
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::EnvPath(path) => {
                write!(f, "{CONFIG_PATH_VAR}={}", path.display())
            }
            ConfigSource::EnvInline => f.write_str(CONFIG_JSON_VAR),
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Default => f.write_str("built-in defaults"),
        }
    }
}

/// Loads configuration against an explicit root directory and variable
/// set, so callers (and tests) never depend on process state implicitly.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    root: PathBuf,
    vars: HashMap<String, String>,
}

impl ConfigLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            vars: HashMap::new(),
        }
    }

    pub fn with_var(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Loader over the current directory and process environment, after
    /// merging a `.env` file if one is present.
    pub fn from_process_env() -> Result<Self, ConfigLoadError> {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            return Err(err.into());
        }
        let root = env::current_dir().map_err(|source| ConfigLoadError::Io {
            path: PathBuf::from("."),
            source,
        })?;
        Ok(Self {
            root,
            vars: env::vars().collect(),
        })
    }

    fn var(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    pub fn load(&self) -> Result<(RampartConfig, ConfigSource), ConfigLoadError> {
        let (mut config, source) = self.load_base()?;

        if let Some(raw) = self.var(MODE_VAR) {
            config.orchestrator.initial_mode = raw
                .parse::<Mode>()
                .map_err(|source| ConfigLoadError::InvalidMode { source })?;
        }
        if let Some(filter) = self.var(LOG_VAR) {
            config.log_filter = Some(filter.to_string());
        }

        config
            .orchestrator
            .validate()
            .map_err(ConfigLoadError::Invalid)?;
        Ok((config, source))
    }

    fn load_base(&self) -> Result<(RampartConfig, ConfigSource), ConfigLoadError> {
        if let Some(path_str) = self.var(CONFIG_PATH_VAR) {
            let path = self.root.join(path_str);
            let config = RampartConfig::load_from_file(&path)?;
            return Ok((config, ConfigSource::EnvPath(path)));
        }

        if let Some(raw) = self.var(CONFIG_JSON_VAR) {
            let config = RampartConfig::parse_json(raw, CONFIG_JSON_VAR)?;
            return Ok((config, ConfigSource::EnvInline));
        }

        if let Some(path) = self.find_default_file() {
            let config = RampartConfig::load_from_file(&path)?;
            return Ok((config, ConfigSource::File(path)));
        }

        Ok((RampartConfig::default(), ConfigSource::Default))
    }

    fn find_default_file(&self) -> Option<PathBuf> {
        CANDIDATES
            .iter()
            .map(|candidate| self.root.join(candidate))
            .find(|path| path.exists())
    }
}
