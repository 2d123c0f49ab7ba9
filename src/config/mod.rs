// Configuration module

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::cache::CacheConfig;
use crate::logging::LoggingConfig;
use crate::update::UpdateConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{0}' is referenced but not set")]
    MissingEnv(String),

    #[error("Invalid YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub update: UpdateConfig,
}

impl Config {
    /// Parse YAML after replacing `${VAR}` and `${VAR:-default}` references
    pub fn from_yaml_with_env(yaml: &str) -> Result<Self, ConfigError> {
        let substituted = substitute_env(yaml)?;
        Ok(serde_yaml::from_str(&substituted)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_with_env(&yaml)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.logging.validate().map_err(ConfigError::Invalid)?;
        self.cache.validate().map_err(ConfigError::Invalid)?;
        self.update.validate().map_err(ConfigError::Invalid)?;
        Ok(())
    }
}

fn substitute_env(yaml: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}")
        .map_err(|e| ConfigError::Invalid(e.to_string()))?;

    // fail on the first missing variable before substituting anything
    for caps in re.captures_iter(yaml) {
        let name = &caps[1];
        if caps.get(2).is_none() && std::env::var(name).is_err() {
            return Err(ConfigError::MissingEnv(name.to_string()));
        }
    }

    Ok(re
        .replace_all(yaml, |caps: &Captures| {
            std::env::var(&caps[1])
                .ok()
                .or_else(|| caps.get(2).map(|d| d.as_str().to_string()))
                .unwrap_or_default()
        })
        .into_owned())
}
