//! Core runtime configuration.
//!
//! # Responsibility
//! - Resolve the store path, corrupt-file policy and logging settings.
//! - Layer values: defaults, then optional JSON file, then `PARCEL_*` env vars.
//!
//! # Invariants
//! - Unset or blank overrides keep the previous layer's value.

use crate::db::JsonFileStore;
use crate::logging::{default_log_level, LogSettings, LoggingError};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const ENV_DB_PATH: &str = "PARCEL_DB_PATH";
pub const ENV_PRESERVE_CORRUPT: &str = "PARCEL_PRESERVE_CORRUPT";
pub const ENV_LOG_LEVEL: &str = "PARCEL_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "PARCEL_LOG_DIR";

const DEFAULT_DB_PATH: &str = "db.json";
const DEFAULT_LOG_DIR: &str = "logs";

#[derive(Debug)]
pub enum ConfigError {
    Read { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: serde_json::Error },
    InvalidValue { key: &'static str, value: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "cannot read config `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "invalid config `{}`: {source}", path.display())
            }
            Self::InvalidValue { key, value } => write!(f, "invalid value `{value}` for {key}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::InvalidValue { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CoreConfig {
    pub db_path: PathBuf,
    /// Copy corrupt store content aside before resetting it.
    pub preserve_corrupt: bool,
    pub log_level: String,
    pub log_dir: PathBuf,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            preserve_corrupt: true,
            log_level: default_log_level().to_string(),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }
}

impl CoreConfig {
    /// Reads a JSON config file; missing keys keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies `PARCEL_*` overrides from the process environment.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides resolved by `lookup`.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = get(ENV_DB_PATH) {
            self.db_path = PathBuf::from(value.trim());
        }
        if let Some(value) = get(ENV_PRESERVE_CORRUPT) {
            self.preserve_corrupt = parse_flag(ENV_PRESERVE_CORRUPT, &value)?;
        }
        if let Some(value) = get(ENV_LOG_LEVEL) {
            self.log_level = value.trim().to_string();
        }
        if let Some(value) = get(ENV_LOG_DIR) {
            self.log_dir = PathBuf::from(value.trim());
        }
        Ok(self)
    }

    /// Builds the store described by this config.
    pub fn open_store(&self) -> JsonFileStore {
        JsonFileStore::new(&self.db_path).preserve_corrupt(self.preserve_corrupt)
    }

    pub fn log_settings(&self) -> Result<LogSettings, LoggingError> {
        LogSettings::new(&self.log_level, &self.log_dir)
    }
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}
