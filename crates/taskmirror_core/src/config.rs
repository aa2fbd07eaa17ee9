//! Runtime configuration.
//!
//! # Responsibility
//! - Load the TOML settings shared by every entry point.
//! - Validate values before any database or logger is opened.
//!
//! # Invariants
//! - `principal` is never empty.
//! - `log-dir`, when set, is absolute.
//!
//! Example:
//!
//! ```toml
//! database = "/home/alice/.local/share/taskmirror/mirror.db"
//! principal = "alice"
//! log-level = "info"
//! log-dir = "/home/alice/.local/state/taskmirror/logs"
//! ```

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const DEFAULT_DATABASE: &str = "taskmirror.db";
const DEFAULT_PRINCIPAL: &str = "local";

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, error: std::io::Error },
    Parse(toml::de::Error),
    InvalidValue { key: &'static str, reason: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, error } => write!(f, "failed to read {}: {error}", path.display()),
            Self::Parse(err) => write!(f, "invalid config: {err}"),
            Self::InvalidValue { key, reason } => write!(f, "invalid `{key}`: {reason}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { error, .. } => Some(error),
            Self::Parse(err) => Some(err),
            Self::InvalidValue { .. } => None,
        }
    }
}

/// Settings for one mirror installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct CoreConfig {
    /// SQLite database file.
    pub database: PathBuf,
    /// Principal that owns imported pending tasks and signs journal entries.
    pub principal: String,
    /// `None` falls back to the build-mode default.
    pub log_level: Option<String>,
    /// `None` disables file logging.
    pub log_dir: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            principal: DEFAULT_PRINCIPAL.to_string(),
            log_level: None,
            log_dir: None,
        }
    }
}

impl CoreConfig {
    /// Parses and validates TOML text; missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
            path: path.to_path_buf(),
            error,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.principal.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "principal",
                reason: "must not be empty".to_string(),
            });
        }
        if self.database.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "database",
                reason: "must not be empty".to_string(),
            });
        }
        if let Some(dir) = &self.log_dir {
            if !dir.is_absolute() {
                return Err(ConfigError::InvalidValue {
                    key: "log-dir",
                    reason: format!("must be an absolute path, got `{}`", dir.display()),
                });
            }
        }
        Ok(())
    }
}
