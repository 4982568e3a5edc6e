//! Configuration handling for nvpn
//!
//! The configuration lives in a single JSON file per user (`~/.nvpnrc` by
//! default). It is written once, by `nvpn init` or the first toggle, and read
//! on every invocation after that.

use crate::prompt::{Prompter, collect_config};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// File name of the per-user configuration, relative to the home directory
pub const CONFIG_FILE_NAME: &str = ".nvpnrc";

/// Environment variable overriding the configuration path
pub const CONFIG_PATH_ENV: &str = "NVPN_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {}", .0.display())]
    Missing(PathBuf),
    #[error("Invalid config file {}: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },
    #[error("Config field must not be empty: {0}")]
    EmptyField(&'static str),
    #[error("Failed to access config file: {0}")]
    Io(#[from] io::Error),
    #[error("Failed to read answer: {0}")]
    Prompt(#[source] io::Error),
    #[error("Could not determine home directory")]
    NoHomeDir,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// NetworkManager connection profile name
    pub connection_name: String,
    /// Shared TOTP secret, base32 encoded
    pub secret_base32: String,
    /// Fixed part of the password, the TOTP code is appended to it
    pub password_static_part: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("connection_name", &self.connection_name)
            .field("secret_base32", &"<redacted>")
            .field("password_static_part", &"<redacted>")
            .finish()
    }
}

impl Config {
    pub fn new(
        connection_name: impl Into<String>,
        secret_base32: impl Into<String>,
        password_static_part: impl Into<String>,
    ) -> Self {
        Self {
            connection_name: connection_name.into(),
            secret_base32: secret_base32.into(),
            password_static_part: password_static_part.into(),
        }
    }

    /// Check that every field carries a value
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connection_name.is_empty() {
            return Err(ConfigError::EmptyField("connectionName"));
        }
        if self.secret_base32.is_empty() {
            return Err(ConfigError::EmptyField("secretBase32"));
        }
        if self.password_static_part.is_empty() {
            return Err(ConfigError::EmptyField("passwordStaticPart"));
        }
        Ok(())
    }
}

/// How to react when the configuration file does not exist yet
pub enum LoadMode<'a> {
    /// Fail with [`ConfigError::Missing`]; never touches the filesystem
    Strict,
    /// Ask for the values and write a new file
    Provision(&'a dyn Prompter),
}

/// Reads and writes the configuration file at a fixed path
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$NVPN_CONFIG` if set, otherwise `~/.nvpnrc`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }
        dirs::home_dir()
            .map(|home| home.join(CONFIG_FILE_NAME))
            .ok_or(ConfigError::NoHomeDir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True iff the config path exists and is a regular file
    pub fn exists(&self) -> bool {
        self.path.metadata().map(|m| m.is_file()).unwrap_or(false)
    }

    pub fn load(&self, mode: LoadMode<'_>) -> Result<Config, ConfigError> {
        if !self.exists() {
            return match mode {
                LoadMode::Strict => Err(ConfigError::Missing(self.path.clone())),
                LoadMode::Provision(prompter) => {
                    info!("No config at {}, creating one", self.path.display());
                    let config = collect_config(prompter).map_err(ConfigError::Prompt)?;
                    self.create(config)
                }
            };
        }

        debug!("Loading config from {}", self.path.display());
        let content = std::fs::read_to_string(&self.path)?;
        let config: Config =
            serde_json::from_str(&content).map_err(|e| ConfigError::Invalid {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        config.validate().map_err(|e| ConfigError::Invalid {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        Ok(config)
    }

    /// Persist `config` and hand it back
    ///
    /// The JSON is written to a temporary sibling and renamed into place, so
    /// the target either keeps its old content or gets the complete new one.
    pub fn create(&self, config: Config) -> Result<Config, ConfigError> {
        config.validate()?;

        let parent = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)?;

        let mut content = serde_json::to_string_pretty(&config)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        content.push('\n');

        // NamedTempFile is created with mode 0600 on unix
        let mut file = tempfile::NamedTempFile::new_in(&parent)?;
        file.write_all(content.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|e| e.error)?;

        info!("Saved config to {}", self.path.display());
        Ok(config)
    }
}
