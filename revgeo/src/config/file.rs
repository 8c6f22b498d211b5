//! Configuration file handling for ~/.revgeo/config.ini.
//!
//! A missing file means defaults. Environment overrides (`GITHUB_TOKEN`,
//! `PORT`) are applied on top of whatever the file says.

use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;
use tracing::warn;

use super::settings::ConfigFile;

/// Environment variable that supplies the GitHub backend token.
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Environment variable that overrides the server port.
pub const PORT_ENV: &str = "PORT";

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    #[error("Failed to write config file: {0}")]
    WriteError(String),

    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

impl ConfigFile {
    /// Loads ~/.revgeo/config.ini, or defaults if it does not exist.
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Loads configuration from `path`, or defaults if it does not exist.
    ///
    /// Environment overrides are not applied here; see
    /// [`with_env_overrides`](Self::with_env_overrides).
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Parses configuration from INI text.
    pub fn from_ini_str(content: &str) -> Result<Self, ConfigFileError> {
        let ini = Ini::load_from_str(content)
            .map_err(|e| ConfigFileError::ReadError(ini::Error::Parse(e)))?;
        super::parser::parse_ini(&ini)
    }

    /// Saves to ~/.revgeo/config.ini.
    pub fn save(&self) -> Result<(), ConfigFileError> {
        self.save_to(&config_file_path())
    }

    /// Saves to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }

        let content = super::writer::to_config_string(self);
        std::fs::write(path, content).map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// Creates the default config file if it doesn't exist.
    ///
    /// Returns the path to the config file.
    pub fn ensure_exists() -> Result<PathBuf, ConfigFileError> {
        let path = config_file_path();
        if !path.exists() {
            Self::default().save_to(&path)?;
        }
        Ok(path)
    }

    /// Applies `GITHUB_TOKEN` and `PORT` from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Applies overrides looked up through `lookup`.
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(token) = lookup(GITHUB_TOKEN_ENV).filter(|t| !t.trim().is_empty()) {
            self.cache.github_token = Some(token.trim().to_string());
        }

        if let Some(port) = lookup(PORT_ENV) {
            match port.trim().parse::<u16>() {
                Ok(port) => self.server.bind = replace_port(&self.server.bind, port),
                Err(_) => warn!(value = %port, "Ignoring non-numeric PORT"),
            }
        }

        self
    }
}

fn replace_port(bind: &str, port: u16) -> String {
    let host = bind.rsplit_once(':').map(|(host, _)| host).unwrap_or(bind);
    format!("{}:{}", host, port)
}

/// Path to the config directory (~/.revgeo).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".revgeo")
}

/// Path to the config file (~/.revgeo/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

/// Default location of the file backend (~/.revgeo/cache.json).
pub fn default_cache_path() -> PathBuf {
    config_directory().join("cache.json")
}
