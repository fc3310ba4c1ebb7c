#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for the download engine.
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (`~/.config/sps2/config.toml`)
//! - Environment variables

pub mod constants;
pub mod core;

pub use constants as fixed_paths;
pub use core::{GeneralConfig, NetworkConfig, PathConfig, SignatureLevel};

use serde::{Deserialize, Serialize};
use sps2_errors::{ConfigError, Error};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub paths: PathConfig,
}

impl Config {
    /// Get the default config file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let home_dir = dirs::home_dir().ok_or_else(|| ConfigError::NotFound {
            path: "home directory".to_string(),
        })?;
        Ok(home_dir.join(".config").join("sps2").join("config.toml"))
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or contains invalid TOML.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        let config: Self = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration with fallback to defaults.
    ///
    /// If the config file doesn't exist, creates it with defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or contains invalid TOML.
    pub async fn load() -> Result<Self, Error> {
        let config_path = Self::default_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path).await
        } else {
            let config = Self::default();
            if let Err(e) = config.save().await {
                tracing::warn!("failed to save default config: {e}");
            }
            Ok(config)
        }
    }

    /// Load configuration from an optional path, falling back to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed.
    pub async fn load_or_default(path: &Option<PathBuf>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Merge overrides from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if an environment variable holds a value that cannot
    /// be parsed into its expected type.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        if let Ok(downloads) = std::env::var("SPS2_PARALLEL_DOWNLOADS") {
            self.general.parallel_downloads =
                downloads.parse().map_err(|_| ConfigError::InvalidValue {
                    field: "SPS2_PARALLEL_DOWNLOADS".to_string(),
                    value: downloads,
                })?;
        }

        if let Ok(timeout) = std::env::var("SPS2_NETWORK_TIMEOUT") {
            self.network.timeout = timeout.parse().map_err(|_| ConfigError::InvalidValue {
                field: "SPS2_NETWORK_TIMEOUT".to_string(),
                value: timeout,
            })?;
        }

        if let Ok(agent) = std::env::var("HTTP_USER_AGENT") {
            self.network.user_agent = Some(agent);
        }

        Ok(())
    }

    /// Get the cache directory path (with default).
    #[must_use]
    pub fn cache_path(&self) -> PathBuf {
        self.paths
            .cache_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(constants::CACHE_DIR))
    }

    /// Get the temp-file directory (with default, falls back to the cache directory).
    #[must_use]
    pub fn tmp_path(&self) -> PathBuf {
        self.paths
            .tmp_dir
            .clone()
            .unwrap_or_else(|| self.cache_path())
    }

    /// Save configuration to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized or the
    /// file cannot be written.
    pub async fn save(&self) -> Result<(), Error> {
        let config_path = Self::default_path()?;
        self.save_to(&config_path).await
    }

    /// Save configuration to a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized or the
    /// file cannot be written.
    pub async fn save_to(&self, path: &Path) -> Result<(), Error> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ConfigError::WriteError {
                    path: parent.display().to_string(),
                    error: e.to_string(),
                })?;
        }

        let toml_string =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
                error: e.to_string(),
            })?;

        let content = format!(
            "# sps2 download engine configuration\n\
             # This file was automatically generated.\n\n\
             {toml_string}"
        );

        fs::write(path, content)
            .await
            .map_err(|e| ConfigError::WriteError {
                path: path.display().to_string(),
                error: e.to_string(),
            })?;

        Ok(())
    }
}
