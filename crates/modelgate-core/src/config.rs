//! Application configuration management.
//!
//! This module resolves the remote API base URL and where credentials
//! are kept. Values come from defaults, then the config file at
//! `~/.config/modelgate/config.json`, then the environment:
//!
//! - `MODELGATE_REMOTE_API`: base URL of the service
//! - `MODELGATE_STORAGE`: `file` or `keyring`

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::{CredentialBackend, FileBackend, KeyringBackend};

/// Application name used for config/storage directory paths
const APP_NAME: &str = "modelgate";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Base URL used when nothing else is configured
const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

pub const ENV_REMOTE_API: &str = "MODELGATE_REMOTE_API";
pub const ENV_STORAGE: &str = "MODELGATE_STORAGE";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    File,
    Keyring,
}

impl StorageKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Some(StorageKind::File),
            "keyring" => Some(StorageKind::Keyring),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default)]
    pub storage: StorageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<PathBuf>,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            storage: StorageKind::default(),
            storage_dir: None,
        }
    }
}

impl Config {
    /// Load the config file (if any) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file()?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn load_file() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(serde_json::from_str(&contents).context("Failed to parse config file")?)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply overrides from `lookup` and validate the result
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_REMOTE_API) {
            self.api_base_url = url;
        }
        if let Some(raw) = lookup(ENV_STORAGE) {
            self.storage = StorageKind::parse(&raw)
                .ok_or_else(|| anyhow::anyhow!("Unknown {} value: {}", ENV_STORAGE, raw))?;
        }

        self.api_base_url = self.api_base_url.trim().trim_end_matches('/').to_string();
        if self.api_base_url.is_empty() {
            anyhow::bail!("API base URL must not be empty");
        }
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the file-backed credential store
    pub fn storage_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.storage_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn credential_backend(&self) -> Result<Box<dyn CredentialBackend>> {
        Ok(match self.storage {
            StorageKind::File => Box::new(FileBackend::new(self.storage_dir()?)),
            StorageKind::Keyring => Box::new(KeyringBackend),
        })
    }
}
