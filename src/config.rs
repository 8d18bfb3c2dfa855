//! Reads/writes the node's TOML configuration file: `[app]` (logging),
//! `[p2p]` (listener address), and `[bank]` (the identity resolver's
//! persisted bank code).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    crate::common::DEFAULT_PORT
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_dir: default_log_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct P2pConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for P2pConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BankConfig {
    pub code: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub p2p: P2pConfig,
    #[serde(default)]
    pub bank: BankConfig,

    #[serde(skip)]
    path: PathBuf,
}

impl Config {
    /// Loads `path` if it exists, otherwise starts from defaults.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            toml::from_str::<Config>(&raw)?
        } else {
            Config::default()
        };
        config.path = path.to_path_buf();
        Ok(config)
    }

    /// Persists `bank.code`, creating the file on first boot.
    pub fn persist_bank_code(&mut self, code: &str) -> Result<(), Error> {
        self.bank.code = Some(code.to_string());
        let serialized = toml::to_string_pretty(&self)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serialized)?;
        Ok(())
    }
}
