//! Application configuration
//!
//! Loaded from TOML at startup, falls back to defaults if no config file
//! exists. Every section is optional.

use locus_llm::Credentials;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Overrides `storage.root`.
pub const ROOT_ENV: &str = "LOCUS_ROOT";
/// Path of the config file itself.
pub const CONFIG_ENV: &str = "LOCUS_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub models: ModelDefaults,
    pub credentials: Credentials,
    pub agents: AgentsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root of the on-disk layout (`agents/`, `workflows/`).
    pub root: PathBuf,
}

/// Used for any agent whose spec does not name its own model or region.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelDefaults {
    pub default_model: String,
    pub default_region: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    /// Directory holding `agents/<slug>.toml` and `tools/<id>.toml`.
    pub config_dir: PathBuf,
    /// Slugs built at startup. Empty means every configured agent.
    pub autostart: Vec<String>,
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: home_dir().join(".locus"),
        }
    }
}

impl Default for ModelDefaults {
    fn default() -> Self {
        Self {
            default_model: "claude-sonnet-4-20250514".into(),
            default_region: "us-east-1".into(),
        }
    }
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            config_dir: home_dir().join(".locus").join("config"),
            autostart: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {}, using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Default config location: `$LOCUS_CONFIG`, else `~/.locus/locus.toml`.
    pub fn default_path() -> PathBuf {
        std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| home_dir().join(".locus").join("locus.toml"))
    }

    /// Apply environment overrides on top of whatever was loaded.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(root) = std::env::var(ROOT_ENV) {
            self.storage.root = PathBuf::from(root);
        }
        self
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}
