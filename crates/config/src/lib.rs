//! Configuration for tolk
//!
//! A single JSON file under `~/.tolk/`. Every field has a serde default so that a
//! partial (or hand-edited) file still loads.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod paths;

pub use paths::{config_path, data_dir, ensure_dir, expand_tilde};

pub const OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Environment variables consulted when the file carries no key, in order.
pub const API_KEY_ENV_VARS: [&str; 2] = ["OPENROUTER_API_KEY", "OPENAI_API_KEY"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Credentials for one backend
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openrouter: ProviderConfig,
    #[serde(default)]
    pub openai: ProviderConfig,
}

/// Model used for the tool-calling loop and the one used for drafting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_model")]
    pub agent: String,
    #[serde(default = "default_model")]
    pub translator: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            agent: default_model(),
            translator: default_model(),
        }
    }
}

fn default_model() -> String {
    "z-ai/glm-4.5".to_string()
}

/// Loop parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefaults {
    #[serde(default = "default_workspace")]
    pub workspace: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_iterations")]
    pub max_tool_iterations: u32,
    #[serde(default = "default_target_language")]
    pub target_language: String,
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            workspace: default_workspace(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_tool_iterations: default_max_iterations(),
            target_language: default_target_language(),
        }
    }
}

fn default_workspace() -> String {
    ".".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_iterations() -> u32 {
    40
}

fn default_target_language() -> String {
    "Chinese".to_string()
}

/// Human review of drafts. When disabled every draft is auto-approved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_true() -> bool {
    true
}

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub agent: AgentDefaults,
    #[serde(default)]
    pub review: ReviewConfig,
}

impl Config {
    pub async fn load() -> Result<Self> {
        Self::load_from(&config_path()).await
    }

    /// Load from a specific file; a missing file yields the defaults.
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }

        debug!(path = %path.display(), "loading config");
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub async fn save(&self) -> Result<()> {
        self.save_to(&config_path()).await
    }

    pub async fn save_to(&self, path: &Path) -> Result<()> {
        debug!(path = %path.display(), "saving config");

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Workspace root with `~` expanded
    pub fn workspace_path(&self) -> PathBuf {
        expand_tilde(&self.agent.workspace)
    }

    /// Key from the file only
    pub fn configured_api_key(&self) -> Option<String> {
        [&self.providers.openrouter, &self.providers.openai]
            .into_iter()
            .map(|p| p.api_key.trim())
            .find(|k| !k.is_empty())
            .map(|k| k.to_string())
    }

    /// Key from the file, falling back to the environment
    pub fn api_key(&self) -> Option<String> {
        self.configured_api_key().or_else(|| {
            API_KEY_ENV_VARS
                .iter()
                .filter_map(|var| std::env::var(var).ok())
                .map(|k| k.trim().to_string())
                .find(|k| !k.is_empty())
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key().is_some()
    }

    /// Base URL matching whichever key is in use
    pub fn api_base(&self) -> String {
        let openrouter = &self.providers.openrouter;
        let openai = &self.providers.openai;

        let explicit = |p: &ProviderConfig| p.api_base.clone().filter(|b| !b.trim().is_empty());

        if !openrouter.api_key.trim().is_empty() {
            return explicit(openrouter).unwrap_or_else(|| OPENROUTER_API_BASE.to_string());
        }
        if !openai.api_key.trim().is_empty() {
            return explicit(openai).unwrap_or_else(|| OPENAI_API_BASE.to_string());
        }
        if std::env::var(API_KEY_ENV_VARS[0]).map_or(false, |k| !k.trim().is_empty()) {
            return explicit(openrouter).unwrap_or_else(|| OPENROUTER_API_BASE.to_string());
        }
        if std::env::var(API_KEY_ENV_VARS[1]).map_or(false, |k| !k.trim().is_empty()) {
            return explicit(openai).unwrap_or_else(|| OPENAI_API_BASE.to_string());
        }
        explicit(openrouter).unwrap_or_else(|| OPENROUTER_API_BASE.to_string())
    }
}

/// Write the default config (unless one exists) and create the data directory.
pub async fn init() -> Result<Config> {
    init_at(&config_path()).await
}

/// [`init`] against an explicit config location
pub async fn init_at(path: &Path) -> Result<Config> {
    if path.exists() {
        warn!(path = %path.display(), "config already exists, leaving it untouched");
    } else {
        Config::default().save_to(path).await?;
        info!(path = %path.display(), "wrote default config");
    }

    if let Some(dir) = path.parent() {
        ensure_dir(dir).await?;
    }

    Config::load_from(path).await
}
