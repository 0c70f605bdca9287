//! Configuration management for assetline
//!
//! Loads and saves the model, GraphQL upstream and agent settings from
//! `~/.assetline/config.json`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod paths;

pub use paths::{config_path, data_dir};

/// Environment fallback for the model API key
pub const API_KEY_ENV: &str = "ASSETLINE_API_KEY";

/// Environment fallback for the GraphQL bearer token
pub const GRAPHQL_TOKEN_ENV: &str = "ASSETLINE_GRAPHQL_TOKEN";

/// Errors in configuration handling
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Language model endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_model() -> String {
    "anthropic/claude-3-haiku".to_string()
}

fn default_temperature() -> f32 {
    0.0
}

fn default_max_tokens() -> u32 {
    4096
}

/// GraphQL upstream used by the query tools
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphQlConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GraphQlConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            token: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_endpoint() -> String {
    "https://stg.api.n-able.com/graphql".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

/// Conversation driver settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: default_max_tool_rounds(),
            stream_buffer: default_stream_buffer(),
            system_prompt: None,
        }
    }
}

fn default_max_tool_rounds() -> u32 {
    20
}

fn default_stream_buffer() -> usize {
    32
}

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub graphql: GraphQlConfig,
    #[serde(default)]
    pub agent: AgentConfig,
}

impl Config {
    /// Load from the default location
    pub async fn load() -> Result<Self> {
        let path = config_path();
        Self::load_from(&path).await
    }

    /// Load from a specific location, falling back to defaults when absent
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("no config found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        debug!("loading config from {:?}", path);
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save to the default location
    pub async fn save(&self) -> Result<()> {
        let path = config_path();
        self.save_to(&path).await
    }

    /// Save to a specific location
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        debug!("saving config to {:?}", path);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Model API key, falling back to `ASSETLINE_API_KEY`
    pub fn api_key(&self) -> Option<String> {
        non_empty(&self.model.api_key).or_else(|| env_non_empty(API_KEY_ENV))
    }

    /// Model API base URL
    pub fn api_base(&self) -> Option<String> {
        self.model
            .api_base
            .as_deref()
            .and_then(non_empty)
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key().is_some()
    }

    /// GraphQL bearer token, falling back to `ASSETLINE_GRAPHQL_TOKEN`
    pub fn graphql_token(&self) -> Option<String> {
        non_empty(&self.graphql.token).or_else(|| env_non_empty(GRAPHQL_TOKEN_ENV))
    }

    pub fn default_model(&self) -> String {
        self.model.model.clone()
    }

    /// Model calls allowed per turn, at least one
    pub fn max_tool_rounds(&self) -> u32 {
        self.agent.max_tool_rounds.max(1)
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Write a default config unless one exists, then load it
pub async fn init() -> Result<Config> {
    let config_path = config_path();

    if config_path.exists() {
        warn!("config already present at {:?}", config_path);
    } else {
        let config = Config::default();
        config.save().await?;
        info!("◆ config written to {:?}", config_path);
    }

    Config::load().await
}
