//! Configuration loading, validation, and management for turnwise.
//!
//! Loads configuration from `~/.turnwise/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.turnwise/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the response service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model to use for every turn
    #[serde(default = "default_model")]
    pub model: String,

    /// Maximum tokens per response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,

    /// Stream responses incrementally
    #[serde(default = "default_true")]
    pub stream: bool,

    /// Tool-loop bounds and timeouts
    #[serde(default)]
    pub orchestration: OrchestrationConfig,

    /// Which assistant to run
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// Hosted document search
    #[serde(default)]
    pub file_search: FileSearchConfig,

    /// Hosted code execution
    #[serde(default)]
    pub code_interpreter: ToggleConfig,

    /// Hosted web search
    #[serde(default)]
    pub web_search: ToggleConfig,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("stream", &self.stream)
            .field("orchestration", &self.orchestration)
            .field("assistant", &self.assistant)
            .field("file_search", &self.file_search)
            .field("code_interpreter", &self.code_interpreter)
            .field("web_search", &self.web_search)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    /// Maximum local-tool continuation rounds per turn
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,

    /// Overall deadline for one turn, in seconds
    #[serde(default = "default_turn_timeout_secs")]
    pub turn_timeout_secs: u64,
}

fn default_max_tool_rounds() -> u32 {
    5
}
fn default_turn_timeout_secs() -> u64 {
    120
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: default_max_tool_rounds(),
            turn_timeout_secs: default_turn_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// "personal", "documents", or "advisor"
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Replaces the preset's built-in instructions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

fn default_preset() -> String {
    "personal".into()
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            preset: default_preset(),
            instructions: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSearchConfig {
    #[serde(default)]
    pub vector_store_ids: Vec<String>,

    #[serde(default = "default_max_num_results")]
    pub max_num_results: u32,
}

fn default_max_num_results() -> u32 {
    5
}

impl Default for FileSearchConfig {
    fn default() -> Self {
        Self {
            vector_store_ids: vec![],
            max_num_results: default_max_num_results(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ToggleConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

pub const PRESETS: [&str; 3] = ["personal", "documents", "advisor"];

impl AppConfig {
    /// Load configuration from the default path (~/.turnwise/config.toml).
    ///
    /// Also checks environment variables:
    /// - `TURNWISE_API_KEY`, then `OPENAI_API_KEY`
    /// - `TURNWISE_MODEL`
    /// - `TURNWISE_BASE_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through a lookup function.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("TURNWISE_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }
        if let Some(model) = lookup("TURNWISE_MODEL") {
            self.model = model;
        }
        if let Some(url) = lookup("TURNWISE_BASE_URL") {
            self.base_url = url;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".turnwise")
    }

    /// Get the configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::ValidationError("base_url must not be empty".into()));
        }

        if !(1..=32).contains(&self.orchestration.max_tool_rounds) {
            return Err(ConfigError::ValidationError(
                "orchestration.max_tool_rounds must be between 1 and 32".into(),
            ));
        }

        if self.orchestration.turn_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "orchestration.turn_timeout_secs must be > 0".into(),
            ));
        }

        if !(1..=50).contains(&self.file_search.max_num_results) {
            return Err(ConfigError::ValidationError(
                "file_search.max_num_results must be between 1 and 50".into(),
            ));
        }

        if !PRESETS.contains(&self.assistant.preset.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "assistant.preset must be one of {}",
                PRESETS.join(", ")
            )));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            max_output_tokens: None,
            stream: true,
            orchestration: OrchestrationConfig::default(),
            assistant: AssistantConfig::default(),
            file_search: FileSearchConfig::default(),
            code_interpreter: ToggleConfig::default(),
            web_search: ToggleConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
