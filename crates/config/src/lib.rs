//! Configuration loading, validation, and management for Bruin.
//!
//! Loads configuration from `~/.bruin/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.bruin/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the LLM provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Provider configuration
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Alarm scheduler configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Agent behavior configuration
    #[serde(default)]
    pub agent: AgentConfig,

    /// System prompt configuration
    #[serde(default)]
    pub prompts: PromptConfig,
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
            .field("provider", &self.provider)
            .field("database", &self.database)
            .field("scheduler", &self.scheduler)
            .field("agent", &self.agent)
            .field("prompts", &self.prompts)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider name (only "openai"-compatible backends are supported)
    #[serde(default = "default_provider_name")]
    pub name: String,

    /// Base URL override for OpenAI-compatible backends
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Model to use
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens per response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_provider_name() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            api_url: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "~/.bruin/bruin.db".into()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// What to do with an alarm found older than the stale cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissedAlarmPolicy {
    /// Delete without firing (default)
    Drop,
    /// Fire once, marked late, then delete
    FireLateOnce,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between sweep passes
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    /// Policy for alarms older than one full interval
    #[serde(default = "default_missed_policy")]
    pub missed_policy: MissedAlarmPolicy,
}

fn default_check_interval() -> u64 {
    60
}
fn default_missed_policy() -> MissedAlarmPolicy {
    MissedAlarmPolicy::Drop
}

impl SchedulerConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval(),
            missed_policy: default_missed_policy(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum messages retained per user context
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Maximum whitespace-delimited tokens per outbound user message
    #[serde(default = "default_max_message_tokens")]
    pub max_message_tokens: usize,

    /// Maximum provider round-trips per turn before giving up
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: usize,
}

fn default_history_limit() -> usize {
    16
}
fn default_max_message_tokens() -> usize {
    50
}
fn default_max_tool_iterations() -> usize {
    16
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            max_message_tokens: default_max_message_tokens(),
            max_tool_iterations: default_max_tool_iterations(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Persona prompt prepended to every conversation
    #[serde(default = "default_persona")]
    pub persona: String,

    /// Preamble for turns triggered by a fired alarm rather than a user
    #[serde(default = "default_system_event")]
    pub system_event: String,
}

fn default_persona() -> String {
    "You are Bruin, a helpful personal assistant. You can set, list, update, \
     and delete alarms for the user, and you notify users when their alarms \
     fire. Keep replies short and friendly."
        .into()
}

fn default_system_event() -> String {
    "A scheduled event has fired. Compose a short notification for the \
     affected user and deliver it with the notify tool."
        .into()
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            persona: default_persona(),
            system_event: default_system_event(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.bruin/config.toml).
    ///
    /// Also checks environment variables for API keys:
    /// - `BRUIN_API_KEY` (highest priority)
    /// - `OPENAI_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        // Environment variable overrides (highest priority)
        if config.api_key.is_none() {
            config.api_key = std::env::var("BRUIN_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(model) = std::env::var("BRUIN_MODEL") {
            config.provider.model = model;
        }

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

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".bruin")
    }

    /// Resolve the database path, expanding a leading `~`.
    pub fn database_path(&self) -> PathBuf {
        let raw = &self.database.path;
        if let Some(rest) = raw.strip_prefix("~/") {
            dirs_home().join(rest)
        } else {
            PathBuf::from(raw)
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.temperature < 0.0 || self.provider.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "provider.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.scheduler.check_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "scheduler.check_interval_secs must be at least 1".into(),
            ));
        }

        if self.agent.history_limit == 0 {
            return Err(ConfigError::ValidationError(
                "agent.history_limit must be at least 1".into(),
            ));
        }

        if self.agent.max_tool_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_tool_iterations must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: ProviderConfig::default(),
            database: DatabaseConfig::default(),
            scheduler: SchedulerConfig::default(),
            agent: AgentConfig::default(),
            prompts: PromptConfig::default(),
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
