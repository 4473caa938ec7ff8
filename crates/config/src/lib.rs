//! Configuration loading and validation for Parley.
//!
//! Loads configuration from `~/.parley/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Built-in tools enabled when the config names none.
const BUILTIN_TOOLS: [&str; 3] = ["CalculatorTool", "CountLettersTool", "CurrentTimeTool"];

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// The root configuration structure.
///
/// Maps directly to `~/.parley/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model identifier reported by the executor
    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// Which offline executor drives the loop
    #[serde(default)]
    pub executor: ExecutorKind,

    /// Script replayed by the `scripted` executor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_path: Option<PathBuf>,

    /// Default system prompt for every run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Abort a run that takes longer than this
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_timeout_secs: Option<u64>,

    /// Default log filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub transforms: TransformsConfig,
}

fn default_model_id() -> String {
    "echo-1".into()
}
fn default_log_level() -> String {
    "info".into()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    /// Rule-based replies
    #[default]
    Echo,
    /// Replays `script_path`
    Scripted,
}

impl FromStr for ExecutorKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "echo" => Ok(Self::Echo),
            "scripted" => Ok(Self::Scripted),
            other => Err(ConfigError::ValidationError(format!(
                "unknown executor '{other}', expected 'echo' or 'scripted'"
            ))),
        }
    }
}

impl std::fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Echo => write!(f, "echo"),
            Self::Scripted => write!(f, "scripted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Names of the built-in tools offered to the model
    #[serde(default = "default_enabled_tools")]
    pub enabled: Vec<String>,
}

fn default_enabled_tools() -> Vec<String> {
    BUILTIN_TOOLS.iter().map(|s| s.to_string()).collect()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled_tools(),
        }
    }
}

/// Pre-tool-call transforms. When both are on, the inline parser runs first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformsConfig {
    /// Recover tool calls written into assistant text
    #[serde(default)]
    pub inline_tool_calls: bool,

    /// Drop assistant text that accompanies tool calls
    #[serde(default)]
    pub tool_call_filter: bool,
}

impl AppConfig {
    /// Load configuration from the default path (~/.parley/config.toml).
    ///
    /// Environment variables override the file:
    /// - `PARLEY_MODEL`
    /// - `PARLEY_EXECUTOR`
    /// - `PARLEY_SYSTEM_PROMPT`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(None)
    }

    /// Like [`load`](Self::load), reading `path` instead of the default file
    /// when given.
    pub fn load_with(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map_or_else(Self::config_path, Path::to_path_buf);
        let mut config = Self::load_from(&path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
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

    /// Apply `PARLEY_*` overrides read through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("PARLEY_MODEL") {
            self.model_id = model;
        }
        if let Some(executor) = lookup("PARLEY_EXECUTOR") {
            self.executor = executor.parse()?;
        }
        if let Some(prompt) = lookup("PARLEY_SYSTEM_PROMPT") {
            self.system_prompt = Some(prompt);
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".parley")
    }

    /// Get the default configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model_id.trim().is_empty() {
            return Err(ConfigError::ValidationError("model_id must not be empty".into()));
        }

        if self.executor == ExecutorKind::Scripted && self.script_path.is_none() {
            return Err(ConfigError::ValidationError(
                "executor 'scripted' requires script_path".into(),
            ));
        }

        if self.run_timeout_secs == Some(0) {
            return Err(ConfigError::ValidationError(
                "run_timeout_secs must be > 0".into(),
            ));
        }

        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "log_level must be one of {}",
                LOG_LEVELS.join(", ")
            )));
        }

        if self.tools.enabled.iter().any(|name| name.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "tools.enabled must not contain empty names".into(),
            ));
        }

        Ok(())
    }

    /// Serialize to TOML (for the `config` command).
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        Self::default().to_toml().unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_id: default_model_id(),
            executor: ExecutorKind::default(),
            script_path: None,
            system_prompt: None,
            run_timeout_secs: None,
            log_level: default_log_level(),
            tools: ToolsConfig::default(),
            transforms: TransformsConfig::default(),
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
