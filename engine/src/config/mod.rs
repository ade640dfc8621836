//! Configuration management
//!
//! Configuration is stored in TOML format at ~/.wayfind/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: log level, data directory
//! - **engine**: step budgets, call timeouts, batch breaker, regression
//!   threshold and the enabled context strategies
//! - **llm**: provider selection and per-provider endpoints
//! - **surface**: where the page-control service listens
//!
//! Every engine value defaults to the named constant used by the library, so
//! an empty `[engine]` table behaves exactly like the built-in engine.
//!
//! # Examples
//!
//! ```no_run
//! use wayfind_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//! println!("Provider: {}", config.llm.provider);
//! println!("Max steps: {}", config.engine.max_steps);
//! # Ok(())
//! # }
//! ```

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::conductor::context::{
    EngineLimits, DEFAULT_ACTION_TIMEOUT_SECS, DEFAULT_MAX_STEPS, DEFAULT_OBSERVE_TIMEOUT_SECS,
    DEFAULT_PLANNER_TIMEOUT_SECS, DEFAULT_SUMMARIZER_TIMEOUT_SECS, DEFAULT_TRAILING_HISTORY,
    SIMPLE_MAX_STEPS,
};
use crate::conductor::feedback::DEFAULT_JUDGE_TIMEOUT_SECS;
use crate::conductor::DEFAULT_MAX_CONSECUTIVE_FAILURES;
use crate::outcomes::REGRESSION_THRESHOLD;
use crate::strategy::StrategyRegistry;

/// Database file name inside `core.data_dir`
pub const DATABASE_FILE: &str = "wayfind.db";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Core settings
    #[serde(default)]
    pub core: CoreConfig,

    /// Goal execution settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// LLM provider configuration
    #[serde(default)]
    pub llm: LLMConfig,

    /// Page-control service
    #[serde(default)]
    pub surface: SurfaceConfig,
}

/// Core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Data directory path (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            data_dir: default_data_dir(),
        }
    }
}

/// Goal execution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Step budget per sub-goal with an LLM-guided planner
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// Step budget per sub-goal with a rule-based planner
    #[serde(default = "default_simple_max_steps")]
    pub simple_max_steps: usize,

    /// Steps of history shown to the planner
    #[serde(default = "default_trailing_history")]
    pub trailing_history: usize,

    #[serde(default = "default_observe_timeout")]
    pub observe_timeout_secs: u64,

    #[serde(default = "default_action_timeout")]
    pub action_timeout_secs: u64,

    #[serde(default = "default_planner_timeout")]
    pub planner_timeout_secs: u64,

    #[serde(default = "default_summarizer_timeout")]
    pub summarizer_timeout_secs: u64,

    #[serde(default = "default_judge_timeout")]
    pub judge_timeout_secs: u64,

    /// Consecutive failures that abort the rest of a batch
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: usize,

    /// Score drop versus the previous run that counts as a regression
    #[serde(default = "default_regression_threshold")]
    pub regression_threshold: f64,

    /// Enabled context strategies; priority order is fixed by the engine
    #[serde(default = "default_strategies")]
    pub strategies: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            simple_max_steps: default_simple_max_steps(),
            trailing_history: default_trailing_history(),
            observe_timeout_secs: default_observe_timeout(),
            action_timeout_secs: default_action_timeout(),
            planner_timeout_secs: default_planner_timeout(),
            summarizer_timeout_secs: default_summarizer_timeout(),
            judge_timeout_secs: default_judge_timeout(),
            max_consecutive_failures: default_max_consecutive_failures(),
            regression_threshold: default_regression_threshold(),
            strategies: default_strategies(),
        }
    }
}

impl EngineConfig {
    /// Call limits for `EngineContext`
    pub fn limits(&self) -> EngineLimits {
        EngineLimits {
            max_steps: self.max_steps,
            simple_max_steps: self.simple_max_steps,
            trailing_history: self.trailing_history,
            observe_timeout: Duration::from_secs(self.observe_timeout_secs),
            action_timeout: Duration::from_secs(self.action_timeout_secs),
            planner_timeout: Duration::from_secs(self.planner_timeout_secs),
            summarizer_timeout: Duration::from_secs(self.summarizer_timeout_secs),
        }
    }

    pub fn judge_timeout(&self) -> Duration {
        Duration::from_secs(self.judge_timeout_secs)
    }

    /// Built-in strategies narrowed to the configured names
    pub fn registry(&self) -> Result<StrategyRegistry, EngineError> {
        StrategyRegistry::builtin().subset(&self.strategies)
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Provider backing the planner, judge and summarizer (ollama, openai)
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Ollama provider settings
    #[serde(default)]
    pub ollama: OllamaConfig,

    /// OpenAI-compatible provider settings
    #[serde(default)]
    pub openai: OpenAIConfig,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            ollama: OllamaConfig::default(),
            openai: OpenAIConfig::default(),
        }
    }
}

/// Ollama provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Base URL for Ollama API
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_ollama_model")]
    pub model: String,
}

/// OpenAI-compatible provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    /// Base URL for the chat completions API
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_openai_model")]
    pub model: String,

    /// Environment variable holding the API key; the key is never stored here
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

/// Page-control service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceConfig {
    #[serde(default = "default_surface_base_url")]
    pub base_url: String,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            base_url: default_surface_base_url(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.wayfind")
}

fn default_max_steps() -> usize {
    DEFAULT_MAX_STEPS
}

fn default_simple_max_steps() -> usize {
    SIMPLE_MAX_STEPS
}

fn default_trailing_history() -> usize {
    DEFAULT_TRAILING_HISTORY
}

fn default_observe_timeout() -> u64 {
    DEFAULT_OBSERVE_TIMEOUT_SECS
}

fn default_action_timeout() -> u64 {
    DEFAULT_ACTION_TIMEOUT_SECS
}

fn default_planner_timeout() -> u64 {
    DEFAULT_PLANNER_TIMEOUT_SECS
}

fn default_summarizer_timeout() -> u64 {
    DEFAULT_SUMMARIZER_TIMEOUT_SECS
}

fn default_judge_timeout() -> u64 {
    DEFAULT_JUDGE_TIMEOUT_SECS
}

fn default_max_consecutive_failures() -> usize {
    DEFAULT_MAX_CONSECUTIVE_FAILURES
}

fn default_regression_threshold() -> f64 {
    REGRESSION_THRESHOLD
}

fn default_strategies() -> Vec<String> {
    StrategyRegistry::builtin()
        .names()
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn default_provider() -> String {
    "ollama".to_string()
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.1:8b".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_surface_base_url() -> String {
    "http://127.0.0.1:9223".to_string()
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
            model: default_ollama_model(),
        }
    }
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            model: default_openai_model(),
            api_key_env: default_api_key_env(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.wayfind/config.toml)
    ///
    /// If the configuration file doesn't exist, writes a default one first.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or written, TOML parsing
    /// fails, or validation fails.
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration text
    pub fn from_toml_str(contents: &str) -> Result<Self, EngineError> {
        let mut config: Config = toml::from_str(contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        // Serialize before processing so `~` stays unexpanded on disk
        let config = Self::default_config();
        let toml_string = toml::to_string_pretty(&config)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {}", e)))?;

        let mut config = config;
        config.validate_and_process()?;
        Ok(config)
    }

    /// Default configuration file path (~/.wayfind/config.toml)
    pub fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".wayfind").join("config.toml"))
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            core: CoreConfig::default(),
            engine: EngineConfig::default(),
            llm: LLMConfig::default(),
            surface: SurfaceConfig::default(),
        }
    }

    /// SQLite database location
    pub fn database_path(&self) -> PathBuf {
        self.core.data_dir.join(DATABASE_FILE)
    }

    /// Validate values and expand paths
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Config` naming the first offending field.
    fn validate_and_process(&mut self) -> Result<(), EngineError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        let valid_providers = ["ollama", "openai"];
        if !valid_providers.contains(&self.llm.provider.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid provider '{}'. Must be one of: {}",
                self.llm.provider,
                valid_providers.join(", ")
            )));
        }

        let engine = &self.engine;
        if engine.max_steps == 0 || engine.simple_max_steps == 0 {
            return Err(EngineError::Config(
                "max_steps and simple_max_steps must be at least 1".to_string(),
            ));
        }
        if engine.max_consecutive_failures == 0 {
            return Err(EngineError::Config(
                "max_consecutive_failures must be at least 1".to_string(),
            ));
        }
        if !(-1.0..=0.0).contains(&engine.regression_threshold) {
            return Err(EngineError::Config(
                "regression_threshold must be between -1.0 and 0.0".to_string(),
            ));
        }
        let timeouts = [
            ("observe_timeout_secs", engine.observe_timeout_secs),
            ("action_timeout_secs", engine.action_timeout_secs),
            ("planner_timeout_secs", engine.planner_timeout_secs),
            ("summarizer_timeout_secs", engine.summarizer_timeout_secs),
            ("judge_timeout_secs", engine.judge_timeout_secs),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, secs)| *secs == 0) {
            return Err(EngineError::Config(format!("{} must be at least 1", name)));
        }

        // Unknown strategy names surface here instead of at first run
        self.engine.registry()?;

        if self.surface.base_url.trim().is_empty() {
            return Err(EngineError::Config("surface.base_url must not be empty".to_string()));
        }

        self.core.data_dir = expand_path(&self.core.data_dir)?;

        if !self.core.data_dir.exists() {
            fs::create_dir_all(&self.core.data_dir).map_err(|e| {
                EngineError::Config(format!("Failed to create data directory: {}", e))
            })?;
        }

        Ok(())
    }
}

/// Expand ~ in path to user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, EngineError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| EngineError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_creation() {
        let config = Config::default_config();

        assert_eq!(config.core.log_level, "info");
        assert_eq!(config.llm.provider, "ollama");
        assert_eq!(config.engine.max_steps, DEFAULT_MAX_STEPS);
        assert_eq!(config.engine.simple_max_steps, SIMPLE_MAX_STEPS);
        assert_eq!(config.engine.max_consecutive_failures, 5);
        assert!((config.engine.regression_threshold + 0.20).abs() < 1e-12);
        assert_eq!(
            config.engine.strategies,
            vec!["image_search", "video_search", "encyclopedia"]
        );
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let path = PathBuf::from("~/test");
        let expanded = expand_path(&path).unwrap();

        let home = dirs::home_dir().unwrap();
        assert_eq!(expanded, home.join("test"));
    }

    #[test]
    fn test_expand_path_without_tilde() {
        let path = PathBuf::from("/absolute/path");
        assert_eq!(expand_path(&path).unwrap(), path);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default_config();
        let toml_string = toml::to_string(&config).unwrap();

        let deserialized: Config = toml::from_str(&toml_string).unwrap();
        assert_eq!(config.core.log_level, deserialized.core.log_level);
        assert_eq!(config.engine.strategies, deserialized.engine.strategies);
        assert_eq!(config.llm.openai.api_key_env, deserialized.llm.openai.api_key_env);
    }

    #[test]
    fn test_limits_follow_engine_section() {
        let mut engine = EngineConfig::default();
        engine.planner_timeout_secs = 7;
        engine.max_steps = 3;

        let limits = engine.limits();
        assert_eq!(limits.max_steps, 3);
        assert_eq!(limits.planner_timeout, Duration::from_secs(7));
        assert_eq!(limits.simple_max_steps, SIMPLE_MAX_STEPS);
    }
}
