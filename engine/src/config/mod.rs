//! Configuration management
//!
//! This module handles loading, validation, and management of the variantd configuration.
//! Configuration is stored in TOML format at ~/.variantd/config.toml.
//!
//! # Configuration Sections
//!
//! - **server**: Bind address, port, log level
//! - **llm**: Completion service endpoint, model and call budget
//! - **auth**: Where the gateway bearer secret comes from
//! - **generation**: Retry, concurrency and validation settings
//!
//! Secrets are never stored in the file. The `llm.api_key_env` and
//! `auth.token_env` keys name the environment variables that hold them
//! (see [`crate::secrets`]).
//!
//! # Environment Overrides
//!
//! `VARIANTD_PORT`, `VARIANTD_MODEL` and `VARIANTD_BASE_URL` are applied after
//! the file is read and before validation.
//!
//! # Examples
//!
//! ```no_run
//! use variant_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//!
//! println!("Model: {}", config.llm.model);
//! println!("Max attempts: {}", config.generation.max_attempts);
//! # Ok(())
//! # }
//! ```

use sdk::errors::VariantError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
///
/// Every section falls back to its defaults when absent, so an empty file
/// is a valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Completion service settings
    #[serde(default)]
    pub llm: LLMConfig,

    /// Gateway authentication
    #[serde(default)]
    pub auth: AuthConfig,

    /// Pipeline tuning
    #[serde(default)]
    pub generation: GenerationConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Completion service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature (0.0-2.0), omitted from requests when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Effort hint (minimal, low, medium, high), omitted when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<String>,

    /// Completion token budget per call
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Ask the service for `response_format = json_object`
    #[serde(default)]
    pub json_response_format: bool,

    /// Per-call timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

/// Gateway authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Environment variable holding the pre-shared bearer token
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

/// Generation pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Draft attempts per directive before it is abandoned (1-10)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Directives drafted concurrently (1-5)
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Planner retries after the first attempt (0-5)
    #[serde(default = "default_max_replans")]
    pub max_replans: u32,

    /// Character-bigram similarity at or above which a candidate is a near-duplicate
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Return the accepted subset instead of failing when a directive is abandoned
    #[serde(default)]
    pub allow_partial: bool,

    /// Ask the model to review each locally valid candidate
    #[serde(default)]
    pub semantic_review: bool,

    /// Extra phrases a candidate must not contain
    #[serde(default)]
    pub banned_phrases: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            temperature: None,
            reasoning_effort: None,
            max_tokens: default_max_tokens(),
            json_response_format: false,
            timeout_secs: default_timeout_secs(),
            api_key_env: default_api_key_env(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_env: default_token_env(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            max_concurrency: default_max_concurrency(),
            max_replans: default_max_replans(),
            similarity_threshold: default_similarity_threshold(),
            allow_partial: false,
            semantic_review: false,
            banned_phrases: Vec::new(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    28899
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-5-mini".to_string()
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_token_env() -> String {
    "VARIANT_AUTH_TOKEN".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_max_concurrency() -> usize {
    3
}

fn default_max_replans() -> u32 {
    2
}

fn default_similarity_threshold() -> f64 {
    0.85
}

const VALID_LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];
const VALID_EFFORTS: [&str; 4] = ["minimal", "low", "medium", "high"];

impl Config {
    /// Load configuration from the default location (~/.variantd/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read or written
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load_or_create() -> Result<Self, VariantError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment overrides are applied before validation.
    pub fn load_from_path(path: &Path) -> Result<Self, VariantError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| VariantError::Config(format!("Failed to read config file: {}", e)))?;

        let mut config = Self::from_toml(&contents)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate_and_process()?;

        Ok(config)
    }

    /// Parse a TOML document without applying environment overrides or validation
    pub fn from_toml(contents: &str) -> Result<Self, VariantError> {
        toml::from_str(contents)
            .map_err(|e| VariantError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, VariantError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                VariantError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(&Self::default())
            .map_err(|e| VariantError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| VariantError::Config(format!("Failed to write config file: {}", e)))?;

        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate_and_process()?;

        Ok(config)
    }

    /// Get the default configuration file path (~/.variantd/config.toml)
    pub fn default_config_path() -> Result<PathBuf, VariantError> {
        let home = dirs::home_dir().ok_or_else(|| {
            VariantError::Config("Could not determine home directory".to_string())
        })?;

        Ok(home.join(".variantd").join("config.toml"))
    }

    /// Apply `VARIANTD_*` overrides using the given variable lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), VariantError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("VARIANTD_PORT") {
            self.server.port = port.trim().parse().map_err(|_| {
                VariantError::Config(format!("VARIANTD_PORT is not a valid port: '{}'", port))
            })?;
        }
        if let Some(model) = lookup("VARIANTD_MODEL") {
            self.llm.model = model;
        }
        if let Some(base_url) = lookup("VARIANTD_BASE_URL") {
            self.llm.base_url = base_url;
        }
        Ok(())
    }

    /// Validate and normalize configuration
    ///
    /// Trims the trailing slash from `llm.base_url` and drops blank entries
    /// from `generation.banned_phrases`.
    pub fn validate_and_process(&mut self) -> Result<(), VariantError> {
        if !VALID_LOG_LEVELS.contains(&self.server.log_level.as_str()) {
            return Err(VariantError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.server.log_level,
                VALID_LOG_LEVELS.join(", ")
            )));
        }

        let base_url = self.llm.base_url.trim().trim_end_matches('/');
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(VariantError::Config(format!(
                "llm.base_url must be an http(s) URL, got '{}'",
                self.llm.base_url
            )));
        }
        self.llm.base_url = base_url.to_string();

        if self.llm.model.trim().is_empty() {
            return Err(VariantError::Config("llm.model must not be empty".to_string()));
        }

        if let Some(temperature) = self.llm.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(VariantError::Config(
                    "llm.temperature must be between 0.0 and 2.0".to_string(),
                ));
            }
        }

        if let Some(effort) = &self.llm.reasoning_effort {
            if !VALID_EFFORTS.contains(&effort.as_str()) {
                return Err(VariantError::Config(format!(
                    "Invalid reasoning_effort '{}'. Must be one of: {}",
                    effort,
                    VALID_EFFORTS.join(", ")
                )));
            }
        }

        if self.llm.max_tokens == 0 {
            return Err(VariantError::Config(
                "llm.max_tokens must be greater than 0".to_string(),
            ));
        }

        if self.llm.timeout_secs == 0 {
            return Err(VariantError::Config(
                "llm.timeout_secs must be greater than 0".to_string(),
            ));
        }

        let generation = &mut self.generation;
        if !(1..=10).contains(&generation.max_attempts) {
            return Err(VariantError::Config(
                "generation.max_attempts must be between 1 and 10".to_string(),
            ));
        }
        if !(1..=5).contains(&generation.max_concurrency) {
            return Err(VariantError::Config(
                "generation.max_concurrency must be between 1 and 5".to_string(),
            ));
        }
        if generation.max_replans > 5 {
            return Err(VariantError::Config(
                "generation.max_replans must be between 0 and 5".to_string(),
            ));
        }
        if !(generation.similarity_threshold > 0.0 && generation.similarity_threshold <= 1.0) {
            return Err(VariantError::Config(
                "generation.similarity_threshold must be in (0.0, 1.0]".to_string(),
            ));
        }

        generation.banned_phrases.retain(|p| !p.trim().is_empty());

        Ok(())
    }
}
