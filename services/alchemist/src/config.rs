//! services/alchemist/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use book_alchemist_core::{AiProvider, ApiConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone)]
pub struct Config {
    pub log_level: Level,
    pub data_dir: PathBuf,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub openai_model: String,
    pub openai_base_url: String,
    /// How many recent messages the OpenAI session sends besides its setup prefix.
    pub conversation_window: usize,
    pub request_timeout: Duration,
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let data_dir = var("ALCHEMIST_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data"));

        // --- Backend Settings ---
        let gemini_model = var("GEMINI_MODEL").unwrap_or_else(|| "gemini-2.5-flash".to_string());
        let gemini_base_url = var("GEMINI_BASE_URL")
            .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string());
        let openai_model = var("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string());
        let openai_base_url =
            var("OPENAI_BASE_URL").unwrap_or_else(|| "https://api.openai.com/v1".to_string());

        let conversation_window = match var("CONVERSATION_WINDOW") {
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidValue(
                        "CONVERSATION_WINDOW".to_string(),
                        format!("'{}' is not a positive integer", raw),
                    ))
                }
            },
            None => 20,
        };

        let request_timeout = match var("REQUEST_TIMEOUT_SECS") {
            Some(raw) => raw.parse::<u64>().map(Duration::from_secs).map_err(|e| {
                ConfigError::InvalidValue("REQUEST_TIMEOUT_SECS".to_string(), e.to_string())
            })?,
            None => Duration::from_secs(120),
        };

        // --- Load API Keys (as optional) ---
        let gemini_api_key = var("GEMINI_API_KEY").filter(|k| !k.trim().is_empty());
        let openai_api_key = var("OPENAI_API_KEY").filter(|k| !k.trim().is_empty());

        Ok(Self {
            log_level,
            data_dir,
            gemini_model,
            gemini_base_url,
            openai_model,
            openai_base_url,
            conversation_window,
            request_timeout,
            gemini_api_key,
            openai_api_key,
        })
    }

    /// An API configuration derived from environment keys, Gemini first.
    pub fn env_api_config(&self) -> Option<ApiConfig> {
        if let Some(key) = &self.gemini_api_key {
            return Some(ApiConfig { provider: AiProvider::Gemini, key: key.clone() });
        }
        self.openai_api_key
            .as_ref()
            .map(|key| ApiConfig { provider: AiProvider::OpenAi, key: key.clone() })
    }
}
