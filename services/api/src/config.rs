//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use sleep_advice_core::GenerationOptions;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

const GEMINI_OPENAI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
const OPENAI_BASE: &str = "https://api.openai.com/v1";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which text-generation backend serves the advice stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdviceProvider {
    Gemini,
    OpenAi,
}

impl AdviceProvider {
    fn key_var(self) -> &'static str {
        match self {
            Self::Gemini => "GEMINI_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
        }
    }

    fn default_base(self) -> &'static str {
        match self {
            Self::Gemini => GEMINI_OPENAI_BASE,
            Self::OpenAi => OPENAI_BASE,
        }
    }

    fn default_model(self) -> &'static str {
        match self {
            Self::Gemini => "gemma-3-1b-it",
            Self::OpenAi => "gpt-4o-mini",
        }
    }
}

impl FromStr for AdviceProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAi),
            other => Err(format!("'{}' is not a supported provider", other)),
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub advice_provider: AdviceProvider,
    pub advice_api_key: String,
    pub advice_api_base: String,
    pub advice_model: String,
    pub generation: GenerationOptions,
    pub session_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub cors_allowed_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Load Server and Database Settings ---
        let bind_address: SocketAddr =
            parse_or(&lookup, "BIND_ADDRESS", "0.0.0.0:8000".parse().ok())?;

        let database_url =
            lookup("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load the Generation Provider (credentials are mandatory) ---
        let advice_provider = parse_or(&lookup, "ADVICE_PROVIDER", Some(AdviceProvider::Gemini))?;
        let key_var = advice_provider.key_var();
        let advice_api_key = lookup(key_var)
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar(key_var.to_string()))?;
        let advice_api_base = lookup("ADVICE_API_BASE")
            .unwrap_or_else(|| advice_provider.default_base().to_string());
        let advice_model = lookup("ADVICE_MODEL")
            .unwrap_or_else(|| advice_provider.default_model().to_string());

        let defaults = GenerationOptions::default();
        let generation = GenerationOptions {
            temperature: parse_or(&lookup, "ADVICE_TEMPERATURE", Some(defaults.temperature))?,
            max_tokens: parse_or(&lookup, "ADVICE_MAX_TOKENS", Some(defaults.max_tokens))?,
        };

        // --- Load Streaming Settings ---
        let session_timeout =
            Duration::from_secs(parse_or(&lookup, "ADVICE_TIMEOUT_SECS", Some(120u64))?);
        let heartbeat_interval =
            Duration::from_secs(parse_or(&lookup, "SSE_HEARTBEAT_SECS", Some(30u64))?);

        let cors_allowed_origin = lookup("CORS_ALLOWED_ORIGIN")
            .unwrap_or_else(|| "http://localhost:5173".to_string());

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            advice_provider,
            advice_api_key,
            advice_api_base,
            advice_model,
            generation,
            session_timeout,
            heartbeat_interval,
            cors_allowed_origin,
        })
    }
}

/// Parses an optional variable, falling back to `default` when it is unset.
fn parse_or<F, T>(lookup: &F, name: &str, default: Option<T>) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        None => default.ok_or_else(|| ConfigError::MissingVar(name.to_string())),
    }
}
