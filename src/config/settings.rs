//! Application settings.
//!
//! Settings come from three layers, weakest first: built-in defaults, an
//! optional TOML file (`voxledger.toml` or `$VOXLEDGER_CONFIG`), and
//! environment variables. Secrets (`OPENAI_API_KEY`) are deliberately not
//! part of [`AppConfig`]; they are read directly where needed so they never
//! end up in debug output.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::{fs, path::Path, time::Duration};

/// Default confirmation window for voice-proposed transactions.
const DEFAULT_CONFIRM_TTL_SECS: u64 = 300;
/// Default upper bound on any single external call (STT, extraction, HTTP).
const DEFAULT_EXTERNAL_TIMEOUT_SECS: u64 = 30;

/// Top-level application configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Database connection string (sqlite URL).
    pub database_url: String,
    /// How long a proposed voice transaction stays confirmable, in seconds.
    pub confirm_ttl_secs: u64,
    /// Timeout applied to each external service call, in seconds.
    pub external_timeout_secs: u64,
    /// Speech-to-text model name passed to the transcription service.
    pub stt_model: String,
    /// Language-model name used for transaction extraction.
    pub parse_model: String,
    /// Base URL of the OpenAI-compatible API.
    pub openai_api_base: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://data/voxledger.sqlite?mode=rwc".to_string(),
            confirm_ttl_secs: DEFAULT_CONFIRM_TTL_SECS,
            external_timeout_secs: DEFAULT_EXTERNAL_TIMEOUT_SECS,
            stt_model: "gpt-4o-transcribe".to_string(),
            parse_model: "gpt-4o-mini".to_string(),
            openai_api_base: "https://api.openai.com/v1".to_string(),
        }
    }
}

impl AppConfig {
    /// Confirmation window as a [`chrono::Duration`] for deadline arithmetic.
    #[must_use]
    pub fn confirm_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.confirm_ttl_secs).unwrap_or(i64::MAX))
    }

    /// External-call timeout as a [`std::time::Duration`].
    #[must_use]
    pub const fn external_timeout(&self) -> Duration {
        Duration::from_secs(self.external_timeout_secs)
    }
}

/// Loads configuration: defaults, then the optional TOML file, then
/// environment variable overrides.
pub fn load_app_config() -> Result<AppConfig> {
    let path = std::env::var("VOXLEDGER_CONFIG").unwrap_or_else(|_| "voxledger.toml".to_string());
    let mut config = if Path::new(&path).exists() {
        tracing::debug!("Loading configuration from {path}");
        let contents = fs::read_to_string(&path).map_err(|e| Error::Config {
            message: format!("failed to read config file {path}: {e}"),
        })?;
        toml::from_str(&contents).map_err(|e| Error::Config {
            message: format!("failed to parse TOML from {path}: {e}"),
        })?
    } else {
        AppConfig::default()
    };

    if let Ok(url) = std::env::var("DATABASE_URL") {
        config.database_url = url;
    }
    if let Some(secs) = env_u64("CONFIRM_TTL_SECS")? {
        config.confirm_ttl_secs = secs;
    }
    if let Some(secs) = env_u64("EXTERNAL_TIMEOUT_SECS")? {
        config.external_timeout_secs = secs;
    }
    if let Ok(model) = std::env::var("VOICE_STT_MODEL") {
        config.stt_model = model;
    }
    if let Ok(model) = std::env::var("VOICE_PARSE_MODEL") {
        config.parse_model = model;
    }
    if let Ok(base) = std::env::var("OPENAI_API_BASE") {
        config.openai_api_base = base;
    }

    Ok(config)
}

fn env_u64(name: &str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(raw) => raw.parse().map(Some).map_err(|e| Error::Config {
            message: format!("{name} must be a non-negative integer: {e}"),
        }),
        Err(_) => Ok(None),
    }
}
