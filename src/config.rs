// config.rs

use dotenv::dotenv;
use log::info;
use std::{env, time::Duration};
use thiserror::Error;

use crate::utils::invitation_validator::DEFAULT_DENYLIST;

/// Configuration-related error types
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Error when a required environment variable is not found
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    /// Error when a variable is present but cannot be parsed
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },
}

/// Runtime settings, read from the environment (and `.env` when present)
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_url: String,
    pub api_token: Option<String>,
    pub request_timeout: Duration,
    pub notify_max_attempts: u32,
    pub notify_backoff: Duration,
    pub denylist: Vec<String>,
}

impl AppConfig {
    /// Loads the configuration from `CARELINK_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        let config = Self::from_lookup(|name| env::var(name).ok())?;
        info!("Configuration loaded for {}", config.api_url);
        Ok(config)
    }

    /// Builds the configuration from any variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let api_url = get("CARELINK_API_URL")
            .ok_or_else(|| ConfigError::EnvVarNotFound("CARELINK_API_URL".to_string()))?;
        let api_token = get("CARELINK_API_TOKEN");

        let request_timeout =
            Duration::from_secs(parse_or(get("CARELINK_REQUEST_TIMEOUT_SECS"), "CARELINK_REQUEST_TIMEOUT_SECS", 30)?);
        let notify_max_attempts =
            parse_or(get("CARELINK_NOTIFY_MAX_ATTEMPTS"), "CARELINK_NOTIFY_MAX_ATTEMPTS", 5)?;
        let notify_backoff =
            Duration::from_millis(parse_or(get("CARELINK_NOTIFY_BACKOFF_MS"), "CARELINK_NOTIFY_BACKOFF_MS", 500)?);

        let denylist = match get("CARELINK_DENYLIST") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|term| !term.is_empty())
                .map(ToString::to_string)
                .collect(),
            None => DEFAULT_DENYLIST.iter().map(ToString::to_string).collect(),
        };

        Ok(AppConfig {
            api_url,
            api_token,
            request_timeout,
            notify_max_attempts,
            notify_backoff,
            denylist,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            name: name.to_string(),
            value: raw,
        }),
        None => Ok(default),
    }
}
