//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! - `ROASTAH_API_URL` - base URL of the marketplace API (default: `http://localhost:5000`)
//! - `ROASTAH_AUTH_TOKEN` - bearer token of the signed-in seller (optional)
//! - `ROASTAH_REQUEST_TIMEOUT_SECS` - per-request timeout (default: 15)
//! - `ROASTAH_CACHE_MAX_AGE_SECS` - how long cached queries stay fresh (default: 30)
//! - `ROASTAH_PREFS_URL` - SQLite URL of the preference store (default: OS data dir)

use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_API_URL: &str = "http://localhost:5000";
const DEFAULT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_CACHE_MAX_AGE_SECS: u64 = 30;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_url: String,
    pub auth_token: Option<String>,
    pub request_timeout: Duration,
    pub cache_max_age: Duration,
    pub prefs_url: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            auth_token: None,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            cache_max_age: Duration::from_secs(DEFAULT_CACHE_MAX_AGE_SECS),
            prefs_url: None,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_url = match non_empty("ROASTAH_API_URL") {
            Some(url) => {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(ConfigError::InvalidEnvVar(
                        "ROASTAH_API_URL".to_string(),
                        "must start with http:// or https://".to_string(),
                    ));
                }
                url.trim_end_matches('/').to_string()
            }
            None => DEFAULT_API_URL.to_string(),
        };

        let request_timeout = Duration::from_secs(parse_secs(
            "ROASTAH_REQUEST_TIMEOUT_SECS",
            non_empty("ROASTAH_REQUEST_TIMEOUT_SECS"),
            DEFAULT_TIMEOUT_SECS,
        )?);
        if request_timeout.is_zero() {
            return Err(ConfigError::InvalidEnvVar(
                "ROASTAH_REQUEST_TIMEOUT_SECS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let cache_max_age = Duration::from_secs(parse_secs(
            "ROASTAH_CACHE_MAX_AGE_SECS",
            non_empty("ROASTAH_CACHE_MAX_AGE_SECS"),
            DEFAULT_CACHE_MAX_AGE_SECS,
        )?);

        Ok(Self {
            api_url,
            auth_token: non_empty("ROASTAH_AUTH_TOKEN"),
            request_timeout,
            cache_max_age,
            prefs_url: non_empty("ROASTAH_PREFS_URL"),
        })
    }
}

fn parse_secs(key: &str, value: Option<String>, default: u64) -> Result<u64, ConfigError> {
    match value {
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}
