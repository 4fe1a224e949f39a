// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client configuration loaded from environment variables.
//!
//! A `.env` file next to the binary is honored for local testing against a
//! staging CRM.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default header carrying the static CRM API key.
pub const DEFAULT_API_KEY_HEADER: &str = "x-api-key";

/// Client configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the race CRM (no trailing slash)
    pub crm_base_url: String,
    /// Static API key sent with every CRM request
    pub crm_api_key: String,
    /// Header name for the API key
    pub crm_api_key_header: String,
    /// Per-request timeout for CRM calls
    pub crm_timeout: Duration,
    /// Where the local session store lives
    pub session_store_path: PathBuf,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let crm_base_url = env::var("CRM_BASE_URL")
            .map_err(|_| ConfigError::Missing("CRM_BASE_URL"))?
            .trim_end_matches('/')
            .to_string();

        let crm_timeout = match env::var("CRM_TIMEOUT_SECS") {
            Ok(v) => v
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::Invalid("CRM_TIMEOUT_SECS", v))?,
            Err(_) => Duration::from_secs(15),
        };

        Ok(Self {
            crm_base_url,
            crm_api_key: env::var("CRM_API_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("CRM_API_KEY"))?,
            crm_api_key_header: env::var("CRM_API_KEY_HEADER")
                .unwrap_or_else(|_| DEFAULT_API_KEY_HEADER.to_string()),
            crm_timeout,
            session_store_path: env::var("SESSION_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("cookie_hunt_session.json")),
        })
    }

    /// Config pointing at a local test server.
    pub fn test_default() -> Self {
        Self {
            crm_base_url: "http://127.0.0.1:9".to_string(),
            crm_api_key: "test_api_key".to_string(),
            crm_api_key_header: DEFAULT_API_KEY_HEADER.to_string(),
            crm_timeout: Duration::from_secs(5),
            session_store_path: PathBuf::from("test_session.json"),
        }
    }

    /// Same as [`Config::test_default`] but targeting `base_url`.
    pub fn for_base_url(base_url: impl Into<String>) -> Self {
        Self {
            crm_base_url: base_url.into(),
            ..Self::test_default()
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}
