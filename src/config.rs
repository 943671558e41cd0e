// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Values are read once at startup. A `.env` file is honoured for local
//! development.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

/// Default MyAnimeList endpoints.
pub const MAL_AUTH_URL: &str = "https://myanimelist.net/v1/oauth2/authorize";
pub const MAL_TOKEN_URL: &str = "https://myanimelist.net/v1/oauth2/token";
pub const MAL_API_URL: &str = "https://api.myanimelist.net/v2";

/// Where user records and library entries live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    Memory,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- OAuth ---
    /// MAL OAuth client ID (public)
    pub mal_client_id: String,
    /// MAL client secret; only "web" type apps have one
    pub mal_client_secret: Option<String>,
    /// Redirect URI registered with MAL, if more than one is registered
    pub mal_redirect_uri: Option<String>,
    /// HMAC key for the OAuth state parameter (raw bytes)
    pub oauth_state_key: Vec<u8>,
    pub mal_auth_url: String,
    pub mal_token_url: String,
    pub mal_api_url: String,

    // --- Server ---
    /// Frontend URL for OAuth redirects
    pub frontend_url: String,
    pub port: u16,

    // --- Storage ---
    pub store_backend: StoreBackend,
    /// GCP project hosting the Firestore database
    pub gcp_project_id: Option<String>,

    // --- Outbound HTTP ---
    pub http_timeout: Duration,
    /// Total attempts per request (initial try + retries)
    pub http_max_attempts: usize,
    pub http_base_backoff: Duration,

    // --- Sync progress ---
    /// How long completed/failed progress records stay pollable
    pub progress_retention: Duration,
    /// Running records with no update for this long are dropped
    pub progress_stale_after: Duration,

    // --- Jellyfin ---
    /// Path secret for the Jellyfin webhook; the route is disabled when unset
    pub jellyfin_webhook_secret: Option<String>,
    /// Jellyfin username -> Paisen username
    pub jellyfin_user_map: HashMap<String, String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let store_backend = match env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "firestore".to_string())
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "firestore" => StoreBackend::Firestore,
            "memory" => StoreBackend::Memory,
            other => return Err(ConfigError::Invalid("STORE_BACKEND", other.to_string())),
        };

        let gcp_project_id = optional_var("GCP_PROJECT_ID");
        if store_backend == StoreBackend::Firestore && gcp_project_id.is_none() {
            return Err(ConfigError::Missing("GCP_PROJECT_ID"));
        }

        Ok(Self {
            mal_client_id: required_var("MAL_CLIENT_ID")?,
            mal_client_secret: optional_var("MAL_CLIENT_SECRET"),
            mal_redirect_uri: optional_var("MAL_REDIRECT_URI"),
            oauth_state_key: required_var("OAUTH_STATE_KEY")?.into_bytes(),
            mal_auth_url: optional_var("MAL_AUTH_URL").unwrap_or_else(|| MAL_AUTH_URL.to_string()),
            mal_token_url: optional_var("MAL_TOKEN_URL")
                .unwrap_or_else(|| MAL_TOKEN_URL.to_string()),
            mal_api_url: optional_var("MAL_API_URL").unwrap_or_else(|| MAL_API_URL.to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            port: parse_var("PORT", 8080)?,
            store_backend,
            gcp_project_id,
            http_timeout: Duration::from_secs(parse_var("HTTP_TIMEOUT_SECS", 15)?),
            http_max_attempts: parse_var("HTTP_MAX_ATTEMPTS", 3)?,
            http_base_backoff: Duration::from_millis(parse_var("HTTP_BACKOFF_MS", 200)?),
            progress_retention: Duration::from_secs(parse_var(
                "SYNC_PROGRESS_RETENTION_SECS",
                300,
            )?),
            progress_stale_after: Duration::from_secs(parse_var(
                "SYNC_PROGRESS_STALE_SECS",
                3600,
            )?),
            jellyfin_webhook_secret: optional_var("JELLYFIN_WEBHOOK_SECRET"),
            jellyfin_user_map: parse_user_map(
                &env::var("JELLYFIN_USER_MAP").unwrap_or_default(),
            ),
        })
    }

    /// Deterministic config for tests. Provider URLs point at localhost and
    /// are normally overridden with a stub server address.
    pub fn test_default() -> Self {
        Self {
            mal_client_id: "test_client_id".to_string(),
            mal_client_secret: None,
            mal_redirect_uri: None,
            oauth_state_key: b"test_state_key_32_bytes_minimum!".to_vec(),
            mal_auth_url: "http://127.0.0.1:9/v1/oauth2/authorize".to_string(),
            mal_token_url: "http://127.0.0.1:9/v1/oauth2/token".to_string(),
            mal_api_url: "http://127.0.0.1:9/v2".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            port: 8080,
            store_backend: StoreBackend::Memory,
            gcp_project_id: None,
            http_timeout: Duration::from_secs(5),
            http_max_attempts: 2,
            http_base_backoff: Duration::from_millis(1),
            progress_retention: Duration::from_secs(300),
            progress_stale_after: Duration::from_secs(3600),
            jellyfin_webhook_secret: Some("test_jellyfin_secret".to_string()),
            jellyfin_user_map: HashMap::new(),
        }
    }

    /// Point every provider endpoint at `base` (a stub server in tests).
    pub fn with_provider_base(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.mal_auth_url = format!("{}/v1/oauth2/authorize", base);
        self.mal_token_url = format!("{}/v1/oauth2/token", base);
        self.mal_api_url = format!("{}/v2", base);
        self
    }

    /// Map a Jellyfin account name to the Paisen username it syncs to.
    pub fn paisen_username_for<'a>(&'a self, jellyfin_user: &'a str) -> &'a str {
        self.jellyfin_user_map
            .get(jellyfin_user)
            .map(String::as_str)
            .unwrap_or(jellyfin_user)
    }
}

fn required_var(name: &'static str) -> Result<String, ConfigError> {
    optional_var(name).ok_or(ConfigError::Missing(name))
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match optional_var(name) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid(name, raw)),
        None => Ok(default),
    }
}

/// Parse `jf_user=paisen_user,other=...`. Malformed pairs are skipped.
fn parse_user_map(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (from, to) = pair.split_once('=')?;
            let (from, to) = (from.trim(), to.trim());
            if from.is_empty() || to.is_empty() {
                return None;
            }
            Some((from.to_string(), to.to_string()))
        })
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
