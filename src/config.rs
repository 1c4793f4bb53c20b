// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session configuration loaded from environment variables.
//!
//! These are build-time provider settings baked into the app. The store key
//! is the only secret; it seeds the at-rest cipher for the token store.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default timeout for every identity provider call.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Default OAuth scopes. `offline_access` is needed to get a refresh token.
pub const DEFAULT_SCOPE: &str = "openid profile email offline_access";

/// Identity provider and storage configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Identity provider ---
    /// Identity provider tenant domain (e.g. `example.us.auth0.com`)
    pub auth_domain: String,
    /// Public OAuth client ID
    pub client_id: String,
    /// API audience requested with every token
    pub audience: String,
    /// Space-separated OAuth scopes
    pub scope: String,
    /// App deep link the provider redirects back to
    pub redirect_uri: String,
    /// Timeout applied to every provider HTTP call
    pub http_timeout: Duration,
    /// Allow the resource-owner password grant (off by default)
    pub allow_password_grant: bool,

    // --- Secure token store ---
    /// Directory holding sealed token store entries
    pub store_dir: PathBuf,
    /// Secret material for the at-rest cipher (raw bytes)
    pub store_key: Vec<u8>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let auth_domain = env::var("AUTH0_DOMAIN")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .map_err(|_| ConfigError::Missing("AUTH0_DOMAIN"))?;
        if auth_domain.is_empty() {
            return Err(ConfigError::Invalid("AUTH0_DOMAIN", "empty".to_string()));
        }

        let audience = env::var("AUTH0_AUDIENCE")
            .unwrap_or_else(|_| format!("{}/api/v2/", domain_base_url(&auth_domain)));

        let http_timeout = match env::var("AUTH_HTTP_TIMEOUT_SECS") {
            Ok(v) => v
                .trim()
                .parse::<u64>()
                .map_err(|e| ConfigError::Invalid("AUTH_HTTP_TIMEOUT_SECS", e.to_string()))?,
            Err(_) => DEFAULT_HTTP_TIMEOUT_SECS,
        };

        let allow_password_grant = env::var("AUTH_ALLOW_PASSWORD_GRANT")
            .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let store_key = env::var("AUTH_STORE_KEY")
            .map(|v| v.trim().to_string())
            .map_err(|_| ConfigError::Missing("AUTH_STORE_KEY"))?;
        if store_key.is_empty() {
            return Err(ConfigError::Invalid("AUTH_STORE_KEY", "empty".to_string()));
        }

        Ok(Self {
            client_id: env::var("AUTH0_CLIENT_ID")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("AUTH0_CLIENT_ID"))?,
            audience,
            scope: env::var("AUTH0_SCOPE").unwrap_or_else(|_| DEFAULT_SCOPE.to_string()),
            redirect_uri: env::var("AUTH_REDIRECT_URI")
                .unwrap_or_else(|_| "myapp://callback".to_string()),
            http_timeout: Duration::from_secs(http_timeout),
            allow_password_grant,
            store_dir: env::var("AUTH_STORE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".session")),
            store_key: store_key.into_bytes(),
            auth_domain,
        })
    }

    /// Config for tests only. `store_dir` is shared; tests that open the
    /// store override it with a private directory.
    pub fn test_default() -> Self {
        Self {
            auth_domain: "test-tenant.example.com".to_string(),
            client_id: "test_client_id".to_string(),
            audience: "https://test-tenant.example.com/api/v2/".to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            redirect_uri: "myapp://callback".to_string(),
            http_timeout: Duration::from_secs(2),
            allow_password_grant: false,
            store_dir: env::temp_dir().join("doubt-session-test"),
            store_key: b"test_store_key_32_bytes_minimum!".to_vec(),
        }
    }

    /// Base URL for the identity provider endpoints.
    pub fn base_url(&self) -> String {
        domain_base_url(&self.auth_domain)
    }
}

/// Accept both a bare domain and a full URL (handy for local mock servers).
fn domain_base_url(domain: &str) -> String {
    if domain.starts_with("http://") || domain.starts_with("https://") {
        domain.trim_end_matches('/').to_string()
    } else {
        format!("https://{}", domain.trim_end_matches('/'))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
