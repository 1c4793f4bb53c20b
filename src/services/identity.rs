// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity provider client (OAuth 2 authorization code + PKCE).
//!
//! Handles:
//! - Authorization request construction (PKCE challenge, state, role)
//! - Code exchange and refresh at the token endpoint
//! - User-info lookup
//! - Best-effort remote logout

use crate::config::Config;
use crate::error::{AuthError, Result};
use crate::models::{CredentialRecord, Role, UserProfile};
use crate::services::pkce::{self, PkceChallenge};
use crate::time_utils;
use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use subtle::ConstantTimeEq;
use url::Url;
use validator::Validate;

/// Bytes of randomness in the OAuth `state` parameter.
const STATE_BYTES: usize = 24;

/// Token-issuing operations the session manager depends on.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchange an authorization code and its PKCE verifier for tokens.
    async fn exchange_code(&self, code: &str, verifier: &str) -> Result<CredentialRecord>;

    /// Resource-owner password grant.
    async fn password_login(&self, email: &str, password: &str) -> Result<CredentialRecord>;

    /// Exchange a refresh token for a new token set. The returned record
    /// keeps `refresh_token` when the provider does not rotate it.
    async fn refresh(&self, refresh_token: &str) -> Result<CredentialRecord>;

    async fn fetch_user_info(&self, access_token: &str) -> Result<UserProfile>;

    /// Terminate the provider-side session. Callers treat failure as
    /// non-fatal.
    async fn logout_remote(&self) -> Result<()>;
}

/// A pending authorization: open `url` in a browser, keep the rest until
/// the redirect comes back.
#[derive(Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
    pub code_verifier: String,
    pub role: Role,
}

impl AuthorizationRequest {
    /// Constant-time comparison of the returned `state`.
    pub fn verify_state(&self, returned: &str) -> bool {
        self.state.as_bytes().ct_eq(returned.as_bytes()).into()
    }
}

/// Query parameters delivered to the redirect URI.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizationCallback {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl AuthorizationCallback {
    /// Parse the query string of a redirect URL such as
    /// `myapp://callback?code=...&state=...`.
    pub fn from_redirect_url(redirect: &str) -> Result<Self> {
        let parsed = Url::parse(redirect)
            .map_err(|e| AuthError::Validation(format!("malformed redirect URL: {}", e)))?;
        if parsed.query().is_none() {
            return Err(AuthError::Validation("redirect URL has no query".to_string()));
        }

        let params: Map<String, Value> = parsed
            .query_pairs()
            .map(|(name, value)| (name.into_owned(), Value::String(value.into_owned())))
            .collect();
        serde_json::from_value(Value::Object(params))
            .map_err(|e| AuthError::Validation(format!("bad callback parameters: {}", e)))
    }
}

/// Email/password input, checked before any network call.
#[derive(Debug, Validate)]
struct PasswordCredentials {
    #[validate(email(message = "email address is malformed"))]
    email: String,
    #[validate(length(min = 1, message = "password is required"))]
    password: String,
}

/// Token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenResponse {
    /// Build a credential record stamped with `issued_at` (epoch millis).
    pub fn into_credentials(self, issued_at: i64) -> CredentialRecord {
        CredentialRecord {
            access_token: self.access_token,
            refresh_token: self.refresh_token.filter(|t| !t.is_empty()),
            id_token: self.id_token,
            expires_in: self.expires_in,
            issued_at,
        }
    }
}

/// OAuth error body (`{"error": "...", "error_description": "..."}`).
#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Identity provider HTTP client.
#[derive(Clone)]
pub struct IdentityClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    audience: String,
    scope: String,
    redirect_uri: String,
    allow_password_grant: bool,
}

impl IdentityClient {
    /// Create a client for the configured tenant.
    ///
    /// Redirects are not followed: the logout endpoint answers with a
    /// redirect to the app's custom URL scheme.
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("failed building identity HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url(),
            client_id: config.client_id.clone(),
            audience: config.audience.clone(),
            scope: config.scope.clone(),
            redirect_uri: config.redirect_uri.clone(),
            allow_password_grant: config.allow_password_grant,
        })
    }

    /// Point the client at a different base URL (local mock servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn token_endpoint(&self) -> String {
        format!("{}/oauth/token", self.base_url)
    }

    /// Build the `/authorize` request for the chosen role.
    pub fn build_authorization_request(&self, role: Role) -> Result<AuthorizationRequest> {
        self.build_authorization_request_with_connection(role, None)
    }

    /// Like [`Self::build_authorization_request`], with an optional
    /// connection hint (e.g. `google-oauth2`) to skip the provider's picker.
    pub fn build_authorization_request_with_connection(
        &self,
        role: Role,
        connection: Option<&str>,
    ) -> Result<AuthorizationRequest> {
        let pkce = PkceChallenge::generate()?;
        let state = pkce::random_url_token(STATE_BYTES)?;

        let mut url = format!(
            "{}/authorize?\
             response_type=code&\
             client_id={}&\
             redirect_uri={}&\
             scope={}&\
             audience={}&\
             prompt=login&\
             code_challenge={}&\
             code_challenge_method={}&\
             state={}",
            self.base_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&self.scope),
            urlencoding::encode(&self.audience),
            pkce.challenge,
            pkce::CHALLENGE_METHOD,
            state
        );
        if let Some(connection) = connection {
            url.push_str("&connection=");
            url.push_str(&urlencoding::encode(connection));
        }

        tracing::info!(
            role = %role,
            connection = connection.unwrap_or("default"),
            "Built authorization request"
        );

        Ok(AuthorizationRequest {
            url,
            state,
            code_verifier: pkce.verifier,
            role,
        })
    }

    /// Provider logout URL for the app to open in a browser.
    pub fn logout_url(&self) -> String {
        format!(
            "{}/v2/logout?client_id={}&returnTo={}",
            self.base_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri)
        )
    }

    /// POST a grant to the token endpoint and stamp the result with now.
    async fn request_tokens(
        &self,
        grant: &'static str,
        params: &[(&str, &str)],
    ) -> Result<CredentialRecord> {
        let mut form: Vec<(&str, &str)> = vec![
            ("grant_type", grant),
            ("client_id", self.client_id.as_str()),
        ];
        form.extend_from_slice(params);

        let response = self
            .http
            .post(self.token_endpoint())
            .form(&form)
            .send()
            .await
            .map_err(|e| AuthError::Network(format!("Token request ({}) failed: {}", grant, e)))?;

        let tokens: TokenResponse = check_response_json(response).await.map_err(|e| {
            tracing::warn!(grant, error = %e, "Token endpoint rejected grant");
            e
        })?;

        Ok(tokens.into_credentials(time_utils::now_millis()))
    }
}

#[async_trait]
impl IdentityProvider for IdentityClient {
    async fn exchange_code(&self, code: &str, verifier: &str) -> Result<CredentialRecord> {
        if code.is_empty() {
            return Err(AuthError::Validation("authorization code is empty".to_string()));
        }

        let credentials = self
            .request_tokens(
                "authorization_code",
                &[
                    ("code", code),
                    ("code_verifier", verifier),
                    ("redirect_uri", self.redirect_uri.as_str()),
                ],
            )
            .await?;

        tracing::info!(
            expires_in = credentials.expires_in,
            has_refresh_token = credentials.refresh_token.is_some(),
            "Authorization code exchanged"
        );
        Ok(credentials)
    }

    async fn password_login(&self, email: &str, password: &str) -> Result<CredentialRecord> {
        if !self.allow_password_grant {
            return Err(AuthError::GrantDisabled("password"));
        }

        let input = PasswordCredentials {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        input
            .validate()
            .map_err(|e| AuthError::Validation(e.to_string()))?;

        self.request_tokens(
            "password",
            &[
                ("username", input.email.as_str()),
                ("password", input.password.as_str()),
                ("audience", self.audience.as_str()),
                ("scope", self.scope.as_str()),
            ],
        )
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<CredentialRecord> {
        let mut credentials = self
            .request_tokens("refresh_token", &[("refresh_token", refresh_token)])
            .await?;

        if credentials.refresh_token.is_none() {
            credentials.refresh_token = Some(refresh_token.to_string());
        }
        Ok(credentials)
    }

    async fn fetch_user_info(&self, access_token: &str) -> Result<UserProfile> {
        let response = self
            .http
            .get(format!("{}/userinfo", self.base_url))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::Network(format!("User-info request failed: {}", e)))?;

        check_response_json(response).await
    }

    async fn logout_remote(&self) -> Result<()> {
        let response = self
            .http
            .get(format!("{}/v2/logout", self.base_url))
            .query(&[
                ("client_id", self.client_id.as_str()),
                ("returnTo", self.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Network(format!("Logout request failed: {}", e)))?;

        // The provider answers with a redirect to returnTo.
        let status = response.status();
        if status.is_success() || status.is_redirection() {
            tracing::info!("Provider session terminated");
            return Ok(());
        }

        Err(provider_error(response).await)
    }
}

/// Check response status and parse the JSON body.
async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T> {
    if !response.status().is_success() {
        return Err(provider_error(response).await);
    }

    response
        .json()
        .await
        .map_err(|e| AuthError::InvalidResponse(format!("JSON parse error: {}", e)))
}

/// Turn a non-2xx response into a provider error carrying the OAuth code.
async fn provider_error(response: reqwest::Response) -> AuthError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();

    let message = match serde_json::from_str::<ProviderErrorBody>(&body) {
        Ok(err) => match err.error_description {
            Some(desc) => format!("{}: {}", err.error, desc),
            None => err.error,
        },
        Err(_) if body.is_empty() => "empty response".to_string(),
        Err(_) => body,
    };

    AuthError::Provider { status, message }
}
