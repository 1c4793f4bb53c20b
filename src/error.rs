// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error types for the session and identity layers.
//!
//! Every failure that can reach UI code is one of these variants. Nothing in
//! this crate panics on an expected failure path such as an expired token or
//! an unreachable identity provider.

/// Authentication error type.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Identity provider returned HTTP {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response from identity provider: {0}")]
    InvalidResponse(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Encryption error: {0}")]
    Crypto(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("OAuth state mismatch")]
    StateMismatch,

    #[error("Authorization denied: {0}")]
    Denied(String),

    #[error("Grant type disabled: {0}")]
    GrantDisabled(&'static str),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    /// OAuth error code for a rejected or already-rotated refresh token.
    pub const INVALID_GRANT: &'static str = "invalid_grant";

    /// Check if the provider rejected the grant (bad code, revoked or
    /// rotated refresh token, wrong password).
    pub fn is_invalid_grant(&self) -> bool {
        match self {
            AuthError::Provider { message, .. } => message.contains(Self::INVALID_GRANT),
            _ => false,
        }
    }

    /// Check if the failure happened before any response was received.
    pub fn is_network(&self) -> bool {
        matches!(self, AuthError::Network(_))
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            AuthError::InvalidResponse(e.to_string())
        } else {
            AuthError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(e: serde_json::Error) -> Self {
        AuthError::Storage(format!("Serialization failed: {}", e))
    }
}

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, AuthError>;
