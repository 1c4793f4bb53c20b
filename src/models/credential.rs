// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential record issued by the identity provider.

use crate::time_utils;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Token set persisted in the secure store.
///
/// Serialized as camelCase JSON. `issued_at` is epoch milliseconds and
/// `expires_in` is seconds, so the absolute expiry is
/// `issued_at + expires_in * 1000`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    /// Bearer token for API calls
    pub access_token: String,
    /// Refresh token (only issued with the `offline_access` scope)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// OpenID Connect ID token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    /// When the token set was received (epoch milliseconds)
    pub issued_at: i64,
}

impl CredentialRecord {
    /// Absolute expiry instant in epoch milliseconds.
    pub fn expires_at_millis(&self) -> i64 {
        self.issued_at
            .saturating_add(self.expires_in.saturating_mul(1000))
    }

    /// Absolute expiry instant, if representable.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_millis(self.expires_at_millis())
    }

    /// A record is fresh strictly before its expiry instant.
    pub fn is_fresh_at(&self, now_millis: i64) -> bool {
        now_millis < self.expires_at_millis()
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(time_utils::now_millis())
    }

    /// Refresh token, ignoring empty strings some providers send.
    pub fn usable_refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.trim().is_empty())
    }
}

// Tokens never end up in logs through Debug.
impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
            .field("expires_in", &self.expires_in)
            .field("issued_at", &self.issued_at)
            .finish()
    }
}
