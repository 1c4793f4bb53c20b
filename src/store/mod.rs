// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Secure token store.
//!
//! A string key/value backend behind [`SecureStore`], wrapped by the typed
//! [`TokenStore`] that owns the three session records.

pub mod file;
pub mod memory;

pub use file::EncryptedFileStore;
pub use memory::MemoryStore;

use crate::error::Result;
use crate::models::{CredentialRecord, Role, UserProfile};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Storage key names as constants.
pub mod keys {
    /// JSON credential record
    pub const AUTH_TOKEN: &str = "auth_token";
    /// JSON user profile claims
    pub const AUTH_USER: &str = "auth_user";
    /// Plain role string
    pub const USER_ROLE: &str = "user_role";

    pub const ALL: [&str; 3] = [AUTH_TOKEN, AUTH_USER, USER_ROLE];
}

/// Key/value persistence with whole-value writes.
///
/// `set` replaces the entire value; a concurrent `get` sees either the old
/// value or the new one, never a mix.
#[async_trait]
pub trait SecureStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Typed access to the session records.
///
/// Reads never fail: storage and serialization errors are logged and
/// reported as an absent record.
#[derive(Clone)]
pub struct TokenStore {
    backend: Arc<dyn SecureStore>,
}

impl TokenStore {
    pub fn new(backend: Arc<dyn SecureStore>) -> Self {
        Self { backend }
    }

    /// Store backed by process memory only.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn backend(&self) -> &Arc<dyn SecureStore> {
        &self.backend
    }

    // ─── Credentials ─────────────────────────────────────────────────────────

    pub async fn credentials(&self) -> Option<CredentialRecord> {
        self.read_json(keys::AUTH_TOKEN).await
    }

    pub async fn save_credentials(&self, credentials: &CredentialRecord) -> Result<()> {
        let json = serde_json::to_string(credentials)?;
        self.backend.set(keys::AUTH_TOKEN, &json).await
    }

    // ─── Profile ─────────────────────────────────────────────────────────────

    pub async fn profile(&self) -> Option<UserProfile> {
        self.read_json(keys::AUTH_USER).await
    }

    pub async fn save_profile(&self, profile: &UserProfile) -> Result<()> {
        let json = serde_json::to_string(profile)?;
        self.backend.set(keys::AUTH_USER, &json).await
    }

    // ─── Role ────────────────────────────────────────────────────────────────

    pub async fn role(&self) -> Option<Role> {
        let raw = self.read_raw(keys::USER_ROLE).await?;
        match raw.parse() {
            Ok(role) => Some(role),
            Err(e) => {
                tracing::warn!(error = %e, "Stored role is invalid, ignoring");
                None
            }
        }
    }

    pub async fn save_role(&self, role: Role) -> Result<()> {
        self.backend.set(keys::USER_ROLE, role.as_str()).await
    }

    /// Delete all three records.
    ///
    /// Every delete is attempted even if an earlier one fails; the first
    /// error is returned.
    pub async fn clear(&self) -> Result<()> {
        let mut first_err = None;
        for key in keys::ALL {
            if let Err(e) = self.backend.delete(key).await {
                tracing::error!(key, error = %e, "Failed to delete stored record");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn read_raw(&self, key: &str) -> Option<String> {
        match self.backend.get(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "Secure store read failed, treating as absent");
                None
            }
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.read_raw(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "Stored record is corrupt, treating as absent");
                None
            }
        }
    }
}
