// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Doubt-session: client-side authentication for the student/expert app.
//!
//! This crate owns the login session of the mobile app: the OAuth
//! authorization code + PKCE flow against the identity provider, encrypted
//! storage of the issued tokens, and the session state machine the UI uses
//! to gate navigation.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod store;
pub mod telemetry;
pub mod time_utils;

use config::Config;
use error::Result;
use services::{IdentityClient, SessionManager, TokenCipher};
use std::sync::Arc;
use store::{EncryptedFileStore, TokenStore};

/// Wire the production session: identity client plus encrypted file store.
///
/// The returned manager is in the `Loading` state; the caller runs the
/// first `check_auth()` when the UI mounts.
pub async fn build_session(config: &Config) -> Result<Arc<SessionManager>> {
    let identity = IdentityClient::new(config)?;
    tracing::info!(domain = %config.auth_domain, "Identity client initialized");

    let cipher = TokenCipher::from_secret(&config.store_key)?;
    let backend = EncryptedFileStore::open(&config.store_dir, cipher).await?;
    tracing::info!(dir = %config.store_dir.display(), "Secure token store opened");

    Ok(Arc::new(SessionManager::new(
        Arc::new(identity),
        TokenStore::new(Arc::new(backend)),
    )))
}
