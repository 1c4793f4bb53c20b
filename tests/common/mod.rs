// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

#![allow(dead_code)]

use async_trait::async_trait;
use doubt_session::error::{AuthError, Result};
use doubt_session::models::{CredentialRecord, Role, UserProfile};
use doubt_session::services::{IdentityProvider, SessionManager};
use doubt_session::store::{keys, MemoryStore, SecureStore, TokenStore};
use doubt_session::time_utils::now_millis;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted result of a fake token endpoint call.
#[derive(Clone)]
pub enum Outcome {
    Tokens(CredentialRecord),
    Rejected(u16, &'static str),
    NetworkDown,
}

impl Outcome {
    fn into_result(self) -> Result<CredentialRecord> {
        match self {
            Outcome::Tokens(c) => Ok(c),
            Outcome::Rejected(status, message) => Err(AuthError::Provider {
                status,
                message: message.to_string(),
            }),
            Outcome::NetworkDown => Err(AuthError::Network("connection refused".to_string())),
        }
    }
}

/// In-memory identity provider with call counters.
#[derive(Default)]
pub struct FakeIdentity {
    pub exchange_calls: AtomicUsize,
    pub password_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub user_info_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    refresh_script: Mutex<VecDeque<(Duration, Outcome)>>,
    exchange_outcome: Mutex<Option<Outcome>>,
    user_info: Mutex<Option<UserProfile>>,
    logout_fails: AtomicBool,
}

impl FakeIdentity {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue the result of the next refresh call.
    pub fn push_refresh(&self, delay: Duration, outcome: Outcome) {
        self.refresh_script
            .lock()
            .unwrap()
            .push_back((delay, outcome));
    }

    pub fn set_exchange(&self, outcome: Outcome) {
        *self.exchange_outcome.lock().unwrap() = Some(outcome);
    }

    pub fn set_user_info(&self, profile: Option<UserProfile>) {
        *self.user_info.lock().unwrap() = profile;
    }

    pub fn fail_logout(&self) {
        self.logout_fails.store(true, Ordering::SeqCst);
    }

    pub fn network_calls(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
            + self.password_calls.load(Ordering::SeqCst)
            + self.refresh_calls.load(Ordering::SeqCst)
            + self.user_info_calls.load(Ordering::SeqCst)
            + self.logout_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn exchange_code(&self, _code: &str, _verifier: &str) -> Result<CredentialRecord> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .exchange_outcome
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(Outcome::Rejected(403, "invalid_grant"));
        outcome.into_result()
    }

    async fn password_login(&self, _email: &str, _password: &str) -> Result<CredentialRecord> {
        self.password_calls.fetch_add(1, Ordering::SeqCst);
        Err(AuthError::GrantDisabled("password"))
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<CredentialRecord> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.refresh_script.lock().unwrap().pop_front();
        let (delay, outcome) =
            next.unwrap_or((Duration::ZERO, Outcome::Rejected(500, "no scripted refresh")));
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        outcome.into_result()
    }

    async fn fetch_user_info(&self, _access_token: &str) -> Result<UserProfile> {
        self.user_info_calls.fetch_add(1, Ordering::SeqCst);
        self.user_info
            .lock()
            .unwrap()
            .clone()
            .ok_or(AuthError::Provider {
                status: 401,
                message: "Unauthorized".to_string(),
            })
    }

    async fn logout_remote(&self) -> Result<()> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        if self.logout_fails.load(Ordering::SeqCst) {
            return Err(AuthError::Network("provider unreachable".to_string()));
        }
        Ok(())
    }
}

/// Backend whose reads, deletes or role writes fail, and whose writes can
/// be slowed down.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_reads: AtomicBool,
    pub fail_deletes: AtomicBool,
    pub fail_role_writes: AtomicBool,
    pub write_delay_ms: AtomicU64,
}

#[async_trait]
impl SecureStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AuthError::Storage("keystore locked".to_string()));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let delay = self.write_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if key == keys::USER_ROLE && self.fail_role_writes.load(Ordering::SeqCst) {
            return Err(AuthError::Storage("locked".to_string()));
        }
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(AuthError::Storage("keystore locked".to_string()));
        }
        self.inner.delete(key).await
    }
}

pub const HOUR_MS: i64 = 3_600_000;

/// Credential record issued just now, valid for an hour.
pub fn fresh_record(access_token: &str) -> CredentialRecord {
    CredentialRecord {
        access_token: access_token.to_string(),
        refresh_token: Some("refresh-1".to_string()),
        id_token: None,
        expires_in: 3600,
        issued_at: now_millis(),
    }
}

/// Credential record issued two hours ago with a one-hour lifetime.
pub fn expired_record(refresh_token: Option<&str>) -> CredentialRecord {
    CredentialRecord {
        access_token: "stale-access".to_string(),
        refresh_token: refresh_token.map(str::to_string),
        id_token: None,
        expires_in: 3600,
        issued_at: now_millis() - 2 * HOUR_MS,
    }
}

pub fn sample_profile() -> UserProfile {
    serde_json::from_value(serde_json::json!({
        "sub": "auth0|student-1",
        "name": "Riya Student",
        "email": "riya@example.com"
    }))
    .unwrap()
}

/// Memory-backed store seeded with the given records.
pub async fn seeded_store(
    credentials: Option<&CredentialRecord>,
    role: Option<Role>,
    profile: Option<&UserProfile>,
) -> TokenStore {
    let store = TokenStore::in_memory();
    if let Some(c) = credentials {
        store.save_credentials(c).await.unwrap();
    }
    if let Some(r) = role {
        store.save_role(r).await.unwrap();
    }
    if let Some(p) = profile {
        store.save_profile(p).await.unwrap();
    }
    store
}

pub fn manager(identity: &Arc<FakeIdentity>, store: TokenStore) -> SessionManager {
    SessionManager::new(identity.clone(), store)
}
