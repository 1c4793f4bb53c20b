// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session manager: the single source of truth for "is this user logged
//! in, and as what role".
//!
//! State machine (per app lifecycle, not persisted):
//!
//! ```text
//!            +-----------> Authenticated(role)
//! Loading ---+
//!            +-----------> Unauthenticated
//! ```
//!
//! Every check and every logout re-enters `Loading` first; state is never
//! patched in place. Each check is independent: the last one to finish
//! publishes the final state. Login and logout start a new session
//! generation, and checks that began in an older generation are discarded
//! instead of published. Writes of the session records are serialized, and
//! a refresh never lands in storage after a logout has cleared it.

use crate::error::{AuthError, Result};
use crate::models::{AuthSnapshot, CredentialRecord, Role, UserProfile};
use crate::services::id_token;
use crate::services::identity::{AuthorizationCallback, AuthorizationRequest, IdentityProvider};
use crate::store::TokenStore;
use crate::time_utils;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

/// Injectable session object, shared by reference with UI consumers.
pub struct SessionManager {
    identity: Arc<dyn IdentityProvider>,
    store: TokenStore,
    state: watch::Sender<AuthSnapshot>,
    /// Bumped on login and logout.
    generation: AtomicU64,
    /// Held while session records are written or cleared.
    persist_lock: Mutex<()>,
}

impl SessionManager {
    /// Create a manager in the `Loading` state. Call [`Self::check_auth`]
    /// once the UI is mounted.
    pub fn new(identity: Arc<dyn IdentityProvider>, store: TokenStore) -> Self {
        let (state, _) = watch::channel(AuthSnapshot::loading());
        Self {
            identity,
            store,
            state,
            generation: AtomicU64::new(0),
            persist_lock: Mutex::new(()),
        }
    }

    /// Current state.
    pub fn snapshot(&self) -> AuthSnapshot {
        self.state.borrow().clone()
    }

    /// Observe every state replacement.
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.state.subscribe()
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    // ─── Checks ──────────────────────────────────────────────────────────────

    /// Re-derive authentication state from the stored records.
    ///
    /// Never fails: every error resolves to `Unauthenticated` and is logged.
    pub async fn check_auth(&self) -> AuthSnapshot {
        let generation = self.generation.load(Ordering::SeqCst);
        self.publish(AuthSnapshot::loading());

        let resolved = self.resolve(generation).await;

        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!("Discarding auth check superseded by login/logout");
            return self.settled().await;
        }
        self.publish(resolved.clone());
        resolved
    }

    /// Wait for the operation that superseded a check to publish its result.
    ///
    /// Every login, logout and check ends by publishing a non-`Loading`
    /// state, so this resolves once that operation finishes.
    async fn settled(&self) -> AuthSnapshot {
        let mut rx = self.state.subscribe();
        let snapshot = match rx.wait_for(|s| !s.is_loading()).await {
            Ok(snapshot) => (*snapshot).clone(),
            // The sender lives in `self`, so the channel cannot close here.
            Err(_) => AuthSnapshot::unauthenticated(),
        };
        snapshot
    }

    async fn resolve(&self, generation: u64) -> AuthSnapshot {
        let Some(credentials) = self.store.credentials().await else {
            tracing::debug!("No stored credentials");
            return AuthSnapshot::unauthenticated();
        };

        if self.ensure_fresh(credentials, generation).await.is_none() {
            return AuthSnapshot::unauthenticated();
        }

        let Some(role) = self.store.role().await else {
            tracing::info!("Credentials valid but no role stored, treating as incomplete signup");
            return AuthSnapshot::unauthenticated();
        };

        let user = self.store.profile().await;
        tracing::debug!(role = %role, has_profile = user.is_some(), "Session authenticated");
        AuthSnapshot::authenticated(role, user)
    }

    /// Return fresh credentials, refreshing once if expired.
    ///
    /// `None` means the session cannot be used: expired without a refresh
    /// token, refresh rejected, provider unreachable, or a login/logout
    /// happened while the refresh was in flight.
    async fn ensure_fresh(
        &self,
        credentials: CredentialRecord,
        generation: u64,
    ) -> Option<CredentialRecord> {
        let now = time_utils::now_millis();
        if credentials.is_fresh_at(now) {
            return Some(credentials);
        }

        let expired_at = time_utils::format_millis(credentials.expires_at_millis());
        let Some(refresh_token) = credentials.usable_refresh_token() else {
            tracing::info!(expired_at = %expired_at, "Access token expired and no refresh token");
            return None;
        };

        tracing::info!(expired_at = %expired_at, "Access token expired, refreshing");

        // No retry here; the next check is the retry point.
        let refreshed = match self.identity.refresh(refresh_token).await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    invalid_grant = e.is_invalid_grant(),
                    "Token refresh failed"
                );
                return None;
            }
        };

        {
            let _guard = self.persist_lock.lock().await;
            if self.generation.load(Ordering::SeqCst) != generation {
                tracing::debug!("Session changed during refresh, dropping refreshed tokens");
                return None;
            }

            if let Err(e) = self.store.save_credentials(&refreshed).await {
                tracing::warn!(error = %e, "Failed to persist refreshed credentials");
            }
        }

        tracing::info!(
            expires_at = %time_utils::format_millis(refreshed.expires_at_millis()),
            "Token refreshed"
        );
        Some(refreshed)
    }

    /// Fresh access token for API calls, refreshing once if needed.
    ///
    /// Does not change the published state.
    pub async fn access_token(&self) -> Option<String> {
        let generation = self.generation.load(Ordering::SeqCst);
        let credentials = self.store.credentials().await?;
        self.ensure_fresh(credentials, generation)
            .await
            .map(|c| c.access_token)
    }

    // ─── Login ───────────────────────────────────────────────────────────────

    /// Finish the browser flow: verify state, exchange the code, store the
    /// session records and the role chosen in `request`, then re-check.
    pub async fn complete_login(
        &self,
        request: &AuthorizationRequest,
        callback: &AuthorizationCallback,
    ) -> Result<AuthSnapshot> {
        if let Some(error) = &callback.error {
            let detail = callback.error_description.as_deref().unwrap_or(error);
            tracing::warn!(error = %error, "Authorization error from provider");
            return Err(AuthError::Denied(detail.to_string()));
        }

        let returned_state = callback.state.as_deref().unwrap_or_default();
        if !request.verify_state(returned_state) {
            tracing::warn!("OAuth state mismatch on callback");
            return Err(AuthError::StateMismatch);
        }

        let code = callback
            .code
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AuthError::Validation("callback has no authorization code".into()))?;

        let credentials = self
            .identity
            .exchange_code(code, &request.code_verifier)
            .await?;

        self.establish(credentials, request.role).await
    }

    /// Password grant login. Disabled unless the config allows it.
    pub async fn login_with_password(
        &self,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<AuthSnapshot> {
        let credentials = self.identity.password_login(email, password).await?;
        self.establish(credentials, role).await
    }

    /// Store a new session's records and publish the resulting state.
    ///
    /// If any record fails to save, all three are cleared and the state ends
    /// `Unauthenticated`; the previous session's records never mix with the
    /// new ones.
    async fn establish(&self, credentials: CredentialRecord, role: Role) -> Result<AuthSnapshot> {
        let profile = self.load_profile(&credentials).await?;

        self.generation.fetch_add(1, Ordering::SeqCst);
        self.publish(AuthSnapshot::loading());

        {
            let _guard = self.persist_lock.lock().await;
            if let Err(e) = self.save_session(&credentials, &profile, role).await {
                tracing::error!(error = %e, "Failed to store new session, clearing records");
                if let Err(clear_err) = self.store.clear().await {
                    tracing::error!(error = %clear_err, "Failed to clear partial session");
                }
                self.publish(AuthSnapshot::unauthenticated());
                return Err(e);
            }
        }

        tracing::info!(
            role = %role,
            subject = profile.subject().unwrap_or("unknown"),
            "Login complete, session stored"
        );

        Ok(self.check_auth().await)
    }

    async fn save_session(
        &self,
        credentials: &CredentialRecord,
        profile: &UserProfile,
        role: Role,
    ) -> Result<()> {
        self.store.save_credentials(credentials).await?;
        self.store.save_profile(profile).await?;
        self.store.save_role(role).await
    }

    /// User-info lookup, falling back to the ID token claims.
    async fn load_profile(&self, credentials: &CredentialRecord) -> Result<UserProfile> {
        match self.identity.fetch_user_info(&credentials.access_token).await {
            Ok(profile) => Ok(profile),
            Err(e) => {
                let Some(id_token) = credentials.id_token.as_deref() else {
                    return Err(e);
                };
                tracing::warn!(error = %e, "User-info lookup failed, using ID token claims");
                id_token::decode_claims_unverified(id_token)
            }
        }
    }

    // ─── Logout ──────────────────────────────────────────────────────────────

    /// Clear the session locally, then end the provider session.
    ///
    /// Always ends `Unauthenticated`, even if the remote call or a storage
    /// delete fails.
    pub async fn logout(&self) -> AuthSnapshot {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.publish(AuthSnapshot::loading());

        {
            let _guard = self.persist_lock.lock().await;
            if let Err(e) = self.store.clear().await {
                tracing::error!(error = %e, "Failed to clear stored session");
            }
        }

        if let Err(e) = self.identity.logout_remote().await {
            tracing::warn!(error = %e, "Remote logout failed, local session cleared anyway");
        }

        let snapshot = AuthSnapshot::unauthenticated();
        self.publish(snapshot.clone());
        tracing::info!("Logged out");
        snapshot
    }

    fn publish(&self, snapshot: AuthSnapshot) {
        self.state.send_replace(snapshot);
    }
}
