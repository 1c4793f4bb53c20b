// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session check behaviour: freshness, refresh, and degraded paths.

use doubt_session::models::{AuthStatus, Role};
use doubt_session::store::{keys, TokenStore};
use doubt_session::time_utils::now_millis;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

mod common;
use common::*;

#[tokio::test]
async fn test_fresh_record_authenticates_without_refresh() {
    let identity = FakeIdentity::new();
    let profile = sample_profile();
    let store = seeded_store(
        Some(&fresh_record("access-ok")),
        Some(Role::Student),
        Some(&profile),
    )
    .await;
    let session = manager(&identity, store);

    assert!(session.snapshot().is_loading(), "Starts in Loading");

    let snap = session.check_auth().await;

    assert_eq!(snap.status, AuthStatus::Authenticated { role: Role::Student });
    assert_eq!(snap.user, Some(profile));
    assert_eq!(identity.refresh_calls.load(Ordering::SeqCst), 0);
    assert_eq!(session.snapshot(), snap);
}

#[tokio::test]
async fn test_no_record_is_unauthenticated_without_network() {
    let identity = FakeIdentity::new();
    let session = manager(&identity, TokenStore::in_memory());

    let snap = session.check_auth().await;

    assert_eq!(snap.status, AuthStatus::Unauthenticated);
    assert!(snap.user.is_none());
    assert_eq!(identity.network_calls(), 0, "No network calls expected");
}

#[tokio::test]
async fn test_expired_record_refreshes_and_overwrites_store() {
    let identity = FakeIdentity::new();
    let store = seeded_store(
        Some(&expired_record(Some("refresh-old"))),
        Some(Role::Expert),
        Some(&sample_profile()),
    )
    .await;

    let mut new_tokens = fresh_record("access-new");
    new_tokens.refresh_token = Some("refresh-old".to_string());
    identity.push_refresh(Duration::ZERO, Outcome::Tokens(new_tokens));

    let session = manager(&identity, store.clone());
    let before = now_millis();
    let snap = session.check_auth().await;

    assert_eq!(snap.status, AuthStatus::Authenticated { role: Role::Expert });
    assert_eq!(identity.refresh_calls.load(Ordering::SeqCst), 1);

    let stored = store.credentials().await.expect("record stored");
    assert_eq!(stored.access_token, "access-new");
    assert_eq!(stored.refresh_token.as_deref(), Some("refresh-old"));
    assert!(
        (stored.issued_at - before).abs() < 5_000,
        "issuedAt should be approximately now"
    );
    assert!(stored.is_fresh());
}

#[tokio::test]
async fn test_exactly_one_refresh_attempt_per_check() {
    let identity = FakeIdentity::new();
    let store = seeded_store(
        Some(&expired_record(Some("refresh-revoked"))),
        Some(Role::Student),
        None,
    )
    .await;
    identity.push_refresh(Duration::ZERO, Outcome::Rejected(403, "invalid_grant"));
    identity.push_refresh(Duration::ZERO, Outcome::Rejected(403, "invalid_grant"));

    let session = manager(&identity, store.clone());

    assert_eq!(session.check_auth().await.status, AuthStatus::Unauthenticated);
    assert_eq!(identity.refresh_calls.load(Ordering::SeqCst), 1);

    assert_eq!(session.check_auth().await.status, AuthStatus::Unauthenticated);
    assert_eq!(identity.refresh_calls.load(Ordering::SeqCst), 2);

    // A failed refresh leaves the stored record for the next login to replace.
    assert!(store.credentials().await.is_some());
}

#[tokio::test]
async fn test_provider_outage_resolves_unauthenticated() {
    let identity = FakeIdentity::new();
    let store = seeded_store(
        Some(&expired_record(Some("refresh-1"))),
        Some(Role::Student),
        None,
    )
    .await;
    identity.push_refresh(Duration::ZERO, Outcome::NetworkDown);

    let session = manager(&identity, store);
    let snap = session.check_auth().await;

    assert_eq!(snap.status, AuthStatus::Unauthenticated);
    assert_eq!(identity.refresh_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_expired_without_refresh_token_skips_network() {
    let identity = FakeIdentity::new();
    let store = seeded_store(Some(&expired_record(None)), Some(Role::Student), None).await;
    let session = manager(&identity, store);

    assert_eq!(session.check_auth().await.status, AuthStatus::Unauthenticated);
    assert_eq!(identity.network_calls(), 0);
}

#[tokio::test]
async fn test_missing_role_is_incomplete_signup() {
    let identity = FakeIdentity::new();
    let store = seeded_store(Some(&fresh_record("access-ok")), None, Some(&sample_profile())).await;
    let session = manager(&identity, store);

    let snap = session.check_auth().await;

    assert_eq!(snap.status, AuthStatus::Unauthenticated);
    assert!(!snap.is_authenticated());
}

#[tokio::test]
async fn test_storage_failure_reads_as_absent() {
    let identity = FakeIdentity::new();
    let backend = Arc::new(FlakyStore::default());
    let store = TokenStore::new(backend.clone());
    store.save_credentials(&fresh_record("access-ok")).await.unwrap();
    store.save_role(Role::Student).await.unwrap();
    backend.fail_reads.store(true, Ordering::SeqCst);

    let session = manager(&identity, store);

    assert_eq!(session.check_auth().await.status, AuthStatus::Unauthenticated);
    assert_eq!(identity.network_calls(), 0);
}

#[tokio::test]
async fn test_corrupt_record_reads_as_absent() {
    let identity = FakeIdentity::new();
    let store = TokenStore::in_memory();
    store
        .backend()
        .set(keys::AUTH_TOKEN, "not json")
        .await
        .unwrap();
    store.save_role(Role::Expert).await.unwrap();

    let session = manager(&identity, store);
    assert_eq!(session.check_auth().await.status, AuthStatus::Unauthenticated);
}

#[tokio::test]
async fn test_check_passes_through_loading() {
    let identity = FakeIdentity::new();
    let store = seeded_store(
        Some(&expired_record(Some("refresh-1"))),
        Some(Role::Student),
        None,
    )
    .await;
    identity.push_refresh(
        Duration::from_millis(50),
        Outcome::Tokens(fresh_record("access-new")),
    );

    let session = Arc::new(manager(&identity, store));
    let first = session.check_auth().await;
    assert!(first.is_authenticated());

    let mut rx = session.subscribe();
    rx.borrow_and_update();

    // Expire the stored record again so the next check suspends on refresh.
    session
        .store()
        .save_credentials(&expired_record(Some("refresh-2")))
        .await
        .unwrap();
    identity.push_refresh(Duration::from_millis(50), Outcome::Rejected(403, "invalid_grant"));

    let handle = tokio::spawn({
        let session = session.clone();
        async move { session.check_auth().await }
    });

    rx.changed().await.unwrap();
    assert!(rx.borrow_and_update().is_loading(), "Authenticated -> Loading first");

    let last = handle.await.unwrap();
    assert_eq!(last.status, AuthStatus::Unauthenticated);
    assert_eq!(session.snapshot().status, AuthStatus::Unauthenticated);
}

#[tokio::test]
async fn test_access_token_refreshes_without_publishing() {
    let identity = FakeIdentity::new();
    let store = seeded_store(
        Some(&expired_record(Some("refresh-1"))),
        Some(Role::Student),
        None,
    )
    .await;
    identity.push_refresh(Duration::ZERO, Outcome::Tokens(fresh_record("access-new")));

    let session = manager(&identity, store);

    assert_eq!(session.access_token().await.as_deref(), Some("access-new"));
    assert!(session.snapshot().is_loading(), "State untouched");

    // Now fresh: no second refresh.
    assert_eq!(session.access_token().await.as_deref(), Some("access-new"));
    assert_eq!(identity.refresh_calls.load(Ordering::SeqCst), 1);
}
