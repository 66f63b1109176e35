// ABOUTME: Integration tests for the OAuth flow state machine and provider configuration
// ABOUTME: Covers initiation, state token single-use enforcement, and enable/disable lifecycle
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

mod common;

use common::create_test_database;
use dispatch_auth::database_plugins::DatabaseProvider;
use dispatch_auth::errors::AuthError;
use dispatch_auth::oauth::manager::OAuthManager;
use dispatch_auth::oauth::{MemoryStateStore, OAuthProvider, StateTokenStore};
use std::sync::Arc;

async fn manager_with_store() -> (OAuthManager, Arc<MemoryStateStore>) {
    let database = create_test_database().await.unwrap();
    let store = Arc::new(MemoryStateStore::new());
    let manager = OAuthManager::new(database, store.clone(), None).unwrap();
    (manager, store)
}

#[tokio::test]
async fn test_initiate_builds_provider_url_with_state() {
    let (manager, _) = manager_with_store().await;
    manager
        .enable_provider(
            OAuthProvider::GitHub,
            "iv-client",
            "iv-secret",
            "https://dispatch.example/auth/oauth/github/callback",
        )
        .await
        .unwrap();

    let request = manager.initiate(OAuthProvider::GitHub).await.unwrap();
    assert!(request.url.starts_with("https://github.com/login/oauth/authorize?"));
    assert!(request.url.contains("client_id=iv-client"));
    assert!(request.url.contains(&format!("state={}", request.state)));
    assert!(request.url.contains("scope=read%3Auser%20user%3Aemail"));
    assert_eq!(request.expires_in_minutes, 10);
}

#[tokio::test]
async fn test_each_initiation_issues_a_distinct_state() {
    let (manager, store) = manager_with_store().await;
    manager
        .enable_provider(OAuthProvider::Google, "cid", "secret", "https://x/cb")
        .await
        .unwrap();

    let first = manager.initiate(OAuthProvider::Google).await.unwrap();
    let second = manager.initiate(OAuthProvider::Google).await.unwrap();
    assert_ne!(first.state, second.state);

    // Both are live simultaneously
    assert!(store.take(&first.state).await.is_some());
    assert!(store.take(&second.state).await.is_some());
}

#[tokio::test]
async fn test_callback_with_foreign_state_fails_closed() {
    let (manager, _) = manager_with_store().await;
    manager
        .enable_provider(OAuthProvider::GitHub, "cid", "secret", "https://x/cb")
        .await
        .unwrap();

    let result = manager
        .handle_callback(OAuthProvider::GitHub, "some-code", "forged-state")
        .await;
    assert!(matches!(result, Err(AuthError::StateTokenInvalid)));
}

#[tokio::test]
async fn test_state_cannot_authenticate_two_callbacks() {
    let (manager, _) = manager_with_store().await;
    manager
        .enable_provider(OAuthProvider::GitHub, "cid", "secret", "https://x/cb")
        .await
        .unwrap();

    let request = manager.initiate(OAuthProvider::GitHub).await.unwrap();

    // The first callback consumes the state before its (failing) network
    // call; the second gets the single-use rejection
    let first = manager
        .handle_callback(OAuthProvider::GitHub, "code", &request.state)
        .await;
    assert!(first.is_err());

    let second = manager
        .handle_callback(OAuthProvider::GitHub, "code", &request.state)
        .await;
    assert!(matches!(second, Err(AuthError::StateTokenInvalid)));
}

#[tokio::test]
async fn test_callback_on_wrong_provider_route_rejected() {
    let (manager, _) = manager_with_store().await;
    manager
        .enable_provider(OAuthProvider::GitHub, "cid", "secret", "https://x/cb")
        .await
        .unwrap();
    manager
        .enable_provider(OAuthProvider::Google, "cid2", "secret2", "https://x/cb2")
        .await
        .unwrap();

    let request = manager.initiate(OAuthProvider::GitHub).await.unwrap();
    let result = manager
        .handle_callback(OAuthProvider::Google, "code", &request.state)
        .await;
    assert!(matches!(
        result,
        Err(AuthError::StateTokenProviderMismatch { .. })
    ));
}

#[tokio::test]
async fn test_disable_blocks_new_logins_only() {
    let (manager, _) = manager_with_store().await;

    manager
        .enable_provider(OAuthProvider::Google, "cid", "secret", "https://x/cb")
        .await
        .unwrap();
    assert!(manager.initiate(OAuthProvider::Google).await.is_ok());

    manager.disable_provider(OAuthProvider::Google).await.unwrap();
    assert!(matches!(
        manager.initiate(OAuthProvider::Google).await,
        Err(AuthError::OAuthProviderDisabled(_))
    ));

    // Re-enabling with the same credentials restores the flow
    manager
        .enable_provider(OAuthProvider::Google, "cid", "secret", "https://x/cb")
        .await
        .unwrap();
    assert!(manager.initiate(OAuthProvider::Google).await.is_ok());
}

#[tokio::test]
async fn test_enable_rejects_empty_client_id() {
    let (manager, _) = manager_with_store().await;
    assert!(matches!(
        manager
            .enable_provider(OAuthProvider::GitHub, "", "secret", "https://x/cb")
            .await,
        Err(AuthError::Validation(_))
    ));
}

#[tokio::test]
async fn test_provider_config_survives_upsert() {
    let database = create_test_database().await.unwrap();
    let manager = OAuthManager::new(
        database.clone(),
        Arc::new(MemoryStateStore::new()),
        None,
    )
    .unwrap();

    manager
        .enable_provider(OAuthProvider::GitHub, "old-id", "old-secret", "https://old/cb")
        .await
        .unwrap();
    manager
        .enable_provider(OAuthProvider::GitHub, "new-id", "new-secret", "https://new/cb")
        .await
        .unwrap();

    let config = database.get_oauth_config("github").await.unwrap().unwrap();
    assert_eq!(config.client_id, "new-id");
    assert_eq!(config.redirect_uri, "https://new/cb");
    assert!(config.enabled);
}
