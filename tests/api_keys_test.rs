// ABOUTME: Integration tests for API key generation, verification, and lifecycle
// ABOUTME: Covers the generate-verify-disable flow, ownership checks, and hash-only storage
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

mod common;

use common::{create_test_database, create_test_user};
use dispatch_auth::api_keys::ApiKeyManager;
use dispatch_auth::database_plugins::DatabaseProvider;
use dispatch_auth::errors::AuthError;
use uuid::Uuid;

#[tokio::test]
async fn test_generate_verify_disable_flow() {
    let database = create_test_database().await.unwrap();
    let user = create_test_user(&database).await.unwrap();
    let manager = ApiKeyManager::new(database);

    let generated = manager.generate(user.id, "ci-deploy").await.unwrap();
    assert_eq!(generated.label, "ci-deploy");
    assert!(!generated.key.is_empty());

    // The plaintext verifies and resolves to the owning user
    let verified = manager.verify(&generated.key).await.unwrap().unwrap();
    assert_eq!(verified.user_id, user.id);
    assert_eq!(verified.id, generated.id);

    // Disabled keys stop verifying immediately
    assert!(manager.disable(&generated.id, user.id).await.unwrap());
    assert!(manager.verify(&generated.key).await.unwrap().is_none());

    // Re-enabling restores the key
    assert!(manager.enable(&generated.id, user.id).await.unwrap());
    assert!(manager.verify(&generated.key).await.unwrap().is_some());
}

#[tokio::test]
async fn test_wrong_key_does_not_verify() {
    let database = create_test_database().await.unwrap();
    let user = create_test_user(&database).await.unwrap();
    let manager = ApiKeyManager::new(database);

    manager.generate(user.id, "real").await.unwrap();

    assert!(manager.verify("not-a-real-key").await.unwrap().is_none());
    assert!(manager.verify("").await.unwrap().is_none());
}

#[tokio::test]
async fn test_keys_do_not_cross_verify() {
    let database = create_test_database().await.unwrap();
    let alice = create_test_user(&database).await.unwrap();
    let bob = create_test_user(&database).await.unwrap();
    let manager = ApiKeyManager::new(database);

    let alice_key = manager.generate(alice.id, "alice").await.unwrap();
    let bob_key = manager.generate(bob.id, "bob").await.unwrap();

    let verified = manager.verify(&alice_key.key).await.unwrap().unwrap();
    assert_eq!(verified.user_id, alice.id);

    let verified = manager.verify(&bob_key.key).await.unwrap().unwrap();
    assert_eq!(verified.user_id, bob.id);
}

#[tokio::test]
async fn test_plaintext_is_never_persisted() {
    let database = create_test_database().await.unwrap();
    let user = create_test_user(&database).await.unwrap();
    let manager = ApiKeyManager::new(database.clone());

    let generated = manager.generate(user.id, "secret-check").await.unwrap();

    let stored = database.get_user_api_keys(user.id).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_ne!(stored[0].key_hash, generated.key);
    assert!(!stored[0].key_hash.contains(&generated.key));
    assert!(stored[0].key_hash.starts_with("$argon2id$"));
}

#[tokio::test]
async fn test_label_validation() {
    let database = create_test_database().await.unwrap();
    let user = create_test_user(&database).await.unwrap();
    let manager = ApiKeyManager::new(database);

    assert!(matches!(
        manager.generate(user.id, "").await,
        Err(AuthError::Validation(_))
    ));
    assert!(matches!(
        manager.generate(user.id, &"x".repeat(101)).await,
        Err(AuthError::Validation(_))
    ));

    // Multibyte labels are measured in characters, not bytes
    let label = "é".repeat(100);
    assert!(manager.generate(user.id, &label).await.is_ok());
}

#[tokio::test]
async fn test_ownership_guards_management_calls() {
    let database = create_test_database().await.unwrap();
    let owner = create_test_user(&database).await.unwrap();
    let stranger = create_test_user(&database).await.unwrap();
    let manager = ApiKeyManager::new(database);

    let generated = manager.generate(owner.id, "guarded").await.unwrap();

    // Someone else's user id is a no-op, not an error
    assert!(!manager.disable(&generated.id, stranger.id).await.unwrap());
    assert!(!manager.delete(&generated.id, stranger.id).await.unwrap());
    assert!(manager.verify(&generated.key).await.unwrap().is_some());

    assert!(manager.delete(&generated.id, owner.id).await.unwrap());
    assert!(manager.verify(&generated.key).await.unwrap().is_none());
}

#[tokio::test]
async fn test_list_returns_only_own_keys() {
    let database = create_test_database().await.unwrap();
    let alice = create_test_user(&database).await.unwrap();
    let bob = create_test_user(&database).await.unwrap();
    let manager = ApiKeyManager::new(database);

    manager.generate(alice.id, "a1").await.unwrap();
    manager.generate(alice.id, "a2").await.unwrap();
    manager.generate(bob.id, "b1").await.unwrap();

    assert_eq!(manager.list(alice.id).await.unwrap().len(), 2);
    assert_eq!(manager.list(bob.id).await.unwrap().len(), 1);
    assert!(manager.list(Uuid::new_v4()).await.unwrap().is_empty());
}
