// ABOUTME: Integration tests for rolling session lifecycle and the expiry sweep
// ABOUTME: Covers validation, refresh thresholds, logout, and lazy expiry semantics
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

mod common;

use chrono::{Duration, Utc};
use common::{create_test_database, create_test_user};
use dispatch_auth::database_plugins::DatabaseProvider;
use dispatch_auth::models::SessionProvider;
use dispatch_auth::sessions::SessionManager;

#[tokio::test]
async fn test_session_ids_are_unique_and_unguessable_length() {
    let database = create_test_database().await.unwrap();
    let user = create_test_user(&database).await.unwrap();
    let manager = SessionManager::new(database);

    let a = manager.create(user.id, SessionProvider::ApiKey).await.unwrap();
    let b = manager.create(user.id, SessionProvider::ApiKey).await.unwrap();

    assert_ne!(a.id, b.id);
    // 32 random bytes, base64url without padding
    assert_eq!(a.id.len(), 43);
}

#[tokio::test]
async fn test_validate_touches_last_active() {
    let database = create_test_database().await.unwrap();
    let user = create_test_user(&database).await.unwrap();
    let manager = SessionManager::new(database.clone());

    let session = manager.create(user.id, SessionProvider::OauthGoogle).await.unwrap();
    let validated = manager.validate(&session.id).await.unwrap().unwrap();
    assert!(validated.session.last_active_at >= session.last_active_at);

    let stored = database.get_session(&session.id).await.unwrap().unwrap();
    assert_eq!(stored.last_active_at, validated.session.last_active_at);
}

#[tokio::test]
async fn test_month_old_session_still_validates_after_refreshes() {
    let database = create_test_database().await.unwrap();
    let user = create_test_user(&database).await.unwrap();
    let manager = SessionManager::new(database.clone());

    let session = manager.create(user.id, SessionProvider::ApiKey).await.unwrap();

    // A session kept alive by refreshes validates well past its original
    // 30-day horizon; only the rolling expiry matters
    database
        .update_session_expiry(&session.id, Utc::now() + Duration::days(29))
        .await
        .unwrap();
    let validated = manager.validate(&session.id).await.unwrap().unwrap();
    assert!(!validated.needs_refresh);

    manager.refresh(&session.id).await.unwrap().unwrap();
    let validated = manager.validate(&session.id).await.unwrap().unwrap();
    assert!(validated.session.expires_at > Utc::now() + Duration::days(29));
}

#[tokio::test]
async fn test_refresh_window_boundary() {
    let database = create_test_database().await.unwrap();
    let user = create_test_user(&database).await.unwrap();
    let manager = SessionManager::new(database.clone());

    let session = manager.create(user.id, SessionProvider::ApiKey).await.unwrap();

    // 25 hours out: no refresh needed yet
    database
        .update_session_expiry(&session.id, Utc::now() + Duration::hours(25))
        .await
        .unwrap();
    assert!(!manager.validate(&session.id).await.unwrap().unwrap().needs_refresh);

    // 23 hours out: inside the window
    database
        .update_session_expiry(&session.id, Utc::now() + Duration::hours(23))
        .await
        .unwrap();
    assert!(manager.validate(&session.id).await.unwrap().unwrap().needs_refresh);
}

#[tokio::test]
async fn test_expired_session_is_gone_after_validate() {
    let database = create_test_database().await.unwrap();
    let user = create_test_user(&database).await.unwrap();
    let manager = SessionManager::new(database.clone());

    let session = manager.create(user.id, SessionProvider::ApiKey).await.unwrap();
    database
        .update_session_expiry(&session.id, Utc::now() - Duration::seconds(1))
        .await
        .unwrap();

    assert!(manager.validate(&session.id).await.unwrap().is_none());
    assert!(database.get_session(&session.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_logout_then_validate_is_none() {
    let database = create_test_database().await.unwrap();
    let user = create_test_user(&database).await.unwrap();
    let manager = SessionManager::new(database);

    let session = manager.create(user.id, SessionProvider::ApiKey).await.unwrap();
    assert!(manager.logout(&session.id).await.unwrap());
    assert!(manager.validate(&session.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_sweep_leaves_live_sessions_alone() {
    let database = create_test_database().await.unwrap();
    let user = create_test_user(&database).await.unwrap();
    let manager = SessionManager::new(database.clone());

    let live = manager.create(user.id, SessionProvider::ApiKey).await.unwrap();
    for _ in 0..3 {
        let dead = manager.create(user.id, SessionProvider::ApiKey).await.unwrap();
        database
            .update_session_expiry(&dead.id, Utc::now() - Duration::minutes(5))
            .await
            .unwrap();
    }

    assert_eq!(manager.cleanup_expired().await.unwrap(), 3);
    assert_eq!(manager.cleanup_expired().await.unwrap(), 0);
    assert!(manager.validate(&live.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_sessions_from_different_providers_coexist() {
    let database = create_test_database().await.unwrap();
    let user = create_test_user(&database).await.unwrap();
    let manager = SessionManager::new(database);

    let api = manager.create(user.id, SessionProvider::ApiKey).await.unwrap();
    let github = manager.create(user.id, SessionProvider::OauthGithub).await.unwrap();

    let api_validated = manager.validate(&api.id).await.unwrap().unwrap();
    let github_validated = manager.validate(&github.id).await.unwrap().unwrap();
    assert_eq!(api_validated.session.provider, SessionProvider::ApiKey);
    assert_eq!(github_validated.session.provider, SessionProvider::OauthGithub);

    // Logging one out leaves the other untouched
    manager.logout(&api.id).await.unwrap();
    assert!(manager.validate(&github.id).await.unwrap().is_some());
}
