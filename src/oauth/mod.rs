// ABOUTME: OAuth module organizing the authorization-code flow and provider table
// ABOUTME: Centralizes the closed provider enum and the single-use CSRF state token store
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! # OAuth Management Module
//!
//! OAuth2 authorization-code flow against a closed set of providers. The
//! provider table is an exhaustive enum checked at compile time - there is
//! no string dispatch at the trust boundary. CSRF state tokens live in a
//! process-local single-use store behind the [`StateTokenStore`] trait; the
//! in-memory implementation is only suitable for single-instance
//! deployment, and a shared-store implementation is the extension point for
//! horizontal scaling.

pub mod manager;
pub mod providers;

use crate::errors::AuthError;
use crate::models::{OAuthStateToken, SessionProvider};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Supported OAuth providers - a closed set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    GitHub,
    Google,
}

impl OAuthProvider {
    /// Stable lowercase name used in storage and callback routing
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GitHub => "github",
            Self::Google => "google",
        }
    }

    /// Human-readable provider name
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::GitHub => "GitHub",
            Self::Google => "Google",
        }
    }

    /// Session provider tag for sessions created through this provider
    #[must_use]
    pub const fn session_provider(self) -> SessionProvider {
        match self {
            Self::GitHub => SessionProvider::OauthGithub,
            Self::Google => SessionProvider::OauthGoogle,
        }
    }

    /// Authorization endpoint the user's browser is redirected to
    #[must_use]
    pub const fn authorize_endpoint(self) -> &'static str {
        match self {
            Self::GitHub => "https://github.com/login/oauth/authorize",
            Self::Google => "https://accounts.google.com/o/oauth2/v2/auth",
        }
    }

    /// Token endpoint for the authorization-code exchange
    #[must_use]
    pub const fn token_endpoint(self) -> &'static str {
        match self {
            Self::GitHub => "https://github.com/login/oauth/access_token",
            Self::Google => "https://oauth2.googleapis.com/token",
        }
    }

    /// User profile endpoint
    #[must_use]
    pub const fn profile_endpoint(self) -> &'static str {
        match self {
            Self::GitHub => "https://api.github.com/user",
            Self::Google => "https://www.googleapis.com/oauth2/v2/userinfo",
        }
    }

    /// Scopes requested during authorization
    #[must_use]
    pub const fn scopes(self) -> &'static str {
        match self {
            Self::GitHub => "read:user user:email",
            Self::Google => "openid email profile",
        }
    }
}

impl std::fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OAuthProvider {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "github" => Ok(Self::GitHub),
            "google" => Ok(Self::Google),
            other => Err(AuthError::validation(format!(
                "unknown OAuth provider: {other}"
            ))),
        }
    }
}

/// OAuth authorization request handed to the HTTP layer for redirection
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationRequest {
    /// Provider authorization URL including the state parameter
    pub url: String,
    /// The CSRF state token bound to this request
    pub state: String,
    /// Provider the request was initiated for
    pub provider: OAuthProvider,
    /// How long the state token stays valid
    pub expires_in_minutes: u32,
}

/// Single-use store for CSRF state tokens with TTL semantics
///
/// `take` is the only read operation and it consumes the token, so a state
/// value can never authenticate two callbacks.
#[async_trait]
pub trait StateTokenStore: Send + Sync {
    /// Store a freshly issued token
    async fn insert(&self, token: OAuthStateToken);

    /// Remove and return the token for `state`, if present
    async fn take(&self, state: &str) -> Option<OAuthStateToken>;

    /// Drop every token past its expiry, returning how many were removed
    async fn purge_expired(&self, now: DateTime<Utc>) -> usize;
}

/// Process-local in-memory state token store
#[derive(Default)]
pub struct MemoryStateStore {
    tokens: DashMap<String, OAuthStateToken>,
}

impl MemoryStateStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateTokenStore for MemoryStateStore {
    async fn insert(&self, token: OAuthStateToken) {
        self.tokens.insert(token.state.clone(), token);
    }

    async fn take(&self, state: &str) -> Option<OAuthStateToken> {
        self.tokens.remove(state).map(|(_, token)| token)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.tokens.len();
        self.tokens.retain(|_, token| !token.is_expired(now));
        before - self.tokens.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token(state: &str, expires_in_minutes: i64) -> OAuthStateToken {
        let now = Utc::now();
        OAuthStateToken {
            state: state.to_string(),
            provider: "github".into(),
            created_at: now,
            expires_at: now + Duration::minutes(expires_in_minutes),
        }
    }

    #[tokio::test]
    async fn test_take_consumes_token() {
        let store = MemoryStateStore::new();
        store.insert(token("abc", 10)).await;

        assert!(store.take("abc").await.is_some());
        assert!(store.take("abc").await.is_none());
    }

    #[tokio::test]
    async fn test_purge_removes_only_expired() {
        let store = MemoryStateStore::new();
        store.insert(token("live", 10)).await;
        store.insert(token("dead", -1)).await;

        assert_eq!(store.purge_expired(Utc::now()).await, 1);
        assert!(store.take("live").await.is_some());
        assert!(store.take("dead").await.is_none());
    }

    #[test]
    fn test_provider_parse_round_trip() {
        for provider in [OAuthProvider::GitHub, OAuthProvider::Google] {
            assert_eq!(
                provider.as_str().parse::<OAuthProvider>().unwrap(),
                provider
            );
        }
        assert!("gitlab".parse::<OAuthProvider>().is_err());
    }
}
