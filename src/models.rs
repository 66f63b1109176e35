// ABOUTME: Core domain models for users, API keys, sessions, SSH keys, and OAuth records
// ABOUTME: Defines the closed provider enum and all row types persisted by the storage layer
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! # Data Models
//!
//! Row types and value objects shared across the auth core. Everything here
//! is serde-serializable so the HTTP boundary can emit it directly, with the
//! deliberate exception of stored credential hashes which never leave the
//! storage layer through these types' public responses.

use crate::errors::AuthError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Origin of a browser session - a closed set, never free-form strings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionProvider {
    /// Session created after a successful API key login
    ApiKey,
    /// Session created by the GitHub OAuth callback
    OauthGithub,
    /// Session created by the Google OAuth callback
    OauthGoogle,
}

impl SessionProvider {
    /// Stable string form used in storage and cookies
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ApiKey => "api_key",
            Self::OauthGithub => "oauth_github",
            Self::OauthGoogle => "oauth_google",
        }
    }
}

impl std::fmt::Display for SessionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionProvider {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "api_key" => Ok(Self::ApiKey),
            "oauth_github" => Ok(Self::OauthGithub),
            "oauth_google" => Ok(Self::OauthGoogle),
            other => Err(AuthError::validation(format!(
                "unknown session provider: {other}"
            ))),
        }
    }
}

/// A registered user account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user identifier
    pub id: Uuid,
    /// Display / login name
    pub username: String,
    /// Email address, when the identity source supplied one
    pub email: Option<String>,
    /// Whether this user holds admin privileges
    pub is_admin: bool,
    /// Authentication methods this user has logged in with
    pub auth_methods: Vec<String>,
    /// When the account was created
    pub created_at: DateTime<Utc>,
    /// When the account was last modified
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Build a new user record; the storage layer decides the final
    /// `is_admin` value when this is the first account ever created
    #[must_use]
    pub fn new(username: String, email: Option<String>, auth_method: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username,
            email,
            is_admin: false,
            auth_methods: vec![auth_method.to_string()],
            created_at: now,
            updated_at: now,
        }
    }

    /// Record an additional auth method if it is not already present
    pub fn add_auth_method(&mut self, method: &str) {
        if !self.auth_methods.iter().any(|m| m == method) {
            self.auth_methods.push(method.to_string());
        }
    }
}

/// A user row enriched with login history for admin listings
#[derive(Debug, Clone, Serialize)]
pub struct UserListing {
    /// The user record
    #[serde(flatten)]
    pub user: User,
    /// Most recent session creation time, if any session was ever created
    pub last_login_at: Option<DateTime<Utc>>,
}

/// A stored API key row - the plaintext secret is never part of this type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    /// Unique key identifier
    pub id: String,
    /// Owning user
    pub user_id: Uuid,
    /// User-facing label, 1-100 chars
    pub label: String,
    /// Argon2id hash of the plaintext secret
    #[serde(skip_serializing)]
    pub key_hash: String,
    /// When the key was created
    pub created_at: DateTime<Utc>,
    /// When the key last successfully authenticated a request
    pub last_used_at: Option<DateTime<Utc>>,
    /// Disabled keys are excluded from verification
    pub disabled: bool,
}

/// Result of generating an API key - the only place the plaintext appears
#[derive(Debug, Serialize)]
pub struct ApiKeyGenerated {
    /// Key identifier for later management calls
    pub id: String,
    /// The plaintext secret, returned exactly once
    pub key: String,
    /// Label echoed back for display
    pub label: String,
}

/// A browser session row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unguessable random session identifier
    pub id: String,
    /// Owning user
    pub user_id: Uuid,
    /// Which login strategy created this session
    pub provider: SessionProvider,
    /// When the session was created
    pub created_at: DateTime<Utc>,
    /// Last time the session validated a request
    pub last_active_at: DateTime<Utc>,
    /// Rolling expiry: always `now + 30d` at creation or refresh
    pub expires_at: DateTime<Utc>,
}

/// Stored OAuth provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthProviderConfig {
    /// Provider this configuration belongs to
    pub provider: String,
    /// OAuth application client id
    pub client_id: String,
    /// Client secret - encrypted at rest when a cipher is configured
    #[serde(skip_serializing)]
    pub client_secret: String,
    /// Redirect URI registered with the provider
    pub redirect_uri: String,
    /// Disabled providers reject new logins but keep existing sessions
    pub enabled: bool,
    /// When the configuration was first stored
    pub created_at: DateTime<Utc>,
    /// When the configuration was last changed
    pub updated_at: DateTime<Utc>,
}

/// Ephemeral single-use CSRF state token for the OAuth flow
#[derive(Debug, Clone)]
pub struct OAuthStateToken {
    /// The random state value
    pub state: String,
    /// Provider the authorization request was initiated for
    pub provider: String,
    /// When the token was issued
    pub created_at: DateTime<Utc>,
    /// Hard expiry, 10 minutes after issue
    pub expires_at: DateTime<Utc>,
}

impl OAuthStateToken {
    /// Whether the token is past its TTL at `now`
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// A registered SSH public key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshKey {
    /// Unique key identifier
    pub id: String,
    /// Owning user
    pub user_id: Uuid,
    /// Full public key line as supplied
    pub public_key: String,
    /// SHA-256 fingerprint in OpenSSH display form
    pub fingerprint: String,
    /// User-facing name
    pub name: String,
    /// When the key was registered
    pub created_at: DateTime<Utc>,
}

/// Provider identity after a completed OAuth callback, normalized so that
/// repeated logins by the same external identity reconcile deterministically
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedIdentity {
    /// Deterministic external identifier: `<provider>_<provider_profile_id>`
    pub user_id: String,
    /// Email reported by the provider, if any
    pub email: Option<String>,
    /// Display name reported by the provider, if any
    pub name: Option<String>,
    /// Session provider tag for this identity
    pub provider: SessionProvider,
    /// Raw provider profile for diagnostics
    pub raw_profile: serde_json::Value,
}
