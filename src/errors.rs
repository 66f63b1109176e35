// ABOUTME: Unified typed error handling for the authentication core
// ABOUTME: Defines error kinds, HTTP status mapping, and the AuthResult alias
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! # Error Handling
//!
//! One typed error enum covers every failure the auth core can surface.
//! Credential checks (`ApiKeyManager::verify`, `SessionManager::validate`)
//! never return these for the plain "not authenticated" outcome - they
//! return `None` instead, and the error enum is reserved for flow and
//! configuration failures that the HTTP boundary maps to 4xx/5xx.

use thiserror::Error;

/// Unified error type for the auth core
#[derive(Debug, Error)]
pub enum AuthError {
    /// Presented credential does not match any stored credential
    #[error("invalid credential")]
    InvalidCredential,

    /// Session exists but is past its expiry
    #[error("session has expired")]
    SessionExpired,

    /// No session row for the presented id
    #[error("session not found")]
    SessionNotFound,

    /// OAuth state token missing or already consumed
    #[error("state token is invalid or has already been used")]
    StateTokenInvalid,

    /// OAuth state token older than its TTL
    #[error("state token has expired")]
    StateTokenExpired,

    /// OAuth state token was issued for a different provider
    #[error("state token was issued for {expected}, callback came from {actual}")]
    StateTokenProviderMismatch {
        /// Provider the state token was issued for
        expected: String,
        /// Provider named in the callback
        actual: String,
    },

    /// OAuth provider is configured but disabled
    #[error("OAuth provider {0} is disabled")]
    OAuthProviderDisabled(String),

    /// OAuth provider has no client id configured
    #[error("OAuth provider {0} has no client_id configured")]
    OAuthMissingClientId(String),

    /// Authorization code could not be exchanged for an access token
    #[error("token exchange failed: {0}")]
    TokenExchangeFailed(String),

    /// Provider profile endpoint returned a non-recoverable failure
    #[error("profile fetch failed for {provider}: HTTP {status}")]
    ProfileFetchFailed {
        /// Provider whose profile endpoint failed
        provider: String,
        /// HTTP status returned by the provider
        status: u16,
    },

    /// Input failed validation (label length, unknown provider value, ...)
    #[error("validation error: {0}")]
    Validation(String),

    /// Legacy JWT failed signature or expiry checks
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Storage layer failure - connectivity loss is fatal and bubbles up
    #[error("database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl AuthError {
    /// HTTP status code the transport layer should map this error to
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::InvalidCredential
            | Self::SessionExpired
            | Self::SessionNotFound
            | Self::InvalidToken(_) => 401,

            Self::StateTokenInvalid
            | Self::StateTokenExpired
            | Self::StateTokenProviderMismatch { .. }
            | Self::OAuthProviderDisabled(_)
            | Self::OAuthMissingClientId(_)
            | Self::Validation(_) => 400,

            Self::TokenExchangeFailed(_) | Self::ProfileFetchFailed { .. } => 502,

            Self::Database(_) => 500,
        }
    }

    /// Convenience constructor for validation failures
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Result type alias for the auth core
pub type AuthResult<T> = Result<T, AuthError>;
