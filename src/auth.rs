// ABOUTME: Legacy JWT authentication - stateless sign/verify/refresh on a shared secret
// ABOUTME: Independent of session cookies; used only by the single-key legacy auth method
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! # Legacy JWT Authentication
//!
//! The legacy auth method signs short-lived HS256 tokens with a single
//! shared secret. It is entirely stateless and does not touch session
//! storage: a valid token is its own proof, and `refresh` mints a new token
//! from an existing one without any database round trip.

use crate::constants::limits;
use crate::errors::{AuthError, AuthResult};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// JWT claims for the legacy auth method
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - the authenticated user id
    pub sub: String,
    /// Email of the authenticated user, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Issued at timestamp (milliseconds, see `token_counter`)
    pub iat: i64,
    /// Expiration timestamp (seconds)
    pub exp: i64,
}

/// Manager for legacy JWT tokens
pub struct AuthManager {
    secret: Vec<u8>,
    token_expiry_hours: i64,
    /// Monotonic counter so two tokens minted in the same millisecond still
    /// differ in their issued-at claim
    token_counter: AtomicU64,
}

impl AuthManager {
    /// Create a new manager from the shared secret
    #[must_use]
    pub const fn new(secret: Vec<u8>, token_expiry_hours: i64) -> Self {
        Self {
            secret,
            token_expiry_hours,
            token_counter: AtomicU64::new(0),
        }
    }

    /// Create a manager with the default expiry
    #[must_use]
    pub const fn with_default_expiry(secret: Vec<u8>) -> Self {
        Self::new(secret, limits::JWT_EXPIRY_HOURS)
    }

    /// Sign a new token for a subject
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` if encoding fails
    pub fn sign(&self, sub: &str, email: Option<&str>) -> AuthResult<String> {
        let now = Utc::now();
        let expiry = now + Duration::hours(self.token_expiry_hours);

        let counter = self.token_counter.fetch_add(1, Ordering::Relaxed);
        let unique_iat =
            now.timestamp() * 1000 + i64::from(u32::try_from(counter % 1000).unwrap_or(0));

        let claims = Claims {
            sub: sub.to_string(),
            email: email.map(ToString::to_string),
            iat: unique_iat,
            exp: expiry.timestamp(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.secret),
        )
        .map_err(|e| AuthError::InvalidToken(format!("failed to encode token: {e}")))
    }

    /// Verify a token's signature and expiry
    ///
    /// # Errors
    ///
    /// Returns a distinct `InvalidToken` for bad signature, expiry, and
    /// malformed input
    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        let validation = Validation::new(Algorithm::HS256);

        decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|e| convert_jwt_error(&e))
    }

    /// Refresh a token: verify its signature (even when expired), strip the
    /// timing claims, and re-sign with a fresh expiry
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` if the old token's signature does not check out
    pub fn refresh(&self, token: &str) -> AuthResult<String> {
        // Signature must be valid even if the token has expired; that is
        // what makes the refresh request legitimate
        let mut validation_no_exp = Validation::new(Algorithm::HS256);
        validation_no_exp.validate_exp = false;

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(&self.secret),
            &validation_no_exp,
        )
        .map(|data| data.claims)
        .map_err(|e| convert_jwt_error(&e))?;

        self.sign(&claims.sub, claims.email.as_deref())
    }
}

/// Convert JWT library errors into the crate's typed error
fn convert_jwt_error(e: &jsonwebtoken::errors::Error) -> AuthError {
    use jsonwebtoken::errors::ErrorKind;

    match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::InvalidToken("token has expired".into()),
        ErrorKind::InvalidSignature => {
            AuthError::InvalidToken("token signature verification failed".into())
        }
        ErrorKind::InvalidToken => AuthError::InvalidToken("token format is invalid".into()),
        ErrorKind::Base64(base64_err) => {
            AuthError::InvalidToken(format!("token contains invalid base64: {base64_err}"))
        }
        ErrorKind::Json(json_err) => {
            AuthError::InvalidToken(format!("token contains invalid JSON: {json_err}"))
        }
        _ => AuthError::InvalidToken(format!("token validation failed: {e}")),
    }
}

/// Generate a random shared secret for the legacy JWT method
#[must_use]
pub fn generate_jwt_secret() -> [u8; 64] {
    let mut secret = [0u8; 64];
    rand::thread_rng().fill_bytes(&mut secret);
    secret
}
