// ABOUTME: API key credential store - generation, slow-hash verification, and lifecycle
// ABOUTME: Argon2id hashing with a deliberate linear scan across all active keys on verify
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! # API Key Management
//!
//! Opaque bearer secrets for programmatic access. The plaintext key is
//! returned exactly once at generation and only its Argon2id hash is ever
//! persisted.
//!
//! Verification deliberately scans every active key with the full
//! hash-compare instead of an indexed lookup: indexing by a fast hash of the
//! plaintext would leak which stored key matched through timing and index
//! side channels. The O(n) cost is acceptable because active-key counts are
//! small, and the whole scan runs on the blocking pool so it cannot stall
//! the async request path.

use crate::constants::limits;
use crate::database_plugins::{factory::Database, DatabaseProvider};
use crate::errors::{AuthError, AuthResult};
use crate::models::{ApiKey, ApiKeyGenerated};
use argon2::password_hash::{rand_core::OsRng as HashOsRng, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use rand::RngCore;
use tracing::{debug, warn};
use uuid::Uuid;

/// API key credential store
#[derive(Clone)]
pub struct ApiKeyManager {
    database: Database,
}

/// Build the Argon2id hasher with the crate's tuned cost parameters
fn build_hasher() -> AuthResult<Argon2<'static>> {
    let params = Params::new(
        limits::API_KEY_HASH_MEMORY_KIB,
        limits::API_KEY_HASH_ITERATIONS,
        limits::API_KEY_HASH_PARALLELISM,
        None,
    )
    .map_err(|e| AuthError::Database(anyhow::anyhow!("invalid argon2 parameters: {e}")))?;

    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

impl ApiKeyManager {
    /// Create a new API key manager backed by the given database
    #[must_use]
    pub const fn new(database: Database) -> Self {
        Self { database }
    }

    /// Generate a new API key for a user
    ///
    /// The returned plaintext is the only copy that will ever exist; the
    /// stored row carries the salted Argon2id hash.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the label is empty or longer than 100 chars,
    /// or `Database` if hashing or persistence fails
    pub async fn generate(&self, user_id: Uuid, label: &str) -> AuthResult<ApiKeyGenerated> {
        let label_chars = label.chars().count();
        if label_chars == 0 || label_chars > limits::API_KEY_LABEL_MAX_CHARS {
            return Err(AuthError::validation(format!(
                "label must be 1-{} characters, got {label_chars}",
                limits::API_KEY_LABEL_MAX_CHARS
            )));
        }

        let mut secret_bytes = [0u8; limits::API_KEY_SECRET_BYTES];
        rand::thread_rng().fill_bytes(&mut secret_bytes);
        let plaintext = URL_SAFE_NO_PAD.encode(secret_bytes);

        // Hashing is tuned to ~100-150ms, keep it off the async workers
        let to_hash = plaintext.clone();
        let key_hash = tokio::task::spawn_blocking(move || -> AuthResult<String> {
            let hasher = build_hasher()?;
            let salt = SaltString::generate(&mut HashOsRng);
            let hash = hasher
                .hash_password(to_hash.as_bytes(), &salt)
                .map_err(|e| AuthError::Database(anyhow::anyhow!("argon2 hashing failed: {e}")))?;
            Ok(hash.to_string())
        })
        .await
        .map_err(|e| AuthError::Database(anyhow::anyhow!("hashing task panicked: {e}")))??;

        let api_key = ApiKey {
            id: Uuid::new_v4().to_string(),
            user_id,
            label: label.to_string(),
            key_hash,
            created_at: Utc::now(),
            last_used_at: None,
            disabled: false,
        };

        self.database.create_api_key(&api_key).await?;
        debug!("Generated API key {} for user {}", api_key.id, user_id);

        Ok(ApiKeyGenerated {
            id: api_key.id,
            key: plaintext,
            label: api_key.label,
        })
    }

    /// Verify a presented plaintext key against all active keys
    ///
    /// "No match" is a normal outcome, not an error: callers get `Ok(None)`
    /// and treat the request as unauthenticated. A stored hash that fails to
    /// parse counts as a non-match and the scan continues.
    ///
    /// # Errors
    ///
    /// Returns `Database` only when loading the candidate rows fails
    pub async fn verify(&self, key: &str) -> AuthResult<Option<ApiKey>> {
        let candidates = self.database.get_active_api_keys().await?;

        let presented = key.to_string();
        let matched = tokio::task::spawn_blocking(move || -> AuthResult<Option<ApiKey>> {
            let hasher = build_hasher()?;
            for candidate in candidates {
                let parsed = match PasswordHash::new(&candidate.key_hash) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        // Malformed hash must not abort the scan
                        warn!("Skipping API key {} with malformed hash: {e}", candidate.id);
                        continue;
                    }
                };

                if hasher
                    .verify_password(presented.as_bytes(), &parsed)
                    .is_ok()
                {
                    return Ok(Some(candidate));
                }
            }
            Ok(None)
        })
        .await
        .map_err(|e| AuthError::Database(anyhow::anyhow!("verification task panicked: {e}")))??;

        let Some(matched) = matched else {
            return Ok(None);
        };

        // Best-effort telemetry: never blocks or fails the verify path
        let database = self.database.clone();
        let key_id = matched.id.clone();
        tokio::spawn(async move {
            if let Err(e) = database.update_api_key_last_used(&key_id, Utc::now()).await {
                warn!("Failed to update last_used_at for API key {key_id}: {e}");
            }
        });

        debug!("API key {} verified for user {}", matched.id, matched.user_id);
        Ok(Some(matched))
    }

    /// List all keys belonging to a user
    ///
    /// # Errors
    ///
    /// Returns `Database` if the query fails
    pub async fn list(&self, user_id: Uuid) -> AuthResult<Vec<ApiKey>> {
        Ok(self.database.get_user_api_keys(user_id).await?)
    }

    /// Disable a key; `false` when `(key_id, user_id)` does not match a row
    ///
    /// # Errors
    ///
    /// Returns `Database` if the update fails
    pub async fn disable(&self, key_id: &str, user_id: Uuid) -> AuthResult<bool> {
        Ok(self
            .database
            .set_api_key_disabled(key_id, user_id, true)
            .await?)
    }

    /// Re-enable a key; same ownership contract as `disable`
    ///
    /// # Errors
    ///
    /// Returns `Database` if the update fails
    pub async fn enable(&self, key_id: &str, user_id: Uuid) -> AuthResult<bool> {
        Ok(self
            .database
            .set_api_key_disabled(key_id, user_id, false)
            .await?)
    }

    /// Hard-delete a key; same ownership contract as `disable`
    ///
    /// # Errors
    ///
    /// Returns `Database` if the delete fails
    pub async fn delete(&self, key_id: &str, user_id: Uuid) -> AuthResult<bool> {
        Ok(self.database.delete_api_key(key_id, user_id).await?)
    }
}
