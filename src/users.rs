// ABOUTME: User registry - account CRUD, admin bootstrap queries, and SSH key management
// ABOUTME: Computes OpenSSH-style SHA256 fingerprints over the decoded public key blob
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! # User Registry
//!
//! Account management on top of the storage layer, plus the SSH public key
//! registry used for key-based access. Fingerprints follow the OpenSSH
//! display convention: `SHA256:` followed by the unpadded base64 of a
//! SHA-256 digest over the decoded key blob, so they line up with what
//! `ssh-keygen -lf` prints.

use crate::database_plugins::{factory::Database, DatabaseProvider};
use crate::errors::{AuthError, AuthResult};
use crate::models::{SshKey, User, UserListing};
use base64::{engine::general_purpose::STANDARD, engine::general_purpose::STANDARD_NO_PAD, Engine};
use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

/// Registry of user accounts and their SSH keys
#[derive(Clone)]
pub struct UserRegistry {
    database: Database,
}

impl UserRegistry {
    /// Create a new registry backed by the given database
    #[must_use]
    pub const fn new(database: Database) -> Self {
        Self { database }
    }

    /// Create a user account
    ///
    /// The storage layer decides the admin grant: the first account ever
    /// created becomes admin inside the insert transaction.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for an empty username and `Database` for
    /// persistence failures, including username and email uniqueness
    /// violations
    pub async fn create(&self, user: &User) -> AuthResult<User> {
        if user.username.is_empty() {
            return Err(AuthError::validation("username must not be empty"));
        }

        let created = self.database.create_user(user).await?;
        info!(
            "User {} created (admin: {})",
            created.username, created.is_admin
        );
        Ok(created)
    }

    /// Look up a user by id
    ///
    /// # Errors
    ///
    /// Returns `Database` if the query fails
    pub async fn get(&self, user_id: Uuid) -> AuthResult<Option<User>> {
        Ok(self.database.get_user(user_id).await?)
    }

    /// Look up a user by email
    ///
    /// # Errors
    ///
    /// Returns `Database` if the query fails
    pub async fn get_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        Ok(self.database.get_user_by_email(email).await?)
    }

    /// Look up a user by username
    ///
    /// # Errors
    ///
    /// Returns `Database` if the query fails
    pub async fn get_by_username(&self, username: &str) -> AuthResult<Option<User>> {
        Ok(self.database.get_user_by_username(username).await?)
    }

    /// Persist changes to username, email, admin flag, and auth methods
    ///
    /// # Errors
    ///
    /// Returns `Database` if the update fails
    pub async fn update(&self, user: &User) -> AuthResult<()> {
        Ok(self.database.update_user(user).await?)
    }

    /// Delete a user and everything that authenticates as them: sessions,
    /// SSH keys, and API keys go in the same transaction
    ///
    /// # Errors
    ///
    /// Returns `Database` if the delete fails
    pub async fn delete(&self, user_id: Uuid) -> AuthResult<bool> {
        let deleted = self.database.delete_user(user_id).await?;
        if deleted {
            info!("User {user_id} deleted with credentials cascade");
        }
        Ok(deleted)
    }

    /// Whether no account exists yet, i.e. the next signup bootstraps admin
    ///
    /// Advisory only: the authoritative check runs inside the create
    /// transaction, so this is safe to use for UI hints but never for the
    /// grant itself.
    ///
    /// # Errors
    ///
    /// Returns `Database` if the count fails
    pub async fn is_first_user(&self) -> AuthResult<bool> {
        Ok(self.database.get_user_count().await? == 0)
    }

    /// List all users with their last-login time for admin views
    ///
    /// # Errors
    ///
    /// Returns `Database` if the query fails
    pub async fn list_all(&self) -> AuthResult<Vec<UserListing>> {
        Ok(self.database.get_all_users().await?)
    }

    /// Register an SSH public key for a user
    ///
    /// # Errors
    ///
    /// Returns `Validation` when the key line is not a decodable OpenSSH
    /// public key, and `Database` for persistence failures including a
    /// duplicate fingerprint
    pub async fn add_ssh_key(
        &self,
        user_id: Uuid,
        name: &str,
        public_key: &str,
    ) -> AuthResult<SshKey> {
        let fingerprint = ssh_key_fingerprint(public_key)?;

        let key = SshKey {
            id: Uuid::new_v4().to_string(),
            user_id,
            public_key: public_key.trim().to_string(),
            fingerprint,
            name: name.to_string(),
            created_at: Utc::now(),
        };

        self.database.create_ssh_key(&key).await?;
        debug!("SSH key {} registered for user {user_id}", key.fingerprint);
        Ok(key)
    }

    /// List a user's SSH keys
    ///
    /// # Errors
    ///
    /// Returns `Database` if the query fails
    pub async fn list_ssh_keys(&self, user_id: Uuid) -> AuthResult<Vec<SshKey>> {
        Ok(self.database.get_user_ssh_keys(user_id).await?)
    }

    /// Resolve an SSH key (and its owner) from a fingerprint
    ///
    /// # Errors
    ///
    /// Returns `Database` if the query fails
    pub async fn find_ssh_key(&self, fingerprint: &str) -> AuthResult<Option<SshKey>> {
        Ok(self.database.get_ssh_key_by_fingerprint(fingerprint).await?)
    }

    /// Remove an SSH key; `false` when `(key_id, user_id)` matches nothing
    ///
    /// # Errors
    ///
    /// Returns `Database` if the delete fails
    pub async fn remove_ssh_key(&self, key_id: &str, user_id: Uuid) -> AuthResult<bool> {
        Ok(self.database.delete_ssh_key(key_id, user_id).await?)
    }
}

/// Compute the OpenSSH display fingerprint of a public key line
///
/// # Errors
///
/// Returns `Validation` when the line has no base64 blob or the blob does
/// not decode
pub fn ssh_key_fingerprint(public_key: &str) -> AuthResult<String> {
    // "ssh-ed25519 AAAA... comment" - the digest covers the decoded blob,
    // not the text line
    let blob_b64 = public_key
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| AuthError::validation("SSH key must be '<type> <base64> [comment]'"))?;

    let blob = STANDARD
        .decode(blob_b64)
        .map_err(|e| AuthError::validation(format!("SSH key blob is not valid base64: {e}")))?;

    let digest = Sha256::digest(&blob);
    Ok(format!("SHA256:{}", STANDARD_NO_PAD.encode(digest)))
}

/// Short display form of a fingerprint for log lines and UI tables
#[must_use]
pub fn short_fingerprint(fingerprint: &str) -> String {
    fingerprint.chars().take(15).collect()
}
