// ABOUTME: Database abstraction layer for the auth core
// ABOUTME: Plugin architecture exposing users, sessions, API keys, SSH keys, and OAuth config rows

use crate::models::{ApiKey, OAuthProviderConfig, Session, SshKey, User, UserListing};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod factory;
pub mod sqlite;

/// Core database abstraction trait
///
/// The auth core assumes nothing about the engine beyond durable rows
/// addressable by id with atomic single-row read/update/delete. All
/// implementations must provide this interface.
#[async_trait]
pub trait DatabaseProvider: Send + Sync + Clone {
    /// Create a new database connection
    async fn new(database_url: &str) -> Result<Self>
    where
        Self: Sized;

    /// Run migrations to set up the schema
    async fn migrate(&self) -> Result<()>;

    // ================================
    // User Management
    // ================================

    /// Create a new user account, returning the stored row.
    ///
    /// The admin grant for the very first account is decided inside a single
    /// storage transaction: implementations must compute it from the live
    /// user count in the same transaction as the insert, so two concurrent
    /// first-time logins can never both become admin.
    async fn create_user(&self, user: &User) -> Result<User>;

    /// Get user by id
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>>;

    /// Get user by email address
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Get user by username
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Update username, email, admin flag, and auth methods
    async fn update_user(&self, user: &User) -> Result<()>;

    /// Delete a user, cascading to their sessions, SSH keys, and API keys
    async fn delete_user(&self, user_id: Uuid) -> Result<bool>;

    /// Total number of users
    async fn get_user_count(&self) -> Result<i64>;

    /// All users with last-login derived from session history
    async fn get_all_users(&self) -> Result<Vec<UserListing>>;

    // ================================
    // API Key Management
    // ================================

    /// Persist a new API key row
    async fn create_api_key(&self, api_key: &ApiKey) -> Result<()>;

    /// All non-disabled keys across all users, for the verification scan
    async fn get_active_api_keys(&self) -> Result<Vec<ApiKey>>;

    /// All keys belonging to one user
    async fn get_user_api_keys(&self, user_id: Uuid) -> Result<Vec<ApiKey>>;

    /// Set the disabled flag; returns false when `(key_id, user_id)` does
    /// not identify a row owned by that user
    async fn set_api_key_disabled(
        &self,
        key_id: &str,
        user_id: Uuid,
        disabled: bool,
    ) -> Result<bool>;

    /// Hard-delete a key; same ownership contract as disable
    async fn delete_api_key(&self, key_id: &str, user_id: Uuid) -> Result<bool>;

    /// Best-effort timestamp update after a successful verification
    async fn update_api_key_last_used(&self, key_id: &str, when: DateTime<Utc>) -> Result<()>;

    // ================================
    // Session Management
    // ================================

    /// Persist a new session row
    async fn create_session(&self, session: &Session) -> Result<()>;

    /// Get session by id
    async fn get_session(&self, session_id: &str) -> Result<Option<Session>>;

    /// Update the last-active timestamp
    async fn touch_session(&self, session_id: &str, when: DateTime<Utc>) -> Result<()>;

    /// Set a new expiry; returns false when the session no longer exists
    async fn update_session_expiry(
        &self,
        session_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Delete one session (logout or lazy expiry)
    async fn delete_session(&self, session_id: &str) -> Result<bool>;

    /// Delete every session past its expiry. The condition must be evaluated
    /// against the live row at delete time (one atomic statement), so a
    /// concurrent refresh racing the sweep can never lose a just-extended
    /// session.
    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64>;

    // ================================
    // SSH Key Management
    // ================================

    /// Persist a new SSH key row
    async fn create_ssh_key(&self, key: &SshKey) -> Result<()>;

    /// All SSH keys belonging to one user
    async fn get_user_ssh_keys(&self, user_id: Uuid) -> Result<Vec<SshKey>>;

    /// Look up a key by its fingerprint
    async fn get_ssh_key_by_fingerprint(&self, fingerprint: &str) -> Result<Option<SshKey>>;

    /// Delete an SSH key with the same ownership contract as API keys
    async fn delete_ssh_key(&self, key_id: &str, user_id: Uuid) -> Result<bool>;

    // ================================
    // OAuth Provider Configuration
    // ================================

    /// Insert or replace a provider configuration
    async fn upsert_oauth_config(&self, config: &OAuthProviderConfig) -> Result<()>;

    /// Get the configuration for one provider
    async fn get_oauth_config(&self, provider: &str) -> Result<Option<OAuthProviderConfig>>;

    /// Flip the enabled flag; returns false when no configuration exists.
    /// Never touches existing sessions.
    async fn set_oauth_provider_enabled(&self, provider: &str, enabled: bool) -> Result<bool>;
}
