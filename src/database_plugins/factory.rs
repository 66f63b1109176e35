// ABOUTME: Database factory and provider wrapper for runtime backend selection
// ABOUTME: Detects the backend from the connection string and delegates trait calls
//! Database factory for creating database providers
//!
//! Detects the database type from the connection string. SQLite is the only
//! backend today; the enum keeps the seam open for a server-grade engine
//! without touching any caller.

use super::sqlite::SqliteDatabase;
use super::DatabaseProvider;
use crate::models::{ApiKey, OAuthProviderConfig, Session, SshKey, User, UserListing};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

/// Supported database types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseType {
    SQLite,
}

/// Database instance wrapper that delegates to the appropriate implementation
#[derive(Clone)]
pub enum Database {
    SQLite(SqliteDatabase),
}

impl Database {
    /// Get a descriptive string for the current database backend
    #[must_use]
    pub const fn backend_info(&self) -> &'static str {
        match self {
            Self::SQLite(_) => "SQLite",
        }
    }

    /// Get the database type enum
    #[must_use]
    pub const fn database_type(&self) -> DatabaseType {
        match self {
            Self::SQLite(_) => DatabaseType::SQLite,
        }
    }
}

/// Automatically detect database type from connection string
///
/// # Errors
///
/// Returns an error if the URL scheme is not a supported backend
fn detect_database_type(database_url: &str) -> Result<DatabaseType> {
    if database_url.starts_with("sqlite:") {
        Ok(DatabaseType::SQLite)
    } else {
        Err(anyhow!(
            "Unsupported database URL: {database_url}. Expected sqlite:..."
        ))
    }
}

#[async_trait]
impl DatabaseProvider for Database {
    async fn new(database_url: &str) -> Result<Self> {
        debug!("Detecting database type from URL: {}", database_url);
        let db_type = detect_database_type(database_url)?;

        match db_type {
            DatabaseType::SQLite => {
                let db = SqliteDatabase::new(database_url).await?;
                info!("SQLite database initialized");
                Ok(Self::SQLite(db))
            }
        }
    }

    async fn migrate(&self) -> Result<()> {
        match self {
            Self::SQLite(db) => db.migrate().await,
        }
    }

    async fn create_user(&self, user: &User) -> Result<User> {
        match self {
            Self::SQLite(db) => db.create_user(user).await,
        }
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        match self {
            Self::SQLite(db) => db.get_user(user_id).await,
        }
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        match self {
            Self::SQLite(db) => db.get_user_by_email(email).await,
        }
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        match self {
            Self::SQLite(db) => db.get_user_by_username(username).await,
        }
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        match self {
            Self::SQLite(db) => db.update_user(user).await,
        }
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<bool> {
        match self {
            Self::SQLite(db) => db.delete_user(user_id).await,
        }
    }

    async fn get_user_count(&self) -> Result<i64> {
        match self {
            Self::SQLite(db) => db.get_user_count().await,
        }
    }

    async fn get_all_users(&self) -> Result<Vec<UserListing>> {
        match self {
            Self::SQLite(db) => db.get_all_users().await,
        }
    }

    async fn create_api_key(&self, api_key: &ApiKey) -> Result<()> {
        match self {
            Self::SQLite(db) => db.create_api_key(api_key).await,
        }
    }

    async fn get_active_api_keys(&self) -> Result<Vec<ApiKey>> {
        match self {
            Self::SQLite(db) => db.get_active_api_keys().await,
        }
    }

    async fn get_user_api_keys(&self, user_id: Uuid) -> Result<Vec<ApiKey>> {
        match self {
            Self::SQLite(db) => db.get_user_api_keys(user_id).await,
        }
    }

    async fn set_api_key_disabled(
        &self,
        key_id: &str,
        user_id: Uuid,
        disabled: bool,
    ) -> Result<bool> {
        match self {
            Self::SQLite(db) => db.set_api_key_disabled(key_id, user_id, disabled).await,
        }
    }

    async fn delete_api_key(&self, key_id: &str, user_id: Uuid) -> Result<bool> {
        match self {
            Self::SQLite(db) => db.delete_api_key(key_id, user_id).await,
        }
    }

    async fn update_api_key_last_used(&self, key_id: &str, when: DateTime<Utc>) -> Result<()> {
        match self {
            Self::SQLite(db) => db.update_api_key_last_used(key_id, when).await,
        }
    }

    async fn create_session(&self, session: &Session) -> Result<()> {
        match self {
            Self::SQLite(db) => db.create_session(session).await,
        }
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        match self {
            Self::SQLite(db) => db.get_session(session_id).await,
        }
    }

    async fn touch_session(&self, session_id: &str, when: DateTime<Utc>) -> Result<()> {
        match self {
            Self::SQLite(db) => db.touch_session(session_id, when).await,
        }
    }

    async fn update_session_expiry(
        &self,
        session_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool> {
        match self {
            Self::SQLite(db) => db.update_session_expiry(session_id, expires_at).await,
        }
    }

    async fn delete_session(&self, session_id: &str) -> Result<bool> {
        match self {
            Self::SQLite(db) => db.delete_session(session_id).await,
        }
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
        match self {
            Self::SQLite(db) => db.delete_expired_sessions(now).await,
        }
    }

    async fn create_ssh_key(&self, key: &SshKey) -> Result<()> {
        match self {
            Self::SQLite(db) => db.create_ssh_key(key).await,
        }
    }

    async fn get_user_ssh_keys(&self, user_id: Uuid) -> Result<Vec<SshKey>> {
        match self {
            Self::SQLite(db) => db.get_user_ssh_keys(user_id).await,
        }
    }

    async fn get_ssh_key_by_fingerprint(&self, fingerprint: &str) -> Result<Option<SshKey>> {
        match self {
            Self::SQLite(db) => db.get_ssh_key_by_fingerprint(fingerprint).await,
        }
    }

    async fn delete_ssh_key(&self, key_id: &str, user_id: Uuid) -> Result<bool> {
        match self {
            Self::SQLite(db) => db.delete_ssh_key(key_id, user_id).await,
        }
    }

    async fn upsert_oauth_config(&self, config: &OAuthProviderConfig) -> Result<()> {
        match self {
            Self::SQLite(db) => db.upsert_oauth_config(config).await,
        }
    }

    async fn get_oauth_config(&self, provider: &str) -> Result<Option<OAuthProviderConfig>> {
        match self {
            Self::SQLite(db) => db.get_oauth_config(provider).await,
        }
    }

    async fn set_oauth_provider_enabled(&self, provider: &str, enabled: bool) -> Result<bool> {
        match self {
            Self::SQLite(db) => db.set_oauth_provider_enabled(provider, enabled).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_sqlite() {
        assert_eq!(
            detect_database_type("sqlite::memory:").unwrap(),
            DatabaseType::SQLite
        );
        assert_eq!(
            detect_database_type("sqlite:dispatch.db").unwrap(),
            DatabaseType::SQLite
        );
    }

    #[test]
    fn test_detect_unsupported() {
        assert!(detect_database_type("postgresql://localhost/dispatch").is_err());
        assert!(detect_database_type("mysql://localhost/dispatch").is_err());
    }
}
