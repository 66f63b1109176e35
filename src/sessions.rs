// ABOUTME: Rolling browser session management - create, validate, refresh, logout, sweep
// ABOUTME: Owns the lazy-expiry check, the refresh threshold, and the hourly cleanup task
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! # Session Management
//!
//! Browser sessions carry an unguessable 256-bit identifier and a rolling
//! 30-day expiry. Validation is where expiry is enforced: an expired row
//! found during `validate` is deleted on the spot, so the background sweep
//! is purely hygiene and never a correctness requirement.

use crate::constants::{cookies, limits};
use crate::database_plugins::{factory::Database, DatabaseProvider};
use crate::errors::AuthResult;
use crate::models::{Session, SessionProvider, User};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use rand::RngCore;
use std::time::Duration as StdDuration;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A session that passed validation
#[derive(Debug, Clone)]
pub struct ValidatedSession {
    /// The live session row, with `last_active_at` already touched
    pub session: Session,
    /// The session's owner
    pub user: User,
    /// True when the session is within 24 hours of expiry; the caller
    /// should follow up with [`SessionManager::refresh`] and re-issue the
    /// cookie
    pub needs_refresh: bool,
}

/// Manager for rolling browser sessions
pub struct SessionManager {
    database: Database,
    shutdown_tx: Option<watch::Sender<bool>>,
}

impl SessionManager {
    /// Create a new session manager backed by the given database
    #[must_use]
    pub const fn new(database: Database) -> Self {
        Self {
            database,
            shutdown_tx: None,
        }
    }

    /// Create a session for a user, returning the row to be set as a cookie
    ///
    /// # Errors
    ///
    /// Returns `Database` if persistence fails
    pub async fn create(&self, user_id: Uuid, provider: SessionProvider) -> AuthResult<Session> {
        let mut id_bytes = [0u8; limits::SESSION_ID_BYTES];
        rand::thread_rng().fill_bytes(&mut id_bytes);

        let now = Utc::now();
        let session = Session {
            id: URL_SAFE_NO_PAD.encode(id_bytes),
            user_id,
            provider,
            created_at: now,
            last_active_at: now,
            expires_at: now + Duration::days(limits::SESSION_EXPIRY_DAYS),
        };

        self.database.create_session(&session).await?;
        debug!("Session created for user {user_id} via {provider}");
        Ok(session)
    }

    /// Validate a presented session id
    ///
    /// `Ok(None)` covers every "not authenticated" outcome: unknown id,
    /// expired session (deleted here as a side effect), and a session whose
    /// user has since been removed. Errors are reserved for storage
    /// failures.
    ///
    /// # Errors
    ///
    /// Returns `Database` if any storage call fails
    pub async fn validate(&self, session_id: &str) -> AuthResult<Option<ValidatedSession>> {
        let Some(mut session) = self.database.get_session(session_id).await? else {
            return Ok(None);
        };

        let now = Utc::now();
        if session.expires_at < now {
            // Lazy expiry: the row dies the moment it is seen expired
            self.database.delete_session(session_id).await?;
            debug!("Session {session_id} expired and was removed on validate");
            return Ok(None);
        }

        let Some(user) = self.database.get_user(session.user_id).await? else {
            // Deleted user, orphaned session: treat like expiry
            self.database.delete_session(session_id).await?;
            warn!("Session {session_id} referenced missing user; removed");
            return Ok(None);
        };

        self.database.touch_session(session_id, now).await?;
        session.last_active_at = now;

        let needs_refresh =
            session.expires_at - now < Duration::hours(limits::SESSION_REFRESH_THRESHOLD_HOURS);

        Ok(Some(ValidatedSession {
            session,
            user,
            needs_refresh,
        }))
    }

    /// Extend a session to a fresh 30-day expiry
    ///
    /// Unconditional: refreshing is always safe, and callers decide when
    /// via the `needs_refresh` flag. Returns the new expiry, or `None` when
    /// the session no longer exists.
    ///
    /// # Errors
    ///
    /// Returns `Database` if the update fails
    pub async fn refresh(&self, session_id: &str) -> AuthResult<Option<Session>> {
        let new_expiry = Utc::now() + Duration::days(limits::SESSION_EXPIRY_DAYS);

        if !self
            .database
            .update_session_expiry(session_id, new_expiry)
            .await?
        {
            return Ok(None);
        }

        Ok(self.database.get_session(session_id).await?)
    }

    /// Terminate a session; `false` when it did not exist
    ///
    /// # Errors
    ///
    /// Returns `Database` if the delete fails
    pub async fn logout(&self, session_id: &str) -> AuthResult<bool> {
        let deleted = self.database.delete_session(session_id).await?;
        if deleted {
            debug!("Session {session_id} logged out");
        }
        Ok(deleted)
    }

    /// Delete every expired session in one atomic statement
    ///
    /// # Errors
    ///
    /// Returns `Database` if the delete fails
    pub async fn cleanup_expired(&self) -> AuthResult<u64> {
        let removed = self.database.delete_expired_sessions(Utc::now()).await?;
        if removed > 0 {
            info!("Session sweep removed {removed} expired sessions");
        }
        Ok(removed)
    }

    /// Spawn the hourly background sweep
    ///
    /// The task runs until [`destroy`](Self::destroy) is called. Sweep
    /// failures are logged and the loop continues; the lazy check in
    /// `validate` keeps expired sessions unusable regardless.
    pub fn start_cleanup_task(&mut self) {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        self.shutdown_tx = Some(shutdown_tx);

        let database = self.database.clone();
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(StdDuration::from_secs(limits::SESSION_CLEANUP_INTERVAL_SECS));
            // First tick fires immediately; skip it so startup is quiet
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match database.delete_expired_sessions(Utc::now()).await {
                            Ok(removed) if removed > 0 => {
                                info!("Session sweep removed {removed} expired sessions");
                            }
                            Ok(_) => {}
                            Err(e) => warn!("Session sweep failed: {e}"),
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        info!("Session cleanup task shutting down");
                        break;
                    }
                }
            }
        });
    }

    /// Signal the background sweep to stop
    pub fn destroy(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Builder for the `Set-Cookie` value the transport layer emits
///
/// The contract: `HttpOnly`, `SameSite=Lax`, path `/`, `Secure` outside
/// development, and `Max-Age` matching the session lifetime.
#[derive(Debug, Clone)]
pub struct SessionCookie {
    session_id: String,
    secure: bool,
    max_age_secs: i64,
}

impl SessionCookie {
    /// Start a cookie for a freshly created or refreshed session
    #[must_use]
    pub fn new(session: &Session) -> Self {
        Self {
            session_id: session.id.clone(),
            secure: true,
            max_age_secs: limits::SESSION_EXPIRY_DAYS * i64::from(crate::constants::time_constants::SECONDS_PER_DAY),
        }
    }

    /// Drop the `Secure` attribute for plain-HTTP development setups
    #[must_use]
    pub const fn insecure_for_development(mut self) -> Self {
        self.secure = false;
        self
    }

    /// Render the full `Set-Cookie` header value
    #[must_use]
    pub fn header_value(&self) -> String {
        let mut value = format!(
            "{}={}; Path={}; HttpOnly; SameSite={}; Max-Age={}",
            cookies::SESSION_COOKIE_NAME,
            self.session_id,
            cookies::COOKIE_PATH,
            cookies::SAME_SITE,
            self.max_age_secs
        );
        if self.secure {
            value.push_str("; Secure");
        }
        value
    }

    /// Render the expired-cookie value that clears the session on logout
    #[must_use]
    pub fn removal_header_value() -> String {
        format!(
            "{}=; Path={}; HttpOnly; SameSite={}; Max-Age=0",
            cookies::SESSION_COOKIE_NAME,
            cookies::COOKIE_PATH,
            cookies::SAME_SITE
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;

    async fn setup() -> (SessionManager, User) {
        let database = Database::new("sqlite::memory:").await.unwrap();
        database.migrate().await.unwrap();
        let user = database
            .create_user(&User::new("alice".into(), None, "api_key"))
            .await
            .unwrap();
        (SessionManager::new(database), user)
    }

    #[tokio::test]
    async fn test_create_and_validate() {
        let (manager, user) = setup().await;
        let session = manager.create(user.id, SessionProvider::ApiKey).await.unwrap();

        let validated = manager.validate(&session.id).await.unwrap().unwrap();
        assert_eq!(validated.user.id, user.id);
        assert_eq!(validated.session.provider, SessionProvider::ApiKey);
        assert!(!validated.needs_refresh);
    }

    #[tokio::test]
    async fn test_unknown_session_is_none_not_error() {
        let (manager, _) = setup().await;
        assert!(manager.validate("no-such-session").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_session_deleted_on_validate() {
        let (manager, user) = setup().await;
        let session = manager.create(user.id, SessionProvider::ApiKey).await.unwrap();

        manager
            .database
            .update_session_expiry(&session.id, Utc::now() - Duration::minutes(1))
            .await
            .unwrap();

        assert!(manager.validate(&session.id).await.unwrap().is_none());
        // The lazy check removed the row
        assert!(manager.database.get_session(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_near_expiry_session_flags_refresh() {
        let (manager, user) = setup().await;
        let session = manager.create(user.id, SessionProvider::OauthGithub).await.unwrap();

        // 23 hours left: inside the 24-hour refresh window, still valid
        manager
            .database
            .update_session_expiry(&session.id, Utc::now() + Duration::hours(23))
            .await
            .unwrap();

        let validated = manager.validate(&session.id).await.unwrap().unwrap();
        assert!(validated.needs_refresh);
    }

    #[tokio::test]
    async fn test_refresh_resets_expiry() {
        let (manager, user) = setup().await;
        let session = manager.create(user.id, SessionProvider::ApiKey).await.unwrap();
        manager
            .database
            .update_session_expiry(&session.id, Utc::now() + Duration::hours(1))
            .await
            .unwrap();

        let refreshed = manager.refresh(&session.id).await.unwrap().unwrap();
        let remaining = refreshed.expires_at - Utc::now();
        assert!(remaining > Duration::days(limits::SESSION_EXPIRY_DAYS - 1));
    }

    #[tokio::test]
    async fn test_refresh_missing_session_is_none() {
        let (manager, _) = setup().await;
        assert!(manager.refresh("gone").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_logout_invalidates_immediately() {
        let (manager, user) = setup().await;
        let session = manager.create(user.id, SessionProvider::ApiKey).await.unwrap();

        assert!(manager.logout(&session.id).await.unwrap());
        assert!(manager.validate(&session.id).await.unwrap().is_none());
        assert!(!manager.logout(&session.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_cleanup_sweeps_only_expired() {
        let (manager, user) = setup().await;
        let live = manager.create(user.id, SessionProvider::ApiKey).await.unwrap();
        let dead = manager.create(user.id, SessionProvider::ApiKey).await.unwrap();
        manager
            .database
            .update_session_expiry(&dead.id, Utc::now() - Duration::minutes(1))
            .await
            .unwrap();

        assert_eq!(manager.cleanup_expired().await.unwrap(), 1);
        assert!(manager.database.get_session(&live.id).await.unwrap().is_some());
        assert!(manager.database.get_session(&dead.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_deleted_user_orphans_session() {
        let (manager, user) = setup().await;
        let session = manager.create(user.id, SessionProvider::ApiKey).await.unwrap();

        manager.database.delete_user(user.id).await.unwrap();
        assert!(manager.validate(&session.id).await.unwrap().is_none());
    }

    #[test]
    fn test_cookie_contract() {
        let session = Session {
            id: "sid123".into(),
            user_id: Uuid::new_v4(),
            provider: SessionProvider::ApiKey,
            created_at: Utc::now(),
            last_active_at: Utc::now(),
            expires_at: Utc::now() + Duration::days(30),
        };

        let value = SessionCookie::new(&session).header_value();
        assert!(value.starts_with("dispatch_session=sid123"));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("SameSite=Lax"));
        assert!(value.contains("Path=/"));
        assert!(value.contains("Secure"));
        assert!(value.contains("Max-Age=2592000"));

        let dev = SessionCookie::new(&session)
            .insecure_for_development()
            .header_value();
        assert!(!dev.contains("Secure"));

        let removal = SessionCookie::removal_header_value();
        assert!(removal.contains("Max-Age=0"));
    }
}
