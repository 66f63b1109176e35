// ABOUTME: SQLite implementation of the DatabaseProvider trait using sqlx
// ABOUTME: Owns schema migration, row mapping, and the atomic expiry sweep statement
//! SQLite database implementation
//!
//! Timestamps are stored as RFC3339 text in UTC, which keeps lexicographic
//! and chronological ordering identical; the expiry sweep relies on that.

use super::DatabaseProvider;
use crate::models::{ApiKey, OAuthProviderConfig, Session, SshKey, User, UserListing};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Row, Sqlite, SqlitePool};
use uuid::Uuid;

/// SQLite database implementation
#[derive(Clone)]
pub struct SqliteDatabase {
    pool: Pool<Sqlite>,
}

impl SqliteDatabase {
    fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
        let id_str: String = row.try_get("id")?;
        let id = Uuid::parse_str(&id_str)?;

        let username: String = row.try_get("username")?;
        let email: Option<String> = row.try_get("email")?;
        let is_admin: bool = row.try_get("is_admin")?;

        let auth_methods_json: String = row.try_get("auth_methods")?;
        let auth_methods: Vec<String> = serde_json::from_str(&auth_methods_json)?;

        let created_at_str: String = row.try_get("created_at")?;
        let created_at = DateTime::parse_from_rfc3339(&created_at_str)?.with_timezone(&Utc);

        let updated_at_str: String = row.try_get("updated_at")?;
        let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)?.with_timezone(&Utc);

        Ok(User {
            id,
            username,
            email,
            is_admin,
            auth_methods,
            created_at,
            updated_at,
        })
    }

    fn row_to_api_key(row: &sqlx::sqlite::SqliteRow) -> Result<ApiKey> {
        let user_id_str: String = row.try_get("user_id")?;
        let created_at_str: String = row.try_get("created_at")?;
        let last_used_at_str: Option<String> = row.try_get("last_used_at")?;

        let last_used_at = match last_used_at_str {
            Some(s) => Some(DateTime::parse_from_rfc3339(&s)?.with_timezone(&Utc)),
            None => None,
        };

        Ok(ApiKey {
            id: row.try_get("id")?,
            user_id: Uuid::parse_str(&user_id_str)?,
            label: row.try_get("label")?,
            key_hash: row.try_get("key_hash")?,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)?.with_timezone(&Utc),
            last_used_at,
            disabled: row.try_get("disabled")?,
        })
    }

    fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> Result<Session> {
        let user_id_str: String = row.try_get("user_id")?;
        let provider_str: String = row.try_get("provider")?;
        let created_at_str: String = row.try_get("created_at")?;
        let last_active_str: String = row.try_get("last_active_at")?;
        let expires_at_str: String = row.try_get("expires_at")?;

        Ok(Session {
            id: row.try_get("id")?,
            user_id: Uuid::parse_str(&user_id_str)?,
            provider: provider_str
                .parse()
                .map_err(|e| anyhow::anyhow!("corrupt session provider column: {e}"))?,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)?.with_timezone(&Utc),
            last_active_at: DateTime::parse_from_rfc3339(&last_active_str)?.with_timezone(&Utc),
            expires_at: DateTime::parse_from_rfc3339(&expires_at_str)?.with_timezone(&Utc),
        })
    }

    fn row_to_ssh_key(row: &sqlx::sqlite::SqliteRow) -> Result<SshKey> {
        let user_id_str: String = row.try_get("user_id")?;
        let created_at_str: String = row.try_get("created_at")?;

        Ok(SshKey {
            id: row.try_get("id")?,
            user_id: Uuid::parse_str(&user_id_str)?,
            public_key: row.try_get("public_key")?,
            fingerprint: row.try_get("fingerprint")?,
            name: row.try_get("name")?,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)?.with_timezone(&Utc),
        })
    }

    fn row_to_oauth_config(row: &sqlx::sqlite::SqliteRow) -> Result<OAuthProviderConfig> {
        let created_at_str: String = row.try_get("created_at")?;
        let updated_at_str: String = row.try_get("updated_at")?;

        Ok(OAuthProviderConfig {
            provider: row.try_get("provider")?,
            client_id: row.try_get("client_id")?,
            client_secret: row.try_get("client_secret")?,
            redirect_uri: row.try_get("redirect_uri")?,
            enabled: row.try_get("enabled")?,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)?.with_timezone(&Utc),
            updated_at: DateTime::parse_from_rfc3339(&updated_at_str)?.with_timezone(&Utc),
        })
    }
}

#[async_trait]
impl DatabaseProvider for SqliteDatabase {
    async fn new(database_url: &str) -> Result<Self> {
        // Ensure SQLite creates the database file if it doesn't exist
        let connection_options = if database_url.starts_with("sqlite:")
            && !database_url.contains(":memory:")
            && !database_url.contains('?')
        {
            format!("{database_url}?mode=rwc")
        } else {
            database_url.to_string()
        };

        let pool = SqlitePool::connect(&connection_options).await?;
        let db = Self { pool };
        db.migrate().await?;

        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT UNIQUE NOT NULL,
                email TEXT UNIQUE,
                is_admin BOOLEAN NOT NULL DEFAULT 0,
                auth_methods TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_email ON users(email)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS auth_sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                provider TEXT NOT NULL,
                created_at TEXT NOT NULL,
                last_active_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_auth_sessions_expires_at ON auth_sessions(expires_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS auth_api_keys (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                key_hash TEXT NOT NULL,
                label TEXT NOT NULL,
                created_at TEXT NOT NULL,
                last_used_at TEXT,
                disabled BOOLEAN NOT NULL DEFAULT 0,
                FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS ssh_keys (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                public_key TEXT NOT NULL,
                fingerprint TEXT UNIQUE NOT NULL,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS oauth_config (
                provider TEXT PRIMARY KEY,
                client_id TEXT NOT NULL,
                client_secret TEXT NOT NULL,
                redirect_uri TEXT NOT NULL,
                enabled BOOLEAN NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_user(&self, user: &User) -> Result<User> {
        // The first-user admin grant must be decided in the same transaction
        // as the insert; a read-then-write check would let two concurrent
        // first logins both become admin.
        let mut tx = self.pool.begin().await?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&mut *tx)
            .await?;
        let is_admin = user.is_admin || count == 0;

        sqlx::query(
            r"
            INSERT INTO users (id, username, email, is_admin, auth_methods, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(user.id.to_string())
        .bind(&user.username)
        .bind(&user.email)
        .bind(is_admin)
        .bind(serde_json::to_string(&user.auth_methods)?)
        .bind(user.created_at.to_rfc3339())
        .bind(user.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let mut stored = user.clone();
        stored.is_admin = is_admin;
        Ok(stored)
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?1")
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_user(&row)?)),
            None => Ok(None),
        }
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE email = ?1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_user(&row)?)),
            None => Ok(None),
        }
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE username = ?1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_user(&row)?)),
            None => Ok(None),
        }
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            r"
            UPDATE users
            SET username = ?2, email = ?3, is_admin = ?4, auth_methods = ?5, updated_at = ?6
            WHERE id = ?1
            ",
        )
        .bind(user.id.to_string())
        .bind(&user.username)
        .bind(&user.email)
        .bind(user.is_admin)
        .bind(serde_json::to_string(&user.auth_methods)?)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<bool> {
        // Explicit cascade inside one transaction; PRAGMA foreign_keys is
        // per-connection in SQLite, so the FK clauses alone are not enough.
        let mut tx = self.pool.begin().await?;
        let id = user_id.to_string();

        sqlx::query("DELETE FROM auth_sessions WHERE user_id = ?1")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM ssh_keys WHERE user_id = ?1")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM auth_api_keys WHERE user_id = ?1")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(&id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_user_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn get_all_users(&self) -> Result<Vec<UserListing>> {
        let rows = sqlx::query(
            r"
            SELECT u.*,
                   (SELECT MAX(s.created_at) FROM auth_sessions s WHERE s.user_id = u.id)
                       AS last_login_at
            FROM users u
            ORDER BY u.created_at
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut listings = Vec::with_capacity(rows.len());
        for row in rows {
            let user = Self::row_to_user(&row)?;
            let last_login_str: Option<String> = row.try_get("last_login_at")?;
            let last_login_at = match last_login_str {
                Some(s) => Some(DateTime::parse_from_rfc3339(&s)?.with_timezone(&Utc)),
                None => None,
            };
            listings.push(UserListing {
                user,
                last_login_at,
            });
        }

        Ok(listings)
    }

    async fn create_api_key(&self, api_key: &ApiKey) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO auth_api_keys (id, user_id, key_hash, label, created_at, last_used_at, disabled)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(&api_key.id)
        .bind(api_key.user_id.to_string())
        .bind(&api_key.key_hash)
        .bind(&api_key.label)
        .bind(api_key.created_at.to_rfc3339())
        .bind(api_key.last_used_at.map(|t| t.to_rfc3339()))
        .bind(api_key.disabled)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_active_api_keys(&self) -> Result<Vec<ApiKey>> {
        let rows = sqlx::query("SELECT * FROM auth_api_keys WHERE disabled = 0")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_api_key).collect()
    }

    async fn get_user_api_keys(&self, user_id: Uuid) -> Result<Vec<ApiKey>> {
        let rows =
            sqlx::query("SELECT * FROM auth_api_keys WHERE user_id = ?1 ORDER BY created_at")
                .bind(user_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        rows.iter().map(Self::row_to_api_key).collect()
    }

    async fn set_api_key_disabled(
        &self,
        key_id: &str,
        user_id: Uuid,
        disabled: bool,
    ) -> Result<bool> {
        let result =
            sqlx::query("UPDATE auth_api_keys SET disabled = ?3 WHERE id = ?1 AND user_id = ?2")
                .bind(key_id)
                .bind(user_id.to_string())
                .bind(disabled)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_api_key(&self, key_id: &str, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM auth_api_keys WHERE id = ?1 AND user_id = ?2")
            .bind(key_id)
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_api_key_last_used(&self, key_id: &str, when: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE auth_api_keys SET last_used_at = ?2 WHERE id = ?1")
            .bind(key_id)
            .bind(when.to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn create_session(&self, session: &Session) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO auth_sessions (id, user_id, provider, created_at, last_active_at, expires_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(&session.id)
        .bind(session.user_id.to_string())
        .bind(session.provider.as_str())
        .bind(session.created_at.to_rfc3339())
        .bind(session.last_active_at.to_rfc3339())
        .bind(session.expires_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        let row = sqlx::query("SELECT * FROM auth_sessions WHERE id = ?1")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_session(&row)?)),
            None => Ok(None),
        }
    }

    async fn touch_session(&self, session_id: &str, when: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE auth_sessions SET last_active_at = ?2 WHERE id = ?1")
            .bind(session_id)
            .bind(when.to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn update_session_expiry(
        &self,
        session_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query("UPDATE auth_sessions SET expires_at = ?2 WHERE id = ?1")
            .bind(session_id)
            .bind(expires_at.to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_session(&self, session_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM auth_sessions WHERE id = ?1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
        // One atomic statement: the condition is evaluated against the live
        // row at delete time, so a refresh racing the sweep cannot lose a
        // session whose expiry was just extended.
        let result = sqlx::query("DELETE FROM auth_sessions WHERE expires_at < ?1")
            .bind(now.to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn create_ssh_key(&self, key: &SshKey) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO ssh_keys (id, user_id, public_key, fingerprint, name, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(&key.id)
        .bind(key.user_id.to_string())
        .bind(&key.public_key)
        .bind(&key.fingerprint)
        .bind(&key.name)
        .bind(key.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_user_ssh_keys(&self, user_id: Uuid) -> Result<Vec<SshKey>> {
        let rows = sqlx::query("SELECT * FROM ssh_keys WHERE user_id = ?1 ORDER BY created_at")
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_ssh_key).collect()
    }

    async fn get_ssh_key_by_fingerprint(&self, fingerprint: &str) -> Result<Option<SshKey>> {
        let row = sqlx::query("SELECT * FROM ssh_keys WHERE fingerprint = ?1")
            .bind(fingerprint)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_ssh_key(&row)?)),
            None => Ok(None),
        }
    }

    async fn delete_ssh_key(&self, key_id: &str, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM ssh_keys WHERE id = ?1 AND user_id = ?2")
            .bind(key_id)
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn upsert_oauth_config(&self, config: &OAuthProviderConfig) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO oauth_config (provider, client_id, client_secret, redirect_uri, enabled, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(provider) DO UPDATE SET
                client_id = excluded.client_id,
                client_secret = excluded.client_secret,
                redirect_uri = excluded.redirect_uri,
                enabled = excluded.enabled,
                updated_at = excluded.updated_at
            ",
        )
        .bind(&config.provider)
        .bind(&config.client_id)
        .bind(&config.client_secret)
        .bind(&config.redirect_uri)
        .bind(config.enabled)
        .bind(config.created_at.to_rfc3339())
        .bind(config.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_oauth_config(&self, provider: &str) -> Result<Option<OAuthProviderConfig>> {
        let row = sqlx::query("SELECT * FROM oauth_config WHERE provider = ?1")
            .bind(provider)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_oauth_config(&row)?)),
            None => Ok(None),
        }
    }

    async fn set_oauth_provider_enabled(&self, provider: &str, enabled: bool) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE oauth_config SET enabled = ?2, updated_at = ?3 WHERE provider = ?1",
        )
        .bind(provider)
        .bind(enabled)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
