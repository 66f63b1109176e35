// ABOUTME: OAuth flow coordinator - initiation, callback handling, identity reconciliation
// ABOUTME: Owns provider configuration lifecycle including client secret encryption at rest
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! # OAuth Manager
//!
//! Coordinates the full authorization-code flow: `initiate` issues a
//! single-use CSRF state token and the provider redirect URL,
//! `handle_callback` consumes the state, exchanges the code, fetches the
//! profile, and reconciles the external identity into the user registry.
//!
//! The state token is consumed before anything else happens in the
//! callback, so a replayed callback fails closed regardless of what the
//! provider would say about the code.

use super::providers::{build_authorization_url, exchange_code, fetch_profile, ProviderProfile};
use super::{AuthorizationRequest, OAuthProvider, StateTokenStore};
use crate::constants::limits;
use crate::crypto::SecretCipher;
use crate::database_plugins::{factory::Database, DatabaseProvider};
use crate::errors::{AuthError, AuthResult};
use crate::models::{NormalizedIdentity, OAuthProviderConfig, OAuthStateToken, User};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use rand::RngCore;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::{debug, info, warn};

/// Outcome of a completed OAuth callback
#[derive(Debug, Clone)]
pub struct CallbackResult {
    /// The reconciled local user account
    pub user: User,
    /// The normalized external identity that produced it
    pub identity: NormalizedIdentity,
}

/// Coordinates the OAuth authorization-code flow end to end
pub struct OAuthManager {
    database: Database,
    state_store: Arc<dyn StateTokenStore>,
    cipher: Option<Arc<dyn SecretCipher>>,
    http: reqwest::Client,
}

impl OAuthManager {
    /// Create a new OAuth manager
    ///
    /// When `cipher` is `None`, client secrets are stored in plaintext and a
    /// warning is logged each time one is saved.
    ///
    /// # Errors
    ///
    /// Returns `Database` if the HTTP client cannot be constructed
    pub fn new(
        database: Database,
        state_store: Arc<dyn StateTokenStore>,
        cipher: Option<Arc<dyn SecretCipher>>,
    ) -> AuthResult<Self> {
        // Provider endpoints get a hard deadline so a hung token exchange
        // cannot pin a login request indefinitely
        let http = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(limits::OAUTH_HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| AuthError::Database(anyhow::anyhow!("http client build failed: {e}")))?;

        Ok(Self {
            database,
            state_store,
            cipher,
            http,
        })
    }

    /// Start an authorization flow for a provider
    ///
    /// Issues a fresh single-use state token with a 10-minute TTL and builds
    /// the redirect URL the browser should be sent to.
    ///
    /// # Errors
    ///
    /// Returns `OAuthProviderDisabled` when the provider is not configured
    /// or configured but disabled, and `OAuthMissingClientId` when the
    /// stored configuration has an empty client id
    pub async fn initiate(&self, provider: OAuthProvider) -> AuthResult<AuthorizationRequest> {
        let config = self.enabled_config(provider).await?;

        // Opportunistic hygiene; abandoned flows otherwise linger for a full TTL
        let purged = self.state_store.purge_expired(Utc::now()).await;
        if purged > 0 {
            debug!("Purged {purged} expired state tokens");
        }

        let mut state_bytes = [0u8; limits::STATE_TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut state_bytes);
        let state = URL_SAFE_NO_PAD.encode(state_bytes);

        let now = Utc::now();
        self.state_store
            .insert(OAuthStateToken {
                state: state.clone(),
                provider: provider.to_string(),
                created_at: now,
                expires_at: now + Duration::minutes(limits::STATE_TOKEN_EXPIRY_MINUTES),
            })
            .await;

        let url =
            build_authorization_url(provider, &config.client_id, &config.redirect_uri, &state);

        info!("OAuth flow initiated for {provider}");
        Ok(AuthorizationRequest {
            url,
            state,
            provider,
            expires_in_minutes: u32::try_from(limits::STATE_TOKEN_EXPIRY_MINUTES).unwrap_or(10),
        })
    }

    /// Complete an authorization flow from the provider callback
    ///
    /// The state token is taken from the store before any network call, so
    /// presenting the same state twice fails on the second attempt no matter
    /// how the first one ended.
    ///
    /// # Errors
    ///
    /// Returns `StateTokenInvalid` for unknown (or already-used) state,
    /// `StateTokenExpired` past the TTL, `StateTokenProviderMismatch` when
    /// the callback arrived on the wrong provider's route, plus the
    /// exchange and profile errors from the provider layer
    pub async fn handle_callback(
        &self,
        provider: OAuthProvider,
        code: &str,
        state: &str,
    ) -> AuthResult<CallbackResult> {
        let token = self
            .state_store
            .take(state)
            .await
            .ok_or(AuthError::StateTokenInvalid)?;

        if token.is_expired(Utc::now()) {
            return Err(AuthError::StateTokenExpired);
        }
        if token.provider != provider.as_str() {
            return Err(AuthError::StateTokenProviderMismatch {
                expected: token.provider,
                actual: provider.to_string(),
            });
        }

        let config = self.enabled_config(provider).await?;
        let client_secret = self.client_secret_for(&config);

        let access_token = exchange_code(
            &self.http,
            provider,
            &config.client_id,
            &client_secret,
            &config.redirect_uri,
            code,
        )
        .await?;

        let profile = fetch_profile(&self.http, provider, &access_token).await?;
        let identity = normalize_identity(provider, profile);
        let user = self.reconcile_identity(&identity).await?;

        info!(
            "OAuth callback completed for {provider}: external identity {} -> user {}",
            identity.user_id, user.id
        );
        Ok(CallbackResult { user, identity })
    }

    /// Store (or replace) a provider configuration and enable it
    ///
    /// # Errors
    ///
    /// Returns `Validation` for an empty client id and `Database` for
    /// encryption or persistence failures
    pub async fn enable_provider(
        &self,
        provider: OAuthProvider,
        client_id: &str,
        client_secret: &str,
        redirect_uri: &str,
    ) -> AuthResult<()> {
        if client_id.is_empty() {
            return Err(AuthError::validation("client_id must not be empty"));
        }

        let stored_secret = match &self.cipher {
            Some(cipher) => cipher.encrypt(client_secret)?,
            None => {
                warn!(
                    "No master cipher configured; storing {provider} client secret in plaintext"
                );
                client_secret.to_string()
            }
        };

        let now = Utc::now();
        self.database
            .upsert_oauth_config(&OAuthProviderConfig {
                provider: provider.to_string(),
                client_id: client_id.to_string(),
                client_secret: stored_secret,
                redirect_uri: redirect_uri.to_string(),
                enabled: true,
                created_at: now,
                updated_at: now,
            })
            .await?;

        info!("OAuth provider {provider} enabled");
        Ok(())
    }

    /// Disable a provider: new logins are rejected, existing sessions are
    /// untouched
    ///
    /// # Errors
    ///
    /// Returns `OAuthProviderDisabled` when no configuration exists to
    /// disable, or `Database` if the update fails
    pub async fn disable_provider(&self, provider: OAuthProvider) -> AuthResult<()> {
        let updated = self
            .database
            .set_oauth_provider_enabled(provider.as_str(), false)
            .await?;

        if !updated {
            return Err(AuthError::OAuthProviderDisabled(provider.to_string()));
        }

        info!("OAuth provider {provider} disabled");
        Ok(())
    }

    /// Load the configuration for a provider, rejecting missing and disabled
    /// configurations with the errors the flow operations document
    async fn enabled_config(&self, provider: OAuthProvider) -> AuthResult<OAuthProviderConfig> {
        let config = self
            .database
            .get_oauth_config(provider.as_str())
            .await?
            .ok_or_else(|| AuthError::OAuthProviderDisabled(provider.to_string()))?;

        if !config.enabled {
            return Err(AuthError::OAuthProviderDisabled(provider.to_string()));
        }
        if config.client_id.is_empty() {
            return Err(AuthError::OAuthMissingClientId(provider.to_string()));
        }

        Ok(config)
    }

    /// Recover the plaintext client secret from its stored form
    ///
    /// Rows written before a cipher was configured hold plaintext; a failed
    /// decrypt therefore falls back to the stored value with a warning
    /// rather than failing the login outright.
    fn client_secret_for(&self, config: &OAuthProviderConfig) -> String {
        match &self.cipher {
            Some(cipher) => match cipher.decrypt(&config.client_secret) {
                Ok(plaintext) => plaintext,
                Err(e) => {
                    warn!(
                        "Stored {} client secret did not decrypt ({e}); treating it as plaintext",
                        config.provider
                    );
                    config.client_secret.clone()
                }
            },
            None => config.client_secret.clone(),
        }
    }

    /// Map an external identity to a local user, creating one on first login
    ///
    /// Match order: by email when the provider supplied one, then by the
    /// deterministic external username. A matched user gains this provider
    /// in their auth methods; a new user is created with the external id as
    /// their username.
    async fn reconcile_identity(&self, identity: &NormalizedIdentity) -> AuthResult<User> {
        let method = identity.provider.as_str();

        let existing = match &identity.email {
            Some(email) => self.database.get_user_by_email(email).await?,
            None => None,
        };
        let existing = match existing {
            Some(user) => Some(user),
            None => self.database.get_user_by_username(&identity.user_id).await?,
        };

        if let Some(mut user) = existing {
            user.add_auth_method(method);
            if user.email.is_none() {
                user.email.clone_from(&identity.email);
            }
            user.updated_at = Utc::now();
            self.database.update_user(&user).await?;
            return Ok(user);
        }

        let user = User::new(identity.user_id.clone(), identity.email.clone(), method);
        Ok(self.database.create_user(&user).await?)
    }
}

/// Collapse a provider profile into the deterministic external identity
fn normalize_identity(provider: OAuthProvider, profile: ProviderProfile) -> NormalizedIdentity {
    NormalizedIdentity {
        user_id: format!("{provider}_{}", profile.id),
        email: profile.email,
        name: profile.name,
        provider: provider.session_provider(),
        raw_profile: profile.raw,
    }
}
