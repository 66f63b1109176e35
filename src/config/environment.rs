// ABOUTME: Environment-based configuration loading for the auth core
// ABOUTME: Development gets warned fallbacks, production fails fast on missing secrets
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! # Environment Configuration
//!
//! All runtime configuration arrives through environment variables. The
//! rule is strictness by deployment tier: development fills gaps with
//! loudly-logged fallbacks so a fresh checkout runs, production refuses to
//! start without its secrets.

use crate::auth::generate_jwt_secret;
use crate::constants::env_config;
use crate::oauth::OAuthProvider;
use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose, Engine};
use std::env;
use std::str::FromStr;
use tracing::warn;

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Testing,
}

impl Environment {
    /// Whether this tier tolerates generated fallback secrets
    #[must_use]
    pub const fn allows_fallbacks(self) -> bool {
        matches!(self, Self::Development | Self::Testing)
    }
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "testing" | "test" => Ok(Self::Testing),
            other => Err(anyhow!("unknown environment: {other}")),
        }
    }
}

/// Credentials for one OAuth application, as supplied by the operator
#[derive(Debug, Clone)]
pub struct OAuthAppConfig {
    pub client_id: String,
    pub client_secret: String,
}

/// Fully resolved runtime configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Deployment tier
    pub environment: Environment,
    /// Database connection string
    pub database_url: String,
    /// Shared secret for the legacy JWT auth method
    pub jwt_secret: Vec<u8>,
    /// Master key for client secret encryption at rest, when configured
    pub master_encryption_key: Option<[u8; 32]>,
    /// Public base URL used to build OAuth redirect URIs
    pub base_url: String,
    /// GitHub OAuth application, when configured
    pub github: Option<OAuthAppConfig>,
    /// Google OAuth application, when configured
    pub google: Option<OAuthAppConfig>,
}

impl AuthConfig {
    /// Load configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns an error in production when `DATABASE_URL` or the JWT secret
    /// is missing, and in any tier when a supplied value does not parse
    pub fn from_env() -> Result<Self> {
        let environment = match env::var(env_config::ENVIRONMENT) {
            Ok(value) => value.parse()?,
            Err(_) => Environment::Development,
        };

        let database_url = match env::var(env_config::DATABASE_URL) {
            Ok(url) => url,
            Err(_) if environment.allows_fallbacks() => {
                warn!("{} not set; using local sqlite file", env_config::DATABASE_URL);
                "sqlite:dispatch_auth.db".to_string()
            }
            Err(_) => {
                return Err(anyhow!(
                    "{} is required in production",
                    env_config::DATABASE_URL
                ))
            }
        };

        let jwt_secret = match env::var(env_config::JWT_SECRET) {
            Ok(encoded) => general_purpose::STANDARD
                .decode(&encoded)
                .with_context(|| format!("{} is not valid base64", env_config::JWT_SECRET))?,
            Err(_) if environment.allows_fallbacks() => {
                warn!(
                    "{} not set; generating an ephemeral secret (tokens will not \
                     survive a restart)",
                    env_config::JWT_SECRET
                );
                generate_jwt_secret().to_vec()
            }
            Err(_) => {
                return Err(anyhow!(
                    "{} is required in production",
                    env_config::JWT_SECRET
                ))
            }
        };

        let master_encryption_key = match env::var(env_config::MASTER_ENCRYPTION_KEY) {
            Ok(encoded) => {
                let bytes = general_purpose::STANDARD.decode(&encoded).with_context(|| {
                    format!("{} is not valid base64", env_config::MASTER_ENCRYPTION_KEY)
                })?;
                let key: [u8; 32] = bytes.try_into().map_err(|_| {
                    anyhow!(
                        "{} must decode to exactly 32 bytes",
                        env_config::MASTER_ENCRYPTION_KEY
                    )
                })?;
                Some(key)
            }
            Err(_) => {
                warn!(
                    "{} not set; OAuth client secrets will be stored in plaintext",
                    env_config::MASTER_ENCRYPTION_KEY
                );
                None
            }
        };

        let base_url = env::var(env_config::BASE_URL).unwrap_or_else(|_| {
            warn!("{} not set; defaulting to localhost", env_config::BASE_URL);
            "http://localhost:8081".to_string()
        });

        Ok(Self {
            environment,
            database_url,
            jwt_secret,
            master_encryption_key,
            base_url,
            github: oauth_app_from_env(
                env_config::GITHUB_CLIENT_ID,
                env_config::GITHUB_CLIENT_SECRET,
            ),
            google: oauth_app_from_env(
                env_config::GOOGLE_CLIENT_ID,
                env_config::GOOGLE_CLIENT_SECRET,
            ),
        })
    }

    /// The callback URI to register with a provider, derived from `base_url`
    #[must_use]
    pub fn redirect_uri(&self, provider: OAuthProvider) -> String {
        format!("{}/auth/oauth/{provider}/callback", self.base_url)
    }
}

/// Read one provider's application credentials, requiring both halves
fn oauth_app_from_env(id_var: &str, secret_var: &str) -> Option<OAuthAppConfig> {
    match (env::var(id_var), env::var(secret_var)) {
        (Ok(client_id), Ok(client_secret)) => Some(OAuthAppConfig {
            client_id,
            client_secret,
        }),
        (Ok(_), Err(_)) | (Err(_), Ok(_)) => {
            warn!("Ignoring partial OAuth configuration: need both {id_var} and {secret_var}");
            None
        }
        (Err(_), Err(_)) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parsing() {
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Development);
        assert_eq!(
            "Production".parse::<Environment>().unwrap(),
            Environment::Production
        );
        assert_eq!("test".parse::<Environment>().unwrap(), Environment::Testing);
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn test_fallback_policy() {
        assert!(Environment::Development.allows_fallbacks());
        assert!(Environment::Testing.allows_fallbacks());
        assert!(!Environment::Production.allows_fallbacks());
    }

    #[test]
    fn test_redirect_uri_shape() {
        let config = AuthConfig {
            environment: Environment::Development,
            database_url: "sqlite::memory:".into(),
            jwt_secret: vec![0; 64],
            master_encryption_key: None,
            base_url: "https://dispatch.example".into(),
            github: None,
            google: None,
        };
        assert_eq!(
            config.redirect_uri(OAuthProvider::GitHub),
            "https://dispatch.example/auth/oauth/github/callback"
        );
    }
}
