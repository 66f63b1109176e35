// ABOUTME: Provider-specific OAuth plumbing - authorization URLs, token exchange, profile fetch
// ABOUTME: Carries each provider's header scheme and the offline-profile fallback table
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! # OAuth Provider Implementations
//!
//! The HTTP half of the OAuth flow. Each provider has its own auth scheme
//! for the profile endpoint: GitHub wants a `token`-scheme Authorization
//! header plus an explicit API version header, Google takes a standard
//! Bearer token. Assuming one universal scheme is exactly the kind of bug
//! this module exists to contain.

use super::OAuthProvider;
use crate::errors::{AuthError, AuthResult};
use serde::Deserialize;
use tracing::warn;

/// Normalized provider profile before identity reconciliation
#[derive(Debug, Clone)]
pub struct ProviderProfile {
    /// Provider-scoped profile id
    pub id: String,
    /// Email, when the granted scopes expose one
    pub email: Option<String>,
    /// Display name, when present
    pub name: Option<String>,
    /// Raw profile payload for diagnostics
    pub raw: serde_json::Value,
}

/// Token endpoint response shared by both providers
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Build the provider authorization URL for a browser redirect
#[must_use]
pub fn build_authorization_url(
    provider: OAuthProvider,
    client_id: &str,
    redirect_uri: &str,
    state: &str,
) -> String {
    format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
        provider.authorize_endpoint(),
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(provider.scopes()),
        urlencoding::encode(state)
    )
}

/// Exchange an authorization code for an access token
///
/// # Errors
///
/// Returns `TokenExchangeFailed` for transport failures (including the
/// request timeout), non-success statuses, and error-bearing bodies. This
/// step is never retried.
pub async fn exchange_code(
    http: &reqwest::Client,
    provider: OAuthProvider,
    client_id: &str,
    client_secret: &str,
    redirect_uri: &str,
    code: &str,
) -> AuthResult<String> {
    let params = [
        ("client_id", client_id),
        ("client_secret", client_secret),
        ("code", code),
        ("redirect_uri", redirect_uri),
        ("grant_type", "authorization_code"),
    ];

    let response = http
        .post(provider.token_endpoint())
        .header("Accept", "application/json")
        .form(&params)
        .send()
        .await
        .map_err(|e| AuthError::TokenExchangeFailed(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(AuthError::TokenExchangeFailed(format!(
            "{provider} token endpoint returned HTTP {status}"
        )));
    }

    let token_response: TokenResponse = response
        .json()
        .await
        .map_err(|e| AuthError::TokenExchangeFailed(format!("parse error: {e}")))?;

    if let Some(error) = token_response.error {
        let description = token_response.error_description.unwrap_or_default();
        return Err(AuthError::TokenExchangeFailed(format!(
            "{provider} rejected the code: {error} {description}"
        )));
    }

    token_response
        .access_token
        .ok_or_else(|| AuthError::TokenExchangeFailed(format!("{provider} returned no access_token")))
}

/// Whether a profile-fetch failure should degrade to the offline profile
///
/// These provider+status pairs indicate a scope or permission gap rather
/// than a true auth failure; failing the whole login for them would lock
/// out users whose tokens are otherwise perfectly valid.
#[must_use]
pub const fn offline_fallback_applies(provider: OAuthProvider, status: u16) -> bool {
    match provider {
        OAuthProvider::GitHub | OAuthProvider::Google => status == 403,
    }
}

/// The synthesized minimal profile used when the fallback applies
#[must_use]
pub fn offline_profile(provider: OAuthProvider) -> ProviderProfile {
    ProviderProfile {
        id: format!("offline_{provider}"),
        email: None,
        name: Some(provider.display_name().to_string()),
        raw: serde_json::Value::Null,
    }
}

/// Fetch the user profile with the provider's own auth scheme and headers
///
/// # Errors
///
/// Returns `ProfileFetchFailed` for transport failures and non-success
/// statuses outside the documented fallback table
pub async fn fetch_profile(
    http: &reqwest::Client,
    provider: OAuthProvider,
    access_token: &str,
) -> AuthResult<ProviderProfile> {
    let request = match provider {
        OAuthProvider::GitHub => http
            .get(provider.profile_endpoint())
            // GitHub's non-standard bearer scheme and mandatory version header
            .header("Authorization", format!("token {access_token}"))
            .header("X-GitHub-Api-Version", "2022-11-28")
            .header("User-Agent", "dispatch-auth"),
        OAuthProvider::Google => http
            .get(provider.profile_endpoint())
            .header("Authorization", format!("Bearer {access_token}")),
    };

    let response = request.send().await.map_err(|e| {
        warn!("Profile fetch transport failure for {provider}: {e}");
        AuthError::ProfileFetchFailed {
            provider: provider.to_string(),
            status: 0,
        }
    })?;

    let status = response.status().as_u16();
    if !response.status().is_success() {
        if offline_fallback_applies(provider, status) {
            warn!(
                "Profile fetch for {provider} returned HTTP {status} (scope gap); \
                 continuing with offline profile"
            );
            return Ok(offline_profile(provider));
        }
        return Err(AuthError::ProfileFetchFailed {
            provider: provider.to_string(),
            status,
        });
    }

    let raw: serde_json::Value =
        response
            .json()
            .await
            .map_err(|_| AuthError::ProfileFetchFailed {
                provider: provider.to_string(),
                status,
            })?;

    Ok(parse_profile(provider, raw))
}

/// Extract the normalized fields from a provider profile payload
fn parse_profile(provider: OAuthProvider, raw: serde_json::Value) -> ProviderProfile {
    match provider {
        OAuthProvider::GitHub => {
            // GitHub ids are numeric; logins double as display names
            let id = raw
                .get("id")
                .and_then(serde_json::Value::as_i64)
                .map_or_else(String::new, |n| n.to_string());
            let name = raw
                .get("name")
                .and_then(serde_json::Value::as_str)
                .or_else(|| raw.get("login").and_then(serde_json::Value::as_str))
                .map(ToString::to_string);
            let email = raw
                .get("email")
                .and_then(serde_json::Value::as_str)
                .map(ToString::to_string);
            ProviderProfile {
                id,
                email,
                name,
                raw,
            }
        }
        OAuthProvider::Google => {
            let id = raw
                .get("id")
                .and_then(serde_json::Value::as_str)
                .map_or_else(String::new, ToString::to_string);
            let name = raw
                .get("name")
                .and_then(serde_json::Value::as_str)
                .map(ToString::to_string);
            let email = raw
                .get("email")
                .and_then(serde_json::Value::as_str)
                .map(ToString::to_string);
            ProviderProfile {
                id,
                email,
                name,
                raw,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_authorization_url_encodes_parameters() {
        let url = build_authorization_url(
            OAuthProvider::GitHub,
            "client id",
            "https://dispatch.example/oauth/callback",
            "state+token",
        );
        assert!(url.starts_with("https://github.com/login/oauth/authorize?"));
        assert!(url.contains("client_id=client%20id"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fdispatch.example%2Foauth%2Fcallback"));
        assert!(url.contains("state=state%2Btoken"));
        assert!(url.contains("response_type=code"));
    }

    #[test]
    fn test_fallback_table() {
        assert!(offline_fallback_applies(OAuthProvider::GitHub, 403));
        assert!(offline_fallback_applies(OAuthProvider::Google, 403));
        assert!(!offline_fallback_applies(OAuthProvider::GitHub, 401));
        assert!(!offline_fallback_applies(OAuthProvider::Google, 500));
    }

    #[test]
    fn test_offline_profile_shape() {
        let profile = offline_profile(OAuthProvider::GitHub);
        assert_eq!(profile.id, "offline_github");
        assert_eq!(profile.email, None);
        assert_eq!(profile.name.as_deref(), Some("GitHub"));
    }

    #[test]
    fn test_parse_github_profile() {
        let profile = parse_profile(
            OAuthProvider::GitHub,
            json!({"id": 583231, "login": "octocat", "name": null, "email": "octo@github.com"}),
        );
        assert_eq!(profile.id, "583231");
        assert_eq!(profile.name.as_deref(), Some("octocat"));
        assert_eq!(profile.email.as_deref(), Some("octo@github.com"));
    }

    #[test]
    fn test_parse_google_profile() {
        let profile = parse_profile(
            OAuthProvider::Google,
            json!({"id": "10769150350006", "name": "Ada", "email": "ada@example.com"}),
        );
        assert_eq!(profile.id, "10769150350006");
        assert_eq!(profile.name.as_deref(), Some("Ada"));
        assert_eq!(profile.email.as_deref(), Some("ada@example.com"));
    }
}
