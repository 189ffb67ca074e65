use crate::OAuthConfig;
use anyhow::{Context, Result};
use tabula::OAuthProviderConfig;

pub const BASE_URL: &str = "https://api.aircall.io/v1";
pub const AUTH_URL: &str = "https://dashboard-v2.aircall.io/oauth/authorize";
pub const TOKEN_URL: &str = "https://api.aircall.io/v1/oauth/token";
pub const SCOPES: &[&str] = &["public_api"];

/// Aircall OAuth client settings.
///
/// Loads client ID and secret from environment variables:
/// - `TABULA_OAUTH_AIRCALL_CLIENT_ID`
/// - `TABULA_OAUTH_AIRCALL_CLIENT_SECRET`
/// - `TABULA_OAUTH_REDIRECT_URI`
pub fn provider_from_env() -> Result<OAuthProviderConfig> {
    OAuthProviderConfig::from_env("aircall", AUTH_URL, TOKEN_URL, SCOPES)
        .context("Aircall OAuth client is not configured")
}

pub fn oauth_config() -> OAuthConfig {
    OAuthConfig {
        auth_url: AUTH_URL.to_string(),
        token_url: TOKEN_URL.to_string(),
        scopes: SCOPES.iter().map(|s| s.to_string()).collect(),
    }
}
