//! Token endpoint calls: authorization-code exchange and refresh.

use super::provider::OAuthProviderConfig;
use crate::credentials::{epoch_seconds_option, OAuthToken};
use crate::error::{FetchError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

/// Standard OAuth 2.0 token response.
///
/// Some providers answer with an absolute `expires_at` (epoch seconds, possibly
/// fractional) instead of `expires_in`; both are accepted.
#[derive(Deserialize, Debug)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default, deserialize_with = "epoch_seconds_option::deserialize")]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
}

impl TokenResponse {
    fn into_token(self, now: DateTime<Utc>) -> OAuthToken {
        let expires_at = match (self.expires_at, self.expires_in) {
            (Some(at), _) => Some(at),
            (None, Some(seconds)) => Some(now + Duration::seconds(seconds)),
            (None, None) => None,
        };

        OAuthToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            scope: self.scope,
            token_type: self.token_type,
        }
    }
}

/// Exchange an authorization code for a token.
///
/// Client credentials travel in the form body; several providers reject
/// HTTP basic auth on their token endpoint.
pub async fn exchange_code_for_token(
    client: &reqwest::Client,
    provider: &OAuthProviderConfig,
    code: &str,
) -> Result<OAuthToken> {
    let form = [
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", provider.redirect_uri.as_str()),
        ("client_id", provider.client_id.as_str()),
        ("client_secret", provider.client_secret.as_str()),
    ];

    tracing::debug!("Exchanging authorization code for token at {}", provider.token_url);
    let response = post_token_form(client, &provider.token_url, &form).await?;

    tracing::debug!(
        "Token exchange successful, has_refresh_token={}, expires_in={:?}",
        response.refresh_token.is_some(),
        response.expires_in
    );

    Ok(response.into_token(Utc::now()))
}

/// Obtain a new access token with `grant_type=refresh_token`.
///
/// Providers that do not rotate refresh tokens omit it from the response; the
/// previous one is carried over in that case.
pub async fn refresh_access_token(
    client: &reqwest::Client,
    provider: &OAuthProviderConfig,
    refresh_token: &str,
) -> Result<OAuthToken> {
    let form = [
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
        ("client_id", provider.client_id.as_str()),
        ("client_secret", provider.client_secret.as_str()),
    ];

    let response = post_token_form(client, &provider.token_url, &form).await?;
    let mut token = response.into_token(Utc::now());
    if token.refresh_token.is_none() {
        token.refresh_token = Some(refresh_token.to_string());
    }
    Ok(token)
}

async fn post_token_form(
    client: &reqwest::Client,
    token_url: &str,
    form: &[(&str, &str)],
) -> Result<TokenResponse> {
    let response = client
        .post(token_url)
        .header("Accept", "application/json")
        .form(form)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<failed to read body>".to_string());
        return Err(FetchError::TokenEndpoint {
            status: status.as_u16(),
            body,
        });
    }

    let body = response.text().await?;
    serde_json::from_str(&body)
        .map_err(|e| FetchError::MalformedResponse(format!("token response: {}", e)))
}
