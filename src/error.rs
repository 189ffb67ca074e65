//! Error taxonomy for the fetch engine.
//!
//! Only [`FetchError::RemoteApi`] is produced after local retries. Every other
//! variant is fatal and propagates to the caller of `fetch` unchanged.

use thiserror::Error;

/// Result alias used throughout the engine.
pub type Result<T, E = FetchError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum FetchError {
    /// No token is stored for the connector identity.
    #[error("no credentials stored for connector '{0}'")]
    NoCredentials(String),

    /// The stored token has expired and cannot be refreshed.
    #[error("access token for connector '{0}' expired and no refresh token is stored")]
    NoRefreshToken(String),

    /// The `state` returned by the provider differs from the persisted one.
    #[error("OAuth state mismatch for connector '{0}' (possible CSRF)")]
    AuthMismatch(String),

    /// The provider redirected back with an `error` parameter.
    #[error("OAuth authorization denied: {error} - {description}")]
    AuthorizationDenied { error: String, description: String },

    /// The API kept answering with an error envelope after all attempts.
    #[error("remote API error for dataset '{dataset}' after {attempts} attempts: {payload}")]
    RemoteApi {
        dataset: String,
        attempts: u32,
        payload: serde_json::Value,
    },

    /// A field the engine depends on is missing from a response.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// A dataset key that is not part of the connector's declared set.
    #[error("unknown dataset '{0}'")]
    UnknownDataset(String),

    #[error("invalid fetch limit {0} (expected -1, 0 or a positive integer)")]
    InvalidLimit(i64),

    /// The token endpoint answered with a non-2xx status.
    #[error("token endpoint returned status {status}: {body}")]
    TokenEndpoint { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("secret store error: {0:#}")]
    SecretStore(anyhow::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl FetchError {
    /// Authentication failures that need a new OAuth dance rather than a retry.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            FetchError::NoCredentials(_)
                | FetchError::NoRefreshToken(_)
                | FetchError::AuthMismatch(_)
                | FetchError::AuthorizationDenied { .. }
        )
    }
}
