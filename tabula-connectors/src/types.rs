use serde::{Deserialize, Serialize};

/// OAuth endpoints and scopes of a connector.
///
/// Client credentials are deployment-specific and loaded separately, see
/// [`tabula::OAuthProviderConfig::from_env`].
///
/// # Example
/// ```
/// use tabula_connectors::OAuthConfig;
///
/// let config = OAuthConfig {
///     auth_url: "https://dashboard.aircall.io/oauth/authorize".to_string(),
///     token_url: "https://api.aircall.io/v1/oauth/token".to_string(),
///     scopes: vec!["public_api".to_string()],
/// };
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// OAuth authorization endpoint URL
    pub auth_url: String,

    /// OAuth token exchange endpoint URL
    pub token_url: String,

    /// Required OAuth scopes for this connector
    pub scopes: Vec<String>,
}

/// Whether a connector can currently reach its API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorStatus {
    pub status: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConnectorStatus {
    pub fn ok() -> Self {
        Self {
            status: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: false,
            error: Some(error.into()),
        }
    }
}
