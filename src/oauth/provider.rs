//! OAuth provider configuration.
//!
//! Endpoints and scopes are fixed per connector; client credentials and the
//! redirect URI come from the environment.

use crate::error::{FetchError, Result};
use serde::{Deserialize, Serialize};

/// Everything needed to talk to one provider's authorization and token endpoints.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OAuthProviderConfig {
    /// Authorization endpoint the user is redirected to
    pub auth_url: String,

    /// Token endpoint (code exchange and refresh)
    pub token_url: String,

    pub scopes: Vec<String>,

    pub client_id: String,

    pub client_secret: String,

    /// Callback URL registered with the provider
    pub redirect_uri: String,
}

impl OAuthProviderConfig {
    /// Build the authorization request URL for a given `state` nonce.
    pub fn build_auth_url(&self, state: &str) -> String {
        let scopes = self.scopes.join(" ");
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}",
            self.auth_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&scopes),
            urlencoding::encode(state)
        )
    }

    /// Load client credentials for `connector_name` from the environment.
    ///
    /// Reads `TABULA_OAUTH_{NAME}_CLIENT_ID`, `TABULA_OAUTH_{NAME}_CLIENT_SECRET`
    /// and `TABULA_OAUTH_REDIRECT_URI`.
    pub fn from_env(
        connector_name: &str,
        auth_url: &str,
        token_url: &str,
        scopes: &[&str],
    ) -> Result<Self> {
        let env_prefix = connector_name.to_uppercase().replace('-', "_");
        let client_id = require_env(&format!("TABULA_OAUTH_{}_CLIENT_ID", env_prefix))?;
        let client_secret = require_env(&format!("TABULA_OAUTH_{}_CLIENT_SECRET", env_prefix))?;
        let redirect_uri = require_env("TABULA_OAUTH_REDIRECT_URI")?;

        Ok(Self {
            auth_url: auth_url.to_string(),
            token_url: token_url.to_string(),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            client_id,
            client_secret,
            redirect_uri,
        })
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| FetchError::Config(format!("{} not set", name)))
}
