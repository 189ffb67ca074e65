//! Authorization state (CSRF nonce) and callback parsing.

use crate::error::{FetchError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Nonce persisted between building the authorization URL and the callback.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationState {
    pub state: String,
}

impl AuthorizationState {
    pub fn generate() -> Self {
        Self {
            state: Uuid::new_v4().to_string(),
        }
    }

    /// Reads the nonce from a stored secret document, if it carries one.
    pub fn from_document(document: &serde_json::Value) -> Option<Self> {
        document
            .get("state")
            .and_then(|s| s.as_str())
            .map(|state| Self {
                state: state.to_string(),
            })
    }
}

/// Query parameters of the provider redirect.
#[derive(Debug, Deserialize)]
pub struct AuthorizationCallback {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl AuthorizationCallback {
    /// Parse the full redirect URL (or a bare query string).
    pub fn parse(authorization_response: &str) -> Result<Self> {
        let without_fragment = authorization_response
            .split_once('#')
            .map_or(authorization_response, |(head, _)| head);
        let query = without_fragment
            .split_once('?')
            .map_or(without_fragment, |(_, query)| query);

        serde_urlencoded::from_str(query)
            .map_err(|e| FetchError::MalformedResponse(format!("authorization response: {}", e)))
    }

    /// Returns `(code, state)`, turning a provider error into `AuthorizationDenied`.
    pub fn into_grant(self) -> Result<(String, String)> {
        if let Some(error) = self.error {
            return Err(FetchError::AuthorizationDenied {
                error,
                description: self
                    .error_description
                    .unwrap_or_else(|| "Unknown error".to_string()),
            });
        }

        let code = self.code.ok_or_else(|| {
            FetchError::MalformedResponse("missing 'code' parameter".to_string())
        })?;
        let state = self.state.ok_or_else(|| {
            FetchError::MalformedResponse("missing 'state' parameter".to_string())
        })?;
        Ok((code, state))
    }
}
