use crate::types::{ConnectorStatus, OAuthConfig};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tabula::{FetchEngine, FetchError, ResourceCollection};
use tracing::warn;

/// Connector interface for OAuth-protected paginated APIs.
///
/// A connector owns a [`FetchEngine`] bound to one connector identity. The
/// OAuth dance and status checks are shared; only dataset dispatch and
/// post-processing are connector-specific.
///
/// # Lifecycle
/// 1. `build_authorization_url()` → user authorizes on the provider's site
/// 2. `retrieve_tokens(callback_url)` stores the token
/// 3. `fetch(dataset, limit)` as often as needed; tokens refresh transparently
///
/// # Example
/// ```no_run
/// use tabula_connectors::{Connector, OAuthConfig};
/// use tabula::{FetchEngine, ResourceCollection};
/// use async_trait::async_trait;
/// use anyhow::Result;
///
/// struct MyConnector {
///     engine: FetchEngine,
/// }
///
/// #[async_trait]
/// impl Connector for MyConnector {
///     fn name(&self) -> &str {
///         "myservice"
///     }
///
///     fn oauth_config(&self) -> OAuthConfig {
///         OAuthConfig {
///             auth_url: "https://api.example.com/oauth/authorize".to_string(),
///             token_url: "https://api.example.com/oauth/token".to_string(),
///             scopes: vec!["read".to_string()],
///         }
///     }
///
///     fn datasets(&self) -> &[&'static str] {
///         &["items"]
///     }
///
///     fn engine(&self) -> &FetchEngine {
///         &self.engine
///     }
///
///     async fn fetch(&self, dataset: &str, limit: i64) -> Result<ResourceCollection> {
///         Ok(self.engine.fetch(dataset, limit).await?)
///     }
/// }
/// ```
#[async_trait]
pub trait Connector: Send + Sync {
    /// Unique lowercase identifier (e.g. "aircall").
    fn name(&self) -> &str;

    fn oauth_config(&self) -> OAuthConfig;

    /// Datasets accepted by [`fetch`](Self::fetch).
    fn datasets(&self) -> &[&'static str];

    fn engine(&self) -> &FetchEngine;

    /// Fetch a dataset as a schema-stable table.
    ///
    /// `limit` is `-1` for all pages, `0` for the empty table, or a page count.
    async fn fetch(&self, dataset: &str, limit: i64) -> Result<ResourceCollection>;

    /// Provider URL the user must visit to grant access.
    fn build_authorization_url(&self) -> Result<String> {
        self.engine()
            .token_manager()
            .build_authorization_url()
            .context("Failed to build authorization URL")
    }

    /// Complete the OAuth flow from the provider's redirect URL.
    async fn retrieve_tokens(&self, authorization_response: &str) -> Result<()> {
        self.engine()
            .token_manager()
            .exchange_code_for_token(authorization_response)
            .await
            .context("Failed to exchange authorization code")
    }

    /// Authenticated GET of an arbitrary API URL.
    async fn fetch_raw(&self, url: &str) -> Result<Value> {
        self.engine()
            .fetch_raw(url)
            .await
            .with_context(|| format!("Failed to fetch {}", url))
    }

    /// Check that a usable access token can be obtained.
    async fn get_status(&self) -> ConnectorStatus {
        match self.engine().token_manager().get_access_token().await {
            Ok(_) => ConnectorStatus::ok(),
            Err(e) => {
                warn!(connector = %self.name(), error = %e, "Connector status check failed");
                match e {
                    FetchError::Transport(_) | FetchError::TokenEndpoint { .. } => {
                        ConnectorStatus::failed("couldn't access API")
                    }
                    _ => ConnectorStatus::failed("Credentials are missing"),
                }
            }
        }
    }
}
