pub mod api;
pub mod config;
pub mod transformer;

use crate::{Connector, OAuthConfig};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tabula::credentials::SecretStore;
use tabula::{FetchConfig, FetchEngine, FetchError, OAuthProviderConfig, ResourceCollection, TokenManager};
use tracing::info;

use self::api::AircallQuery;
use self::config::BASE_URL;
use self::transformer::{calls_with_teams, users_with_teams, CALLS, TAGS, TEAMS, USERS};

/// Aircall connector: `calls`, `users` and `tags` tables.
///
/// `calls` and `users` are fetched together with `teams`, which supplies the
/// team of each call and the team memberships of users.
pub struct AircallConnector {
    engine: FetchEngine,
}

impl AircallConnector {
    /// Create a connector using the real Aircall API base URL.
    pub fn new(
        identity: &str,
        provider: OAuthProviderConfig,
        store: Arc<dyn SecretStore>,
        config: FetchConfig,
    ) -> Result<Self> {
        Self::with_base_url(identity, provider, store, config, BASE_URL)
    }

    /// Create a connector with a custom API base URL (for testing).
    pub fn with_base_url(
        identity: &str,
        provider: OAuthProviderConfig,
        store: Arc<dyn SecretStore>,
        config: FetchConfig,
        base_url: &str,
    ) -> Result<Self> {
        let tokens = Arc::new(TokenManager::new(identity, provider, store));
        let registry = transformer::formatters().context("Failed to register Aircall formatters")?;
        let engine = FetchEngine::new(
            tokens,
            Arc::new(AircallQuery::new(base_url)),
            registry,
            transformer::assembler(),
            config,
        );
        Ok(Self { engine })
    }

    /// Create a connector with OAuth client settings from the environment.
    pub fn from_env(identity: &str, store: Arc<dyn SecretStore>, config: FetchConfig) -> Result<Self> {
        Self::new(identity, config::provider_from_env()?, store, config)
    }
}

#[async_trait]
impl Connector for AircallConnector {
    fn name(&self) -> &str {
        "aircall"
    }

    fn oauth_config(&self) -> OAuthConfig {
        config::oauth_config()
    }

    fn datasets(&self) -> &[&'static str] {
        &[CALLS, USERS, TAGS]
    }

    fn engine(&self) -> &FetchEngine {
        &self.engine
    }

    async fn fetch(&self, dataset: &str, limit: i64) -> Result<ResourceCollection> {
        let collection = match dataset {
            TAGS => self.engine.fetch(TAGS, limit).await?,
            CALLS => {
                let (calls, teams) = self.engine.fetch_with_auxiliary(CALLS, TEAMS, limit).await?;
                calls_with_teams(calls, &teams)
            }
            USERS => {
                let (users, teams) = self.engine.fetch_with_auxiliary(USERS, TEAMS, limit).await?;
                users_with_teams(&users, &teams)
            }
            other => return Err(FetchError::UnknownDataset(other.to_string()).into()),
        };

        info!(
            dataset = %dataset,
            rows = collection.len(),
            "Aircall dataset fetched"
        );
        Ok(collection)
    }
}
