use crate::assembly::{ResourceCollection, ResultAssembler};
use crate::config::FetchConfig;
use crate::error::Result;
use crate::fetch::{
    ConcurrentCollector, FetchLimit, FormatterRegistry, HttpSessionFactory, PageFetcher,
    QueryBuilder, RetryPolicy, Row, SessionFactory,
};
use crate::oauth::TokenManager;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Entry point used by connectors: token, traversal, formatting and assembly.
///
/// Every batch obtains the access token once, opens one transport session
/// with it and drops the session when the batch ends, on success or failure.
pub struct FetchEngine {
    tokens: Arc<TokenManager>,
    query: Arc<dyn QueryBuilder>,
    sessions: Arc<dyn SessionFactory>,
    registry: FormatterRegistry,
    assembler: ResultAssembler,
    config: FetchConfig,
}

impl FetchEngine {
    pub fn new(
        tokens: Arc<TokenManager>,
        query: Arc<dyn QueryBuilder>,
        registry: FormatterRegistry,
        assembler: ResultAssembler,
        config: FetchConfig,
    ) -> Self {
        let sessions = Arc::new(HttpSessionFactory::new(config.clone()));
        Self {
            tokens,
            query,
            sessions,
            registry,
            assembler,
            config,
        }
    }

    /// Replace the HTTP session factory.
    pub fn with_sessions(mut self, sessions: Arc<dyn SessionFactory>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn token_manager(&self) -> &TokenManager {
        &self.tokens
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetch one dataset.
    ///
    /// `limit` is `-1` for every page, `0` for the empty-schema result without
    /// any token lookup or request, or the maximum number of pages.
    pub async fn fetch(&self, dataset: &str, limit: i64) -> Result<ResourceCollection> {
        let limit = FetchLimit::try_from(limit)?;
        let schema = self.assembler.schema(dataset)?;
        if limit.is_skip() {
            debug!(dataset = %dataset, "Limit is 0, returning empty result");
            return Ok(schema.empty(dataset));
        }

        let mut rows = self.collect(&[dataset], limit).await?;
        let rows = rows.pop().unwrap_or_default();
        Ok(schema.collect(dataset, &rows))
    }

    /// Fetch a dataset together with an auxiliary lookup dataset.
    ///
    /// Both traversals share one token and run concurrently under the same
    /// `limit`. Each collection is assembled with its own schema.
    pub async fn fetch_with_auxiliary(
        &self,
        dataset: &str,
        auxiliary: &str,
        limit: i64,
    ) -> Result<(ResourceCollection, ResourceCollection)> {
        let limit = FetchLimit::try_from(limit)?;
        let primary_schema = self.assembler.schema(dataset)?;
        let auxiliary_schema = self.assembler.schema(auxiliary)?;
        if limit.is_skip() {
            return Ok((
                primary_schema.empty(dataset),
                auxiliary_schema.empty(auxiliary),
            ));
        }

        let collected = self.collect(&[dataset, auxiliary], limit).await?;
        let mut collected = collected.into_iter();
        let primary_rows = collected.next().unwrap_or_default();
        let auxiliary_rows = collected.next().unwrap_or_default();

        Ok((
            primary_schema.collect(dataset, &primary_rows),
            auxiliary_schema.collect(auxiliary, &auxiliary_rows),
        ))
    }

    /// Single authenticated GET of an arbitrary URL, without envelope parsing.
    pub async fn fetch_raw(&self, url: &str) -> Result<Value> {
        let access_token = self.tokens.get_access_token().await?;
        let transport = self.sessions.open(&access_token)?;
        debug!(url = %url, "Raw authenticated request");
        transport.get_json(url).await
    }

    async fn collect(&self, datasets: &[&str], limit: FetchLimit) -> Result<Vec<Vec<Row>>> {
        let access_token = self.tokens.get_access_token().await?;
        let transport = self.sessions.open(&access_token)?;

        let fetcher = PageFetcher::new(
            transport.as_ref(),
            self.query.as_ref(),
            RetryPolicy::from(&self.config),
        );
        let collector = ConcurrentCollector::new(fetcher, self.config.page_size, &self.registry);
        let collected = collector.collect(datasets, limit).await?;

        info!(
            identity = %self.tokens.identity(),
            datasets = ?datasets,
            "Fetch batch complete"
        );
        Ok(collected)
    }
}
