//! Outbound HTTP session used for one fetch batch.

use super::page::PageRequest;
use crate::config::FetchConfig;
use crate::error::{FetchError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde_json::Value;

/// Authenticated GET returning a parsed JSON body.
///
/// Network-level failures are returned as-is and never retried by the engine.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_json(&self, url: &str) -> Result<Value>;
}

/// Builds the request URL for a page. Implemented per connector.
pub trait QueryBuilder: Send + Sync {
    fn page_url(&self, request: &PageRequest) -> String;
}

/// Opens a [`Transport`] bound to one access token.
///
/// The engine opens a session right before a batch and drops it when the
/// batch ends, whatever the outcome.
pub trait SessionFactory: Send + Sync {
    fn open(&self, access_token: &str) -> Result<Box<dyn Transport>>;
}

/// reqwest-backed transport carrying a bearer token on every request.
pub struct HttpTransport {
    http_client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(access_token: &str, config: &FetchConfig) -> Result<Self> {
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", access_token))
            .map_err(|_| FetchError::Config("access token is not a valid header value".to_string()))?;
        bearer.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.as_str())
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self { http_client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, url: &str) -> Result<Value> {
        let response = self.http_client.get(url).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        // Error envelopes usually come with a 4xx/5xx status; the body decides.
        serde_json::from_slice(&body).map_err(|e| {
            FetchError::MalformedResponse(format!(
                "status {} with non-JSON body from {}: {}",
                status, url, e
            ))
        })
    }
}

/// Default [`SessionFactory`]: one [`HttpTransport`] per batch.
pub struct HttpSessionFactory {
    config: FetchConfig,
}

impl HttpSessionFactory {
    pub fn new(config: FetchConfig) -> Self {
        Self { config }
    }
}

impl SessionFactory for HttpSessionFactory {
    fn open(&self, access_token: &str) -> Result<Box<dyn Transport>> {
        Ok(Box::new(HttpTransport::new(access_token, &self.config)?))
    }
}
