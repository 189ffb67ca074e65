use super::page::{PageOutcome, PageRequest, PageResult};
use super::transport::{QueryBuilder, Transport};
use crate::config::FetchConfig;
use crate::error::{FetchError, Result};
use std::time::Duration;
use tracing::{debug, error, info};

/// Bound and pacing of retries on API-level errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Requests allowed for one page, the first one included
    pub max_attempts: u32,
    /// Fixed wait between a failed attempt and the next
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

impl From<&FetchConfig> for RetryPolicy {
    fn from(config: &FetchConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: config.backoff(),
        }
    }
}

/// Fetches single pages, retrying the identical request on error envelopes.
///
/// Holds no traversal state, so one fetcher can serve several concurrent
/// drivers.
pub struct PageFetcher<'a> {
    transport: &'a dyn Transport,
    query: &'a dyn QueryBuilder,
    retry: RetryPolicy,
}

impl<'a> PageFetcher<'a> {
    pub fn new(transport: &'a dyn Transport, query: &'a dyn QueryBuilder, retry: RetryPolicy) -> Self {
        Self {
            transport,
            query,
            retry,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Fetch one page.
    ///
    /// An error envelope is retried after `backoff` until `max_attempts`
    /// requests have been made; the last payload is then returned in
    /// [`FetchError::RemoteApi`]. Transport failures and malformed bodies are
    /// returned immediately.
    pub async fn fetch_page(&self, request: &PageRequest) -> Result<PageResult> {
        let url = self.query.page_url(request);
        let page = request.page_number();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let body = self.transport.get_json(&url).await?;
            info!(
                dataset = %request.dataset,
                page = page,
                attempt = attempt,
                "Page request sent"
            );

            let payload = match PageOutcome::parse(&request.dataset, body)? {
                PageOutcome::Page(result) => return Ok(result),
                PageOutcome::ApiError(payload) => payload,
            };

            error!(
                dataset = %request.dataset,
                page = page,
                attempt = attempt,
                error = %payload,
                "API returned an error envelope"
            );

            if attempt >= self.retry.max_attempts {
                error!(
                    dataset = %request.dataset,
                    page = page,
                    "Aborting requests, retries exhausted"
                );
                return Err(FetchError::RemoteApi {
                    dataset: request.dataset.clone(),
                    attempts: attempt,
                    payload,
                });
            }

            debug!(
                dataset = %request.dataset,
                delay_ms = self.retry.backoff.as_millis() as u64,
                "Backing off before retry"
            );
            tokio::time::sleep(self.retry.backoff).await;
        }
    }
}
