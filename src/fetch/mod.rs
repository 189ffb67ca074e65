//! Authenticated paginated fetching.
//!
//! ```text
//! ConcurrentCollector ── one PaginationDriver per dataset (interleaved on one task)
//!          │                         │
//!          │                   PageFetcher (bounded retry, fixed backoff)
//!          │                         │
//!          └──────────────── Transport (one session per batch)
//! ```

mod collector;
mod driver;
mod fetcher;
mod page;
mod registry;
mod transport;

pub use collector::ConcurrentCollector;
pub use driver::{FetchSession, PaginationDriver};
pub use fetcher::{PageFetcher, RetryPolicy};
pub use page::{PageOutcome, PageRequest, PageResult};
pub use registry::{FormatterRegistry, RecordFormatter, Row};
pub use transport::{
    HttpSessionFactory, HttpTransport, QueryBuilder, SessionFactory, Transport,
};

use crate::error::{FetchError, Result};
use std::num::NonZeroU32;

/// How far a dataset traversal may go.
///
/// Built from the integer limit used by data sources: `-1` unbounded, `0` no
/// fetch at all, `N > 0` at most `N` pages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchLimit {
    Unbounded,
    Skip,
    Passes(NonZeroU32),
}

impl FetchLimit {
    pub fn is_skip(&self) -> bool {
        matches!(self, FetchLimit::Skip)
    }

    /// Whether `passes` completed pages have used up the limit.
    pub fn reached(&self, passes: u32) -> bool {
        match self {
            FetchLimit::Unbounded => false,
            FetchLimit::Skip => true,
            FetchLimit::Passes(max) => passes >= max.get(),
        }
    }
}

impl TryFrom<i64> for FetchLimit {
    type Error = FetchError;

    fn try_from(limit: i64) -> Result<Self> {
        match limit {
            -1 => Ok(FetchLimit::Unbounded),
            0 => Ok(FetchLimit::Skip),
            n if n > 0 => u32::try_from(n)
                .ok()
                .and_then(NonZeroU32::new)
                .map(FetchLimit::Passes)
                .ok_or(FetchError::InvalidLimit(limit)),
            _ => Err(FetchError::InvalidLimit(limit)),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted transport for counting requests without a server.

    use super::page::PageRequest;
    use super::transport::{QueryBuilder, SessionFactory, Transport};
    use crate::error::{FetchError, Result};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};

    /// Builds `mock://{dataset}?per_page={n}&page={p}`.
    pub struct MockQuery;

    impl QueryBuilder for MockQuery {
        fn page_url(&self, request: &PageRequest) -> String {
            format!(
                "mock://{}?per_page={}&page={}",
                request.dataset,
                request.per_page,
                request.page_number()
            )
        }
    }

    /// Answers each URL from its own queue of bodies and records every call.
    #[derive(Clone, Default)]
    pub struct ScriptedTransport {
        responses: Arc<Mutex<HashMap<String, VecDeque<Value>>>>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(&self, url: &str, body: Value) -> &Self {
            self.responses
                .lock()
                .unwrap()
                .entry(url.to_string())
                .or_default()
                .push_back(body);
            self
        }

        /// Scripts `pages` consecutive pages of `per_page` records for `dataset`.
        pub fn paginate(&self, dataset: &str, per_page: u32, pages: u64) -> &Self {
            for page in 1..=pages {
                let next = if page < pages {
                    json!(format!("mock://{}?page={}", dataset, page + 1))
                } else {
                    Value::Null
                };
                let records: Vec<Value> = (0..per_page)
                    .map(|i| json!({"id": format!("{}-{}-{}", dataset, page, i)}))
                    .collect();
                let mut body = json!({"meta": {"next_page_link": next, "current_page": page}});
                body[dataset] = Value::Array(records);
                self.respond(&url(dataset, per_page, page), body);
            }
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    pub fn url(dataset: &str, per_page: u32, page: u64) -> String {
        format!("mock://{}?per_page={}&page={}", dataset, per_page, page)
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn get_json(&self, url: &str) -> Result<Value> {
            self.calls.lock().unwrap().push(url.to_string());
            // Yield so concurrent drivers actually interleave
            tokio::task::yield_now().await;
            self.responses
                .lock()
                .unwrap()
                .get_mut(url)
                .and_then(|queue| queue.pop_front())
                .ok_or_else(|| FetchError::MalformedResponse(format!("unscripted url {}", url)))
        }
    }

    /// Hands out clones of one scripted transport and remembers the tokens used.
    #[derive(Clone, Default)]
    pub struct ScriptedSessions {
        pub transport: ScriptedTransport,
        pub opened_with: Arc<Mutex<Vec<String>>>,
    }

    impl SessionFactory for ScriptedSessions {
        fn open(&self, access_token: &str) -> Result<Box<dyn Transport>> {
            self.opened_with
                .lock()
                .unwrap()
                .push(access_token.to_string());
            Ok(Box::new(self.transport.clone()))
        }
    }
}
