use super::fetcher::PageFetcher;
use super::page::{PageRequest, PageResult};
use super::FetchLimit;
use crate::error::Result;
use serde_json::Value;
use tracing::{debug, info};

/// Traversal state of one dataset. Never shared between datasets.
#[derive(Debug, Default)]
pub struct FetchSession {
    pub pages: Vec<PageResult>,
    /// Pages fetched so far
    pub passes: u32,
}

impl FetchSession {
    pub fn record_count(&self) -> usize {
        self.pages.iter().map(|p| p.records.len()).sum()
    }

    /// All records, in page order.
    pub fn into_records(self) -> Vec<Value> {
        self.pages.into_iter().flat_map(|p| p.records).collect()
    }
}

/// Walks the pages of one dataset with a [`PageFetcher`].
///
/// Traversal is a loop, not recursion: page N+1 is requested only once page N
/// has been appended, and the stack stays flat however many pages there are.
pub struct PaginationDriver<'f> {
    fetcher: &'f PageFetcher<'f>,
    page_size: u32,
}

impl<'f> PaginationDriver<'f> {
    pub fn new(fetcher: &'f PageFetcher<'f>, page_size: u32) -> Self {
        Self { fetcher, page_size }
    }

    /// Fetch `dataset` until the API reports no next page or `limit` is reached.
    ///
    /// `FetchLimit::Skip` returns an empty session without any request.
    pub async fn run(&self, dataset: &str, limit: FetchLimit) -> Result<FetchSession> {
        let mut session = FetchSession::default();
        if limit.is_skip() {
            debug!(dataset = %dataset, "Limit is 0, skipping traversal");
            return Ok(session);
        }

        let mut request = PageRequest::first(dataset, self.page_size);
        loop {
            let page = self.fetcher.fetch_page(&request).await?;
            session.passes += 1;

            if !page.has_next() {
                session.pages.push(page);
                break;
            }
            if limit.reached(session.passes) {
                session.pages.push(page);
                debug!(
                    dataset = %dataset,
                    passes = session.passes,
                    "Limit reached, remaining pages not fetched"
                );
                break;
            }

            // Only read once another page will actually be requested.
            let next = page.next_page()?;
            session.pages.push(page);
            request = request.with_page(next);
        }

        info!(
            dataset = %dataset,
            passes = session.passes,
            records = session.record_count(),
            "Dataset traversal complete"
        );
        Ok(session)
    }
}
