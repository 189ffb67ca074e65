use super::driver::PaginationDriver;
use super::fetcher::PageFetcher;
use super::registry::{FormatterRegistry, Row};
use super::FetchLimit;
use crate::error::Result;
use futures::future::try_join_all;
use tracing::{debug, info};

/// Fetches several datasets concurrently over one transport session.
///
/// Each dataset gets its own [`PaginationDriver`] and therefore its own
/// traversal state. The drivers are polled together on the calling task; the
/// first failure drops every in-flight traversal and discards what the others
/// had already collected.
pub struct ConcurrentCollector<'a> {
    fetcher: PageFetcher<'a>,
    page_size: u32,
    registry: &'a FormatterRegistry,
}

impl<'a> ConcurrentCollector<'a> {
    pub fn new(fetcher: PageFetcher<'a>, page_size: u32, registry: &'a FormatterRegistry) -> Self {
        Self {
            fetcher,
            page_size,
            registry,
        }
    }

    /// Fetch and format every dataset, returning rows in the order of `datasets`.
    pub async fn collect(&self, datasets: &[&str], limit: FetchLimit) -> Result<Vec<Vec<Row>>> {
        // Fail on an unformattable dataset before spending any request.
        for dataset in datasets {
            self.registry.get(dataset)?;
        }

        let driver = PaginationDriver::new(&self.fetcher, self.page_size);
        debug!(datasets = ?datasets, limit = ?limit, "Starting concurrent collection");

        let sessions = try_join_all(datasets.iter().map(|dataset| driver.run(dataset, limit))).await?;

        let mut collected = Vec::with_capacity(sessions.len());
        for (dataset, session) in datasets.iter().zip(sessions) {
            let records = session.into_records();
            let rows = self.registry.format_all(dataset, &records)?;
            info!(
                dataset = %dataset,
                records = records.len(),
                rows = rows.len(),
                "Dataset collected"
            );
            collected.push(rows);
        }

        Ok(collected)
    }
}
