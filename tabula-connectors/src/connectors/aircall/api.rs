use tabula::fetch::{PageRequest, QueryBuilder};

/// Builds Aircall list endpoints: `{base_url}/{dataset}?per_page=N&page=P`.
pub struct AircallQuery {
    base_url: String,
}

impl AircallQuery {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl QueryBuilder for AircallQuery {
    fn page_url(&self, request: &PageRequest) -> String {
        format!(
            "{}/{}?per_page={}&page={}",
            self.base_url,
            request.dataset,
            request.per_page,
            request.page_number()
        )
    }
}
