//! Page requests and the response envelope.
//!
//! ```json
//! {
//!   "error": "optional, API-level failure",
//!   "meta": {"next_page_link": "https://..." | null, "current_page": 1},
//!   "<dataset>": [ {..}, {..} ]
//! }
//! ```

use crate::error::{FetchError, Result};
use serde_json::Value;

/// One page of one dataset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub dataset: String,
    /// `None` requests the first page
    pub page: Option<u64>,
    pub per_page: u32,
}

impl PageRequest {
    pub fn first(dataset: impl Into<String>, per_page: u32) -> Self {
        Self {
            dataset: dataset.into(),
            page: None,
            per_page,
        }
    }

    /// 1-based page number sent to the API.
    pub fn page_number(&self) -> u64 {
        self.page.unwrap_or(1)
    }

    pub fn with_page(&self, page: u64) -> Self {
        Self {
            page: Some(page),
            ..self.clone()
        }
    }
}

/// Successfully parsed page.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PageResult {
    pub records: Vec<Value>,
    pub next_page_link: Option<String>,
    pub current_page: Option<u64>,
}

impl PageResult {
    pub fn has_next(&self) -> bool {
        self.next_page_link.is_some()
    }

    /// Page number to request after this one.
    ///
    /// Only meaningful when [`has_next`](Self::has_next) is true; a next link
    /// without `meta.current_page` leaves no way to continue.
    pub fn next_page(&self) -> Result<u64> {
        self.current_page.map(|page| page + 1).ok_or_else(|| {
            FetchError::MalformedResponse(
                "meta.next_page_link is set but meta.current_page is missing".to_string(),
            )
        })
    }
}

/// What a response body turned out to be.
#[derive(Debug, PartialEq)]
pub enum PageOutcome {
    Page(PageResult),
    /// The API reported an error; the payload is the `error` field
    ApiError(Value),
}

impl PageOutcome {
    /// Classify a response body for `dataset`.
    ///
    /// A truthy `error` field wins over everything else. Otherwise the
    /// dataset-named array is required.
    pub fn parse(dataset: &str, body: Value) -> Result<Self> {
        let Value::Object(mut body) = body else {
            return Err(FetchError::MalformedResponse(format!(
                "response for '{}' is not a JSON object",
                dataset
            )));
        };

        if let Some(error) = body.remove("error").filter(is_truthy) {
            return Ok(PageOutcome::ApiError(error));
        }

        let records = match body.remove(dataset) {
            Some(Value::Array(records)) => records,
            Some(_) => {
                return Err(FetchError::MalformedResponse(format!(
                    "'{}' is not an array",
                    dataset
                )))
            }
            None => {
                return Err(FetchError::MalformedResponse(format!(
                    "missing '{}' key in response",
                    dataset
                )))
            }
        };

        let meta = body.get("meta");
        let next_page_link = meta
            .and_then(|m| m.get("next_page_link"))
            .and_then(|link| link.as_str())
            .map(|link| link.to_string());
        let current_page = meta
            .and_then(|m| m.get("current_page"))
            .and_then(|page| page.as_u64());

        Ok(PageOutcome::Page(PageResult {
            records,
            next_page_link,
            current_page,
        }))
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Number(_) => true,
    }
}
