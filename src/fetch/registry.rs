use crate::error::{FetchError, Result};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// One normalized record, keyed by column name.
pub type Row = Map<String, Value>;

/// Turns one raw API object into zero or more normalized rows.
pub trait RecordFormatter: Send + Sync {
    fn format(&self, record: &Value) -> Result<Vec<Row>>;
}

impl<F> RecordFormatter for F
where
    F: Fn(&Value) -> Result<Vec<Row>> + Send + Sync,
{
    fn format(&self, record: &Value) -> Result<Vec<Row>> {
        self(record)
    }
}

/// Dataset key → formatter, over a closed set of keys fixed at construction.
#[derive(Clone, Default)]
pub struct FormatterRegistry {
    known: BTreeSet<String>,
    formatters: HashMap<String, Arc<dyn RecordFormatter>>,
}

impl FormatterRegistry {
    pub fn new<I, S>(datasets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known: datasets.into_iter().map(Into::into).collect(),
            formatters: HashMap::new(),
        }
    }

    /// Register the formatter for `dataset`, replacing any previous one.
    pub fn register(
        &mut self,
        dataset: &str,
        formatter: impl RecordFormatter + 'static,
    ) -> Result<()> {
        if !self.known.contains(dataset) {
            return Err(FetchError::UnknownDataset(dataset.to_string()));
        }
        self.formatters
            .insert(dataset.to_string(), Arc::new(formatter));
        Ok(())
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(
        mut self,
        dataset: &str,
        formatter: impl RecordFormatter + 'static,
    ) -> Result<Self> {
        self.register(dataset, formatter)?;
        Ok(self)
    }

    pub fn is_known(&self, dataset: &str) -> bool {
        self.known.contains(dataset)
    }

    pub fn datasets(&self) -> impl Iterator<Item = &str> {
        self.known.iter().map(String::as_str)
    }

    pub fn get(&self, dataset: &str) -> Result<&dyn RecordFormatter> {
        self.formatters
            .get(dataset)
            .map(|f| f.as_ref())
            .ok_or_else(|| FetchError::UnknownDataset(dataset.to_string()))
    }

    /// Format every record of `dataset`, preserving record order.
    pub fn format_all(&self, dataset: &str, records: &[Value]) -> Result<Vec<Row>> {
        let formatter = self.get(dataset)?;
        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            rows.extend(formatter.format(record)?);
        }
        Ok(rows)
    }
}

impl std::fmt::Debug for FormatterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut registered: Vec<&String> = self.formatters.keys().collect();
        registered.sort();
        f.debug_struct("FormatterRegistry")
            .field("known", &self.known)
            .field("registered", &registered)
            .finish()
    }
}
