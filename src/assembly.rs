//! Normalization of formatted rows into schema-stable collections.
//!
//! A dataset always comes back with the same columns in the same order, even
//! when nothing was fetched.

use crate::error::{FetchError, Result};
use crate::fetch::Row;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// Ordered column list of a dataset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<String>,
}

impl Schema {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Empty collection carrying this schema.
    pub fn empty(&self, dataset: &str) -> ResourceCollection {
        ResourceCollection {
            dataset: dataset.to_string(),
            columns: self.columns.clone(),
            rows: Vec::new(),
        }
    }

    /// Collection holding `rows` projected onto this schema.
    pub fn collect<'r, I>(&self, dataset: &str, rows: I) -> ResourceCollection
    where
        I: IntoIterator<Item = &'r Row>,
    {
        let mut collection = self.empty(dataset);
        for row in rows {
            collection.push(row);
        }
        collection
    }
}

/// Tabular result of one dataset.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResourceCollection {
    pub dataset: String,
    pub columns: Vec<String>,
    /// Each row is aligned with `columns`
    pub rows: Vec<Vec<Value>>,
}

impl ResourceCollection {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append `row`; absent columns become `null`, keys outside the schema are dropped.
    pub fn push(&mut self, row: &Row) {
        let values = self
            .columns
            .iter()
            .map(|column| row.get(column).cloned().unwrap_or(Value::Null))
            .collect();
        self.rows.push(values);
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Every value of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[index]).collect())
    }

    /// Rows back as column-keyed objects.
    pub fn to_records(&self) -> Vec<Row> {
        self.rows
            .iter()
            .map(|values| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(values.iter().cloned())
                    .collect()
            })
            .collect()
    }
}

/// Builds [`ResourceCollection`]s from a per-dataset schema table.
#[derive(Clone, Debug, Default)]
pub struct ResultAssembler {
    schemas: HashMap<String, Schema>,
}

impl ResultAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(mut self, dataset: &str, schema: Schema) -> Self {
        self.schemas.insert(dataset.to_string(), schema);
        self
    }

    pub fn schema(&self, dataset: &str) -> Result<&Schema> {
        self.schemas
            .get(dataset)
            .ok_or_else(|| FetchError::UnknownDataset(dataset.to_string()))
    }

    /// The empty-schema template for `dataset`.
    pub fn empty(&self, dataset: &str) -> Result<ResourceCollection> {
        Ok(self.schema(dataset)?.empty(dataset))
    }

    pub fn assemble(&self, dataset: &str, rows: &[Row]) -> Result<ResourceCollection> {
        Ok(self.schema(dataset)?.collect(dataset, rows))
    }
}
