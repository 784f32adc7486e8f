use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Column-ordered numeric feature table, the pipeline's output.
///
/// One row per input document in input order, one column per
/// engineered feature. Columns are appended as they are computed and
/// must all carry exactly `row_count` values; rows are never
/// reordered, so row i lines up with input document i everywhere.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    row_count: usize,
    columns: IndexMap<String, Vec<f64>>,
}

impl FeatureTable {
    pub fn new(row_count: usize) -> Self {
        FeatureTable {
            row_count,
            columns: IndexMap::new(),
        }
    }

    /// Append a column.
    ///
    /// # Errors
    /// `Error::DimensionMismatch` when `values` does not carry one
    /// entry per row; `Error::Configuration` when the name is taken.
    pub fn add_column(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        let name = name.into();
        if values.len() != self.row_count {
            return Err(Error::DimensionMismatch {
                expected: self.row_count,
                got: values.len(),
            });
        }
        if self.columns.contains_key(&name) {
            return Err(Error::Configuration(format!(
                "feature column {name:?} already exists"
            )));
        }
        self.columns.insert(name, values);
        Ok(())
    }

    #[inline]
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    #[inline]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column values by feature name.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    /// Feature names in the order the columns were appended.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// One aligned numeric row across all columns, in column order;
    /// the shape a downstream boosted-tree model consumes.
    pub fn row(&self, index: usize) -> Option<Vec<f64>> {
        if index >= self.row_count {
            return None;
        }
        Some(self.columns.values().map(|column| column[index]).collect())
    }
}
