//! Label encoding
//!
//! A [`LabelEncodingMap`] is fit once on the training partition and then
//! applied, unchanged, to every other partition of the same run. Categories
//! are enumerated in sorted order: numerically when every value parses as a
//! number, lexicographically otherwise.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Classes of a single encoded column; a value's code is its index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnEncoding {
    pub classes: Vec<String>,
}

impl ColumnEncoding {
    /// Enumerate the distinct observed values
    pub fn fit<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        let mut classes: Vec<String> = values.into_iter().map(str::to_string).collect();
        classes.sort();
        classes.dedup();

        let numeric: Option<Vec<f64>> = classes.iter().map(|c| c.trim().parse::<f64>().ok()).collect();
        if let Some(keys) = numeric {
            let mut paired: Vec<(f64, String)> = keys.into_iter().zip(classes).collect();
            paired.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
            classes = paired.into_iter().map(|(_, c)| c).collect();
        }

        Self { classes }
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Original value for a code
    pub fn decode(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }
}

/// Per-column encodings fit on the training partition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncodingMap {
    columns: BTreeMap<String, ColumnEncoding>,
}

impl LabelEncodingMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, encoding: ColumnEncoding) {
        self.columns.insert(column.into(), encoding);
    }

    pub fn get(&self, column: &str) -> Option<&ColumnEncoding> {
        self.columns.get(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&String, &ColumnEncoding)> {
        self.columns.iter()
    }

    /// Encode a whole column; values absent from the fitted classes are an error
    pub fn encode_column<'a>(
        &self,
        column: &str,
        values: impl IntoIterator<Item = &'a str>,
    ) -> Result<Vec<i64>> {
        let encoding = self.columns.get(column).ok_or_else(|| {
            PipelineError::Schema(format!("no label encoding fitted for column '{}'", column))
        })?;
        let index: HashMap<&str, i64> = encoding
            .classes
            .iter()
            .enumerate()
            .map(|(code, class)| (class.as_str(), code as i64))
            .collect();

        values
            .into_iter()
            .map(|v| {
                index.get(v).copied().ok_or_else(|| PipelineError::UnseenCategory {
                    column: column.to_string(),
                    value: v.to_string(),
                })
            })
            .collect()
    }
}
