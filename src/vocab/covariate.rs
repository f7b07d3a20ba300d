//! Categorical encoding of covariate columns.

use crate::data::Variable;
use crate::error::{DatasetError, Result};
use std::collections::HashMap;

/// Level ↔ index mapping for one covariate. Indices follow sorted level order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CovariateEncoding {
    key: String,
    levels: Vec<String>,
    index: HashMap<String, usize>,
}

impl CovariateEncoding {
    pub fn from_values(key: &str, values: &[Variable]) -> Self {
        let levels = Variable::sorted_levels(values);
        let index = levels
            .iter()
            .enumerate()
            .map(|(i, level)| (level.clone(), i))
            .collect();
        Self {
            key: key.to_string(),
            levels,
            index,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Sorted distinct levels.
    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    /// Number of distinct levels.
    pub fn cardinality(&self) -> usize {
        self.levels.len()
    }

    pub fn index_of(&self, level: &str) -> Option<usize> {
        self.index.get(level).copied()
    }

    /// Per-row level indices.
    pub fn encode(&self, values: &[Variable]) -> Result<Vec<usize>> {
        values
            .iter()
            .map(|v| {
                let level = v.key_string();
                self.index_of(&level).ok_or_else(|| {
                    DatasetError::InvalidParameter(format!(
                        "Unknown level '{}' for covariate '{}'",
                        level, self.key
                    ))
                })
            })
            .collect()
    }
}

/// Encodings for every covariate, in covariate-key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CovariateVocabulary {
    encodings: Vec<CovariateEncoding>,
}

impl CovariateVocabulary {
    /// Build one encoding per `(key, column)` pair.
    pub fn from_columns(columns: &[(&str, &[Variable])]) -> Self {
        Self {
            encodings: columns
                .iter()
                .map(|(key, values)| CovariateEncoding::from_values(key, values))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.encodings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encodings.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.encodings.iter().map(CovariateEncoding::key)
    }

    pub fn get(&self, key: &str) -> Option<&CovariateEncoding> {
        self.encodings.iter().find(|e| e.key == key)
    }

    pub fn encodings(&self) -> &[CovariateEncoding] {
        &self.encodings
    }

    /// Number of levels per covariate (`num_covariates`).
    pub fn cardinalities(&self) -> Vec<usize> {
        self.encodings.iter().map(CovariateEncoding::cardinality).collect()
    }
}
