//! The raw perturbation record set: annotations, responses and schema metadata.

use crate::data::{ObsTable, ResponseMatrix};
use crate::de_genes::DeGeneTable;
use crate::error::{DatasetError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Physical column(s) a logical field maps to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldMapping {
    /// A single column.
    Column(String),
    /// A list of columns (covariates).
    Columns(Vec<String>),
}

impl FieldMapping {
    /// The mapped columns as a list.
    pub fn columns(&self) -> Vec<String> {
        match self {
            FieldMapping::Column(c) => vec![c.clone()],
            FieldMapping::Columns(cs) => cs.clone(),
        }
    }
}

/// Schema metadata mapping logical field names to physical columns.
pub type FieldMap = HashMap<String, FieldMapping>;

/// A raw record set as handed over by the storage reader.
#[derive(Debug, Clone)]
pub struct PerturbationData {
    obs: ObsTable,
    response: ResponseMatrix,
    fields: FieldMap,
    /// Unstructured cache, currently only used for DE gene tables.
    uns: HashMap<String, Arc<DeGeneTable>>,
}

impl PerturbationData {
    /// Pair an annotation table with its response matrix.
    pub fn new(obs: ObsTable, response: ResponseMatrix) -> Result<Self> {
        if obs.n_rows() != response.n_samples() {
            return Err(DatasetError::DimensionMismatch {
                expected: response.n_samples(),
                actual: obs.n_rows(),
            });
        }
        Ok(Self {
            obs,
            response,
            fields: FieldMap::new(),
            uns: HashMap::new(),
        })
    }

    /// Attach schema metadata.
    pub fn with_fields(mut self, fields: FieldMap) -> Self {
        self.fields = fields;
        self
    }

    /// Register one logical → physical field mapping.
    pub fn map_field(&mut self, logical: &str, mapping: FieldMapping) {
        self.fields.insert(logical.to_string(), mapping);
    }

    /// Number of samples.
    pub fn n_samples(&self) -> usize {
        self.obs.n_rows()
    }

    pub fn obs(&self) -> &ObsTable {
        &self.obs
    }

    pub fn response(&self) -> &ResponseMatrix {
        &self.response
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    /// A cached DE gene table, if present.
    pub fn de_genes(&self, key: &str) -> Option<Arc<DeGeneTable>> {
        self.uns.get(key).cloned()
    }

    /// Store a DE gene table under `key`.
    pub fn cache_de_genes(&mut self, key: &str, table: Arc<DeGeneTable>) {
        self.uns.insert(key.to_string(), table);
    }
}
