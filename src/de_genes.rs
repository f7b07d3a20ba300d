//! Differentially expressed marker genes per comparison group.
//!
//! The ranking procedure itself lives outside this crate. A [`DeGeneRanker`]
//! is invoked once when a record set has no cached table, and the result is
//! stored back on the record set under [`DE_GENES_KEY`].

use crate::data::ResponseMatrix;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cache key for the DE gene table on a record set.
pub const DE_GENES_KEY: &str = "rank_genes_groups_cov";

/// Ordered marker genes keyed by `cov_pert` group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeGeneTable {
    groups: BTreeMap<String, Vec<String>>,
}

impl DeGeneTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion of one group's ranked genes.
    pub fn with_group(mut self, group: &str, genes: Vec<String>) -> Self {
        self.insert(group, genes);
        self
    }

    pub fn insert(&mut self, group: &str, genes: Vec<String>) {
        self.groups.insert(group.to_string(), genes);
    }

    /// Ranked genes for a group key.
    pub fn get(&self, group: &str) -> Option<&[String]> {
        self.groups.get(group).map(Vec::as_slice)
    }

    /// Group keys in sorted order.
    pub fn groups(&self) -> impl Iterator<Item = &str> + '_ {
        self.groups.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Load from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Save to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Everything a ranker needs to compute marker genes.
#[derive(Debug, Clone, Copy)]
pub struct DeGeneRequest<'a> {
    /// Group of each sample (`cov_pert`).
    pub groupby: &'a [String],
    /// Reference group of each sample (`cov_name`).
    pub reference: &'a [String],
    /// Name of the control-flag column.
    pub control_key: &'a str,
    /// Control flag of each sample.
    pub controls: &'a [bool],
    /// Sample responses.
    pub response: &'a ResponseMatrix,
}

/// External differential-expression ranking procedure.
pub trait DeGeneRanker {
    fn rank(&self, request: &DeGeneRequest<'_>) -> Result<DeGeneTable>;
}

impl<F> DeGeneRanker for F
where
    F: Fn(&DeGeneRequest<'_>) -> Result<DeGeneTable>,
{
    fn rank(&self, request: &DeGeneRequest<'_>) -> Result<DeGeneTable> {
        self(request)
    }
}

/// A ranker that hands out an already computed table.
#[derive(Debug, Clone, Default)]
pub struct PrecomputedDeGenes(pub DeGeneTable);

impl DeGeneRanker for PrecomputedDeGenes {
    fn rank(&self, _request: &DeGeneRequest<'_>) -> Result<DeGeneTable> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let table = DeGeneTable::new()
            .with_group("X_drugA", vec!["g2".to_string(), "g1".to_string()])
            .with_group("Y_drugA", vec!["g1".to_string()]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("X_drugA").unwrap(), &["g2", "g1"]);
        assert!(table.get("Z_drugA").is_none());
        assert_eq!(table.groups().collect::<Vec<_>>(), vec!["X_drugA", "Y_drugA"]);
    }

    #[test]
    fn test_json_roundtrip_keeps_gene_order() {
        let table = DeGeneTable::new().with_group("X_drugA", vec!["b".to_string(), "a".to_string()]);
        let parsed = DeGeneTable::from_json(&table.to_json().unwrap()).unwrap();
        assert_eq!(parsed, table);
    }
}
