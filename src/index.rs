//! Named row-index sets (`all`, `control`, `treated`, `train`, `test`, `ood`).

use crate::data::Variable;
use crate::error::{DatasetError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Label of a named index set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexSet {
    All,
    Control,
    Treated,
    Train,
    Test,
    Ood,
}

impl IndexSet {
    pub const ALL: [IndexSet; 6] = [
        IndexSet::All,
        IndexSet::Control,
        IndexSet::Treated,
        IndexSet::Train,
        IndexSet::Test,
        IndexSet::Ood,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IndexSet::All => "all",
            IndexSet::Control => "control",
            IndexSet::Treated => "treated",
            IndexSet::Train => "train",
            IndexSet::Test => "test",
            IndexSet::Ood => "ood",
        }
    }

    fn slot(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for IndexSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexSet {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self> {
        IndexSet::ALL
            .into_iter()
            .find(|set| set.as_str() == s)
            .ok_or_else(|| DatasetError::UnknownIndexSet(s.to_string()))
    }
}

/// Row positions for every [`IndexSet`], each in ascending order.
#[derive(Debug, Clone, Default)]
pub struct IndexCatalog {
    sets: [Vec<usize>; 6],
}

impl IndexCatalog {
    /// Build the catalog from per-row control flags and split labels.
    ///
    /// Rows whose split label is none of `train`/`test`/`ood` belong to no
    /// split set.
    pub fn build(controls: &[bool], split: &[Variable]) -> Result<Self> {
        if controls.len() != split.len() {
            return Err(DatasetError::DimensionMismatch {
                expected: controls.len(),
                actual: split.len(),
            });
        }
        let mut catalog = Self::default();
        for (row, (&is_control, label)) in controls.iter().zip(split).enumerate() {
            catalog.sets[IndexSet::All.slot()].push(row);
            let condition = if is_control {
                IndexSet::Control
            } else {
                IndexSet::Treated
            };
            catalog.sets[condition.slot()].push(row);

            let split_set = match label.as_categorical() {
                Some("train") => Some(IndexSet::Train),
                Some("test") => Some(IndexSet::Test),
                Some("ood") => Some(IndexSet::Ood),
                _ => None,
            };
            if let Some(set) = split_set {
                catalog.sets[set.slot()].push(row);
            }
        }
        Ok(catalog)
    }

    pub fn get(&self, set: IndexSet) -> &[usize] {
        &self.sets[set.slot()]
    }

    /// Rows present in both sets, ascending.
    pub fn intersect(&self, a: IndexSet, b: IndexSet) -> Vec<usize> {
        let other: HashSet<usize> = self.get(b).iter().copied().collect();
        self.get(a)
            .iter()
            .copied()
            .filter(|row| other.contains(row))
            .collect()
    }
}
