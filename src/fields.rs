//! Resolution of logical field names to physical annotation columns.
//!
//! Missing dose, covariate and split fields are not errors: a fallback column
//! is synthesized and returned alongside the resolved names, together with a
//! [`FieldNotice`] describing what was filled in. The caller's table is never
//! modified.

use crate::data::{FieldMap, ObsTable, PerturbationData, Variable};
use crate::error::{DatasetError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::info;

/// Column name of the synthesized constant dose.
pub const DUMMY_DOSE: &str = "dummy_dose";
/// Column name of the synthesized constant covariate.
pub const DUMMY_COVARIATE: &str = "dummy_covar";
/// Value of the synthesized constant covariate.
pub const DUMMY_COVARIATE_VALUE: &str = "dummy-covar";
/// Column name of the synthesized train/test split.
pub const AUTO_SPLIT: &str = "split";

/// Logical field names requested by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldKeys {
    pub perturbation: String,
    pub control: String,
    /// `None` requests a constant dose of 1.0.
    pub dose: Option<String>,
    /// Empty requests a single constant covariate.
    pub covariates: Vec<String>,
    /// `None` requests an automatic train/test split.
    pub split: Option<String>,
}

impl Default for FieldKeys {
    fn default() -> Self {
        Self {
            perturbation: "perturbation".to_string(),
            control: "control".to_string(),
            dose: Some("dose".to_string()),
            covariates: vec!["covariates".to_string()],
            split: Some("split".to_string()),
        }
    }
}

/// A recoverable anomaly handled by synthesizing a column.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldNotice {
    DummyDose { requested: Option<String> },
    DummyCovariate,
    AutoSplit { requested: Option<String>, test_ratio: f64 },
}

impl fmt::Display for FieldNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldNotice::DummyDose { requested } => {
                write!(f, "adding a dummy dose (requested: {:?})", requested)
            }
            FieldNotice::DummyCovariate => f.write_str("adding a dummy covariate"),
            FieldNotice::AutoSplit {
                requested,
                test_ratio,
            } => write!(
                f,
                "performing automatic train-test split with {} ratio (requested: {:?})",
                test_ratio, requested
            ),
        }
    }
}

/// Assigns `train`/`test` labels when the record set carries no split.
pub trait Splitter {
    fn assign(&self, n_samples: usize, test_ratio: f64, seed: u64) -> Result<Vec<String>>;
}

/// Seeded random split: `ceil(n * test_ratio)` samples go to `test`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShuffleSplitter;

impl Splitter for ShuffleSplitter {
    fn assign(&self, n_samples: usize, test_ratio: f64, seed: u64) -> Result<Vec<String>> {
        if !(test_ratio > 0.0 && test_ratio < 1.0) {
            return Err(DatasetError::InvalidParameter(format!(
                "test_ratio must be in (0, 1), got {}",
                test_ratio
            )));
        }
        let n_test = (n_samples as f64 * test_ratio).ceil() as usize;
        let mut order: Vec<usize> = (0..n_samples).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        order.shuffle(&mut rng);

        let mut labels = vec!["train".to_string(); n_samples];
        for &i in order.iter().take(n_test) {
            labels[i] = "test".to_string();
        }
        Ok(labels)
    }
}

/// Physical column names for every logical field, plus any fallback columns.
#[derive(Debug, Clone)]
pub struct ResolvedFields {
    pub perturbation: String,
    pub control: String,
    pub dose: String,
    pub covariates: Vec<String>,
    pub split: String,
    /// Fallback columns, looked up before the source table.
    pub synthesized: Vec<(String, Vec<Variable>)>,
    pub notices: Vec<FieldNotice>,
}

impl ResolvedFields {
    /// Values of a physical column, preferring synthesized ones.
    pub fn column<'a>(&'a self, obs: &'a ObsTable, name: &str) -> Result<&'a [Variable]> {
        match self.synthesized.iter().find(|(n, _)| n == name) {
            Some((_, values)) => Ok(values),
            None => obs.column(name),
        }
    }
}

/// Column a logical name points at: the schema mapping if present, else itself.
fn physical(fields: &FieldMap, logical: &str) -> Option<String> {
    match fields.get(logical) {
        Some(mapping) => mapping.columns().into_iter().next(),
        None => Some(logical.to_string()),
    }
}

/// Physical column for a single-column field, if the table has it.
fn lookup(fields: &FieldMap, obs: &ObsTable, logical: &str) -> Option<String> {
    physical(fields, logical).filter(|column| obs.has_column(column))
}

fn require(fields: &FieldMap, obs: &ObsTable, field: &str, logical: &str) -> Result<String> {
    lookup(fields, obs, logical).ok_or_else(|| DatasetError::MissingField {
        field: field.to_string(),
        column: physical(fields, logical).unwrap_or_else(|| logical.to_string()),
    })
}

/// Resolve every field in `keys` against the record set.
pub fn resolve_fields(
    data: &PerturbationData,
    keys: &FieldKeys,
    test_ratio: f64,
    seed: u64,
    splitter: &dyn Splitter,
) -> Result<ResolvedFields> {
    let fields = data.fields();
    let obs = data.obs();
    let n = obs.n_rows();
    let mut synthesized = Vec::new();
    let mut notices = Vec::new();

    let perturbation = require(fields, obs, "perturbation", &keys.perturbation)?;
    let control = require(fields, obs, "control", &keys.control)?;

    let dose = match keys.dose.as_deref().and_then(|k| lookup(fields, obs, k)) {
        Some(column) => column,
        None => {
            notices.push(FieldNotice::DummyDose {
                requested: keys.dose.clone(),
            });
            synthesized.push((DUMMY_DOSE.to_string(), vec![Variable::Continuous(1.0); n]));
            DUMMY_DOSE.to_string()
        }
    };

    let mut covariates = match keys.covariates.as_slice() {
        [single] if fields.contains_key(single) => fields[single].columns(),
        listed => listed.to_vec(),
    };
    for key in &covariates {
        if !obs.has_column(key) {
            return Err(DatasetError::MissingField {
                field: "covariate".to_string(),
                column: key.clone(),
            });
        }
    }
    if covariates.is_empty() {
        notices.push(FieldNotice::DummyCovariate);
        synthesized.push((
            DUMMY_COVARIATE.to_string(),
            vec![Variable::from(DUMMY_COVARIATE_VALUE); n],
        ));
        covariates.push(DUMMY_COVARIATE.to_string());
    }
    let mut seen = HashSet::new();
    if !covariates.iter().all(|key| seen.insert(key)) {
        return Err(DatasetError::DuplicateCovariateKey(covariates));
    }

    let split = match keys.split.as_deref().and_then(|k| lookup(fields, obs, k)) {
        Some(column) => column,
        None => {
            let labels = splitter.assign(n, test_ratio, seed)?;
            if labels.len() != n {
                return Err(DatasetError::DimensionMismatch {
                    expected: n,
                    actual: labels.len(),
                });
            }
            notices.push(FieldNotice::AutoSplit {
                requested: keys.split.clone(),
                test_ratio,
            });
            synthesized.push((
                AUTO_SPLIT.to_string(),
                labels.into_iter().map(Variable::from).collect(),
            ));
            AUTO_SPLIT.to_string()
        }
    };

    for notice in &notices {
        info!("{}", notice);
    }

    Ok(ResolvedFields {
        perturbation,
        control,
        dose,
        covariates,
        split,
        synthesized,
        notices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{FieldMapping, ResponseMatrix};
    use nalgebra::DMatrix;

    fn create_test_data() -> PerturbationData {
        let obs = ObsTable::new(5)
            .with_column("condition", ["ctrl", "a", "a", "b", "b"])
            .unwrap()
            .with_column("control", [1i64, 0, 0, 0, 0])
            .unwrap()
            .with_column("cell_type", ["X", "X", "Y", "Y", "X"])
            .unwrap()
            .with_column("donor", ["d1", "d2", "d1", "d2", "d1"])
            .unwrap();
        let response = ResponseMatrix::new(DMatrix::zeros(5, 1), vec!["g".to_string()]).unwrap();
        PerturbationData::new(obs, response).unwrap()
    }

    fn resolve(data: &PerturbationData, keys: &FieldKeys) -> Result<ResolvedFields> {
        resolve_fields(data, keys, 0.2, 42, &ShuffleSplitter)
    }

    #[test]
    fn test_schema_mapping_wins() {
        let mut data = create_test_data();
        data.map_field("perturbation", FieldMapping::Column("condition".to_string()));
        data.map_field(
            "covariates",
            FieldMapping::Columns(vec!["cell_type".to_string(), "donor".to_string()]),
        );
        let resolved = resolve(&data, &FieldKeys::default()).unwrap();
        assert_eq!(resolved.perturbation, "condition");
        assert_eq!(resolved.control, "control");
        assert_eq!(resolved.covariates, vec!["cell_type", "donor"]);
    }

    #[test]
    fn test_missing_required_field() {
        let data = create_test_data();
        let err = resolve(&data, &FieldKeys::default()).unwrap_err();
        assert!(matches!(err, DatasetError::MissingField { ref field, .. } if field == "perturbation"));
    }

    #[test]
    fn test_mapping_to_absent_column() {
        let mut data = create_test_data();
        data.map_field("perturbation", FieldMapping::Column("nope".to_string()));
        let err = resolve(&data, &FieldKeys::default()).unwrap_err();
        assert!(matches!(
            err,
            DatasetError::MissingField { ref field, ref column }
                if field == "perturbation" && column == "nope"
        ));

        let mut data = create_test_data();
        data.map_field("perturbation", FieldMapping::Column("condition".to_string()));
        data.map_field("dose", FieldMapping::Column("dose_val".to_string()));
        data.map_field("split", FieldMapping::Column("fold".to_string()));
        let resolved = resolve(&data, &FieldKeys::default()).unwrap();
        assert_eq!(resolved.dose, DUMMY_DOSE);
        assert_eq!(resolved.split, AUTO_SPLIT);
        assert!(resolved.column(data.obs(), &resolved.dose).is_ok());
    }

    #[test]
    fn test_fallbacks_synthesized() {
        let data = create_test_data();
        let keys = FieldKeys {
            perturbation: "condition".to_string(),
            covariates: vec![],
            ..FieldKeys::default()
        };
        let resolved = resolve(&data, &keys).unwrap();

        assert_eq!(resolved.dose, DUMMY_DOSE);
        assert_eq!(resolved.covariates, vec![DUMMY_COVARIATE]);
        assert_eq!(resolved.split, AUTO_SPLIT);
        assert_eq!(resolved.notices.len(), 3);

        let doses = resolved.column(data.obs(), DUMMY_DOSE).unwrap();
        assert!(doses.iter().all(|d| *d == Variable::Continuous(1.0)));
        let covs = resolved.column(data.obs(), DUMMY_COVARIATE).unwrap();
        assert!(covs.iter().all(|c| c.as_categorical() == Some(DUMMY_COVARIATE_VALUE)));

        // the caller's table is untouched
        assert!(!data.obs().has_column(DUMMY_DOSE));
        assert!(!data.obs().has_column(AUTO_SPLIT));
    }

    #[test]
    fn test_missing_covariate_column_is_fatal() {
        let data = create_test_data();
        let keys = FieldKeys {
            perturbation: "condition".to_string(),
            covariates: vec!["tissue".to_string()],
            ..FieldKeys::default()
        };
        assert!(matches!(
            resolve(&data, &keys),
            Err(DatasetError::MissingField { .. })
        ));
    }

    #[test]
    fn test_duplicate_covariates() {
        let data = create_test_data();
        let keys = FieldKeys {
            perturbation: "condition".to_string(),
            covariates: vec!["cell_type".to_string(), "cell_type".to_string()],
            ..FieldKeys::default()
        };
        assert!(matches!(
            resolve(&data, &keys),
            Err(DatasetError::DuplicateCovariateKey(_))
        ));
    }

    #[test]
    fn test_shuffle_splitter() {
        let labels = ShuffleSplitter.assign(10, 0.2, 7).unwrap();
        assert_eq!(labels.len(), 10);
        assert_eq!(labels.iter().filter(|l| *l == "test").count(), 2);
        assert_eq!(labels, ShuffleSplitter.assign(10, 0.2, 7).unwrap());
        assert!(ShuffleSplitter.assign(10, 1.5, 7).is_err());
    }
}
