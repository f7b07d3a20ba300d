//! Per-sample grouping keys built from covariates, perturbation and dose.

use crate::data::Variable;
use crate::error::{DatasetError, Result};
use rayon::prelude::*;

/// Grouping strings for every sample. Keys are not unique per row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompositeKeys {
    /// Covariate values joined with `_`, in covariate-key order.
    pub cov_name: Vec<String>,
    /// `{cov_name}_{perturbation}`
    pub cov_pert: Vec<String>,
    /// `{perturbation}_{dose}`
    pub pert_dose: Vec<String>,
    /// `{cov_name}_{perturbation}_{dose}`
    pub cov_pert_dose: Vec<String>,
}

impl CompositeKeys {
    pub fn build(
        covariates: &[&[Variable]],
        perturbations: &[String],
        doses: &[Variable],
    ) -> Result<Self> {
        let n = perturbations.len();
        for len in covariates.iter().map(|c| c.len()).chain([doses.len()]) {
            if len != n {
                return Err(DatasetError::DimensionMismatch {
                    expected: n,
                    actual: len,
                });
            }
        }

        let rows: Vec<(String, String, String, String)> = (0..n)
            .into_par_iter()
            .map(|row| {
                let cov_name = covariates
                    .iter()
                    .map(|column| column[row].key_string())
                    .collect::<Vec<_>>()
                    .join("_");
                let cov_pert = format!("{}_{}", cov_name, perturbations[row]);
                let pert_dose = format!("{}_{}", perturbations[row], doses[row].key_string());
                let cov_pert_dose = format!("{}_{}", cov_name, pert_dose);
                (cov_name, cov_pert, pert_dose, cov_pert_dose)
            })
            .collect();

        let mut keys = Self::default();
        for (cov_name, cov_pert, pert_dose, cov_pert_dose) in rows {
            keys.cov_name.push(cov_name);
            keys.cov_pert.push(cov_pert);
            keys.pert_dose.push(pert_dose);
            keys.cov_pert_dose.push(cov_pert_dose);
        }
        Ok(keys)
    }

    pub fn len(&self) -> usize {
        self.cov_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cov_name.is_empty()
    }
}
