//! Index-restricted views over a [`Dataset`] and counterfactual sampling.
//!
//! A view owns only its list of root row positions; every per-sample value
//! is read through the shared, immutable parent. Views of views compose
//! their index lists, so nesting never copies sample data.

use crate::data::Variable;
use crate::dataset::Dataset;
use crate::de_genes::DeGeneTable;
use crate::error::{DatasetError, Result};
use nalgebra::{DMatrix, DVector, RowDVector};
use rand::seq::index;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// One training example drawn from a view.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Response row of the requested sample.
    pub genes: RowDVector<f32>,
    /// Dose-weighted perturbation encoding of the requested sample.
    pub perturbation: DVector<f32>,
    /// Responses of samples sharing this sample's covariates and the
    /// candidate's perturbation and dose (one row each), if any exist.
    pub cf_genes: Option<DMatrix<f32>>,
    /// Perturbation encoding of the drawn non-control candidate.
    pub cf_perturbation: DVector<f32>,
    /// Covariate level index per covariate key.
    pub covariates: Vec<usize>,
}

/// A read-only projection of a [`Dataset`] onto a list of rows.
#[derive(Debug, Clone)]
pub struct DatasetView {
    dataset: Arc<Dataset>,
    /// Root row positions, in view order.
    indices: Vec<usize>,
    /// Root positions eligible as counterfactual candidates (non-control).
    cf_candidates: Vec<usize>,
    /// `cov_pert_dose` → root positions; present when `sample_cf` is enabled.
    cf_groups: Option<HashMap<String, Vec<usize>>>,
}

impl DatasetView {
    /// Build a view from root positions already known to be in bounds.
    pub(crate) fn project(dataset: Arc<Dataset>, indices: Vec<usize>) -> Self {
        let cf_candidates: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|&row| !dataset.is_control_candidate(row))
            .collect();

        let cf_groups = dataset.config().sample_cf.then(|| {
            let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
            for &row in &indices {
                groups
                    .entry(dataset.keys().cov_pert_dose[row].clone())
                    .or_default()
                    .push(row);
            }
            groups
        });

        debug!(
            "View over {} samples ({} counterfactual candidates)",
            indices.len(),
            cf_candidates.len()
        );

        Self {
            dataset,
            indices,
            cf_candidates,
            cf_groups,
        }
    }

    /// View over the whole dataset, in original order.
    pub fn new(dataset: Arc<Dataset>) -> Self {
        let indices = (0..dataset.len()).collect();
        Self::project(dataset, indices)
    }

    /// Nested view over positions of this view.
    pub fn select(&self, positions: &[usize]) -> Result<Self> {
        let indices = positions
            .iter()
            .map(|&i| self.root_index(i))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::project(Arc::clone(&self.dataset), indices))
    }

    /// Restrict to control (`Some(true)`) or treated (`Some(false)`) samples.
    /// `None` returns the view unchanged.
    pub fn subset_condition(&self, control: Option<bool>) -> Self {
        match control {
            None => self.clone(),
            Some(control) => {
                let indices = self
                    .indices
                    .iter()
                    .copied()
                    .filter(|&row| self.dataset.controls()[row] == control)
                    .collect();
                Self::project(Arc::clone(&self.dataset), indices)
            }
        }
    }

    /// Draw the sample at position `i` together with a counterfactual.
    ///
    /// A non-control candidate is drawn uniformly from the view. When
    /// counterfactual sampling is enabled, up to `cf_samples` responses are
    /// drawn without replacement from the group sharing this sample's
    /// covariates and the candidate's perturbation and dose.
    pub fn get<R: Rng>(&self, i: usize, rng: &mut R) -> Result<Sample> {
        let row = self.root_index(i)?;
        if self.cf_candidates.is_empty() {
            return Err(DatasetError::NoCounterfactualCandidate {
                n_samples: self.len(),
            });
        }
        let cf_row = self.cf_candidates[rng.random_range(0..self.cf_candidates.len())];

        let keys = self.dataset.keys();
        let cf_genes = match &self.cf_groups {
            Some(groups) => {
                let cf_name = format!("{}_{}", keys.cov_name[row], keys.pert_dose[cf_row]);
                match groups.get(&cf_name) {
                    Some(members) => {
                        let amount = members.len().min(self.dataset.config().cf_samples);
                        let picked: Vec<usize> = index::sample(rng, members.len(), amount)
                            .into_iter()
                            .map(|m| members[m])
                            .collect();
                        Some(self.dataset.genes().gather_rows(&picked)?)
                    }
                    None => None,
                }
            }
            None => None,
        };

        Ok(Sample {
            genes: self.dataset.genes().row(row)?,
            perturbation: self.encoding(row),
            cf_genes,
            cf_perturbation: self.encoding(cf_row),
            covariates: self.dataset.covariates().iter().map(|c| c[row]).collect(),
        })
    }

    fn encoding(&self, row: usize) -> DVector<f32> {
        self.dataset.perturbations().row(row).transpose()
    }

    /// Root position of view position `i`.
    pub fn root_index(&self, i: usize) -> Result<usize> {
        self.indices
            .get(i)
            .copied()
            .ok_or(DatasetError::IndexOutOfBounds {
                index: i,
                len: self.indices.len(),
            })
    }

    /// Number of samples in the view.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Root positions, in view order.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.dataset
    }

    /// Number of samples that can serve as counterfactual candidates.
    pub fn n_cf_candidates(&self) -> usize {
        self.cf_candidates.len()
    }

    pub fn genes(&self, i: usize) -> Result<RowDVector<f32>> {
        self.dataset.genes().row(self.root_index(i)?)
    }

    pub fn perturbation(&self, i: usize) -> Result<DVector<f32>> {
        Ok(self.encoding(self.root_index(i)?))
    }

    pub fn pert_name(&self, i: usize) -> Result<&str> {
        Ok(&self.dataset.pert_names()[self.root_index(i)?])
    }

    pub fn dose(&self, i: usize) -> Result<&Variable> {
        Ok(&self.dataset.doses()[self.root_index(i)?])
    }

    pub fn is_control(&self, i: usize) -> Result<bool> {
        Ok(self.dataset.controls()[self.root_index(i)?])
    }

    pub fn covariates(&self, i: usize) -> Result<Vec<usize>> {
        let row = self.root_index(i)?;
        Ok(self.dataset.covariates().iter().map(|c| c[row]).collect())
    }

    pub fn cov_name(&self, i: usize) -> Result<&str> {
        Ok(&self.dataset.keys().cov_name[self.root_index(i)?])
    }

    pub fn cov_pert(&self, i: usize) -> Result<&str> {
        Ok(&self.dataset.keys().cov_pert[self.root_index(i)?])
    }

    pub fn pert_dose(&self, i: usize) -> Result<&str> {
        Ok(&self.dataset.keys().pert_dose[self.root_index(i)?])
    }

    pub fn cov_pert_dose(&self, i: usize) -> Result<&str> {
        Ok(&self.dataset.keys().cov_pert_dose[self.root_index(i)?])
    }

    pub fn var_names(&self) -> &[String] {
        self.dataset.var_names()
    }

    pub fn de_genes(&self) -> &DeGeneTable {
        self.dataset.de_genes()
    }

    pub fn control_names(&self) -> &[String] {
        self.dataset.control_names()
    }

    pub fn num_outcomes(&self) -> usize {
        self.dataset.num_outcomes()
    }

    pub fn num_treatments(&self) -> usize {
        self.dataset.num_treatments()
    }

    pub fn num_covariates(&self) -> Vec<usize> {
        self.dataset.num_covariates()
    }
}
