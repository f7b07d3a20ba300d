//! Perturbation vocabulary and dose-weighted combination encoding.
//!
//! A perturbation string may name several agents joined by `+`
//! (`"drugA+drugB"`); its dose string is joined the same way (`"1.0+2.0"`).
//! A sample is encoded as the sum of each agent's one-hot vector scaled by
//! its dose, so single agents and combinations share one fixed-width space.

use crate::data::Variable;
use crate::error::{DatasetError, Result};
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use std::collections::HashMap;

/// Separator between agents (and doses) of a combination.
pub const COMBINATION_SEPARATOR: char = '+';

/// Ordered, append-only set of single perturbation agents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerturbationVocabulary {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl PerturbationVocabulary {
    /// Distinct single agents in first-seen order, combinations split apart.
    pub fn unique_agents<I, S>(perturbations: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::from_perturbations(perturbations).names
    }

    /// Build the vocabulary from per-sample perturbation strings.
    pub fn from_perturbations<I, S>(perturbations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut vocab = Self::default();
        for perturbation in perturbations {
            for agent in perturbation.as_ref().split(COMBINATION_SEPARATOR) {
                vocab.push(agent);
            }
        }
        vocab
    }

    fn push(&mut self, agent: &str) {
        if !self.index.contains_key(agent) {
            self.index.insert(agent.to_string(), self.names.len());
            self.names.push(agent.to_string());
        }
    }

    /// Number of distinct agents (`num_treatments`).
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Agents in encoding order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn index_of(&self, agent: &str) -> Option<usize> {
        self.index.get(agent).copied()
    }

    /// Identity-basis vector of one agent.
    pub fn one_hot(&self, agent: &str) -> Result<DVector<f32>> {
        let idx = self
            .index_of(agent)
            .ok_or_else(|| DatasetError::UnknownPerturbation(agent.to_string()))?;
        let mut v = DVector::zeros(self.len());
        v[idx] = 1.0;
        Ok(v)
    }

    /// Encode one sample as the dose-weighted sum of its agents' one-hot vectors.
    pub fn encode(&self, row: usize, perturbation: &str, dose: &Variable) -> Result<DVector<f32>> {
        let agents: Vec<&str> = perturbation.split(COMBINATION_SEPARATOR).collect();
        let doses = dose_parts(row, dose)?;
        if agents.len() != doses.len() {
            return Err(DatasetError::CombinationMismatch {
                row,
                perturbation: perturbation.to_string(),
                dose: dose.key_string(),
                n_agents: agents.len(),
                n_doses: doses.len(),
            });
        }

        let mut encoded = DVector::zeros(self.len());
        for (agent, d) in agents.into_iter().zip(doses) {
            let idx = self
                .index_of(agent)
                .ok_or_else(|| DatasetError::UnknownPerturbation(agent.to_string()))?;
            encoded[idx] += d;
        }
        Ok(encoded)
    }

    /// Encode every sample into a samples × agents matrix.
    pub fn encode_all(&self, perturbations: &[String], doses: &[Variable]) -> Result<DMatrix<f32>> {
        if perturbations.len() != doses.len() {
            return Err(DatasetError::DimensionMismatch {
                expected: perturbations.len(),
                actual: doses.len(),
            });
        }
        let rows: Vec<DVector<f32>> = perturbations
            .par_iter()
            .zip(doses.par_iter())
            .enumerate()
            .map(|(row, (perturbation, dose))| self.encode(row, perturbation, dose))
            .collect::<Result<_>>()?;

        Ok(DMatrix::from_fn(rows.len(), self.len(), |r, c| rows[r][c]))
    }
}

/// Split a dose value into its per-agent parts.
fn dose_parts(row: usize, dose: &Variable) -> Result<Vec<f32>> {
    match dose {
        Variable::Continuous(v) => Ok(vec![*v as f32]),
        Variable::Ordinal(v) => Ok(vec![*v as f32]),
        Variable::Categorical(s) => s
            .split(COMBINATION_SEPARATOR)
            .map(|part| {
                part.trim().parse::<f32>().map_err(|_| DatasetError::InvalidDose {
                    row,
                    value: s.clone(),
                })
            })
            .collect(),
        Variable::Missing => Err(DatasetError::InvalidDose {
            row,
            value: dose.key_string(),
        }),
    }
}
