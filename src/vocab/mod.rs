//! Vocabularies mapping perturbation agents and covariate levels to indices.

mod covariate;
mod perturbation;

pub use covariate::{CovariateEncoding, CovariateVocabulary};
pub use perturbation::{PerturbationVocabulary, COMBINATION_SEPARATOR};
