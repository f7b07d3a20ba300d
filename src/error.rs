//! Error types for the perturbation-dataset library.

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Field '{field}' is missing: no schema mapping and no column '{column}'")]
    MissingField { field: String, column: String },

    #[error("Missing column '{0}' in observation table")]
    MissingColumn(String),

    #[error("Duplicate keys were given in covariate keys: {0:?}")]
    DuplicateCovariateKey(Vec<String>),

    #[error(
        "Row {row}: perturbation '{perturbation}' has {n_agents} parts but dose '{dose}' has {n_doses}"
    )]
    CombinationMismatch {
        row: usize,
        perturbation: String,
        dose: String,
        n_agents: usize,
        n_doses: usize,
    },

    #[error("Row {row}: invalid dose '{value}'")]
    InvalidDose { row: usize, value: String },

    #[error("Unknown perturbation agent '{0}'")]
    UnknownPerturbation(String),

    #[error("Unknown index set '{0}' (expected all, control, treated, train, test or ood)")]
    UnknownIndexSet(String),

    #[error("Index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("No non-control counterfactual candidate among {n_samples} samples")]
    NoCounterfactualCandidate { n_samples: usize },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("DE gene ranking failed: {0}")]
    Ranking(String),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, DatasetError>;
