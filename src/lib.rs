//! Perturbation Dataset Library
//!
//! Turns a raw perturbation-experiment record set (one row per sample with
//! perturbation, dose, control flag, covariates and a response matrix) into
//! an encoded, queryable dataset for downstream modeling.
//!
//! # Overview
//!
//! - **data**: Raw record set (annotation table, response matrix, schema fields)
//! - **fields**: Logical → physical field resolution with fallback columns
//! - **index**: Named row-index sets (all/control/treated/train/test/ood)
//! - **vocab**: Perturbation and covariate vocabularies and encodings
//! - **keys**: Composite grouping keys
//! - **de_genes**: Marker-gene tables from an external ranker
//! - **dataset**: The encoded dataset and its configuration
//! - **view**: Index views and counterfactual sampling
//! - **loader**: Split-loading entry points
//!
//! # Example
//!
//! ```no_run
//! use perturbation_dataset::prelude::*;
//! use rand::SeedableRng;
//!
//! # fn run(mut data: PerturbationData) -> Result<()> {
//! let mut config = DatasetConfig::default();
//! config.sample_cf = true;
//!
//! let loaded = load_dataset_splits(&mut data, &config, &PrecomputedDeGenes::default(), false)?;
//! let train = loaded.get(IndexSet::Train).unwrap();
//! let mut rng = rand::rngs::StdRng::seed_from_u64(0);
//! let sample = train.get(0, &mut rng)?;
//! # Ok(())
//! # }
//! ```

pub mod data;
pub mod dataset;
pub mod de_genes;
pub mod error;
pub mod fields;
pub mod index;
pub mod keys;
pub mod loader;
pub mod view;
pub mod vocab;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::data::{FieldMap, FieldMapping, ObsTable, PerturbationData, ResponseMatrix, Variable};
    pub use crate::dataset::{ControlMatch, Dataset, DatasetConfig};
    pub use crate::de_genes::{
        DeGeneRanker, DeGeneRequest, DeGeneTable, PrecomputedDeGenes, DE_GENES_KEY,
    };
    pub use crate::error::{DatasetError, Result};
    pub use crate::fields::{FieldKeys, FieldNotice, ResolvedFields, ShuffleSplitter, Splitter};
    pub use crate::index::{IndexCatalog, IndexSet};
    pub use crate::keys::CompositeKeys;
    pub use crate::loader::{load_dataset_splits, load_dataset_train_test, LoadedSplits};
    pub use crate::view::{DatasetView, Sample};
    pub use crate::vocab::{
        CovariateEncoding, CovariateVocabulary, PerturbationVocabulary, COMBINATION_SEPARATOR,
    };
}
