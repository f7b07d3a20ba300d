//! Entry points that build a dataset and hand out its split views.

use crate::data::PerturbationData;
use crate::dataset::{Dataset, DatasetConfig};
use crate::de_genes::DeGeneRanker;
use crate::error::Result;
use crate::index::IndexSet;
use crate::view::DatasetView;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Named split views, optionally with the dataset they project.
#[derive(Debug, Clone)]
pub struct LoadedSplits {
    pub splits: BTreeMap<IndexSet, DatasetView>,
    /// Present when the caller asked for the dataset.
    pub dataset: Option<Arc<Dataset>>,
}

impl LoadedSplits {
    pub fn get(&self, split: IndexSet) -> Option<&DatasetView> {
        self.splits.get(&split)
    }
}

fn load(
    data: &mut PerturbationData,
    config: &DatasetConfig,
    ranker: &dyn DeGeneRanker,
    return_dataset: bool,
    splits: &[IndexSet],
) -> Result<LoadedSplits> {
    let dataset = Arc::new(Dataset::new(data, config, ranker)?);
    let views = splits
        .iter()
        .map(|&split| (split, dataset.subset(split, IndexSet::All)))
        .collect();
    Ok(LoadedSplits {
        splits: views,
        dataset: return_dataset.then_some(dataset),
    })
}

/// Build a dataset and return its `train`, `test` and `ood` views.
pub fn load_dataset_splits(
    data: &mut PerturbationData,
    config: &DatasetConfig,
    ranker: &dyn DeGeneRanker,
    return_dataset: bool,
) -> Result<LoadedSplits> {
    load(
        data,
        config,
        ranker,
        return_dataset,
        &[IndexSet::Train, IndexSet::Test, IndexSet::Ood],
    )
}

/// Build a dataset and return only its `train` and `test` views.
///
/// Pair with [`DatasetConfig::train_test`], which reads the `new_split` column.
pub fn load_dataset_train_test(
    data: &mut PerturbationData,
    config: &DatasetConfig,
    ranker: &dyn DeGeneRanker,
    return_dataset: bool,
) -> Result<LoadedSplits> {
    load(
        data,
        config,
        ranker,
        return_dataset,
        &[IndexSet::Train, IndexSet::Test],
    )
}
