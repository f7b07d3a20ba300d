//! The encoded perturbation dataset.
//!
//! A [`Dataset`] is built once from a [`PerturbationData`] record set and is
//! immutable afterwards. It owns the response matrix, the per-sample
//! annotations, their encodings and the index catalog. Views over it are
//! created with [`Dataset::subset`].

use crate::data::{PerturbationData, ResponseMatrix, Variable};
use crate::de_genes::{DeGeneRanker, DeGeneRequest, DeGeneTable, DE_GENES_KEY};
use crate::error::{DatasetError, Result};
use crate::fields::{resolve_fields, FieldKeys, FieldNotice, ResolvedFields, ShuffleSplitter, Splitter};
use crate::index::{IndexCatalog, IndexSet};
use crate::keys::CompositeKeys;
use crate::view::DatasetView;
use crate::vocab::{CovariateVocabulary, PerturbationVocabulary};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// How a counterfactual candidate is recognised as a control sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlMatch {
    /// The candidate's perturbation name is one of the control names.
    #[default]
    Exact,
    /// The candidate's `pert_dose` key contains any control name as a substring.
    Substring,
}

impl ControlMatch {
    pub fn is_control(&self, control_names: &[String], perturbation: &str, pert_dose: &str) -> bool {
        match self {
            ControlMatch::Exact => control_names.iter().any(|c| c == perturbation),
            ControlMatch::Substring => control_names.iter().any(|c| pert_dose.contains(c.as_str())),
        }
    }
}

/// Dataset construction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Logical field names.
    pub keys: FieldKeys,
    /// Test fraction for the automatic split.
    pub test_ratio: f64,
    /// Seed for the automatic split.
    pub random_state: u64,
    /// Whether views draw counterfactual responses.
    pub sample_cf: bool,
    /// Maximum number of counterfactual responses per draw.
    pub cf_samples: usize,
    pub control_match: ControlMatch,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            keys: FieldKeys::default(),
            test_ratio: 0.2,
            random_state: 42,
            sample_cf: false,
            cf_samples: 20,
            control_match: ControlMatch::default(),
        }
    }
}

impl DatasetConfig {
    /// Defaults for train/test-only loading, which reads the `new_split` column.
    pub fn train_test() -> Self {
        let mut config = Self::default();
        config.keys.split = Some("new_split".to_string());
        config
    }

    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(DatasetError::from)
    }

    /// Load from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(DatasetError::from)
    }
}

/// The fully encoded dataset.
#[derive(Debug, Clone)]
pub struct Dataset {
    config: DatasetConfig,
    fields: ResolvedFields,
    genes: ResponseMatrix,
    pert_names: Vec<String>,
    doses: Vec<Variable>,
    controls: Vec<bool>,
    /// Raw covariate values, one column per covariate key.
    covariate_values: Vec<Vec<Variable>>,
    keys: CompositeKeys,
    /// Dose-weighted perturbation encodings (samples × treatments).
    perturbations: DMatrix<f32>,
    /// Covariate level indices, one column per covariate key.
    covariates: Vec<Vec<usize>>,
    indices: IndexCatalog,
    perturbation_vocab: PerturbationVocabulary,
    covariate_vocab: CovariateVocabulary,
    /// Sorted distinct perturbation names of control samples.
    control_names: Vec<String>,
    de_genes: Arc<DeGeneTable>,
}

impl Dataset {
    /// Build a dataset, splitting with [`ShuffleSplitter`] if no split is present.
    pub fn new(
        data: &mut PerturbationData,
        config: &DatasetConfig,
        ranker: &dyn DeGeneRanker,
    ) -> Result<Self> {
        Self::with_splitter(data, config, ranker, &ShuffleSplitter)
    }

    /// Build a dataset with a custom splitter for the automatic split.
    ///
    /// The only change made to `data` is caching the DE gene table when it
    /// was not already present.
    pub fn with_splitter(
        data: &mut PerturbationData,
        config: &DatasetConfig,
        ranker: &dyn DeGeneRanker,
        splitter: &dyn Splitter,
    ) -> Result<Self> {
        if config.sample_cf && config.cf_samples == 0 {
            return Err(DatasetError::InvalidParameter(
                "cf_samples must be at least 1 when sample_cf is enabled".to_string(),
            ));
        }
        if data.n_samples() == 0 {
            return Err(DatasetError::EmptyData("Record set has no samples".to_string()));
        }

        let fields = resolve_fields(data, &config.keys, config.test_ratio, config.random_state, splitter)?;
        let obs = data.obs();

        let pert_names: Vec<String> = fields
            .column(obs, &fields.perturbation)?
            .iter()
            .map(Variable::key_string)
            .collect();
        let doses = fields.column(obs, &fields.dose)?.to_vec();
        let controls: Vec<bool> = fields
            .column(obs, &fields.control)?
            .iter()
            .map(Variable::is_flag)
            .collect();
        let covariate_values: Vec<Vec<Variable>> = fields
            .covariates
            .iter()
            .map(|key| fields.column(obs, key).map(<[Variable]>::to_vec))
            .collect::<Result<_>>()?;

        let indices = IndexCatalog::build(&controls, fields.column(obs, &fields.split)?)?;

        let control_names: Vec<String> = pert_names
            .iter()
            .zip(&controls)
            .filter(|&(_, &is_control)| is_control)
            .map(|(name, _)| name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let perturbation_vocab = PerturbationVocabulary::from_perturbations(&pert_names);
        let perturbations = perturbation_vocab.encode_all(&pert_names, &doses)?;

        let named_columns: Vec<(&str, &[Variable])> = fields
            .covariates
            .iter()
            .map(String::as_str)
            .zip(covariate_values.iter().map(Vec::as_slice))
            .collect();
        let covariate_vocab = CovariateVocabulary::from_columns(&named_columns);
        let covariates: Vec<Vec<usize>> = covariate_vocab
            .encodings()
            .iter()
            .zip(&covariate_values)
            .map(|(encoding, values)| encoding.encode(values))
            .collect::<Result<_>>()?;

        let covariate_columns: Vec<&[Variable]> = covariate_values.iter().map(Vec::as_slice).collect();
        let keys = CompositeKeys::build(&covariate_columns, &pert_names, &doses)?;

        debug!(
            "Encoded {} samples: {} treatments, covariate cardinalities {:?}, {} control names",
            pert_names.len(),
            perturbation_vocab.len(),
            covariate_vocab.cardinalities(),
            control_names.len()
        );

        let de_genes = match data.de_genes(DE_GENES_KEY) {
            Some(table) => table,
            None => {
                info!("Ranking genes for DE genes...");
                let request = DeGeneRequest {
                    groupby: &keys.cov_pert,
                    reference: &keys.cov_name,
                    control_key: &fields.control,
                    controls: &controls,
                    response: data.response(),
                };
                let table = Arc::new(ranker.rank(&request)?);
                data.cache_de_genes(DE_GENES_KEY, Arc::clone(&table));
                table
            }
        };

        Ok(Self {
            config: config.clone(),
            genes: data.response().clone(),
            fields,
            pert_names,
            doses,
            controls,
            covariate_values,
            keys,
            perturbations,
            covariates,
            indices,
            perturbation_vocab,
            covariate_vocab,
            control_names,
            de_genes,
        })
    }

    /// View over the rows present in both `split` and `condition`.
    pub fn subset(self: &Arc<Self>, split: IndexSet, condition: IndexSet) -> DatasetView {
        let rows = self.indices.intersect(split, condition);
        DatasetView::project(Arc::clone(self), rows)
    }

    /// [`Dataset::subset`] with textual labels such as `"train"` and `"all"`.
    pub fn subset_by_label(self: &Arc<Self>, split: &str, condition: &str) -> Result<DatasetView> {
        Ok(self.subset(split.parse()?, condition.parse()?))
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.pert_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pert_names.is_empty()
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    /// Resolved physical field names.
    pub fn fields(&self) -> &ResolvedFields {
        &self.fields
    }

    /// Fallbacks applied while resolving fields.
    pub fn notices(&self) -> &[FieldNotice] {
        &self.fields.notices
    }

    pub fn indices(&self, set: IndexSet) -> &[usize] {
        self.indices.get(set)
    }

    pub fn genes(&self) -> &ResponseMatrix {
        &self.genes
    }

    pub fn var_names(&self) -> &[String] {
        self.genes.var_names()
    }

    pub fn pert_names(&self) -> &[String] {
        &self.pert_names
    }

    pub fn doses(&self) -> &[Variable] {
        &self.doses
    }

    pub fn controls(&self) -> &[bool] {
        &self.controls
    }

    pub fn covariate_keys(&self) -> &[String] {
        &self.fields.covariates
    }

    pub fn covariate_values(&self) -> &[Vec<Variable>] {
        &self.covariate_values
    }

    pub fn keys(&self) -> &CompositeKeys {
        &self.keys
    }

    pub fn perturbations(&self) -> &DMatrix<f32> {
        &self.perturbations
    }

    pub fn covariates(&self) -> &[Vec<usize>] {
        &self.covariates
    }

    pub fn perturbation_vocab(&self) -> &PerturbationVocabulary {
        &self.perturbation_vocab
    }

    pub fn covariate_vocab(&self) -> &CovariateVocabulary {
        &self.covariate_vocab
    }

    pub fn control_names(&self) -> &[String] {
        &self.control_names
    }

    pub fn de_genes(&self) -> &Arc<DeGeneTable> {
        &self.de_genes
    }

    pub fn num_outcomes(&self) -> usize {
        self.genes.n_outcomes()
    }

    pub fn num_treatments(&self) -> usize {
        self.perturbation_vocab.len()
    }

    pub fn num_covariates(&self) -> Vec<usize> {
        self.covariate_vocab.cardinalities()
    }

    /// Whether the sample at root position `row` is a control by the configured match.
    pub(crate) fn is_control_candidate(&self, row: usize) -> bool {
        self.config.control_match.is_control(
            &self.control_names,
            &self.pert_names[row],
            &self.keys.pert_dose[row],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{FieldMapping, ObsTable};
    use crate::de_genes::PrecomputedDeGenes;
    use std::cell::Cell;

    fn create_test_data() -> PerturbationData {
        let obs = ObsTable::new(4)
            .with_column("perturbation", ["ctrl", "drugA", "drugA", "drugA+drugB"])
            .unwrap()
            .with_column("control", [1i64, 0, 0, 0])
            .unwrap()
            .with_column("dose", ["1.0", "1.0", "1.0", "1.0+2.0"])
            .unwrap()
            .with_column("cell_type", ["X", "X", "Y", "Y"])
            .unwrap()
            .with_column("split", ["train", "train", "test", "ood"])
            .unwrap();
        let genes = DMatrix::from_fn(4, 3, |r, c| (r * 10 + c) as f32);
        let response = ResponseMatrix::new(genes, vec!["g0".into(), "g1".into(), "g2".into()]).unwrap();
        PerturbationData::new(obs, response).unwrap()
    }

    fn create_test_config() -> DatasetConfig {
        let mut config = DatasetConfig::default();
        config.keys.covariates = vec!["cell_type".to_string()];
        config
    }

    fn build(data: &mut PerturbationData, config: &DatasetConfig) -> Dataset {
        Dataset::new(data, config, &PrecomputedDeGenes::default()).unwrap()
    }

    struct CountingRanker {
        calls: Cell<usize>,
    }

    impl DeGeneRanker for CountingRanker {
        fn rank(&self, request: &DeGeneRequest<'_>) -> Result<DeGeneTable> {
            self.calls.set(self.calls.get() + 1);
            let mut table = DeGeneTable::new();
            for group in request.groupby {
                table.insert(group, vec!["g1".to_string()]);
            }
            Ok(table)
        }
    }

    #[test]
    fn test_vocabulary_and_encoding() {
        let mut data = create_test_data();
        let dataset = build(&mut data, &create_test_config());

        assert_eq!(dataset.len(), 4);
        assert_eq!(dataset.perturbation_vocab().names(), &["ctrl", "drugA", "drugB"]);
        assert_eq!(dataset.num_treatments(), 3);
        assert_eq!(dataset.num_outcomes(), 3);

        let row3: Vec<f32> = dataset.perturbations().row(3).iter().copied().collect();
        assert_eq!(row3, vec![0.0, 1.0, 2.0]);
        let row1: Vec<f32> = dataset.perturbations().row(1).iter().copied().collect();
        assert_eq!(row1, vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_index_sets() {
        let mut data = create_test_data();
        let dataset = build(&mut data, &create_test_config());

        assert_eq!(dataset.indices(IndexSet::All), &[0, 1, 2, 3]);
        assert_eq!(dataset.indices(IndexSet::Control), &[0]);
        assert_eq!(dataset.indices(IndexSet::Treated), &[1, 2, 3]);
        assert_eq!(dataset.indices(IndexSet::Train), &[0, 1]);
        assert_eq!(dataset.indices(IndexSet::Ood), &[3]);
        assert_eq!(dataset.controls(), &[true, false, false, false]);
        assert_eq!(dataset.control_names(), &["ctrl"]);
    }

    #[test]
    fn test_covariates_and_keys() {
        let mut data = create_test_data();
        let dataset = build(&mut data, &create_test_config());

        assert_eq!(dataset.num_covariates(), vec![2]);
        assert_eq!(dataset.covariates()[0], vec![0, 0, 1, 1]);
        assert_eq!(dataset.keys().cov_name, vec!["X", "X", "Y", "Y"]);
        assert_eq!(dataset.keys().cov_pert[1], "X_drugA");
        assert_eq!(dataset.keys().pert_dose[3], "drugA+drugB_1.0+2.0");
        assert_eq!(dataset.keys().cov_pert_dose[2], "Y_drugA_1.0");
    }

    #[test]
    fn test_de_genes_ranked_once_and_cached() {
        let mut data = create_test_data();
        let ranker = CountingRanker { calls: Cell::new(0) };
        let config = create_test_config();

        let first = Dataset::new(&mut data, &config, &ranker).unwrap();
        assert_eq!(ranker.calls.get(), 1);
        assert_eq!(first.de_genes().get("Y_drugA").unwrap(), &["g1"]);
        assert!(data.de_genes(DE_GENES_KEY).is_some());

        let second = Dataset::new(&mut data, &config, &ranker).unwrap();
        assert_eq!(ranker.calls.get(), 1);
        assert!(Arc::ptr_eq(first.de_genes(), second.de_genes()));
    }

    #[test]
    fn test_fallback_fields() {
        let mut data = create_test_data();
        let mut config = DatasetConfig::default();
        config.keys.dose = None;
        config.keys.covariates = vec![];
        config.keys.split = None;
        let dataset = build(&mut data, &config);

        assert_eq!(dataset.notices().len(), 3);
        assert_eq!(dataset.covariate_keys(), &["dummy_covar"]);
        assert_eq!(dataset.num_covariates(), vec![1]);
        assert!(dataset.doses().iter().all(|d| *d == Variable::Continuous(1.0)));
        // 4 samples at 0.2 test ratio
        assert_eq!(dataset.indices(IndexSet::Test).len(), 1);
        assert_eq!(dataset.indices(IndexSet::Train).len(), 3);
        assert!(!data.obs().has_column("dummy_dose"));
    }

    #[test]
    fn test_schema_mapped_fields() {
        let mut data = create_test_data();
        data.map_field("covariates", FieldMapping::Columns(vec!["cell_type".to_string()]));
        let dataset = build(&mut data, &DatasetConfig::default());
        assert_eq!(dataset.covariate_keys(), &["cell_type"]);
    }

    #[test]
    fn test_combination_mismatch_is_fatal() {
        let mut data = create_test_data();
        let mut obs = data.obs().clone();
        obs.insert_column("dose", ["1.0", "1.0", "1.0", "1.0"].into_iter().map(Variable::from).collect())
            .unwrap();
        let mut data_bad = PerturbationData::new(obs, data.response().clone()).unwrap();
        let result = Dataset::new(&mut data_bad, &create_test_config(), &PrecomputedDeGenes::default());
        assert!(matches!(
            result,
            Err(DatasetError::CombinationMismatch { row: 3, .. })
        ));
        // the untouched record set still builds
        assert!(Dataset::new(&mut data, &create_test_config(), &PrecomputedDeGenes::default()).is_ok());
    }

    #[test]
    fn test_subset_all_all_covers_every_row() {
        let mut data = create_test_data();
        let dataset = Arc::new(build(&mut data, &create_test_config()));
        let view = dataset.subset(IndexSet::All, IndexSet::All);
        let mut rows = view.indices().to_vec();
        rows.sort_unstable();
        assert_eq!(rows, vec![0, 1, 2, 3]);

        let control = dataset.subset(IndexSet::All, IndexSet::Control);
        let treated = dataset.subset(IndexSet::All, IndexSet::Treated);
        assert!(control.indices().iter().all(|r| !treated.indices().contains(r)));
        assert!(dataset.subset_by_label("train", "validation").is_err());
    }

    #[test]
    fn test_control_match_modes() {
        let names = vec!["ctrl".to_string()];
        assert!(ControlMatch::Exact.is_control(&names, "ctrl", "ctrl_1.0"));
        assert!(!ControlMatch::Exact.is_control(&names, "ctrl+drugA", "ctrl+drugA_1.0+1.0"));
        assert!(ControlMatch::Substring.is_control(&names, "ctrl+drugA", "ctrl+drugA_1.0+1.0"));
        assert!(!ControlMatch::Substring.is_control(&names, "drugA", "drugA_1.0"));
    }

    #[test]
    fn test_config_yaml() {
        let mut config = DatasetConfig::train_test();
        config.sample_cf = true;
        config.control_match = ControlMatch::Substring;
        let yaml = config.to_yaml().unwrap();
        let parsed = DatasetConfig::from_yaml(&yaml).unwrap();
        assert_eq!(parsed, config);
        assert_eq!(parsed.keys.split.as_deref(), Some("new_split"));

        let partial = DatasetConfig::from_yaml("sample_cf: true\ncf_samples: 5\n").unwrap();
        assert_eq!(partial.cf_samples, 5);
        assert_eq!(partial.keys, FieldKeys::default());
    }

    #[test]
    fn test_invalid_cf_samples() {
        let mut data = create_test_data();
        let mut config = create_test_config();
        config.sample_cf = true;
        config.cf_samples = 0;
        assert!(matches!(
            Dataset::new(&mut data, &config, &PrecomputedDeGenes::default()),
            Err(DatasetError::InvalidParameter(_))
        ));
    }
}
