//! Framework adapters: turn an encoded dataset and a task config into a
//! predictions file.

mod random_forest;
mod tuned_random_forest;

use std::collections::BTreeMap;
use std::sync::Arc;

use amlb_data::{Dataset, DatasetType, Predictions, save_predictions};
use amlb_rf::{
    MaxFeatures, Metric, RandomForestClassifier, RandomForestConfig, RandomForestRegressor,
    RfError, SplitCriterion,
};
use anyhow::{Context, Result, bail};
use ndarray::{Array1, Array2, ArrayView2};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::TaskConfig;

pub use random_forest::RandomForest;
pub use tuned_random_forest::TunedRandomForest;

/// What a framework reports back after a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Number of fitted models (trees) in the final estimator.
    pub models_count: usize,
    /// Wall-clock seconds spent fitting, tuning included.
    pub training_duration: f64,
}

/// A benchmarked framework.
pub trait Framework {
    /// Name used on the command line and in output file names.
    fn name(&self) -> &'static str;

    /// Train on the dataset's training split, predict its test split and
    /// write the predictions file named by `config`.
    ///
    /// # Errors
    ///
    /// Fails on data loading, encoding, training or writing errors.
    fn run(&self, dataset: &dyn Dataset, config: &TaskConfig) -> Result<RunSummary>;
}

/// Look up a framework by name (case-insensitive).
///
/// # Errors
///
/// Fails for unknown names.
pub fn lookup(name: &str) -> Result<Box<dyn Framework>> {
    let frameworks: [Box<dyn Framework>; 2] = [Box::new(RandomForest), Box::new(TunedRandomForest)];
    frameworks
        .into_iter()
        .find(|f| f.name().eq_ignore_ascii_case(name))
        .with_context(|| {
            format!("unknown framework \"{name}\" (expected RandomForest or TunedRandomForest)")
        })
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

const TUNING_PREFIX: &str = "_tuning.";

/// Parameters that configure training: every key not starting with `_`.
fn training_params(params: &BTreeMap<String, String>) -> BTreeMap<&str, &str> {
    params
        .iter()
        .filter(|(k, _)| !k.starts_with('_'))
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect()
}

/// Training parameters with `_tuning.<key>` entries layered on top.
///
/// A `_tuning.` key overrides only that key; every other training parameter
/// still applies during the sweep.
fn tuning_params(params: &BTreeMap<String, String>) -> BTreeMap<&str, &str> {
    let mut merged = training_params(params);
    for (key, value) in params {
        if let Some(key) = key.strip_prefix(TUNING_PREFIX) {
            merged.insert(key, value.as_str());
        }
    }
    merged
}

/// Worker count: `_n_jobs` when set to a positive number, else the task's cores.
fn n_jobs(config: &TaskConfig) -> Result<usize> {
    match config.framework_params.get("_n_jobs") {
        Some(raw) => {
            let n: i64 = raw
                .parse()
                .with_context(|| format!("_n_jobs must be an integer, got \"{raw}\""))?;
            Ok(usize::try_from(n).ok().filter(|&n| n > 0).unwrap_or(config.cores))
        }
        None => Ok(config.cores),
    }
}

/// Forest settings parsed from `key=value` parameters.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ForestParams {
    n_estimators: usize,
    max_depth: Option<usize>,
    min_samples_split: usize,
    min_samples_leaf: usize,
    max_features: Option<MaxFeatures>,
    criterion: SplitCriterion,
    bootstrap: bool,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: SplitCriterion::Gini,
            bootstrap: true,
        }
    }
}

impl ForestParams {
    /// Parse known keys; unknown keys are logged and ignored.
    pub(crate) fn parse(params: &BTreeMap<&str, &str>) -> Result<Self> {
        let mut parsed = Self::default();
        for (&key, &value) in params {
            match key {
                "n_estimators" => parsed.n_estimators = parse_value(key, value)?,
                "max_depth" => {
                    parsed.max_depth = match value.to_ascii_lowercase().as_str() {
                        "none" | "" => None,
                        _ => Some(parse_value(key, value)?),
                    }
                }
                "min_samples_split" => parsed.min_samples_split = parse_value(key, value)?,
                "min_samples_leaf" => parsed.min_samples_leaf = parse_value(key, value)?,
                "max_features" => parsed.max_features = parse_max_features(value)?,
                "criterion" => {
                    parsed.criterion = match value.to_ascii_lowercase().as_str() {
                        "gini" => SplitCriterion::Gini,
                        "entropy" => SplitCriterion::Entropy,
                        other => bail!("unknown criterion \"{other}\" (expected gini or entropy)"),
                    }
                }
                "bootstrap" => {
                    parsed.bootstrap = match value.to_ascii_lowercase().as_str() {
                        "true" | "1" => true,
                        "false" | "0" => false,
                        other => bail!("bootstrap must be true or false, got \"{other}\""),
                    }
                }
                _ => warn!(key, value, "ignoring unknown framework parameter"),
            }
        }
        Ok(parsed)
    }

    /// Override the max features strategy.
    #[must_use]
    pub(crate) fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = Some(max_features);
        self
    }

    /// Build the forest config for `seed`.
    pub(crate) fn forest_config(&self, seed: u64) -> Result<RandomForestConfig, RfError> {
        let mut config = RandomForestConfig::new(self.n_estimators)?
            .with_max_depth(self.max_depth)
            .with_min_samples_split(self.min_samples_split)
            .with_min_samples_leaf(self.min_samples_leaf)
            .with_criterion(self.criterion)
            .with_bootstrap(self.bootstrap)
            .with_seed(seed);
        if let Some(max_features) = self.max_features {
            config = config.with_max_features(max_features);
        }
        Ok(config)
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .ok()
        .with_context(|| format!("invalid value \"{value}\" for parameter {key}"))
}

/// `sqrt`, `log2`, `all`/`none`, `auto` (per-task default), an integer count,
/// or a fraction containing a decimal point.
fn parse_max_features(value: &str) -> Result<Option<MaxFeatures>> {
    Ok(Some(match value.to_ascii_lowercase().as_str() {
        "auto" => return Ok(None),
        "sqrt" => MaxFeatures::Sqrt,
        "log2" => MaxFeatures::Log2,
        "all" | "none" => MaxFeatures::All,
        v if v.contains('.') => MaxFeatures::Fraction(parse_value("max_features", v)?),
        v => MaxFeatures::Fixed(parse_value("max_features", v)?),
    }))
}

// ---------------------------------------------------------------------------
// Data preparation, fitting and prediction
// ---------------------------------------------------------------------------

/// Training targets in the form the forest consumes.
#[derive(Debug, Clone)]
pub(crate) enum Target {
    /// Label codes below `n_classes`.
    Classes { labels: Vec<usize>, n_classes: usize },
    /// Continuous values.
    Values(Vec<f64>),
}

impl Target {
    /// Convert an encoded target column.
    fn from_encoded(y: &Array1<f64>, dataset_type: DatasetType, n_classes: usize) -> Result<Self> {
        if !dataset_type.is_classification() {
            return Ok(Target::Values(y.to_vec()));
        }
        let labels = y
            .iter()
            .enumerate()
            .map(|(row, &code)| {
                if code.is_finite() && code >= 0.0 && code.fract() == 0.0 && (code as usize) < n_classes {
                    Ok(code as usize)
                } else {
                    Err(anyhow::anyhow!(
                        "training target at row {row} is missing or not a class code ({code})"
                    ))
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Target::Classes { labels, n_classes })
    }

    /// Labels to stratify folds by, for classification targets.
    pub(crate) fn strata(&self) -> Option<&[usize]> {
        match self {
            Target::Classes { labels, .. } => Some(labels),
            Target::Values(_) => None,
        }
    }

    /// The target restricted to `rows`.
    pub(crate) fn select(&self, rows: &[usize]) -> Self {
        match self {
            Target::Classes { labels, n_classes } => Target::Classes {
                labels: rows.iter().map(|&i| labels[i]).collect(),
                n_classes: *n_classes,
            },
            Target::Values(values) => Target::Values(rows.iter().map(|&i| values[i]).collect()),
        }
    }
}

/// Encoded, imputed matrices for one task.
pub(crate) struct TaskData {
    /// Encoded training predictors before imputation.
    pub(crate) x_train_raw: Arc<Array2<f64>>,
    pub(crate) x_train: Array2<f64>,
    pub(crate) x_test: Array2<f64>,
    pub(crate) y_train: Target,
    pub(crate) y_test: Array1<f64>,
    pub(crate) dataset_type: DatasetType,
}

impl TaskData {
    /// Encode both splits and impute missing predictors with training means.
    pub(crate) fn prepare(dataset: &dyn Dataset) -> Result<Self> {
        let dataset_type = dataset.dataset_type();
        let x_train_raw = dataset.train().x_enc().context("failed to encode training split")?;
        let x_test_raw = dataset.test().x_enc().context("failed to encode test split")?;
        let y_train = dataset.train().y_enc().context("failed to encode training target")?;
        let y_test = dataset.test().y_enc().context("failed to encode test target")?;

        let (x_train, x_test) = amlb_data::impute(x_train_raw.view(), x_test_raw.view())
            .context("failed to impute missing values")?;

        let n_classes = dataset.target().label_encoder().classes().len();
        if dataset_type.is_classification() && n_classes == 0 {
            bail!(
                "target \"{}\" has no declared classes for a {dataset_type} task",
                dataset.target().name()
            );
        }
        let y_train = Target::from_encoded(&y_train, dataset_type, n_classes)?;

        info!(
            n_train = x_train.nrows(),
            n_test = x_test.nrows(),
            n_features = x_train.ncols(),
            %dataset_type,
            "task data prepared"
        );
        Ok(Self {
            x_train_raw,
            x_train,
            x_test,
            y_train,
            y_test: (*y_test).clone(),
            dataset_type,
        })
    }
}

/// A fitted forest of either kind.
pub(crate) enum Model {
    Classifier(RandomForestClassifier),
    Regressor(RandomForestRegressor),
}

impl Model {
    pub(crate) fn fit(
        config: &RandomForestConfig,
        x: ArrayView2<'_, f64>,
        y: &Target,
    ) -> Result<Self, RfError> {
        Ok(match y {
            Target::Classes { labels, n_classes } => {
                Model::Classifier(config.fit_classifier(x, labels, *n_classes)?)
            }
            Target::Values(values) => Model::Regressor(config.fit_regressor(x, values)?),
        })
    }

    /// Predictions (class codes or values) and, for classifiers, probabilities.
    pub(crate) fn predict(
        &self,
        x: ArrayView2<'_, f64>,
    ) -> Result<(Array1<f64>, Option<Array2<f64>>), RfError> {
        match self {
            Model::Classifier(forest) => {
                let proba = forest.predict_proba(x)?;
                let codes = proba
                    .rows()
                    .into_iter()
                    .map(|row| {
                        let mut best = 0;
                        for (class, &p) in row.iter().enumerate() {
                            if p > row[best] {
                                best = class;
                            }
                        }
                        best as f64
                    })
                    .collect();
                Ok((codes, Some(proba)))
            }
            Model::Regressor(forest) => Ok((forest.predict(x)?, None)),
        }
    }

    /// Higher-is-better score of this model on `x` against `y`.
    pub(crate) fn score(&self, metric: Metric, x: ArrayView2<'_, f64>, y: &Target) -> Result<f64, RfError> {
        match (self, y) {
            (Model::Classifier(forest), Target::Classes { labels, .. }) => {
                metric.score_classification(labels, forest.predict_proba(x)?.view())
            }
            (Model::Regressor(forest), Target::Values(values)) => {
                metric.score_regression(values, &forest.predict(x)?.to_vec())
            }
            (Model::Classifier(_), Target::Values(_)) => Err(RfError::MetricTaskMismatch {
                metric: metric.name(),
                task: "regression",
            }),
            (Model::Regressor(_), Target::Classes { .. }) => Err(RfError::MetricTaskMismatch {
                metric: metric.name(),
                task: "classification",
            }),
        }
    }

    pub(crate) fn n_trees(&self) -> usize {
        match self {
            Model::Classifier(forest) => forest.n_trees(),
            Model::Regressor(forest) => forest.n_trees(),
        }
    }
}

/// Predict the test split and write the predictions file.
fn write_predictions(
    dataset: &dyn Dataset,
    config: &TaskConfig,
    model: &Model,
    data: &TaskData,
) -> Result<()> {
    let (predictions, probabilities) = model
        .predict(data.x_test.view())
        .context("failed to predict test split")?;
    let output_file = config.output_predictions_file();
    save_predictions(
        dataset,
        &output_file,
        &Predictions {
            predictions,
            probabilities,
            truth: data.y_test.clone(),
            target_is_encoded: true,
        },
    )
    .with_context(|| format!("failed to write predictions to {}", output_file.display()))?;
    info!(path = %output_file.display(), "predictions written");
    Ok(())
}

/// A dedicated pool so `_n_jobs` applies regardless of the global pool.
fn worker_pool(n_jobs: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_jobs)
        .build()
        .context("failed to build worker thread pool")
}
