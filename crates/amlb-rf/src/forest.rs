//! Random Forest training with parallel tree construction, and prediction.

use ndarray::{Array1, Array2, ArrayView2};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use crate::config::{MaxFeatures, RandomForestConfig};
use crate::error::RfError;
use crate::node::LeafOutput;
use crate::split::{Classification, Objective, Regression};
use crate::tree::{DecisionTree, TreeParams};

/// A fitted Random Forest classifier.
#[derive(Debug, Clone)]
pub struct RandomForestClassifier {
    trees: Vec<DecisionTree>,
    n_features: usize,
    n_classes: usize,
}

/// A fitted Random Forest regressor.
#[derive(Debug, Clone)]
pub struct RandomForestRegressor {
    trees: Vec<DecisionTree>,
    n_features: usize,
}

/// Check the feature matrix shape and that every value is finite.
fn validate_features(features: ArrayView2<'_, f64>) -> Result<(), RfError> {
    if features.nrows() == 0 {
        return Err(RfError::EmptyDataset);
    }
    if features.ncols() == 0 {
        return Err(RfError::ZeroFeatures);
    }
    check_finite(features)
}

fn check_finite(features: ArrayView2<'_, f64>) -> Result<(), RfError> {
    for ((sample_index, feature_index), val) in features.indexed_iter() {
        if !val.is_finite() {
            return Err(RfError::NonFiniteValue {
                sample_index,
                feature_index,
            });
        }
    }
    Ok(())
}

fn check_prediction_input(
    features: ArrayView2<'_, f64>,
    n_features: usize,
) -> Result<(), RfError> {
    if features.ncols() != n_features {
        return Err(RfError::PredictionFeatureMismatch {
            expected: n_features,
            got: features.ncols(),
        });
    }
    check_finite(features)
}

fn check_length(what: &'static str, expected: usize, got: usize) -> Result<(), RfError> {
    if expected != got {
        return Err(RfError::LengthMismatch {
            what,
            expected,
            got,
        });
    }
    Ok(())
}

/// Draw `n_samples` row indices with replacement.
fn bootstrap_sample(n_samples: usize, rng: &mut impl Rng) -> Vec<usize> {
    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
}

/// Grow `config.n_trees` trees in parallel, each on its own bootstrap sample.
fn grow_forest<O: Objective>(
    config: &RandomForestConfig,
    features: ArrayView2<'_, f64>,
    objective: &O,
    default_max_features: MaxFeatures,
) -> Result<Vec<DecisionTree>, RfError> {
    config.validate_limits()?;
    let n_samples = features.nrows();
    let n_features = features.ncols();
    let max_features = config
        .max_features
        .unwrap_or(default_max_features)
        .resolve(n_features)?;

    info!(
        n_trees = config.n_trees,
        n_samples,
        n_features,
        max_features,
        bootstrap = config.bootstrap,
        "training random forest"
    );

    // Column-major copy so split search scans contiguous values.
    let columns: Vec<Vec<f64>> = features.columns().into_iter().map(|c| c.to_vec()).collect();
    let params = TreeParams {
        max_depth: config.max_depth,
        min_samples_split: config.min_samples_split,
        min_samples_leaf: config.min_samples_leaf,
        max_features,
    };
    let bootstrap = config.bootstrap;

    let mut master_rng = ChaCha8Rng::seed_from_u64(config.seed);
    let tree_seeds: Vec<u64> = (0..config.n_trees).map(|_| master_rng.r#gen()).collect();

    let trees: Vec<DecisionTree> = tree_seeds
        .into_par_iter()
        .map(|seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let samples = if bootstrap {
                bootstrap_sample(n_samples, &mut rng)
            } else {
                (0..n_samples).collect()
            };
            DecisionTree::grow(&columns, &samples, objective, params, rng.r#gen())
        })
        .collect();

    debug!(n_trees_trained = trees.len(), "tree training complete");
    Ok(trees)
}

#[instrument(skip_all, fields(n_trees = config.n_trees, n_samples = features.nrows()))]
pub(crate) fn train_classifier(
    config: &RandomForestConfig,
    features: ArrayView2<'_, f64>,
    labels: &[usize],
    n_classes: usize,
) -> Result<RandomForestClassifier, RfError> {
    validate_features(features)?;
    check_length("labels", features.nrows(), labels.len())?;
    if let Some((sample_index, &label)) = labels.iter().enumerate().find(|(_, l)| **l >= n_classes)
    {
        return Err(RfError::LabelOutOfRange {
            sample_index,
            label,
            n_classes,
        });
    }

    let objective = Classification {
        labels,
        n_classes,
        criterion: config.criterion,
    };
    let trees = grow_forest(config, features, &objective, MaxFeatures::Sqrt)?;
    info!(n_classes, "random forest classifier trained");

    Ok(RandomForestClassifier {
        trees,
        n_features: features.ncols(),
        n_classes,
    })
}

#[instrument(skip_all, fields(n_trees = config.n_trees, n_samples = features.nrows()))]
pub(crate) fn train_regressor(
    config: &RandomForestConfig,
    features: ArrayView2<'_, f64>,
    targets: &[f64],
) -> Result<RandomForestRegressor, RfError> {
    validate_features(features)?;
    check_length("targets", features.nrows(), targets.len())?;
    if let Some(sample_index) = targets.iter().position(|t| !t.is_finite()) {
        return Err(RfError::NonFiniteTarget { sample_index });
    }

    let objective = Regression { targets };
    let trees = grow_forest(config, features, &objective, MaxFeatures::All)?;
    info!("random forest regressor trained");

    Ok(RandomForestRegressor {
        trees,
        n_features: features.ncols(),
    })
}

impl RandomForestClassifier {
    /// Return averaged class probabilities, one row per sample.
    ///
    /// Rows are computed in parallel; each is the mean of the trees' leaf
    /// distributions and sums to 1.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::PredictionFeatureMismatch`] | column count differs from training |
    /// | [`RfError::NonFiniteValue`] | any input is NaN or infinite |
    pub fn predict_proba(&self, features: ArrayView2<'_, f64>) -> Result<Array2<f64>, RfError> {
        check_prediction_input(features, self.n_features)?;
        let n_trees = self.trees.len() as f64;
        let rows: Vec<Vec<f64>> = (0..features.nrows())
            .into_par_iter()
            .map(|i| {
                let sample = features.row(i);
                let mut avg = vec![0.0f64; self.n_classes];
                for tree in &self.trees {
                    if let LeafOutput::Distribution(proba) = tree.leaf(sample) {
                        for (a, p) in avg.iter_mut().zip(proba) {
                            *a += p;
                        }
                    }
                }
                avg.iter_mut().for_each(|v| *v /= n_trees);
                avg
            })
            .collect();

        let mut out = Array2::zeros((rows.len(), self.n_classes));
        for (mut dst, row) in out.rows_mut().into_iter().zip(&rows) {
            for (d, &v) in dst.iter_mut().zip(row) {
                *d = v;
            }
        }
        Ok(out)
    }

    /// Predict the class of each sample (argmax of [`predict_proba`](Self::predict_proba),
    /// lowest class on ties).
    ///
    /// # Errors
    ///
    /// As [`predict_proba`](Self::predict_proba).
    pub fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Vec<usize>, RfError> {
        let proba = self.predict_proba(features)?;
        Ok(proba
            .rows()
            .into_iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .fold((0usize, f64::NEG_INFINITY), |best, (idx, &p)| {
                        if p > best.1 { (idx, p) } else { best }
                    })
                    .0
            })
            .collect())
    }

    /// Return the number of trees in the ensemble.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Return the number of classes.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Return the number of features this forest was trained on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Return the fitted trees.
    #[must_use]
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }
}

impl RandomForestRegressor {
    /// Predict the mean of the trees' leaf values for each sample.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::PredictionFeatureMismatch`] | column count differs from training |
    /// | [`RfError::NonFiniteValue`] | any input is NaN or infinite |
    pub fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Array1<f64>, RfError> {
        check_prediction_input(features, self.n_features)?;
        let n_trees = self.trees.len() as f64;
        let preds: Vec<f64> = (0..features.nrows())
            .into_par_iter()
            .map(|i| {
                let sample = features.row(i);
                let total: f64 = self
                    .trees
                    .iter()
                    .map(|tree| match tree.leaf(sample) {
                        LeafOutput::Mean(v) => *v,
                        LeafOutput::Distribution(_) => 0.0,
                    })
                    .sum();
                total / n_trees
            })
            .collect();
        Ok(Array1::from(preds))
    }

    /// Return the number of trees in the ensemble.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Return the number of features this forest was trained on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Return the fitted trees.
    #[must_use]
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{Array2, array};

    use crate::config::{MaxFeatures, RandomForestConfig};
    use crate::error::RfError;
    use crate::split::SplitCriterion;

    /// Three separable classes along the first column.
    fn make_separable_data() -> (Array2<f64>, Vec<usize>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for (class, offset) in [0.0, 10.0, 20.0].into_iter().enumerate() {
            for i in 0..20 {
                rows.extend_from_slice(&[offset + i as f64 * 0.15, 0.5]);
                labels.push(class);
            }
        }
        let features = Array2::from_shape_vec((labels.len(), 2), rows).unwrap();
        (features, labels)
    }

    #[test]
    fn three_class_separable_accuracy() {
        let (features, labels) = make_separable_data();
        let forest = RandomForestConfig::new(50)
            .unwrap()
            .with_max_features(MaxFeatures::All)
            .with_seed(42)
            .fit_classifier(features.view(), &labels, 3)
            .unwrap();

        let predictions = forest.predict(features.view()).unwrap();
        let correct = predictions.iter().zip(&labels).filter(|&(p, l)| p == l).count();
        let accuracy = correct as f64 / labels.len() as f64;
        assert!(accuracy > 0.9, "accuracy = {accuracy}");
        assert_eq!(forest.n_trees(), 50);
    }

    #[test]
    fn probabilities_sum_to_one() {
        let (features, labels) = make_separable_data();
        let forest = RandomForestConfig::new(10)
            .unwrap()
            .with_criterion(SplitCriterion::Entropy)
            .fit_classifier(features.view(), &labels, 3)
            .unwrap();
        let proba = forest.predict_proba(features.view()).unwrap();
        assert_eq!(proba.dim(), (60, 3));
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn deterministic_with_same_seed() {
        let (features, labels) = make_separable_data();
        let fit = || {
            RandomForestConfig::new(10)
                .unwrap()
                .with_seed(99)
                .fit_classifier(features.view(), &labels, 3)
                .unwrap()
                .predict_proba(features.view())
                .unwrap()
        };
        assert_eq!(fit(), fit());
    }

    #[test]
    fn unseen_class_gets_zero_probability() {
        let features = array![[0.0], [1.0], [2.0], [3.0]];
        let forest = RandomForestConfig::new(5)
            .unwrap()
            .fit_classifier(features.view(), &[0, 0, 1, 1], 3)
            .unwrap();
        let proba = forest.predict_proba(features.view()).unwrap();
        assert!(proba.column(2).iter().all(|&p| p == 0.0));
    }

    #[test]
    fn regressor_fits_step_function() {
        let features = Array2::from_shape_fn((40, 1), |(i, _)| i as f64);
        let targets: Vec<f64> = (0..40).map(|i| if i < 20 { 1.0 } else { 5.0 }).collect();
        let forest = RandomForestConfig::new(20)
            .unwrap()
            .with_bootstrap(false)
            .fit_regressor(features.view(), &targets)
            .unwrap();
        let preds = forest.predict(array![[3.0], [35.0]].view()).unwrap();
        assert!((preds[0] - 1.0).abs() < 1e-9, "got {}", preds[0]);
        assert!((preds[1] - 5.0).abs() < 1e-9, "got {}", preds[1]);
    }

    #[test]
    fn empty_dataset_error() {
        let features = Array2::<f64>::zeros((0, 2));
        let err = RandomForestConfig::new(10)
            .unwrap()
            .fit_classifier(features.view(), &[], 2)
            .unwrap_err();
        assert!(matches!(err, RfError::EmptyDataset));
    }

    #[test]
    fn non_finite_value_rejected() {
        let features = array![[1.0, 2.0], [f64::NAN, 3.0]];
        let err = RandomForestConfig::new(3)
            .unwrap()
            .fit_classifier(features.view(), &[0, 1], 2)
            .unwrap_err();
        assert!(matches!(
            err,
            RfError::NonFiniteValue {
                sample_index: 1,
                feature_index: 0
            }
        ));
    }

    #[test]
    fn label_out_of_range_rejected() {
        let features = array![[1.0], [2.0]];
        let err = RandomForestConfig::new(3)
            .unwrap()
            .fit_classifier(features.view(), &[0, 2], 2)
            .unwrap_err();
        assert!(matches!(err, RfError::LabelOutOfRange { sample_index: 1, .. }));
    }

    #[test]
    fn length_mismatch_rejected() {
        let features = array![[1.0], [2.0]];
        let err = RandomForestConfig::new(3)
            .unwrap()
            .fit_regressor(features.view(), &[1.0])
            .unwrap_err();
        assert!(matches!(err, RfError::LengthMismatch { what: "targets", .. }));
    }

    #[test]
    fn prediction_feature_mismatch() {
        let (features, labels) = make_separable_data();
        let forest = RandomForestConfig::new(3)
            .unwrap()
            .fit_classifier(features.view(), &labels, 3)
            .unwrap();
        let err = forest.predict(array![[1.0]].view()).unwrap_err();
        assert!(matches!(
            err,
            RfError::PredictionFeatureMismatch {
                expected: 2,
                got: 1
            }
        ));
    }
}
