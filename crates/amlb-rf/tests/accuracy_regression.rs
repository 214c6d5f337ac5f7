//! Accuracy regression tests for amlb-rf.
//!
//! These tests verify that algorithmic changes do not degrade forest quality
//! on deterministic synthetic datasets.

use ndarray::{Array2, Axis};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use amlb_rf::{CrossValidation, MaxFeatures, Metric, Node, RandomForestConfig};

// ---------------------------------------------------------------------------
// Helpers: deterministic synthetic datasets
// ---------------------------------------------------------------------------

/// Generate a 300-sample, 10-feature, 3-class classification dataset.
///
/// Features 0-2 are informative (class * 3.0 + noise in [0, 0.5]).
/// Features 3-9 are pure noise in [0, 0.5].
/// Samples are assigned round-robin across classes.
fn make_classification() -> (Array2<f64>, Vec<usize>) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let n_samples = 300;
    let n_features = 10;
    let n_classes = 3;

    let labels: Vec<usize> = (0..n_samples).map(|i| i % n_classes).collect();
    let features = Array2::from_shape_fn((n_samples, n_features), |(i, f)| {
        let base = if f < 3 { labels[i] as f64 * 3.0 } else { 0.0 };
        base + rng.r#gen::<f64>() * 0.5
    });
    (features, labels)
}

/// Generate `y = 2 * x0 - x1 + noise` over 200 samples with 2 noise columns.
fn make_regression() -> (Array2<f64>, Vec<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let features = Array2::from_shape_fn((200, 4), |_| rng.r#gen::<f64>() * 10.0);
    let targets = features
        .rows()
        .into_iter()
        .map(|row| 2.0 * row[0] - row[1] + rng.r#gen::<f64>() * 0.1)
        .collect();
    (features, targets)
}

// ---------------------------------------------------------------------------
// a) cv_accuracy_above_threshold
// ---------------------------------------------------------------------------

/// Stratified 5-fold mean accuracy must exceed 0.85 on the synthetic dataset.
#[test]
fn cv_accuracy_above_threshold() {
    let (features, labels) = make_classification();
    let rf_config = RandomForestConfig::new(100).unwrap().with_seed(42);
    let cv = CrossValidation::new(5).unwrap().with_seed(42);

    let mut scores = Vec::new();
    for fold in cv.folds(labels.len(), Some(&labels)).unwrap() {
        let x_train = features.select(Axis(0), &fold.train);
        let y_train: Vec<usize> = fold.train.iter().map(|&i| labels[i]).collect();
        let x_test = features.select(Axis(0), &fold.test);
        let y_test: Vec<usize> = fold.test.iter().map(|&i| labels[i]).collect();

        let forest = rf_config.fit_classifier(x_train.view(), &y_train, 3).unwrap();
        let proba = forest.predict_proba(x_test.view()).unwrap();
        scores.push(Metric::Accuracy.score_classification(&y_test, proba.view()).unwrap());
    }
    let mean_accuracy = scores.iter().sum::<f64>() / scores.len() as f64;

    assert!(mean_accuracy > 0.85, "cv mean_accuracy {mean_accuracy} <= 0.85");
}

// ---------------------------------------------------------------------------
// b) auc_above_threshold
// ---------------------------------------------------------------------------

/// Held-out one-vs-rest AUC must exceed 0.95.
#[test]
fn auc_above_threshold() {
    let (features, labels) = make_classification();
    let train: Vec<usize> = (0..200).collect();
    let test: Vec<usize> = (200..300).collect();
    let y_train: Vec<usize> = train.iter().map(|&i| labels[i]).collect();
    let y_test: Vec<usize> = test.iter().map(|&i| labels[i]).collect();

    let forest = RandomForestConfig::new(50)
        .unwrap()
        .with_seed(42)
        .fit_classifier(features.select(Axis(0), &train).view(), &y_train, 3)
        .unwrap();
    let proba = forest.predict_proba(features.select(Axis(0), &test).view()).unwrap();
    let auc = Metric::Auc.score_classification(&y_test, proba.view()).unwrap();

    assert!(auc > 0.95, "auc {auc} <= 0.95");
}

// ---------------------------------------------------------------------------
// c) regression_r2_above_threshold
// ---------------------------------------------------------------------------

/// Held-out R² of the regressor must exceed 0.8.
#[test]
fn regression_r2_above_threshold() {
    let (features, targets) = make_regression();
    let train: Vec<usize> = (0..150).collect();
    let test: Vec<usize> = (150..200).collect();
    let y_train: Vec<f64> = train.iter().map(|&i| targets[i]).collect();
    let y_test: Vec<f64> = test.iter().map(|&i| targets[i]).collect();

    let forest = RandomForestConfig::new(100)
        .unwrap()
        .with_seed(42)
        .fit_regressor(features.select(Axis(0), &train).view(), &y_train)
        .unwrap();
    let preds = forest.predict(features.select(Axis(0), &test).view()).unwrap();
    let r2 = Metric::R2.score_regression(&y_test, preds.as_slice().unwrap()).unwrap();

    assert!(r2 > 0.8, "r2 {r2} <= 0.8");
}

// ---------------------------------------------------------------------------
// d) seed_controls_randomness
// ---------------------------------------------------------------------------

/// Different seeds give different forests; the same seed reproduces exactly.
#[test]
fn seed_controls_randomness() {
    let (features, labels) = make_classification();
    let root_splits = |seed| -> Vec<(usize, f64)> {
        RandomForestConfig::new(5)
            .unwrap()
            .with_max_features(MaxFeatures::Fixed(2))
            .with_seed(seed)
            .fit_classifier(features.view(), &labels, 3)
            .unwrap()
            .trees()
            .iter()
            .filter_map(|tree| match &tree.nodes()[0] {
                Node::Split {
                    feature, threshold, ..
                } => Some((feature.index(), *threshold)),
                Node::Leaf { .. } => None,
            })
            .collect()
    };
    assert_eq!(root_splits(1), root_splits(1));
    assert_ne!(root_splits(1), root_splits(2));
}
