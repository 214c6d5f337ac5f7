//! Criterion benchmarks for amlb-rf: forest training and prediction.

use criterion::{Criterion, criterion_group, criterion_main};
use ndarray::Array2;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use amlb_rf::{CrossValidation, RandomForestConfig};

fn make_classification(
    n_samples: usize,
    n_features: usize,
    n_classes: usize,
    seed: u64,
) -> (Array2<f64>, Vec<usize>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let labels: Vec<usize> = (0..n_samples).map(|i| i % n_classes).collect();
    let features = Array2::from_shape_fn((n_samples, n_features), |(i, f)| {
        let base = if f < 3 { labels[i] as f64 * 3.0 } else { 0.0 };
        base + rng.r#gen::<f64>() * 0.5
    });
    (features, labels)
}

fn bench_rf_train(c: &mut Criterion) {
    let (features, labels) = make_classification(500, 20, 5, 42);
    let cfg = RandomForestConfig::new(50).unwrap().with_seed(42);

    c.bench_function("rf_train_500x20_5class_50trees", |b| {
        b.iter(|| cfg.fit_classifier(features.view(), &labels, 5).unwrap());
    });
}

fn bench_rf_predict_proba(c: &mut Criterion) {
    let (features, labels) = make_classification(500, 20, 5, 42);
    let cfg = RandomForestConfig::new(50).unwrap().with_seed(42);
    let forest = cfg.fit_classifier(features.view(), &labels, 5).unwrap();

    c.bench_function("rf_predict_proba_500x20_50trees", |b| {
        b.iter(|| forest.predict_proba(features.view()).unwrap());
    });
}

fn bench_regressor_train(c: &mut Criterion) {
    let (features, labels) = make_classification(500, 20, 5, 42);
    let targets: Vec<f64> = labels.iter().map(|&l| l as f64).collect();
    let cfg = RandomForestConfig::new(20).unwrap().with_seed(42);

    c.bench_function("rf_regressor_train_500x20_20trees", |b| {
        b.iter(|| cfg.fit_regressor(features.view(), &targets).unwrap());
    });
}

fn bench_stratified_folds(c: &mut Criterion) {
    let (_, labels) = make_classification(10_000, 1, 5, 42);
    let cv = CrossValidation::new(5).unwrap();

    c.bench_function("stratified_folds_10000_5class", |b| {
        b.iter(|| cv.folds(labels.len(), Some(&labels)).unwrap());
    });
}

criterion_group!(
    benches,
    bench_rf_train,
    bench_rf_predict_proba,
    bench_regressor_train,
    bench_stratified_folds
);
criterion_main!(benches);
