//! End-to-end tests: fixture files -> dataset -> encoded matrices -> predictions CSV.

use std::fs;
use std::path::{Path, PathBuf};

use amlb_data::{
    DataFormat, DataType, Dataset, DatasetType, FileDataset, MissingPolicy, Predictions, Value,
    impute, save_predictions,
};
use ndarray::Array1;
use tempfile::TempDir;

/// Path to the test fixture directory.
fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn open(ext: &str) -> FileDataset {
    FileDataset::open(
        &fixture_path(&format!("colors_train.{ext}")),
        &fixture_path(&format!("colors_test.{ext}")),
        "label",
    )
    .expect("fixture should open")
}

#[test]
fn arff_features_from_header_and_scan() {
    let ds = open("arff");
    assert_eq!(ds.format(), DataFormat::Arff);
    assert_eq!(ds.dataset_type(), DatasetType::Binary);

    let names: Vec<&str> = ds.features().iter().map(|f| f.name()).collect();
    assert_eq!(names, vec!["age", "color", "shade name", "label"]);

    let age = &ds.features()[0];
    assert_eq!(age.data_type(), Some(&DataType::Numeric));
    assert!(age.has_missing_values());

    let color = &ds.features()[1];
    assert_eq!(color.values().unwrap(), &["red", "green", "blue"]);
    assert!(color.has_missing_values());
    assert_eq!(color.label_encoder().missing_policy(), MissingPolicy::Mask);

    let shade = &ds.features()[2];
    assert_eq!(shade.values().unwrap().len(), 8);
    assert!(shade.values().unwrap().contains(&"pale pink".to_string()));

    assert!(ds.target().is_target());
    assert!(!ds.target().has_missing_values());

    // the test split double-quotes its shade names
    let x_test = ds.test().x().unwrap();
    assert_eq!(x_test[[1, 2]], Value::Text("pale pink".into()));
}

#[test]
fn arff_encoded_splits() {
    let ds = open("arff");

    let x_train = ds.train().x_enc().unwrap();
    assert_eq!(x_train.dim(), (6, 3));
    assert_eq!(x_train[[0, 0]], 25.0);
    assert!(x_train[[1, 0]].is_nan());
    assert_eq!(x_train[[0, 1]], 2.0);
    assert_eq!(ds.train().y_enc().unwrap().to_vec(), vec![1.0, 0.0, 1.0, 0.0, 1.0, 0.0]);

    let x_test = ds.test().x_enc().unwrap();
    assert_eq!(x_test.nrows(), 3);
    assert!(x_test[[1, 1]].is_nan());

    let (train_imp, test_imp) = impute(x_train.view(), x_test.view()).unwrap();
    assert!(train_imp.iter().chain(test_imp.iter()).all(|v| v.is_finite()));
}

#[test]
fn csv_dataset_matches_arff_codes() {
    let csv = open("csv");
    let arff = open("arff");

    let color = &csv.features()[1];
    assert_eq!(color.data_type(), Some(&DataType::Categorical));
    assert_eq!(color.values().unwrap(), &["blue", "green", "red"]);
    assert!(color.has_missing_values());
    assert!(csv.features()[0].has_missing_values());

    assert_eq!(*csv.train().y_enc().unwrap(), *arff.train().y_enc().unwrap());
    let csv_x = csv.train().x_enc().unwrap();
    let arff_x = arff.train().x_enc().unwrap();
    assert_eq!(csv_x.column(1), arff_x.column(1));
}

#[test]
fn predictions_written_and_decoded() {
    let ds = open("csv");
    let truth: Array1<f64> = (*ds.test().y_enc().unwrap()).clone();
    let result = Predictions {
        predictions: truth.clone(),
        probabilities: None,
        truth,
        target_is_encoded: true,
    };

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out").join("colors_rf_predictions.csv");
    save_predictions(&ds, &path, &result).unwrap();

    let content = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines, vec!["predictions,truth", "yes,yes", "no,no", "no,no"]);
}

#[test]
fn release_then_reload_from_file() {
    let ds = open("csv");
    let first = ds.train().x_enc().unwrap();
    ds.release(None);
    let second = ds.train().x_enc().unwrap();
    assert_eq!(first.dim(), second.dim());
    assert_eq!(first.column(1), second.column(1));
}
