//! Task configuration assembled from command-line flags.

use std::collections::BTreeMap;
use std::path::PathBuf;

use amlb_data::{DatasetType, TaskName};
use amlb_rf::Metric;
use anyhow::{Result, bail};

/// Everything a framework adapter needs to know about the task it runs.
#[derive(Debug, Clone)]
pub struct TaskConfig {
    /// Task name, used in output file names.
    pub name: TaskName,
    /// Framework the task is run with.
    pub framework: String,
    /// Metric the framework should optimise.
    pub metric: Metric,
    /// Seed for every random choice made by the framework.
    pub seed: u64,
    /// Worker threads available to the framework.
    pub cores: usize,
    /// Time budget for the whole run.
    pub max_runtime_seconds: u64,
    /// Directory receiving the predictions file.
    pub output_dir: PathBuf,
    /// Free-form `key=value` parameters passed to the framework.
    pub framework_params: BTreeMap<String, String>,
}

impl TaskConfig {
    /// Path of the predictions CSV: `{output_dir}/{name}_{framework}_predictions.csv`.
    #[must_use]
    pub fn output_predictions_file(&self) -> PathBuf {
        self.output_dir.join(format!(
            "{}_{}_predictions.csv",
            self.name,
            self.framework.to_lowercase()
        ))
    }
}

/// Default metric for a task type: AUC for binary, log loss for multiclass,
/// RMSE for regression.
#[must_use]
pub fn default_metric(dataset_type: DatasetType) -> Metric {
    match dataset_type {
        DatasetType::Binary => Metric::Auc,
        DatasetType::Multiclass => Metric::LogLoss,
        DatasetType::Regression => Metric::Rmse,
    }
}

/// Parse a `key=value` framework parameter.
///
/// # Errors
///
/// Fails when there is no `=` or the key is empty.
pub fn parse_param(raw: &str) -> Result<(String, String)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("parameter \"{raw}\" is not of the form key=value");
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("parameter \"{raw}\" has an empty key");
    }
    Ok((key.to_string(), value.trim().to_string()))
}
