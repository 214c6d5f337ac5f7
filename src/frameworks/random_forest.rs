use std::time::Instant;

use amlb_data::Dataset;
use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use super::{Framework, ForestParams, Model, RunSummary, TaskData, n_jobs, training_params, write_predictions};
use crate::config::TaskConfig;

/// A single random forest trained with the task's parameters as given.
///
/// Ignores the time budget and the metric.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomForest;

impl Framework for RandomForest {
    fn name(&self) -> &'static str {
        "RandomForest"
    }

    #[instrument(skip_all, fields(task = %config.name))]
    fn run(&self, dataset: &dyn Dataset, config: &TaskConfig) -> Result<RunSummary> {
        let n_jobs = n_jobs(config)?;
        let params = ForestParams::parse(&training_params(&config.framework_params))?;
        let data = TaskData::prepare(dataset)?;

        info!(
            max_runtime_seconds = config.max_runtime_seconds,
            n_jobs,
            "running random forest"
        );
        warn!("the time limit is not enforced");
        warn!(metric = %config.metric, "the metric is not optimised");

        let forest_config = params.forest_config(config.seed)?;
        let pool = super::worker_pool(n_jobs)?;
        let start = Instant::now();
        let model = pool
            .install(|| Model::fit(&forest_config, data.x_train.view(), &data.y_train))
            .context("random forest training failed")?;
        let training_duration = start.elapsed().as_secs_f64();

        pool.install(|| write_predictions(dataset, config, &model, &data))?;

        Ok(RunSummary {
            models_count: model.n_trees(),
            training_duration,
        })
    }
}
