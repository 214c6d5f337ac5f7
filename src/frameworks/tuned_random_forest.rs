use std::time::{Duration, Instant};

use amlb_data::Dataset;
use amlb_rf::{CrossValidation, MaxFeatures, Metric, RandomForestConfig};
use anyhow::{Context, Result, bail};
use ndarray::{ArrayView2, Axis};
use tracing::{error, info, instrument, warn};

use super::{
    ForestParams, Framework, Model, RunSummary, TaskData, Target, n_jobs, training_params,
    tuning_params, write_predictions,
};
use crate::config::TaskConfig;

/// Share of the runtime budget spent searching `max_features`; the rest is
/// left for the final fit.
const SAFETY_FACTOR: f64 = 0.85;
const CV_FOLDS: usize = 5;

/// A random forest whose `max_features` is picked by 5-fold cross-validation
/// over up to 11 values spread around `sqrt(p)`, then refit on all training
/// rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct TunedRandomForest;

/// `length` evenly spaced points from `start` to `end`, truncated to
/// integers, deduplicated and sorted.
pub(crate) fn pick_values_uniform(start: usize, end: usize, length: usize) -> Vec<usize> {
    if length < 2 {
        return vec![start];
    }
    let step = (end as f64 - start as f64) / (length - 1) as f64;
    let mut values: Vec<usize> = (0..length)
        .map(|i| (start as f64 + i as f64 * step) as usize)
        .collect();
    values.sort_unstable();
    values.dedup();
    values
}

/// `[sqrt(p)]`, then up to 5 values in `[1, sqrt(p))`, then up to 5 in
/// `(sqrt(p), p]`.
pub(crate) fn max_features_candidates(n_features: usize) -> Vec<usize> {
    let default_value = ((n_features as f64).sqrt() as usize).max(1);
    let mut below = pick_values_uniform(1, default_value, 6);
    below.pop();
    let above = pick_values_uniform(default_value, n_features, 11 - below.len());

    let mut candidates = vec![default_value];
    candidates.extend(below);
    candidates.extend(above.into_iter().skip(1));
    candidates
}

/// Mean held-out score over stratified folds, imputing inside each fold.
fn cv_score(
    config: &RandomForestConfig,
    x: ArrayView2<'_, f64>,
    y: &Target,
    metric: Metric,
    seed: u64,
) -> Result<f64> {
    let folds = CrossValidation::new(CV_FOLDS)?
        .with_seed(seed)
        .folds(x.nrows(), y.strata())?;
    let mut total = 0.0;
    for fold in &folds {
        let (x_fit, x_held) = amlb_data::impute(
            x.select(Axis(0), &fold.train).view(),
            x.select(Axis(0), &fold.test).view(),
        )?;
        let model = Model::fit(config, x_fit.view(), &y.select(&fold.train))?;
        total += model.score(metric, x_held.view(), &y.select(&fold.test))?;
    }
    Ok(total / folds.len() as f64)
}

impl Framework for TunedRandomForest {
    fn name(&self) -> &'static str {
        "TunedRandomForest"
    }

    #[instrument(skip_all, fields(task = %config.name))]
    fn run(&self, dataset: &dyn Dataset, config: &TaskConfig) -> Result<RunSummary> {
        let n_jobs = n_jobs(config)?;
        let final_params = ForestParams::parse(&training_params(&config.framework_params))?;
        let tuning = ForestParams::parse(&tuning_params(&config.framework_params))?;
        let data = TaskData::prepare(dataset)?;
        if config.metric.is_classification() != data.dataset_type.is_classification() {
            bail!(
                "metric {} cannot score a {} task",
                config.metric,
                data.dataset_type
            );
        }

        let budget = Duration::from_secs_f64(config.max_runtime_seconds as f64 * SAFETY_FACTOR);
        let candidates = max_features_candidates(data.x_train.ncols());
        info!(
            max_runtime_seconds = config.max_runtime_seconds,
            n_jobs,
            ?candidates,
            "evaluating multiple values for max_features"
        );

        let pool = super::worker_pool(n_jobs)?;
        let tuning_start = Instant::now();
        let mut scores: Vec<(f64, usize)> = Vec::new();
        for (i, &value) in candidates.iter().enumerate() {
            if tuning_start.elapsed() >= budget {
                warn!(
                    evaluated = i,
                    n_candidates = candidates.len(),
                    "tuning budget exhausted"
                );
                break;
            }
            info!(
                candidate = i + 1,
                n_candidates = candidates.len(),
                max_features = value,
                "evaluating max_features"
            );
            let attempt = tuning
                .clone()
                .with_max_features(MaxFeatures::Fixed(value))
                .forest_config(config.seed)
                .map_err(anyhow::Error::from)
                .and_then(|forest_config| {
                    pool.install(|| {
                        cv_score(
                            &forest_config,
                            data.x_train_raw.view(),
                            &data.y_train,
                            config.metric,
                            config.seed,
                        )
                    })
                });
            match attempt {
                Ok(score) if score.is_finite() => scores.push((score, value)),
                Ok(score) => warn!(max_features = value, score, "non-finite CV score"),
                Err(err) => error!(max_features = value, error = %err, "failed CV scoring"),
            }
        }
        let tuning_duration = tuning_start.elapsed();
        info!(?scores, tuning_seconds = tuning_duration.as_secs_f64(), "tuning scores");

        let best = scores
            .iter()
            .copied()
            .max_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        let final_params = match best {
            Some((score, value)) => {
                info!(max_features = value, score, "training final model");
                final_params.with_max_features(MaxFeatures::Fixed(value))
            }
            None => {
                warn!("no max_features value could be scored, using the default");
                final_params
            }
        };

        let forest_config = final_params.forest_config(config.seed)?;
        let start = Instant::now();
        let model = pool
            .install(|| Model::fit(&forest_config, data.x_train.view(), &data.y_train))
            .context("final random forest training failed")?;
        let training_duration = start.elapsed() + tuning_duration;

        pool.install(|| write_predictions(dataset, config, &model, &data))?;

        Ok(RunSummary {
            models_count: model.n_trees(),
            training_duration: training_duration.as_secs_f64(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_values_truncate_and_dedup() {
        assert_eq!(pick_values_uniform(1, 10, 6), vec![1, 2, 4, 6, 8, 10]);
        assert_eq!(pick_values_uniform(10, 100, 6), vec![10, 28, 46, 64, 82, 100]);
        assert_eq!(pick_values_uniform(2, 4, 10), vec![2, 3, 4]);
        assert_eq!(pick_values_uniform(1, 1, 6), vec![1]);
    }

    #[test]
    fn candidates_around_sqrt() {
        assert_eq!(
            max_features_candidates(100),
            vec![10, 1, 2, 4, 6, 8, 28, 46, 64, 82, 100]
        );
        assert_eq!(max_features_candidates(4), vec![2, 1, 3, 4]);
        assert_eq!(max_features_candidates(1), vec![1]);
    }

    #[test]
    fn candidates_stay_in_range() {
        for p in 1..60 {
            let candidates = max_features_candidates(p);
            assert!(candidates.len() <= 11);
            assert!(candidates.iter().all(|&v| (1..=p).contains(&v)), "p = {p}: {candidates:?}");
            let mut unique = candidates.clone();
            unique.sort_unstable();
            unique.dedup();
            assert_eq!(unique.len(), candidates.len(), "p = {p}: {candidates:?}");
        }
    }
}
