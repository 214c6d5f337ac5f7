//! Scoring metrics for model selection.
//!
//! Every score is higher-is-better: loss metrics are negated.

use std::fmt;
use std::str::FromStr;

use ndarray::ArrayView2;

use crate::error::RfError;

const LOG_LOSS_EPS: f64 = 1e-15;

/// A metric used to compare candidate models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// Fraction of correctly classified samples.
    Accuracy,
    /// Negated mean cross-entropy of the true class probability.
    LogLoss,
    /// Area under the ROC curve; one-vs-rest macro average for multiclass.
    Auc,
    /// Negated root mean squared error.
    Rmse,
    /// Negated mean absolute error.
    Mae,
    /// Coefficient of determination.
    R2,
}

impl Metric {
    /// Return the short name used on the command line.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Metric::Accuracy => "acc",
            Metric::LogLoss => "logloss",
            Metric::Auc => "auc",
            Metric::Rmse => "rmse",
            Metric::Mae => "mae",
            Metric::R2 => "r2",
        }
    }

    /// Return `true` for metrics scored on class probabilities.
    #[must_use]
    pub fn is_classification(self) -> bool {
        matches!(self, Metric::Accuracy | Metric::LogLoss | Metric::Auc)
    }

    /// Score class probabilities (`n_samples × n_classes`) against labels.
    ///
    /// AUC is `NaN` when no class has both positive and negative samples.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::MetricTaskMismatch`] | a regression metric |
    /// | [`RfError::EmptyDataset`] | no samples |
    /// | [`RfError::LengthMismatch`] | `truth` and `proba` rows differ |
    /// | [`RfError::LabelOutOfRange`] | a label has no probability column |
    pub fn score_classification(
        self,
        truth: &[usize],
        proba: ArrayView2<'_, f64>,
    ) -> Result<f64, RfError> {
        if !self.is_classification() {
            return Err(RfError::MetricTaskMismatch {
                metric: self.name(),
                task: "classification",
            });
        }
        check_lengths(truth.len(), proba.nrows())?;
        let n_classes = proba.ncols();
        if let Some((sample_index, &label)) =
            truth.iter().enumerate().find(|(_, l)| **l >= n_classes)
        {
            return Err(RfError::LabelOutOfRange {
                sample_index,
                label,
                n_classes,
            });
        }

        let n = truth.len() as f64;
        let score = match self {
            Metric::Accuracy => {
                let correct = proba
                    .rows()
                    .into_iter()
                    .zip(truth)
                    .filter(|(row, label)| argmax(row.iter().copied()) == **label)
                    .count();
                correct as f64 / n
            }
            Metric::LogLoss => {
                let total: f64 = truth
                    .iter()
                    .enumerate()
                    .map(|(i, &label)| {
                        -proba[[i, label]].clamp(LOG_LOSS_EPS, 1.0 - LOG_LOSS_EPS).ln()
                    })
                    .sum();
                -(total / n)
            }
            _ => macro_auc(truth, proba),
        };
        Ok(score)
    }

    /// Score regression predictions against targets.
    ///
    /// R² is `NaN` when the targets are constant.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::MetricTaskMismatch`] | a classification metric |
    /// | [`RfError::EmptyDataset`] | no samples |
    /// | [`RfError::LengthMismatch`] | `truth` and `predictions` differ in length |
    pub fn score_regression(self, truth: &[f64], predictions: &[f64]) -> Result<f64, RfError> {
        if self.is_classification() {
            return Err(RfError::MetricTaskMismatch {
                metric: self.name(),
                task: "regression",
            });
        }
        check_lengths(truth.len(), predictions.len())?;
        let n = truth.len() as f64;
        let residuals = truth.iter().zip(predictions).map(|(t, p)| t - p);
        let score = match self {
            Metric::Rmse => -(residuals.map(|r| r * r).sum::<f64>() / n).sqrt(),
            Metric::Mae => -(residuals.map(f64::abs).sum::<f64>() / n),
            _ => {
                let mean = truth.iter().sum::<f64>() / n;
                let ss_res: f64 = residuals.map(|r| r * r).sum();
                let ss_tot: f64 = truth.iter().map(|t| (t - mean) * (t - mean)).sum();
                if ss_tot == 0.0 {
                    f64::NAN
                } else {
                    1.0 - ss_res / ss_tot
                }
            }
        };
        Ok(score)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = RfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "acc" | "accuracy" => Ok(Metric::Accuracy),
            "logloss" => Ok(Metric::LogLoss),
            "auc" => Ok(Metric::Auc),
            "rmse" => Ok(Metric::Rmse),
            "mae" => Ok(Metric::Mae),
            "r2" => Ok(Metric::R2),
            _ => Err(RfError::UnknownMetric { name: s.to_string() }),
        }
    }
}

fn check_lengths(expected: usize, got: usize) -> Result<(), RfError> {
    if expected == 0 {
        return Err(RfError::EmptyDataset);
    }
    if expected != got {
        return Err(RfError::LengthMismatch {
            what: "predictions",
            expected,
            got,
        });
    }
    Ok(())
}

/// Index of the largest value, lowest index on ties.
fn argmax(values: impl Iterator<Item = f64>) -> usize {
    values
        .enumerate()
        .fold((0usize, f64::NEG_INFINITY), |best, (idx, v)| {
            if v > best.1 { (idx, v) } else { best }
        })
        .0
}

/// Binary AUC by the rank-sum statistic, with tied scores sharing their
/// average rank. `None` unless both classes are present.
fn binary_auc(scores: &[f64], positive: &[bool]) -> Option<f64> {
    let n_pos = positive.iter().filter(|&&p| p).count();
    let n_neg = positive.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_unstable_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        // ranks are 1-based: positions start..end share (start + 1 + end) / 2
        let avg_rank = (start + 1 + end) as f64 / 2.0;
        rank_sum += avg_rank * order[start..end].iter().filter(|&&i| positive[i]).count() as f64;
        start = end;
    }

    let n_pos = n_pos as f64;
    Some((rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg as f64))
}

fn macro_auc(truth: &[usize], proba: ArrayView2<'_, f64>) -> f64 {
    if proba.ncols() == 2 {
        let scores = proba.column(1).to_vec();
        let positive: Vec<bool> = truth.iter().map(|&l| l == 1).collect();
        return binary_auc(&scores, &positive).unwrap_or(f64::NAN);
    }
    let per_class: Vec<f64> = (0..proba.ncols())
        .filter_map(|class| {
            let scores = proba.column(class).to_vec();
            let positive: Vec<bool> = truth.iter().map(|&l| l == class).collect();
            binary_auc(&scores, &positive)
        })
        .collect();
    if per_class.is_empty() {
        return f64::NAN;
    }
    per_class.iter().sum::<f64>() / per_class.len() as f64
}
