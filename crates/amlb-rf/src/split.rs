use rand::Rng;

use crate::node::{FeatureIndex, Impurity, LeafOutput};

/// Criterion for measuring the quality of a classification split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitCriterion {
    /// Gini impurity: 1 - Σ(p_i²)
    Gini,
    /// Information entropy: -Σ(p_i · ln(p_i))
    Entropy,
}

impl SplitCriterion {
    /// Compute the impurity of a node from its class counts.
    ///
    /// Returns `Impurity(0.0)` when `n_samples` is zero.
    #[must_use]
    pub fn impurity(&self, class_counts: &[usize], n_samples: usize) -> Impurity {
        if n_samples == 0 {
            return Impurity::new(0.0);
        }
        let n = n_samples as f64;
        let value = match self {
            SplitCriterion::Gini => {
                let sum_sq: f64 = class_counts
                    .iter()
                    .map(|&c| {
                        let p = c as f64 / n;
                        p * p
                    })
                    .sum();
                1.0 - sum_sq
            }
            SplitCriterion::Entropy => {
                -class_counts
                    .iter()
                    .filter(|&&c| c > 0)
                    .map(|&c| {
                        let p = c as f64 / n;
                        p * p.ln()
                    })
                    .sum::<f64>()
            }
        };
        Impurity::new(value)
    }
}

/// What a tree is fitted to: running sufficient statistics over the samples
/// of a node, their impurity, and the leaf they produce.
pub(crate) trait Objective: Sync {
    type Stats: Clone;

    fn empty(&self) -> Self::Stats;
    fn push(&self, stats: &mut Self::Stats, sample: usize);
    fn pop(&self, stats: &mut Self::Stats, sample: usize);
    fn impurity(&self, stats: &Self::Stats, n_samples: usize) -> Impurity;
    fn leaf(&self, stats: &Self::Stats, n_samples: usize) -> LeafOutput;

    fn stats(&self, samples: &[usize]) -> Self::Stats {
        let mut stats = self.empty();
        for &si in samples {
            self.push(&mut stats, si);
        }
        stats
    }
}

/// Class labels scored by Gini or entropy.
pub(crate) struct Classification<'a> {
    pub(crate) labels: &'a [usize],
    pub(crate) n_classes: usize,
    pub(crate) criterion: SplitCriterion,
}

impl Objective for Classification<'_> {
    type Stats = Vec<usize>;

    fn empty(&self) -> Vec<usize> {
        vec![0; self.n_classes]
    }

    fn push(&self, stats: &mut Vec<usize>, sample: usize) {
        stats[self.labels[sample]] += 1;
    }

    fn pop(&self, stats: &mut Vec<usize>, sample: usize) {
        stats[self.labels[sample]] -= 1;
    }

    fn impurity(&self, stats: &Vec<usize>, n_samples: usize) -> Impurity {
        self.criterion.impurity(stats, n_samples)
    }

    fn leaf(&self, stats: &Vec<usize>, n_samples: usize) -> LeafOutput {
        let total = n_samples.max(1) as f64;
        LeafOutput::Distribution(stats.iter().map(|&c| c as f64 / total).collect())
    }
}

/// Continuous targets scored by variance (mean squared error).
pub(crate) struct Regression<'a> {
    pub(crate) targets: &'a [f64],
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Moments {
    sum: f64,
    sum_sq: f64,
}

impl Objective for Regression<'_> {
    type Stats = Moments;

    fn empty(&self) -> Moments {
        Moments::default()
    }

    fn push(&self, stats: &mut Moments, sample: usize) {
        let y = self.targets[sample];
        stats.sum += y;
        stats.sum_sq += y * y;
    }

    fn pop(&self, stats: &mut Moments, sample: usize) {
        let y = self.targets[sample];
        stats.sum -= y;
        stats.sum_sq -= y * y;
    }

    fn impurity(&self, stats: &Moments, n_samples: usize) -> Impurity {
        if n_samples == 0 {
            return Impurity::new(0.0);
        }
        let n = n_samples as f64;
        let mean = stats.sum / n;
        // cancellation can push the difference slightly below zero
        Impurity::new((stats.sum_sq / n - mean * mean).max(0.0))
    }

    fn leaf(&self, stats: &Moments, n_samples: usize) -> LeafOutput {
        LeafOutput::Mean(stats.sum / n_samples.max(1) as f64)
    }
}

/// Result of finding the best split for a node.
#[derive(Debug, Clone)]
pub(crate) struct SplitResult {
    pub(crate) feature: FeatureIndex,
    pub(crate) threshold: f64,
    pub(crate) left_indices: Vec<usize>,
    pub(crate) right_indices: Vec<usize>,
}

/// Find the best split among a random subset of features.
///
/// For each of `max_features` randomly chosen features, sorts the samples by
/// value, scans left-to-right with incremental statistic updates, and tracks
/// the globally best split by weighted impurity decrease.
///
/// Returns `None` when no valid split exists (all values identical, or the
/// split would violate `min_samples_leaf`).
///
/// `columns` is column-major: `columns[feature_idx][sample_idx]`.
pub(crate) fn find_best_split<O: Objective>(
    columns: &[Vec<f64>],
    sample_indices: &[usize],
    objective: &O,
    max_features: usize,
    min_samples_leaf: usize,
    rng: &mut impl Rng,
) -> Option<SplitResult> {
    let n_features = columns.len();
    let n_samples = sample_indices.len();
    if n_samples == 0 || n_features == 0 {
        return None;
    }

    let parent = objective.stats(sample_indices);
    let parent_impurity = objective.impurity(&parent, n_samples);

    // Partial Fisher-Yates: shuffle only the first `max_features` positions.
    let mut feature_order: Vec<usize> = (0..n_features).collect();
    let take = max_features.min(n_features);
    for i in 0..take {
        let j = rng.gen_range(i..n_features);
        feature_order.swap(i, j);
    }

    let mut best_decrease = f64::NEG_INFINITY;
    let mut best: Option<(FeatureIndex, f64)> = None;

    for &feat_idx in &feature_order[..take] {
        let column = &columns[feat_idx];
        let mut sorted: Vec<(f64, usize)> =
            sample_indices.iter().map(|&si| (column[si], si)).collect();
        sorted.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

        let mut left = objective.empty();
        let mut right = parent.clone();

        for i in 0..(n_samples - 1) {
            let (val_i, si) = sorted[i];
            objective.push(&mut left, si);
            objective.pop(&mut right, si);

            let n_left = i + 1;
            let n_right = n_samples - n_left;

            let val_next = sorted[i + 1].0;
            if val_i == val_next {
                continue;
            }
            if n_left < min_samples_leaf || n_right < min_samples_leaf {
                continue;
            }

            let decrease = (n_samples as f64) * parent_impurity.value()
                - (n_left as f64) * objective.impurity(&left, n_left).value()
                - (n_right as f64) * objective.impurity(&right, n_right).value();

            if decrease > best_decrease {
                best_decrease = decrease;
                best = Some((FeatureIndex::new(feat_idx), (val_i + val_next) / 2.0));
            }
        }
    }

    let (feature, threshold) = best?;
    let column = &columns[feature.index()];
    let (left_indices, right_indices): (Vec<usize>, Vec<usize>) =
        sample_indices.iter().partition(|&&si| column[si] <= threshold);

    Some(SplitResult {
        feature,
        threshold,
        left_indices,
        right_indices,
    })
}
