//! Configuration builder for Random Forest training.

use ndarray::ArrayView2;

use crate::error::RfError;
use crate::forest::{RandomForestClassifier, RandomForestRegressor};
use crate::split::SplitCriterion;

/// Strategy for determining the number of features to consider at each split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaxFeatures {
    /// Square root of total features, rounded down.
    Sqrt,
    /// Log base 2 of total features, rounded down.
    Log2,
    /// A fraction of total features (in (0.0, 1.0]), rounded down.
    Fraction(f64),
    /// A fixed count.
    Fixed(usize),
    /// All features (no subsampling).
    All,
}

impl MaxFeatures {
    /// Resolve to a concrete feature count for `n_features` columns.
    ///
    /// Rounded-down strategies never resolve below 1.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::InvalidMaxFeatures`] when the count is 0 or exceeds
    /// `n_features`.
    pub fn resolve(self, n_features: usize) -> Result<usize, RfError> {
        let n = n_features as f64;
        let resolved = match self {
            MaxFeatures::Sqrt => (n.sqrt().floor() as usize).max(1),
            MaxFeatures::Log2 => (n.log2().floor().max(0.0) as usize).max(1),
            MaxFeatures::Fraction(f) if f > 0.0 => ((n * f).floor() as usize).max(1),
            MaxFeatures::Fraction(_) => 0,
            MaxFeatures::Fixed(count) => count,
            MaxFeatures::All => n_features,
        };
        if resolved == 0 || resolved > n_features {
            return Err(RfError::InvalidMaxFeatures {
                max_features: resolved,
                n_features,
            });
        }
        Ok(resolved)
    }
}

/// Configuration for Random Forest training.
///
/// Construct via [`RandomForestConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter            | Default     |
/// |----------------------|-------------|
/// | `max_features`       | `Sqrt` for classifiers, `All` for regressors |
/// | `max_depth`          | `None`      |
/// | `min_samples_split`  | 2           |
/// | `min_samples_leaf`   | 1           |
/// | `criterion`          | `Gini`      |
/// | `bootstrap`          | `true`      |
/// | `seed`               | 42          |
#[derive(Debug, Clone)]
pub struct RandomForestConfig {
    pub(crate) n_trees: usize,
    pub(crate) max_features: Option<MaxFeatures>,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_samples_split: usize,
    pub(crate) min_samples_leaf: usize,
    pub(crate) criterion: SplitCriterion,
    pub(crate) bootstrap: bool,
    pub(crate) seed: u64,
}

impl RandomForestConfig {
    /// Create a new config with the given number of trees.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::InvalidTreeCount`] if `n_trees` is zero.
    pub fn new(n_trees: usize) -> Result<Self, RfError> {
        if n_trees == 0 {
            return Err(RfError::InvalidTreeCount { n_trees });
        }
        Ok(Self {
            n_trees,
            max_features: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            criterion: SplitCriterion::Gini,
            bootstrap: true,
            seed: 42,
        })
    }

    /// Set the max features strategy.
    #[must_use]
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = Some(max_features);
        self
    }

    /// Set the maximum tree depth. `None` means unlimited.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the minimum number of samples required to attempt a split.
    #[must_use]
    pub fn with_min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.min_samples_split = min_samples_split;
        self
    }

    /// Set the minimum number of samples required in each leaf after a split.
    #[must_use]
    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf;
        self
    }

    /// Set the classification split criterion (ignored by regressors).
    #[must_use]
    pub fn with_criterion(mut self, criterion: SplitCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Draw a bootstrap sample per tree (`false` trains every tree on all rows).
    #[must_use]
    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// Set the random seed for reproducibility.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Return the number of trees.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.n_trees
    }

    /// Return the explicit max features strategy, if set.
    #[must_use]
    pub fn max_features(&self) -> Option<MaxFeatures> {
        self.max_features
    }

    /// Return the maximum depth limit, if any.
    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Return the minimum samples required to split a node.
    #[must_use]
    pub fn min_samples_split(&self) -> usize {
        self.min_samples_split
    }

    /// Return the minimum samples required in each leaf.
    #[must_use]
    pub fn min_samples_leaf(&self) -> usize {
        self.min_samples_leaf
    }

    /// Return the split criterion.
    #[must_use]
    pub fn criterion(&self) -> SplitCriterion {
        self.criterion
    }

    /// Return whether trees are trained on bootstrap samples.
    #[must_use]
    pub fn bootstrap(&self) -> bool {
        self.bootstrap
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Train a classifier.
    ///
    /// `features` is row-major (samples × features); `labels[i]` is the
    /// zero-based class of sample `i`, below `n_classes`.
    ///
    /// # Errors
    ///
    /// | Variant                               | When                                              |
    /// |---------------------------------------|---------------------------------------------------|
    /// | [`RfError::EmptyDataset`]             | `features` has no rows                            |
    /// | [`RfError::ZeroFeatures`]             | `features` has no columns                         |
    /// | [`RfError::LengthMismatch`]           | `labels` length differs from the row count        |
    /// | [`RfError::NonFiniteValue`]           | any value is NaN or infinite                      |
    /// | [`RfError::LabelOutOfRange`]          | a label is `>= n_classes`                         |
    /// | [`RfError::InvalidMaxFeatures`]       | resolved max_features is outside [1, n_features]  |
    /// | [`RfError::InvalidMaxDepth`] and friends | invalid growth limits                          |
    pub fn fit_classifier(
        &self,
        features: ArrayView2<'_, f64>,
        labels: &[usize],
        n_classes: usize,
    ) -> Result<RandomForestClassifier, RfError> {
        crate::forest::train_classifier(self, features, labels, n_classes)
    }

    /// Train a regressor.
    ///
    /// # Errors
    ///
    /// As [`fit_classifier`](Self::fit_classifier), with
    /// [`RfError::NonFiniteTarget`] for NaN or infinite targets in place of
    /// label checks.
    pub fn fit_regressor(
        &self,
        features: ArrayView2<'_, f64>,
        targets: &[f64],
    ) -> Result<RandomForestRegressor, RfError> {
        crate::forest::train_regressor(self, features, targets)
    }

    pub(crate) fn validate_limits(&self) -> Result<(), RfError> {
        if let Some(d) = self.max_depth
            && d == 0
        {
            return Err(RfError::InvalidMaxDepth { max_depth: 0 });
        }
        if self.min_samples_split < 2 {
            return Err(RfError::InvalidMinSamplesSplit {
                min_samples_split: self.min_samples_split,
            });
        }
        if self.min_samples_leaf < 1 {
            return Err(RfError::InvalidMinSamplesLeaf {
                min_samples_leaf: self.min_samples_leaf,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_strategies() {
        assert_eq!(MaxFeatures::Sqrt.resolve(10).unwrap(), 3);
        assert_eq!(MaxFeatures::Log2.resolve(10).unwrap(), 3);
        assert_eq!(MaxFeatures::Fraction(0.5).resolve(7).unwrap(), 3);
        assert_eq!(MaxFeatures::Sqrt.resolve(1).unwrap(), 1);
        assert_eq!(MaxFeatures::All.resolve(4).unwrap(), 4);
    }

    #[test]
    fn resolve_out_of_range() {
        assert!(matches!(
            MaxFeatures::Fixed(5).resolve(4),
            Err(RfError::InvalidMaxFeatures { max_features: 5, n_features: 4 })
        ));
        assert!(MaxFeatures::Fixed(0).resolve(4).is_err());
        assert!(MaxFeatures::Fraction(0.0).resolve(4).is_err());
    }

    #[test]
    fn invalid_limits() {
        let cfg = RandomForestConfig::new(1).unwrap().with_max_depth(Some(0));
        assert!(matches!(cfg.validate_limits(), Err(RfError::InvalidMaxDepth { .. })));
        let cfg = RandomForestConfig::new(1).unwrap().with_min_samples_split(1);
        assert!(matches!(
            cfg.validate_limits(),
            Err(RfError::InvalidMinSamplesSplit { .. })
        ));
        assert!(RandomForestConfig::new(0).is_err());
    }
}
