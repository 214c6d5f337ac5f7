//! Shuffled, optionally stratified, k-fold splitting.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::error::RfError;

/// Cross-validation configuration.
///
/// Construct via [`CrossValidation::new`], then chain `with_seed` if desired.
#[derive(Debug, Clone)]
pub struct CrossValidation {
    n_folds: usize,
    seed: u64,
}

/// One train/test partition of the sample indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    /// Indices used for fitting, ascending.
    pub train: Vec<usize>,
    /// Held-out indices, ascending.
    pub test: Vec<usize>,
}

impl CrossValidation {
    /// Create a new cross-validation config with the given number of folds.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::InvalidFoldCount`] if `n_folds` < 2.
    pub fn new(n_folds: usize) -> Result<Self, RfError> {
        if n_folds < 2 {
            return Err(RfError::InvalidFoldCount { n_folds });
        }
        Ok(Self { n_folds, seed: 42 })
    }

    /// Set the random seed for fold shuffling.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Return the number of folds.
    #[must_use]
    pub fn n_folds(&self) -> usize {
        self.n_folds
    }

    /// Split `0..n_samples` into `n_folds` folds.
    ///
    /// With `strata`, samples are grouped by label, shuffled within each
    /// group, then dealt round-robin across folds with a counter that carries
    /// over from one group to the next, so fold sizes differ by at most one
    /// and classes rarer than `n_folds` are still placed. Without `strata`
    /// the shuffled indices are dealt directly.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::TooFewSamplesForFolds`] | `n_samples < n_folds` |
    /// | [`RfError::LengthMismatch`] | `strata.len() != n_samples` |
    pub fn folds(&self, n_samples: usize, strata: Option<&[usize]>) -> Result<Vec<Fold>, RfError> {
        if n_samples < self.n_folds {
            return Err(RfError::TooFewSamplesForFolds {
                n_samples,
                n_folds: self.n_folds,
            });
        }
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        let groups: Vec<Vec<usize>> = match strata {
            Some(labels) => {
                if labels.len() != n_samples {
                    return Err(RfError::LengthMismatch {
                        what: "strata",
                        expected: n_samples,
                        got: labels.len(),
                    });
                }
                let n_groups = labels.iter().max().map_or(0, |m| m + 1);
                let mut groups = vec![Vec::new(); n_groups];
                for (i, &label) in labels.iter().enumerate() {
                    groups[label].push(i);
                }
                groups
            }
            None => vec![(0..n_samples).collect()],
        };

        let mut fold_of = vec![0usize; n_samples];
        let mut next = 0usize;
        for mut indices in groups {
            indices.shuffle(&mut rng);
            for idx in indices {
                fold_of[idx] = next % self.n_folds;
                next += 1;
            }
        }

        let folds: Vec<Fold> = (0..self.n_folds)
            .map(|k| {
                let (test, train): (Vec<usize>, Vec<usize>) =
                    (0..n_samples).partition(|&i| fold_of[i] == k);
                Fold { train, test }
            })
            .collect();
        debug!(
            n_folds = self.n_folds,
            n_samples,
            stratified = strata.is_some(),
            "folds assigned"
        );
        Ok(folds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_partition_all_samples() {
        let folds = CrossValidation::new(5).unwrap().folds(23, None).unwrap();
        assert_eq!(folds.len(), 5);
        let mut seen: Vec<usize> = folds.iter().flat_map(|f| f.test.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..23).collect::<Vec<_>>());
        for fold in &folds {
            assert_eq!(fold.train.len() + fold.test.len(), 23);
            assert!(fold.test.len() == 4 || fold.test.len() == 5);
            assert!(fold.train.iter().all(|i| !fold.test.contains(i)));
        }
    }

    #[test]
    fn stratified_folds_balance_classes() {
        let labels: Vec<usize> = (0..30).map(|i| usize::from(i >= 15)).collect();
        let folds = CrossValidation::new(3)
            .unwrap()
            .folds(30, Some(&labels))
            .unwrap();
        for fold in &folds {
            let ones = fold.test.iter().filter(|&&i| labels[i] == 1).count();
            assert_eq!(ones, 5);
            assert_eq!(fold.test.len(), 10);
        }
    }

    #[test]
    fn rare_class_still_assigned() {
        let labels = vec![0, 0, 0, 0, 0, 0, 1];
        let folds = CrossValidation::new(5)
            .unwrap()
            .folds(7, Some(&labels))
            .unwrap();
        let holding = folds.iter().filter(|f| f.test.contains(&6)).count();
        assert_eq!(holding, 1);
    }

    #[test]
    fn deterministic_per_seed() {
        let cv = CrossValidation::new(4).unwrap().with_seed(7);
        assert_eq!(cv.folds(20, None).unwrap(), cv.folds(20, None).unwrap());
    }

    #[test]
    fn invalid_fold_count() {
        assert!(CrossValidation::new(0).is_err());
        assert!(CrossValidation::new(1).is_err());
    }

    #[test]
    fn too_few_samples_for_folds() {
        let err = CrossValidation::new(5).unwrap().folds(3, None).unwrap_err();
        assert!(matches!(
            err,
            RfError::TooFewSamplesForFolds {
                n_samples: 3,
                n_folds: 5
            }
        ));
    }

    #[test]
    fn strata_length_checked() {
        let err = CrossValidation::new(2)
            .unwrap()
            .folds(4, Some(&[0, 1]))
            .unwrap_err();
        assert!(matches!(err, RfError::LengthMismatch { what: "strata", .. }));
    }
}
