//! Column-mean imputation of encoded matrices.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use tracing::debug;

use crate::error::ImputeError;

/// Per-column means learned from a training matrix.
///
/// Means are taken over non-`NaN` entries. A column with no observed value
/// imputes `0.0`, so the matrix keeps its width.
#[derive(Debug, Clone, PartialEq)]
pub struct MeanImputer {
    means: Array1<f64>,
}

impl MeanImputer {
    /// Learn column means from `data`.
    #[must_use]
    pub fn fit(data: ArrayView2<'_, f64>) -> Self {
        let means = data
            .axis_iter(Axis(1))
            .map(|column| {
                let (sum, count) = column
                    .iter()
                    .filter(|v| !v.is_nan())
                    .fold((0.0, 0usize), |(s, c), &v| (s + v, c + 1));
                if count == 0 { 0.0 } else { sum / count as f64 }
            })
            .collect::<Array1<f64>>();
        debug!(n_columns = means.len(), "imputer fitted");
        Self { means }
    }

    /// Fitted column means.
    #[must_use]
    pub fn means(&self) -> &Array1<f64> {
        &self.means
    }

    /// Replace every `NaN` with its column mean.
    ///
    /// # Errors
    ///
    /// Returns [`ImputeError::WidthMismatch`] if `data` has a different number
    /// of columns than the fitted matrix.
    pub fn transform(&self, data: ArrayView2<'_, f64>) -> Result<Array2<f64>, ImputeError> {
        if data.ncols() != self.means.len() {
            return Err(ImputeError::WidthMismatch {
                expected: self.means.len(),
                got: data.ncols(),
            });
        }
        let mut out = data.to_owned();
        for (mut column, &mean) in out.axis_iter_mut(Axis(1)).zip(self.means.iter()) {
            column.mapv_inplace(|v| if v.is_nan() { mean } else { v });
        }
        Ok(out)
    }
}

/// Fit a [`MeanImputer`] on `train` and apply it to both matrices.
///
/// # Errors
///
/// Returns [`ImputeError::WidthMismatch`] if `test` is narrower or wider than `train`.
pub fn impute(
    train: ArrayView2<'_, f64>,
    test: ArrayView2<'_, f64>,
) -> Result<(Array2<f64>, Array2<f64>), ImputeError> {
    let imputer = MeanImputer::fit(train);
    Ok((imputer.transform(train)?, imputer.transform(test)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn nan_replaced_with_train_mean() {
        let train = array![[1.0, f64::NAN], [3.0, 4.0], [f64::NAN, 8.0]];
        let test = array![[f64::NAN, f64::NAN]];
        let (train_imp, test_imp) = impute(train.view(), test.view()).unwrap();

        assert_eq!(train_imp, array![[1.0, 6.0], [3.0, 4.0], [2.0, 8.0]]);
        assert_eq!(test_imp, array![[2.0, 6.0]]);
    }

    #[test]
    fn all_missing_column_imputes_zero() {
        let train = array![[f64::NAN, 1.0], [f64::NAN, 2.0]];
        let imputer = MeanImputer::fit(train.view());
        assert_eq!(imputer.means(), &array![0.0, 1.5]);
        let out = imputer.transform(train.view()).unwrap();
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn width_mismatch_error() {
        let imputer = MeanImputer::fit(array![[1.0, 2.0]].view());
        let err = imputer.transform(array![[1.0]].view()).unwrap_err();
        assert!(matches!(err, ImputeError::WidthMismatch { expected: 2, got: 1 }));
    }
}
