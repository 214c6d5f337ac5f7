//! The dataset abstraction: two splits, a feature list and a target.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::feature::{CategoricalRule, Feature};
use crate::schema::Schema;
use crate::split::Datasplit;

/// Prediction task posed by a dataset's target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetType {
    /// Two target classes.
    Binary,
    /// More than two target classes.
    Multiclass,
    /// Numeric target.
    Regression,
}

impl DatasetType {
    /// Infer the task from the target feature.
    ///
    /// A categorical target (lax rule) with exactly two declared values is
    /// binary, any other categorical target multiclass, anything else
    /// regression.
    #[must_use]
    pub fn infer(target: &Feature) -> Self {
        if !target.is_categorical(CategoricalRule::Lax) {
            return DatasetType::Regression;
        }
        match target.values() {
            Some(values) if values.len() == 2 => DatasetType::Binary,
            _ => DatasetType::Multiclass,
        }
    }

    /// `true` for binary and multiclass tasks.
    #[must_use]
    pub fn is_classification(self) -> bool {
        !matches!(self, DatasetType::Regression)
    }
}

impl fmt::Display for DatasetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DatasetType::Binary => "binary",
            DatasetType::Multiclass => "multiclass",
            DatasetType::Regression => "regression",
        })
    }
}

/// Properties a dataset caches for itself (as opposed to its splits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetProperty {
    /// The inferred [`DatasetType`].
    Type,
}

/// A benchmark dataset: train and test splits over one feature list.
///
/// Concrete sources implement the accessors; predictor selection and
/// release cascading are shared.
pub trait Dataset: Send + Sync {
    /// The prediction task.
    fn dataset_type(&self) -> DatasetType;

    /// The training split.
    fn train(&self) -> &Datasplit;

    /// The test split.
    fn test(&self) -> &Datasplit;

    /// Shared feature metadata.
    fn schema(&self) -> &Arc<Schema>;

    /// Clear the dataset's own cached properties (all when `None`).
    fn clear_cached(&self, _properties: Option<&[DatasetProperty]>) {}

    /// All features in declared order.
    fn features(&self) -> &[Feature] {
        self.schema().features()
    }

    /// The target feature.
    fn target(&self) -> &Feature {
        self.schema().target()
    }

    /// Every feature whose name differs from the target's.
    fn predictors(&self) -> Vec<&Feature> {
        self.schema().predictors()
    }

    /// Release both splits entirely, then the dataset's own cached
    /// properties named in `properties` (all when `None`).
    ///
    /// The filter applies only to the dataset's own cache. Idempotent.
    fn release(&self, properties: Option<&[DatasetProperty]>) {
        debug!("releasing dataset caches");
        self.train().release(None);
        self.test().release(None);
        self.clear_cached(properties);
    }
}
