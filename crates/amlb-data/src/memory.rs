//! Datasets whose splits are pre-loaded arrays.

use std::path::Path;
use std::sync::Arc;

use ndarray::Array2;

use crate::dataset::{Dataset, DatasetType};
use crate::error::{DataLoadError, DatasetLoadError};
use crate::feature::Feature;
use crate::schema::Schema;
use crate::split::{Datasplit, RawRetention, SplitKind, SplitSource};
use crate::value::Value;

/// A split source backed by an in-memory matrix.
///
/// Every load hands out a fresh copy, so releasing a split's caches and
/// reloading behaves like re-reading a file.
#[derive(Debug, Clone)]
pub struct ArraySource {
    data: Arc<Array2<Value>>,
}

impl ArraySource {
    /// Wrap a raw matrix.
    pub fn new(data: Array2<Value>) -> Self {
        Self {
            data: Arc::new(data),
        }
    }
}

impl SplitSource for ArraySource {
    fn path(&self) -> Option<&Path> {
        None
    }

    fn load(&self, _features: &[Feature]) -> Result<Array2<Value>, DataLoadError> {
        Ok(self.data.as_ref().clone())
    }
}

/// A dataset built from pre-loaded train and test matrices.
#[derive(Debug)]
pub struct InMemoryDataset {
    schema: Arc<Schema>,
    train: Datasplit,
    test: Datasplit,
    dataset_type: DatasetType,
}

impl InMemoryDataset {
    /// Build a dataset from features, the target name and raw split matrices.
    ///
    /// The task type is inferred from the target; see [`DatasetType::infer`].
    ///
    /// # Errors
    ///
    /// Returns a [`DatasetLoadError`] if the features are inconsistent or no
    /// feature is named `target`.
    pub fn new(
        features: Vec<Feature>,
        target: &str,
        train: Array2<Value>,
        test: Array2<Value>,
    ) -> Result<Self, DatasetLoadError> {
        let schema = Schema::new(features, target)?;
        let dataset_type = DatasetType::infer(schema.target());
        Ok(Self {
            train: Datasplit::new(SplitKind::Train, &schema, ArraySource::new(train)),
            test: Datasplit::new(SplitKind::Test, &schema, ArraySource::new(test)),
            schema,
            dataset_type,
        })
    }

    /// Override the inferred task type.
    #[must_use]
    pub fn with_type(mut self, dataset_type: DatasetType) -> Self {
        self.dataset_type = dataset_type;
        self
    }

    /// Set the raw-retention mode of both splits.
    #[must_use]
    pub fn with_raw_retention(mut self, retention: RawRetention) -> Self {
        self.train = self.train.with_raw_retention(retention);
        self.test = self.test.with_raw_retention(retention);
        self
    }
}

impl Dataset for InMemoryDataset {
    fn dataset_type(&self) -> DatasetType {
        self.dataset_type
    }

    fn train(&self) -> &Datasplit {
        &self.train
    }

    fn test(&self) -> &Datasplit {
        &self.test
    }

    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}
