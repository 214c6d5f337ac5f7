//! Validated feature list shared between a dataset and its splits.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::DatasetLoadError;
use crate::feature::Feature;

/// The ordered features of a dataset and which one is the target.
///
/// Owned by the dataset behind an `Arc`; splits keep a `Weak` handle.
#[derive(Debug)]
pub struct Schema {
    features: Vec<Feature>,
    target: usize,
}

impl Schema {
    /// Validate `features` and mark the feature named `target` as the target.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DatasetLoadError::NoFeatures`] | `features` is empty |
    /// | [`DatasetLoadError::IndexMismatch`] | A feature's index is not its position |
    /// | [`DatasetLoadError::DuplicateFeature`] | Two features share a name |
    /// | [`DatasetLoadError::UnknownTarget`] | No feature is named `target` |
    pub fn new(mut features: Vec<Feature>, target: &str) -> Result<Arc<Self>, DatasetLoadError> {
        if features.is_empty() {
            return Err(DatasetLoadError::NoFeatures);
        }

        let mut seen: HashMap<&str, usize> = HashMap::with_capacity(features.len());
        for (position, feature) in features.iter().enumerate() {
            if feature.index() != position {
                return Err(DatasetLoadError::IndexMismatch {
                    name: feature.name().to_string(),
                    index: feature.index(),
                    position,
                });
            }
            if let Some(&first) = seen.get(feature.name()) {
                return Err(DatasetLoadError::DuplicateFeature {
                    name: feature.name().to_string(),
                    first,
                    second: position,
                });
            }
            seen.insert(feature.name(), position);
        }

        let target_index = *seen.get(target).ok_or_else(|| DatasetLoadError::UnknownTarget {
            target: target.to_string(),
        })?;
        drop(seen);

        for feature in &mut features {
            let is_target = feature.index() == target_index;
            feature.set_target(is_target);
        }

        Ok(Arc::new(Self {
            features,
            target: target_index,
        }))
    }

    /// Return all features in declared order.
    #[must_use]
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Return the target feature.
    #[must_use]
    pub fn target(&self) -> &Feature {
        &self.features[self.target]
    }

    /// Return every feature except the target, in declared order.
    #[must_use]
    pub fn predictors(&self) -> Vec<&Feature> {
        let target = self.target().name();
        self.features.iter().filter(|f| f.name() != target).collect()
    }

    /// Column indices of the predictors.
    #[must_use]
    pub fn predictor_indices(&self) -> Vec<usize> {
        self.predictors().iter().map(|f| f.index()).collect()
    }

    /// Look a feature up by name.
    #[must_use]
    pub fn feature(&self, name: &str) -> Option<&Feature> {
        self.features.iter().find(|f| f.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DataType;

    fn features(names: &[&str]) -> Vec<Feature> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| Feature::new(i, *n, Some(DataType::Numeric)))
            .collect()
    }

    #[test]
    fn marks_exactly_one_target() {
        let schema = Schema::new(features(&["a", "b", "c"]), "b").unwrap();
        let flagged: Vec<&str> = schema
            .features()
            .iter()
            .filter(|f| f.is_target())
            .map(|f| f.name())
            .collect();
        assert_eq!(flagged, vec!["b"]);
        assert_eq!(schema.target().name(), "b");
        assert_eq!(schema.predictor_indices(), vec![0, 2]);
    }

    #[test]
    fn unknown_target_error() {
        let err = Schema::new(features(&["a", "b"]), "z").unwrap_err();
        assert!(matches!(err, DatasetLoadError::UnknownTarget { .. }));
    }

    #[test]
    fn duplicate_name_error() {
        let err = Schema::new(features(&["a", "b", "a"]), "b").unwrap_err();
        assert!(matches!(
            err,
            DatasetLoadError::DuplicateFeature { first: 0, second: 2, .. }
        ));
    }

    #[test]
    fn index_mismatch_error() {
        let fs = vec![Feature::new(1, "a", None), Feature::new(0, "b", None)];
        let err = Schema::new(fs, "a").unwrap_err();
        assert!(matches!(err, DatasetLoadError::IndexMismatch { .. }));
    }

    #[test]
    fn empty_feature_list_error() {
        assert!(matches!(Schema::new(Vec::new(), "a"), Err(DatasetLoadError::NoFeatures)));
    }
}
