//! Datasets backed by a pair of train/test files.

use std::convert::Infallible;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, instrument};

use crate::arff::{ArffSource, infer_arff_features, scan_arff_column};
use crate::cache::Cached;
use crate::csv_source::{CsvSource, infer_csv_features, scan_csv_column};
use crate::dataset::{Dataset, DatasetProperty, DatasetType};
use crate::error::{DataError, DataLoadError};
use crate::feature::{DataType, Feature};
use crate::schema::Schema;
use crate::split::{Datasplit, RawRetention, SplitKind};

/// On-disk format of a split file, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    /// `.arff`
    Arff,
    /// `.csv`
    Csv,
}

impl DataFormat {
    /// Detect the format from the file extension (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`DataLoadError::UnsupportedFormat`] for any other extension.
    pub fn from_path(path: &Path) -> Result<Self, DataLoadError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("arff") => Ok(DataFormat::Arff),
            Some("csv") => Ok(DataFormat::Csv),
            _ => Err(DataLoadError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DataFormat::Arff => "arff",
            DataFormat::Csv => "csv",
        })
    }
}

/// A dataset whose splits are read lazily from two files of one format.
///
/// Feature metadata is built eagerly at [`open`](Self::open); split data is
/// only read on first access.
#[derive(Debug)]
pub struct FileDataset {
    schema: Arc<Schema>,
    train: Datasplit,
    test: Datasplit,
    train_path: PathBuf,
    test_path: PathBuf,
    format: DataFormat,
    declared_type: Option<DatasetType>,
    inferred_type: Cached<DatasetType>,
}

impl FileDataset {
    /// Open a train/test file pair and declare `target` as the target feature.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DataLoadError::UnsupportedFormat`] | Extension is not `.arff`/`.csv`, or the two files differ in format |
    /// | [`DatasetLoadError::SplitSchemaMismatch`](crate::DatasetLoadError::SplitSchemaMismatch) | Files declare different features |
    /// | [`DatasetLoadError::UnknownTarget`](crate::DatasetLoadError::UnknownTarget) | No feature is named `target` |
    /// | Other [`DataLoadError`]s | Unreadable or malformed files |
    #[instrument(skip_all, fields(train = %train.display(), test = %test.display(), target))]
    pub fn open(train: &Path, test: &Path, target: &str) -> Result<Self, DataError> {
        let format = DataFormat::from_path(train)?;
        if DataFormat::from_path(test)? != format {
            return Err(DataLoadError::UnsupportedFormat {
                path: test.to_path_buf(),
            }
            .into());
        }

        let features = match format {
            DataFormat::Arff => infer_arff_features(train, test)?,
            DataFormat::Csv => infer_csv_features(&[train, test])?,
        };
        let schema = Schema::new(features, target)?;
        let (train_split, test_split) = Self::splits(format, &schema, train, test);

        info!(
            %format,
            n_features = schema.features().len(),
            target = schema.target().name(),
            "dataset opened"
        );
        Ok(Self {
            schema,
            train: train_split,
            test: test_split,
            train_path: train.to_path_buf(),
            test_path: test.to_path_buf(),
            format,
            declared_type: None,
            inferred_type: Cached::new(),
        })
    }

    fn splits(format: DataFormat, schema: &Arc<Schema>, train: &Path, test: &Path) -> (Datasplit, Datasplit) {
        match format {
            DataFormat::Arff => (
                Datasplit::new(SplitKind::Train, schema, ArffSource::new(train)),
                Datasplit::new(SplitKind::Test, schema, ArffSource::new(test)),
            ),
            DataFormat::Csv => (
                Datasplit::new(SplitKind::Train, schema, CsvSource::new(train)),
                Datasplit::new(SplitKind::Test, schema, CsvSource::new(test)),
            ),
        }
    }

    /// Declare the task type instead of inferring it from the target.
    ///
    /// Declaring a classification task over a target with no categorical
    /// values (integer class labels, say) turns the target into a
    /// [`DataType::Categorical`] feature whose values are the sorted distinct
    /// cells of both files.
    ///
    /// # Errors
    ///
    /// Returns [`DataLoadError`]s when the files cannot be rescanned for the
    /// target's values.
    pub fn with_type(mut self, dataset_type: DatasetType) -> Result<Self, DataError> {
        if dataset_type.is_classification() && self.schema.target().values().is_none() {
            self = self.with_categorical_target()?;
        }
        self.declared_type = Some(dataset_type);
        Ok(self)
    }

    #[instrument(skip_all, fields(target = self.schema.target().name()))]
    fn with_categorical_target(mut self) -> Result<Self, DataError> {
        let target = self.schema.target();
        let paths = [self.train_path.as_path(), self.test_path.as_path()];
        let classes = match self.format {
            DataFormat::Arff => scan_arff_column(&paths, target.index())?,
            DataFormat::Csv => scan_csv_column(&paths, target.index())?,
        };
        info!(n_classes = classes.len(), "target redeclared as categorical");

        let target_name = target.name().to_string();
        let features: Vec<Feature> = self
            .schema
            .features()
            .iter()
            .map(|f| {
                if f.is_target() {
                    Feature::new(f.index(), f.name(), Some(DataType::Categorical))
                        .with_values(classes.iter().cloned())
                        .with_missing_values(f.has_missing_values())
                } else {
                    f.unfitted()
                }
            })
            .collect();

        let schema = Schema::new(features, &target_name)?;
        let retention = self.train.raw_retention();
        let (train, test) = Self::splits(self.format, &schema, &self.train_path, &self.test_path);
        self.train = train.with_raw_retention(retention);
        self.test = test.with_raw_retention(retention);
        self.schema = schema;
        self.inferred_type.release();
        Ok(self)
    }

    /// Set the raw-retention mode of both splits.
    #[must_use]
    pub fn with_raw_retention(mut self, retention: RawRetention) -> Self {
        self.train = self.train.with_raw_retention(retention);
        self.test = self.test.with_raw_retention(retention);
        self
    }

    /// Return the file format of both splits.
    #[must_use]
    pub fn format(&self) -> DataFormat {
        self.format
    }
}

impl Dataset for FileDataset {
    fn dataset_type(&self) -> DatasetType {
        if let Some(declared) = self.declared_type {
            return declared;
        }
        let inferred = self
            .inferred_type
            .get_or_try_init(|| Ok::<_, Infallible>(DatasetType::infer(self.schema.target())));
        match inferred {
            Ok(t) => *t,
            Err(never) => match never {},
        }
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

    fn clear_cached(&self, properties: Option<&[DatasetProperty]>) {
        let clear_type = properties.is_none_or(|ps| ps.contains(&DatasetProperty::Type));
        if clear_type {
            self.inferred_type.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CacheState;
    use std::io::Write;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(DataFormat::from_path(Path::new("a/train.ARFF")).unwrap(), DataFormat::Arff);
        assert_eq!(DataFormat::from_path(Path::new("test.csv")).unwrap(), DataFormat::Csv);
        assert!(matches!(
            DataFormat::from_path(Path::new("data.parquet")),
            Err(DataLoadError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn open_csv_pair_and_infer_type() {
        let dir = TempDir::new().unwrap();
        let train = write(&dir, "train.csv", "x,label\n1,a\n2,b\n");
        let test = write(&dir, "test.csv", "x,label\n3,a\n");
        let ds = FileDataset::open(&train, &test, "label").unwrap();

        assert_eq!(ds.format(), DataFormat::Csv);
        assert_eq!(ds.dataset_type(), DatasetType::Binary);
        assert_eq!(ds.inferred_type.state(), CacheState::Computed);
        assert_eq!(ds.train().path().unwrap(), train.as_path());

        ds.release(Some(&[DatasetProperty::Type]));
        assert_eq!(ds.inferred_type.state(), CacheState::Released);
        assert_eq!(ds.dataset_type(), DatasetType::Binary);
    }

    #[test]
    fn declared_type_wins() {
        let dir = TempDir::new().unwrap();
        let train = write(&dir, "train.csv", "x,y\n1,0\n2,1\n");
        let test = write(&dir, "test.csv", "x,y\n3,1\n");
        let ds = FileDataset::open(&train, &test, "y")
            .unwrap()
            .with_type(DatasetType::Binary)
            .unwrap();
        assert_eq!(ds.dataset_type(), DatasetType::Binary);
        assert_eq!(ds.inferred_type.state(), CacheState::Unset);
    }

    #[test]
    fn integer_labels_become_classes_when_declared() {
        let dir = TempDir::new().unwrap();
        let train = write(&dir, "train.csv", "x,y\n1,0\n2,1\n3,0\n");
        let test = write(&dir, "test.csv", "x,y\n4,2\n5,?\n");
        let ds = FileDataset::open(&train, &test, "y").unwrap();
        assert_eq!(ds.target().values(), None);
        assert_eq!(ds.dataset_type(), DatasetType::Regression);

        let ds = ds.with_type(DatasetType::Multiclass).unwrap();
        let target = ds.target();
        assert!(target.is_target());
        assert_eq!(target.data_type(), Some(&DataType::Categorical));
        assert_eq!(target.values().unwrap(), &["0", "1", "2"]);
        assert!(target.has_missing_values());
        assert_eq!(target.label_encoder().classes(), &["0", "1", "2"]);

        assert_eq!(ds.train().y_enc().unwrap().to_vec(), vec![0.0, 1.0, 0.0]);
        let test_y = ds.test().y_enc().unwrap();
        assert_eq!(test_y[0], 2.0);
        assert!(test_y[1].is_nan());
        assert_eq!(ds.train().x_enc().unwrap().column(0).to_vec(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn arff_numeric_target_declared_binary() {
        let dir = TempDir::new().unwrap();
        let header = "@relation t\n@attribute x numeric\n@attribute y integer\n@data\n";
        let train = write(&dir, "train.arff", &format!("{header}1,1\n2,0\n"));
        let test = write(&dir, "test.arff", &format!("{header}3,1\n"));
        let ds = FileDataset::open(&train, &test, "y")
            .unwrap()
            .with_raw_retention(RawRetention::Keep)
            .with_type(DatasetType::Binary)
            .unwrap();

        assert_eq!(ds.target().values().unwrap(), &["0", "1"]);
        assert_eq!(ds.train().raw_retention(), RawRetention::Keep);
        assert_eq!(ds.train().y_enc().unwrap().to_vec(), vec![1.0, 0.0]);
    }

    #[test]
    fn regression_declaration_keeps_numeric_target() {
        let dir = TempDir::new().unwrap();
        let train = write(&dir, "train.csv", "x,y\n1,0.5\n2,1.5\n");
        let test = write(&dir, "test.csv", "x,y\n3,2.5\n");
        let ds = FileDataset::open(&train, &test, "y")
            .unwrap()
            .with_type(DatasetType::Regression)
            .unwrap();
        assert_eq!(ds.target().data_type(), Some(&DataType::Numeric));
        assert_eq!(ds.train().y_enc().unwrap().to_vec(), vec![0.5, 1.5]);
    }

    #[test]
    fn mixed_formats_rejected() {
        let dir = TempDir::new().unwrap();
        let train = write(&dir, "train.csv", "x,y\n1,0\n");
        let test = write(&dir, "test.arff", "@relation t\n@attribute x numeric\n@data\n1\n");
        let err = FileDataset::open(&train, &test, "y").unwrap_err();
        assert!(matches!(err, DataError::Load(DataLoadError::UnsupportedFormat { .. })));
    }
}
