//! One partition (train or test) of a dataset, with lazily derived views.

use std::fmt;
use std::path::Path;
use std::sync::{Arc, Weak};

use ndarray::{Array1, Array2, ArrayView2, Axis};
use tracing::{debug, info, instrument};

use crate::cache::{CacheState, Cached};
use crate::error::{DataError, DataLoadError};
use crate::feature::Feature;
use crate::schema::Schema;
use crate::value::Value;

/// The variant-specific half of a split: where its raw data comes from.
///
/// Implemented per data source (ARFF file, CSV file, pre-loaded array).
pub trait SplitSource: fmt::Debug + Send + Sync {
    /// Backing file of the split, if it is file-backed.
    fn path(&self) -> Option<&Path>;

    /// Load the full raw matrix: one row per instance, one column per
    /// feature in declared order.
    ///
    /// # Errors
    ///
    /// Returns a [`DataLoadError`] if the source is unavailable or corrupt.
    fn load(&self, features: &[Feature]) -> Result<Array2<Value>, DataLoadError>;
}

/// Which partition a split is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitKind {
    /// Training partition.
    Train,
    /// Test partition.
    Test,
}

impl fmt::Display for SplitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SplitKind::Train => "train",
            SplitKind::Test => "test",
        })
    }
}

/// Cached properties of a [`Datasplit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SplitProperty {
    /// Raw matrix of all columns.
    Data,
    /// Raw predictor columns.
    X,
    /// Raw target column.
    Y,
    /// Label-encoded matrix of all columns.
    DataEnc,
    /// Encoded predictor columns.
    XEnc,
    /// Encoded target column.
    YEnc,
}

impl SplitProperty {
    /// Every property, in declaration order.
    pub const ALL: [SplitProperty; 6] = [
        SplitProperty::Data,
        SplitProperty::X,
        SplitProperty::Y,
        SplitProperty::DataEnc,
        SplitProperty::XEnc,
        SplitProperty::YEnc,
    ];
}

/// Whether raw caches survive the computation of encoded data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RawRetention {
    /// Encoding releases `data`, `X` and `y`: raw and encoded matrices are
    /// never both held. Raw data needed afterwards is reloaded from source.
    #[default]
    ReleaseOnEncode,
    /// Keep raw caches alongside encoded ones.
    Keep,
}

/// One partition of a dataset.
///
/// Raw and encoded views are computed on first access and memoized until
/// [`release`](Self::release). Feature metadata is resolved through a
/// non-owning handle to the dataset's [`Schema`].
#[derive(Debug)]
pub struct Datasplit {
    kind: SplitKind,
    schema: Weak<Schema>,
    source: Box<dyn SplitSource>,
    retention: RawRetention,
    data: Cached<Array2<Value>>,
    x: Cached<Array2<Value>>,
    y: Cached<Array1<Value>>,
    data_enc: Cached<Array2<f64>>,
    x_enc: Cached<Array2<f64>>,
    y_enc: Cached<Array1<f64>>,
}

impl Datasplit {
    /// Create a split reading from `source`, described by `schema`.
    pub fn new(kind: SplitKind, schema: &Arc<Schema>, source: impl SplitSource + 'static) -> Self {
        Self {
            kind,
            schema: Arc::downgrade(schema),
            source: Box::new(source),
            retention: RawRetention::default(),
            data: Cached::new(),
            x: Cached::new(),
            y: Cached::new(),
            data_enc: Cached::new(),
            x_enc: Cached::new(),
            y_enc: Cached::new(),
        }
    }

    /// Set whether encoding releases the raw caches.
    #[must_use]
    pub fn with_raw_retention(mut self, retention: RawRetention) -> Self {
        self.retention = retention;
        self
    }

    /// Return which partition this is.
    #[must_use]
    pub fn kind(&self) -> SplitKind {
        self.kind
    }

    /// Return the raw-retention mode.
    #[must_use]
    pub fn raw_retention(&self) -> RawRetention {
        self.retention
    }

    /// Backing file of this split.
    ///
    /// # Errors
    ///
    /// Returns [`DataLoadError::NoBackingFile`] for splits that are not file-backed.
    pub fn path(&self) -> Result<&Path, DataLoadError> {
        self.source.path().ok_or_else(|| DataLoadError::NoBackingFile {
            split: self.kind.to_string(),
        })
    }

    /// Full raw matrix (rows = instances, columns = features in declared order).
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DataLoadError::DatasetDropped`] | The owning dataset no longer exists |
    /// | [`DataLoadError::ColumnCountMismatch`] | Source columns differ from the feature count |
    /// | Other [`DataLoadError`]s | From the source |
    pub fn data(&self) -> Result<Arc<Array2<Value>>, DataError> {
        self.data.get_or_try_init(|| self.load_data())
    }

    /// Raw predictor columns, in declared order.
    ///
    /// # Errors
    ///
    /// Propagates the errors of [`data`](Self::data).
    pub fn x(&self) -> Result<Arc<Array2<Value>>, DataError> {
        self.x.get_or_try_init(|| -> Result<_, DataError> {
            let indices = self.schema()?.predictor_indices();
            let data = self.data()?;
            debug!(split = %self.kind, n_columns = indices.len(), "selecting raw predictors");
            Ok(data.select(Axis(1), &indices))
        })
    }

    /// Raw target column.
    ///
    /// # Errors
    ///
    /// Propagates the errors of [`data`](Self::data).
    pub fn y(&self) -> Result<Arc<Array1<Value>>, DataError> {
        self.y.get_or_try_init(|| -> Result<_, DataError> {
            let target = self.schema()?.target().index();
            let data = self.data()?;
            Ok(data.column(target).to_owned())
        })
    }

    /// Every column passed through its feature's label encoder, concatenated
    /// in declared order.
    ///
    /// On success the raw caches (`data`, `X`, `y`) are released unless the
    /// split keeps raw data ([`RawRetention::Keep`]).
    ///
    /// # Errors
    ///
    /// Propagates [`data`](Self::data) errors and any
    /// [`EncodingError`](crate::EncodingError) from the encoders; nothing is
    /// released or cached on failure.
    pub fn data_enc(&self) -> Result<Arc<Array2<f64>>, DataError> {
        self.data_enc.get_or_try_init(|| self.encode())
    }

    /// Encoded predictor columns (a slice of [`data_enc`](Self::data_enc)).
    ///
    /// # Errors
    ///
    /// Propagates the errors of [`data_enc`](Self::data_enc).
    pub fn x_enc(&self) -> Result<Arc<Array2<f64>>, DataError> {
        self.x_enc.get_or_try_init(|| -> Result<_, DataError> {
            let indices = self.schema()?.predictor_indices();
            let encoded = self.data_enc()?;
            Ok(encoded.select(Axis(1), &indices))
        })
    }

    /// Encoded target column (a slice of [`data_enc`](Self::data_enc)).
    ///
    /// # Errors
    ///
    /// Propagates the errors of [`data_enc`](Self::data_enc).
    pub fn y_enc(&self) -> Result<Arc<Array1<f64>>, DataError> {
        self.y_enc.get_or_try_init(|| -> Result<_, DataError> {
            let target = self.schema()?.target().index();
            let encoded = self.data_enc()?;
            Ok(encoded.column(target).to_owned())
        })
    }

    /// Clear the given cached properties, or all of them when `None`.
    ///
    /// Never fails; releasing a property that was never computed is a no-op.
    #[instrument(skip(self), fields(split = %self.kind))]
    pub fn release(&self, properties: Option<&[SplitProperty]>) {
        let properties = properties.unwrap_or(&SplitProperty::ALL);
        let released: Vec<SplitProperty> = properties
            .iter()
            .copied()
            .filter(|&p| self.slot_release(p))
            .collect();
        if !released.is_empty() {
            debug!(?released, "released cached properties");
        }
    }

    /// Report whether a property is currently cached.
    #[must_use]
    pub fn cache_state(&self, property: SplitProperty) -> CacheState {
        match property {
            SplitProperty::Data => self.data.state(),
            SplitProperty::X => self.x.state(),
            SplitProperty::Y => self.y.state(),
            SplitProperty::DataEnc => self.data_enc.state(),
            SplitProperty::XEnc => self.x_enc.state(),
            SplitProperty::YEnc => self.y_enc.state(),
        }
    }

    fn slot_release(&self, property: SplitProperty) -> bool {
        match property {
            SplitProperty::Data => self.data.release(),
            SplitProperty::X => self.x.release(),
            SplitProperty::Y => self.y.release(),
            SplitProperty::DataEnc => self.data_enc.release(),
            SplitProperty::XEnc => self.x_enc.release(),
            SplitProperty::YEnc => self.y_enc.release(),
        }
    }

    fn schema(&self) -> Result<Arc<Schema>, DataLoadError> {
        self.schema.upgrade().ok_or_else(|| DataLoadError::DatasetDropped {
            split: self.kind.to_string(),
        })
    }

    #[instrument(skip(self), fields(split = %self.kind))]
    fn load_data(&self) -> Result<Array2<Value>, DataError> {
        let schema = self.schema()?;
        let data = self.source.load(schema.features())?;
        if data.ncols() != schema.features().len() {
            return Err(DataLoadError::ColumnCountMismatch {
                expected: schema.features().len(),
                got: data.ncols(),
            }
            .into());
        }
        info!(n_rows = data.nrows(), n_columns = data.ncols(), "raw data loaded");
        Ok(data)
    }

    #[instrument(skip(self), fields(split = %self.kind))]
    fn encode(&self) -> Result<Array2<f64>, DataError> {
        let schema = self.schema()?;
        let data = self.data()?;
        let columns = schema
            .features()
            .iter()
            .map(|f| f.label_encoder().transform(data.column(f.index())))
            .collect::<Result<Vec<_>, _>>()?;
        drop(data);

        if self.retention == RawRetention::ReleaseOnEncode {
            self.release(Some(&[SplitProperty::Data, SplitProperty::X, SplitProperty::Y]));
        }

        let views: Vec<ArrayView2<'_, f64>> = columns.iter().map(Array2::view).collect();
        let encoded = ndarray::concatenate(Axis(1), &views)
            .expect("encoded columns share the split's row count");
        info!(n_rows = encoded.nrows(), n_columns = encoded.ncols(), "data encoded");
        Ok(encoded)
    }
}
