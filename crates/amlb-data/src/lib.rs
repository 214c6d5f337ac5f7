//! Dataset, split and encoding layer for the amlb benchmark harness.
//!
//! A [`Dataset`] exposes train and test [`Datasplit`]s over one list of
//! [`Feature`]s. Splits compute raw and label-encoded views lazily and keep
//! them until released; features fit their [`Encoder`]s once on first use.

mod arff;
mod cache;
mod csv_source;
mod dataset;
mod encoder;
mod error;
mod feature;
mod file;
mod impute;
mod memory;
mod schema;
mod split;
mod value;
mod writer;

pub use arff::{ArffAttribute, ArffHeader, ArffSource, infer_arff_features};
pub use cache::CacheState;
pub use csv_source::{CsvSource, infer_csv_features};
pub use dataset::{Dataset, DatasetProperty, DatasetType};
pub use encoder::{EncodedType, Encoder, EncoderKind, MissingPolicy};
pub use error::{DataError, DataLoadError, DatasetLoadError, EncodingError, ImputeError, WriteError};
pub use feature::{CategoricalRule, DataType, Feature};
pub use file::{DataFormat, FileDataset};
pub use impute::{MeanImputer, impute};
pub use memory::{ArraySource, InMemoryDataset};
pub use schema::Schema;
pub use split::{Datasplit, RawRetention, SplitKind, SplitProperty, SplitSource};
pub use value::{MISSING_MARKERS, Value};
pub use writer::{Predictions, TaskName, save_predictions};
