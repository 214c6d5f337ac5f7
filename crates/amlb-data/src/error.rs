//! Error types for amlb-data.

use std::path::PathBuf;

/// Errors raised while loading raw split data from its source.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// Returned when the input file does not exist or is unreadable.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the CSV parser encounters a malformed record.
    #[error("CSV parse error in {path} at byte offset {offset}")]
    CsvParse {
        /// Path to the file.
        path: PathBuf,
        /// Byte offset where the error occurred.
        offset: u64,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// Returned when an ARFF header line cannot be interpreted.
    #[error("malformed ARFF header in {path} at line {line}: {reason}")]
    ArffHeader {
        /// Path to the ARFF file.
        path: PathBuf,
        /// One-based line number.
        line: usize,
        /// What was wrong with the line.
        reason: String,
    },

    /// Returned for sparse ARFF rows (`{index value, ...}`), which are not supported.
    #[error("sparse ARFF data is not supported ({path}, row {row_index})")]
    SparseArff {
        /// Path to the ARFF file.
        path: PathBuf,
        /// Zero-based data row index.
        row_index: usize,
    },

    /// Returned when a data row has a different number of columns than declared.
    #[error("inconsistent row length in {path}: row {row_index} has {got} columns, expected {expected}")]
    InconsistentRowLength {
        /// Path to the file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// Expected number of columns.
        expected: usize,
        /// Actual number of columns in this row.
        got: usize,
    },

    /// Returned when a cell of a numeric column does not parse as a number.
    #[error("non-numeric value in {path}: row {row_index}, column \"{column}\", raw value \"{raw}\"")]
    NonNumericValue {
        /// Path to the file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// Name of the offending column.
        column: String,
        /// The raw cell content.
        raw: String,
    },

    /// Returned when a file header names columns that differ from the feature list.
    #[error("header of {path} does not match features: expected {expected:?}, found {found:?}")]
    HeaderMismatch {
        /// Path to the file.
        path: PathBuf,
        /// Feature names in declared order.
        expected: Vec<String>,
        /// Column names found in the file.
        found: Vec<String>,
    },

    /// Returned when the loaded matrix does not have one column per feature.
    #[error("split data has {got} columns but the dataset declares {expected} features")]
    ColumnCountMismatch {
        /// Number of declared features.
        expected: usize,
        /// Number of columns in the loaded data.
        got: usize,
    },

    /// Returned when a split is asked for its file but is not file-backed.
    #[error("{split} split has no backing file")]
    NoBackingFile {
        /// Which split was asked.
        split: String,
    },

    /// Returned when the file extension does not name a supported format.
    #[error("unsupported data format for {path} (expected .arff or .csv)")]
    UnsupportedFormat {
        /// Path with the unrecognised extension.
        path: PathBuf,
    },

    /// Returned when a split outlives the dataset that owns its feature metadata.
    #[error("{split} split was used after its dataset was dropped")]
    DatasetDropped {
        /// Which split was used.
        split: String,
    },
}

/// Errors raised while transforming raw values through a fitted encoder.
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    /// Returned for a category that was not among the fitted values.
    #[error("unknown category \"{value}\" for feature \"{feature}\" at row {row_index}")]
    UnknownCategory {
        /// Feature being encoded.
        feature: String,
        /// The unseen value.
        value: String,
        /// Zero-based row index.
        row_index: usize,
    },

    /// Returned for a missing value when the feature's policy does not mask them.
    #[error("unexpected missing value for feature \"{feature}\" at row {row_index}")]
    UnexpectedMissing {
        /// Feature being encoded.
        feature: String,
        /// Zero-based row index.
        row_index: usize,
    },

    /// Returned when a numeric feature holds text that is not a number.
    #[error("non-numeric value \"{value}\" for numeric feature \"{feature}\" at row {row_index}")]
    NotNumeric {
        /// Feature being encoded.
        feature: String,
        /// The offending text.
        value: String,
        /// Zero-based row index.
        row_index: usize,
    },

    /// Returned when decoding a code that does not map to any class.
    #[error("code {code} is out of range for feature \"{feature}\" ({n_classes} classes)")]
    CodeOutOfRange {
        /// Feature being decoded.
        feature: String,
        /// The invalid code.
        code: f64,
        /// Number of fitted classes.
        n_classes: usize,
    },

    /// Returned when inverse transformation is requested from a one-hot encoder.
    #[error("one-hot encoder for feature \"{feature}\" cannot decode scalar codes")]
    NotInvertible {
        /// Feature whose encoder was asked.
        feature: String,
    },
}

/// Errors raised when feature metadata and the declared target disagree.
#[derive(Debug, thiserror::Error)]
pub enum DatasetLoadError {
    /// Returned when a dataset declares no features at all.
    #[error("dataset declares no features")]
    NoFeatures,

    /// Returned when the declared target name matches no feature.
    #[error("target \"{target}\" does not match any feature")]
    UnknownTarget {
        /// The declared target name.
        target: String,
    },

    /// Returned when two features share a name.
    #[error("duplicate feature name \"{name}\" at positions {first} and {second}")]
    DuplicateFeature {
        /// The duplicated name.
        name: String,
        /// Position of the first occurrence.
        first: usize,
        /// Position of the second occurrence.
        second: usize,
    },

    /// Returned when a feature's index is not its position in the feature list.
    #[error("feature \"{name}\" has index {index} but is declared at position {position}")]
    IndexMismatch {
        /// Feature name.
        name: String,
        /// The feature's own index.
        index: usize,
        /// Its position in the list.
        position: usize,
    },

    /// Returned when the train and test files declare different columns.
    #[error("train and test splits declare different features: {train:?} vs {test:?}")]
    SplitSchemaMismatch {
        /// Feature names of the train file.
        train: Vec<String>,
        /// Feature names of the test file.
        test: Vec<String>,
    },
}

/// Any failure surfaced by a split or dataset accessor.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    /// Source unavailable or corrupt.
    #[error(transparent)]
    Load(#[from] DataLoadError),

    /// Raw values could not be encoded.
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// Feature metadata is inconsistent.
    #[error(transparent)]
    Dataset(#[from] DatasetLoadError),
}

/// Errors from mean imputation.
#[derive(Debug, thiserror::Error)]
pub enum ImputeError {
    /// Returned when the matrix to transform has a different column count than the fit.
    #[error("imputer was fitted on {expected} columns, got {got}")]
    WidthMismatch {
        /// Columns seen at fit time.
        expected: usize,
        /// Columns in the transformed matrix.
        got: usize,
    },
}

/// Errors from writing prediction files.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// Returned when the output directory cannot be created.
    #[error("cannot create output directory {path}")]
    OutputDirCreate {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the predictions file cannot be written.
    #[error("cannot write file {path}")]
    WriteFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// Returned when predictions, truth and probabilities disagree in length.
    #[error("{what} has {got} rows, expected {expected}")]
    LengthMismatch {
        /// Which input was inconsistent.
        what: &'static str,
        /// Expected number of rows.
        expected: usize,
        /// Actual number of rows.
        got: usize,
    },

    /// Returned when the probability matrix width differs from the class count.
    #[error("probabilities have {got} columns but the target has {expected} classes")]
    ProbabilityWidth {
        /// Number of target classes.
        expected: usize,
        /// Number of probability columns.
        got: usize,
    },

    /// Returned when the task name contains characters outside `[a-zA-Z0-9_.-]`.
    #[error("invalid task name \"{name}\": must match [a-zA-Z0-9_.-]+")]
    InvalidTaskName {
        /// The invalid name.
        name: String,
    },

    /// Returned when encoded predictions cannot be decoded.
    #[error(transparent)]
    Encoding(#[from] EncodingError),
}
