//! Prediction file writer and output naming.

use std::fmt;
use std::fs;
use std::path::Path;

use ndarray::{Array1, Array2};
use tracing::{debug, info, instrument};

use crate::dataset::Dataset;
use crate::error::WriteError;
use crate::value::Value;

/// A validated task name for output file naming.
///
/// Must match `[a-zA-Z0-9_.-]+`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskName(String);

impl TaskName {
    /// Parse and validate a task name.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::InvalidTaskName`] if the name is empty or
    /// contains characters outside `[a-zA-Z0-9_.-]`.
    pub fn new(name: impl Into<String>) -> Result<Self, WriteError> {
        let name = name.into();
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        {
            return Err(WriteError::InvalidTaskName { name });
        }
        Ok(Self(name))
    }

    /// Return the task name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Model output for the test split, ready to be written.
#[derive(Debug, Clone)]
pub struct Predictions {
    /// One prediction per test row.
    pub predictions: Array1<f64>,
    /// Class probabilities (rows × target classes), classification only.
    pub probabilities: Option<Array2<f64>>,
    /// Ground truth per test row.
    pub truth: Array1<f64>,
    /// `true` when predictions and truth are target label codes that must be
    /// decoded before writing.
    pub target_is_encoded: bool,
}

/// Write predictions for `dataset`'s test split to a CSV file.
///
/// Columns are one probability column per target class (headed by the class
/// name) when probabilities are given, then `predictions` and `truth`.
/// Encoded predictions and truth are decoded through the target's label
/// encoder. Parent directories are created as needed.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`WriteError::LengthMismatch`] | Truth or probabilities disagree with predictions in length |
/// | [`WriteError::ProbabilityWidth`] | Probability columns differ from the target's class count |
/// | [`WriteError::Encoding`] | A code does not decode through the target encoder |
/// | [`WriteError::OutputDirCreate`] | Parent directory cannot be created |
/// | [`WriteError::WriteFile`] | File cannot be written |
#[instrument(skip_all, fields(path = %output_file.display(), n = result.predictions.len()))]
pub fn save_predictions(
    dataset: &dyn Dataset,
    output_file: &Path,
    result: &Predictions,
) -> Result<(), WriteError> {
    let n = result.predictions.len();
    if result.truth.len() != n {
        return Err(WriteError::LengthMismatch {
            what: "truth",
            expected: n,
            got: result.truth.len(),
        });
    }

    let encoder = dataset.target().label_encoder();
    let classes = encoder.classes();
    if let Some(probabilities) = &result.probabilities {
        if probabilities.nrows() != n {
            return Err(WriteError::LengthMismatch {
                what: "probabilities",
                expected: n,
                got: probabilities.nrows(),
            });
        }
        if probabilities.ncols() != classes.len() {
            return Err(WriteError::ProbabilityWidth {
                expected: classes.len(),
                got: probabilities.ncols(),
            });
        }
    }

    let decode = |codes: &Array1<f64>| -> Result<Vec<Value>, WriteError> {
        if result.target_is_encoded {
            Ok(encoder.inverse_transform(&codes.to_vec())?)
        } else {
            Ok(codes.iter().map(|&v| if v.is_nan() { Value::Missing } else { Value::Number(v) }).collect())
        }
    };
    let predictions = decode(&result.predictions)?;
    let truth = decode(&result.truth)?;

    if let Some(parent) = output_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| WriteError::OutputDirCreate {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let write_error = |e: csv::Error| WriteError::WriteFile {
        path: output_file.to_path_buf(),
        source: e,
    };
    let mut wtr = csv::Writer::from_path(output_file).map_err(write_error)?;

    let mut header: Vec<&str> = Vec::with_capacity(classes.len() + 2);
    if result.probabilities.is_some() {
        header.extend(classes.iter().map(String::as_str));
    }
    header.extend(["predictions", "truth"]);
    wtr.write_record(&header).map_err(write_error)?;

    for (i, (prediction, truth)) in predictions.iter().zip(&truth).enumerate() {
        let mut record: Vec<String> = Vec::with_capacity(header.len());
        if let Some(probabilities) = &result.probabilities {
            record.extend(probabilities.row(i).iter().map(f64::to_string));
        }
        record.push(prediction.to_string());
        record.push(truth.to_string());
        wtr.write_record(&record).map_err(write_error)?;
    }
    wtr.flush().map_err(|e| write_error(e.into()))?;

    debug!(n_columns = header.len(), "predictions header written");
    info!(n_rows = n, "predictions saved");
    Ok(())
}
