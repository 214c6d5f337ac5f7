//! Label, one-hot and no-op encoders from raw values to numbers.

use std::collections::{BTreeSet, HashMap};

use ndarray::{Array2, ArrayView1};

use crate::error::EncodingError;
use crate::value::Value;

/// Shape of the transform an [`Encoder`] applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderKind {
    /// Each category maps to a single integer code.
    Label,
    /// Each category maps to a binary indicator vector.
    OneHot,
    /// Values pass through unchanged (numeric features).
    NoOp,
}

/// Numeric type of the encoded output.
///
/// Encoded matrices are always `f64`; `Int` guarantees every non-missing
/// output is integral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodedType {
    /// Integral codes.
    Int,
    /// Floating point values.
    Float,
}

/// What to do with missing and unseen entries during transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingPolicy {
    /// Missing entries are not expected; encountering one is an error.
    Ignore,
    /// Missing and unseen entries are masked as `NaN` in the output.
    Mask,
}

/// A fitted transform from raw values of one feature to numbers.
///
/// Classes are the sorted distinct fitted values, so codes are
/// deterministic: the code of a category is its position in that order.
#[derive(Debug, Clone)]
pub struct Encoder {
    feature: String,
    kind: EncoderKind,
    encoded_type: EncodedType,
    missing_policy: MissingPolicy,
    classes: Vec<String>,
    index: HashMap<String, usize>,
}

impl Encoder {
    /// Create an unfitted encoder for the named feature.
    pub fn new(
        feature: impl Into<String>,
        kind: EncoderKind,
        encoded_type: EncodedType,
        missing_policy: MissingPolicy,
    ) -> Self {
        Self {
            feature: feature.into(),
            kind,
            encoded_type,
            missing_policy,
            classes: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Fit the encoder against the admissible values of the feature.
    ///
    /// A no-op encoder ignores `values`.
    #[must_use]
    pub fn fit<S: AsRef<str>>(mut self, values: &[S]) -> Self {
        if self.kind == EncoderKind::NoOp {
            return self;
        }
        let distinct: BTreeSet<&str> = values.iter().map(AsRef::as_ref).collect();
        self.classes = distinct.into_iter().map(String::from).collect();
        self.index = self
            .classes
            .iter()
            .enumerate()
            .map(|(code, class)| (class.clone(), code))
            .collect();
        self
    }

    /// Return the encoder kind.
    #[must_use]
    pub fn kind(&self) -> EncoderKind {
        self.kind
    }

    /// Return the output numeric type.
    #[must_use]
    pub fn encoded_type(&self) -> EncodedType {
        self.encoded_type
    }

    /// Return the missing-value policy.
    #[must_use]
    pub fn missing_policy(&self) -> MissingPolicy {
        self.missing_policy
    }

    /// Return the fitted classes in code order.
    #[must_use]
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Number of output columns produced per input value.
    #[must_use]
    pub fn width(&self) -> usize {
        match self.kind {
            EncoderKind::OneHot => self.classes.len(),
            EncoderKind::Label | EncoderKind::NoOp => 1,
        }
    }

    /// Encode one column of raw values.
    ///
    /// Returns a matrix with one row per input value and [`width`](Self::width)
    /// columns.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`EncodingError::UnknownCategory`] | Unseen category under [`MissingPolicy::Ignore`] (label only; one-hot encodes zeros) |
    /// | [`EncodingError::UnexpectedMissing`] | Missing value under [`MissingPolicy::Ignore`] that the output type cannot carry |
    /// | [`EncodingError::NotNumeric`] | Text in a no-op (numeric) column that does not parse |
    pub fn transform(&self, column: ArrayView1<'_, Value>) -> Result<Array2<f64>, EncodingError> {
        let width = self.width();
        let mut out = Array2::<f64>::zeros((column.len(), width));
        for (row_index, (value, mut row)) in column.iter().zip(out.rows_mut()).enumerate() {
            match self.kind {
                EncoderKind::NoOp => row[0] = self.pass_through(value, row_index)?,
                EncoderKind::Label => row[0] = self.label_code(value, row_index)?,
                EncoderKind::OneHot => {
                    if value.is_missing() {
                        self.check_maskable(row_index)?;
                        row.fill(f64::NAN);
                    } else if let Some(code) = self.lookup(value) {
                        row[code] = 1.0;
                    }
                }
            }
        }
        Ok(out)
    }

    /// Decode label codes back to their categories.
    ///
    /// `NaN` decodes to [`Value::Missing`]; a no-op encoder returns numbers.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError::CodeOutOfRange`] for a code with no class and
    /// [`EncodingError::NotInvertible`] for one-hot encoders.
    pub fn inverse_transform(&self, codes: &[f64]) -> Result<Vec<Value>, EncodingError> {
        codes
            .iter()
            .map(|&code| {
                if code.is_nan() {
                    return Ok(Value::Missing);
                }
                match self.kind {
                    EncoderKind::NoOp => Ok(Value::Number(code)),
                    EncoderKind::OneHot => Err(EncodingError::NotInvertible {
                        feature: self.feature.clone(),
                    }),
                    EncoderKind::Label => {
                        let idx = code.round();
                        if idx < 0.0 || idx as usize >= self.classes.len() {
                            return Err(EncodingError::CodeOutOfRange {
                                feature: self.feature.clone(),
                                code,
                                n_classes: self.classes.len(),
                            });
                        }
                        Ok(Value::Text(self.classes[idx as usize].clone()))
                    }
                }
            })
            .collect()
    }

    fn lookup(&self, value: &Value) -> Option<usize> {
        value
            .category_key()
            .and_then(|key| self.index.get(key.as_ref()).copied())
    }

    fn check_maskable(&self, row_index: usize) -> Result<(), EncodingError> {
        match self.missing_policy {
            MissingPolicy::Mask => Ok(()),
            MissingPolicy::Ignore => Err(EncodingError::UnexpectedMissing {
                feature: self.feature.clone(),
                row_index,
            }),
        }
    }

    fn label_code(&self, value: &Value, row_index: usize) -> Result<f64, EncodingError> {
        if value.is_missing() {
            self.check_maskable(row_index)?;
            return Ok(f64::NAN);
        }
        match self.lookup(value) {
            Some(code) => Ok(code as f64),
            None if self.missing_policy == MissingPolicy::Mask => Ok(f64::NAN),
            None => Err(EncodingError::UnknownCategory {
                feature: self.feature.clone(),
                value: value.to_string(),
                row_index,
            }),
        }
    }

    fn pass_through(&self, value: &Value, row_index: usize) -> Result<f64, EncodingError> {
        let number = match value {
            Value::Number(n) if !n.is_nan() => *n,
            Value::Text(s) => s.trim().parse::<f64>().map_err(|_| EncodingError::NotNumeric {
                feature: self.feature.clone(),
                value: s.clone(),
                row_index,
            })?,
            _ => f64::NAN,
        };
        if number.is_nan() {
            // A float column carries NaN as its missing marker; an integer one cannot.
            if self.encoded_type == EncodedType::Int {
                self.check_maskable(row_index)?;
            }
            return Ok(f64::NAN);
        }
        Ok(match self.encoded_type {
            EncodedType::Int => number.trunc(),
            EncodedType::Float => number,
        })
    }
}
