//! Feature metadata and the per-feature cached encoders.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::Serialize;

use crate::encoder::{EncodedType, Encoder, EncoderKind, MissingPolicy};

/// Declared type of a column, normalized from free-form metadata tags.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub enum DataType {
    /// `numeric`
    Numeric,
    /// `integer`
    Integer,
    /// `real`
    Real,
    /// `categorical`
    Categorical,
    /// `nominal`
    Nominal,
    /// `enum`
    Enum,
    /// Any other tag (e.g. `string`, `date`), lower-cased.
    Other(String),
}

impl DataType {
    /// Normalize a metadata tag: trimmed and case-insensitive.
    #[must_use]
    pub fn parse(tag: &str) -> Self {
        let tag = tag.trim().to_ascii_lowercase();
        match tag.as_str() {
            "numeric" => DataType::Numeric,
            "integer" => DataType::Integer,
            "real" => DataType::Real,
            "categorical" => DataType::Categorical,
            "nominal" => DataType::Nominal,
            "enum" => DataType::Enum,
            _ => DataType::Other(tag),
        }
    }

    /// Return the lower-case tag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            DataType::Numeric => "numeric",
            DataType::Integer => "integer",
            DataType::Real => "real",
            DataType::Categorical => "categorical",
            DataType::Nominal => "nominal",
            DataType::Enum => "enum",
            DataType::Other(tag) => tag,
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(self, DataType::Numeric | DataType::Integer | DataType::Real)
    }

    fn is_explicitly_categorical(&self) -> bool {
        matches!(self, DataType::Categorical | DataType::Nominal | DataType::Enum)
    }
}

impl FromStr for DataType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<DataType> for String {
    fn from(t: DataType) -> Self {
        t.as_str().to_string()
    }
}

/// How strictly [`Feature::is_categorical`] reads the declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoricalRule {
    /// Only `categorical`, `nominal` and `enum` count.
    Strict,
    /// Anything that is not `numeric`, `integer` or `real` counts.
    Lax,
}

/// Metadata for one dataset column, with lazily fitted encoders.
///
/// Encoders are fitted once, on first access, against [`values`](Self::values)
/// and reused for the lifetime of the feature.
#[derive(Debug)]
pub struct Feature {
    index: usize,
    name: String,
    data_type: Option<DataType>,
    values: Option<Vec<String>>,
    has_missing_values: bool,
    is_target: bool,
    label_encoder: OnceLock<Encoder>,
    one_hot_encoder: OnceLock<Encoder>,
}

impl Feature {
    /// Create a feature at column `index`.
    pub fn new(index: usize, name: impl Into<String>, data_type: Option<DataType>) -> Self {
        Self {
            index,
            name: name.into(),
            data_type,
            values: None,
            has_missing_values: false,
            is_target: false,
            label_encoder: OnceLock::new(),
            one_hot_encoder: OnceLock::new(),
        }
    }

    /// Set the admissible categorical values.
    ///
    /// A [`Value::Number`](crate::Value::Number) cell is looked up by its
    /// shortest decimal text: `1.0` matches a declared `"1"` but not `"1.0"`.
    #[must_use]
    pub fn with_values<S: Into<String>>(mut self, values: impl IntoIterator<Item = S>) -> Self {
        self.values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Declare whether the column contains missing values.
    #[must_use]
    pub fn with_missing_values(mut self, has_missing_values: bool) -> Self {
        self.has_missing_values = has_missing_values;
        self
    }

    /// A copy of the metadata with no fitted encoders and no target flag.
    pub(crate) fn unfitted(&self) -> Self {
        Self {
            index: self.index,
            name: self.name.clone(),
            data_type: self.data_type.clone(),
            values: self.values.clone(),
            has_missing_values: self.has_missing_values,
            is_target: false,
            label_encoder: OnceLock::new(),
            one_hot_encoder: OnceLock::new(),
        }
    }

    /// Mark or unmark this feature as the prediction target.
    ///
    /// Drops any encoder fitted under the previous flag, since the encoded
    /// type depends on it.
    pub(crate) fn set_target(&mut self, is_target: bool) {
        if self.is_target != is_target {
            self.is_target = is_target;
            self.label_encoder.take();
            self.one_hot_encoder.take();
        }
    }

    /// Return the zero-based column position.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Return the feature name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the declared data type, if any.
    #[must_use]
    pub fn data_type(&self) -> Option<&DataType> {
        self.data_type.as_ref()
    }

    /// Return the admissible categorical values, if declared.
    #[must_use]
    pub fn values(&self) -> Option<&[String]> {
        self.values.as_deref()
    }

    /// Return whether the column contains missing values.
    #[must_use]
    pub fn has_missing_values(&self) -> bool {
        self.has_missing_values
    }

    /// Return whether this feature is the prediction target.
    #[must_use]
    pub fn is_target(&self) -> bool {
        self.is_target
    }

    /// Whether the declared type is categorical under `rule`.
    ///
    /// Always `false` when no type is declared.
    #[must_use]
    pub fn is_categorical(&self, rule: CategoricalRule) -> bool {
        match (&self.data_type, rule) {
            (None, _) => false,
            (Some(t), CategoricalRule::Strict) => t.is_explicitly_categorical(),
            (Some(t), CategoricalRule::Lax) => !t.is_numeric(),
        }
    }

    /// Label encoder for this column (identity when no values are declared).
    pub fn label_encoder(&self) -> &Encoder {
        self.label_encoder
            .get_or_init(|| self.build_encoder(EncoderKind::Label))
    }

    /// One-hot encoder for this column (identity when no values are declared).
    pub fn one_hot_encoder(&self) -> &Encoder {
        self.one_hot_encoder
            .get_or_init(|| self.build_encoder(EncoderKind::OneHot))
    }

    fn build_encoder(&self, kind: EncoderKind) -> Encoder {
        let kind = if self.values.is_some() { kind } else { EncoderKind::NoOp };
        let encoded_type = if self.is_target && self.is_categorical(CategoricalRule::Strict) {
            EncodedType::Int
        } else {
            EncodedType::Float
        };
        let missing_policy = if self.has_missing_values {
            MissingPolicy::Mask
        } else {
            MissingPolicy::Ignore
        };
        tracing::debug!(feature = %self.name, ?kind, ?encoded_type, ?missing_policy, "fitting encoder");
        Encoder::new(&self.name, kind, encoded_type, missing_policy)
            .fit(self.values.as_deref().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;
    use ndarray::array;

    fn typed(tag: Option<&str>) -> Feature {
        Feature::new(0, "f", tag.map(DataType::parse))
    }

    #[test]
    fn strict_categorical_tags() {
        for tag in ["categorical", "Nominal", "ENUM"] {
            assert!(typed(Some(tag)).is_categorical(CategoricalRule::Strict), "tag = {tag}");
        }
        for tag in ["numeric", "integer", "real", "string"] {
            assert!(!typed(Some(tag)).is_categorical(CategoricalRule::Strict), "tag = {tag}");
        }
    }

    #[test]
    fn lax_categorical_tags() {
        for tag in ["numeric", "Integer", "REAL"] {
            assert!(!typed(Some(tag)).is_categorical(CategoricalRule::Lax), "tag = {tag}");
        }
        for tag in ["categorical", "string", "date", "whatever"] {
            assert!(typed(Some(tag)).is_categorical(CategoricalRule::Lax), "tag = {tag}");
        }
    }

    #[test]
    fn absent_type_is_never_categorical() {
        let f = typed(None);
        assert!(!f.is_categorical(CategoricalRule::Strict));
        assert!(!f.is_categorical(CategoricalRule::Lax));
    }

    #[test]
    fn encoders_are_memoized() {
        let f = typed(Some("nominal")).with_values(["a", "b"]);
        let first: *const Encoder = f.label_encoder();
        let second: *const Encoder = f.label_encoder();
        assert_eq!(first, second);
        assert_eq!(f.one_hot_encoder().width(), 2);
    }

    #[test]
    fn encoder_type_and_policy() {
        let mut target = typed(Some("categorical")).with_values(["yes", "no"]);
        target.set_target(true);
        assert_eq!(target.label_encoder().encoded_type(), EncodedType::Int);
        assert_eq!(target.label_encoder().missing_policy(), MissingPolicy::Ignore);

        let predictor = typed(Some("categorical"))
            .with_values(["x"])
            .with_missing_values(true);
        assert_eq!(predictor.label_encoder().encoded_type(), EncodedType::Float);
        assert_eq!(predictor.label_encoder().missing_policy(), MissingPolicy::Mask);
    }

    #[test]
    fn without_values_encoders_are_identity() {
        let f = typed(Some("numeric"));
        assert_eq!(f.label_encoder().kind(), EncoderKind::NoOp);
        assert_eq!(f.one_hot_encoder().kind(), EncoderKind::NoOp);
        let column = array![Value::Number(1.5), Value::Number(-2.0)];
        let out = f.one_hot_encoder().transform(column.view()).unwrap();
        assert_eq!(out.column(0).to_vec(), vec![1.5, -2.0]);
    }

    #[test]
    fn set_target_refits_encoders() {
        let mut f = typed(Some("enum")).with_values(["a"]);
        assert_eq!(f.label_encoder().encoded_type(), EncodedType::Float);
        f.set_target(true);
        assert_eq!(f.label_encoder().encoded_type(), EncodedType::Int);
    }
}
