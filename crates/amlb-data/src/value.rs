//! Raw cell values as read from a data source.

use std::borrow::Cow;
use std::fmt;

/// Cell contents recognised as missing by the file sources.
pub const MISSING_MARKERS: [&str; 6] = ["", "?", "NA", "NaN", "nan", "null"];

/// One raw cell of a split, before encoding.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent or unknown.
    #[default]
    Missing,
    /// A numeric cell.
    Number(f64),
    /// A categorical (or otherwise textual) cell.
    Text(String),
}

impl Value {
    /// Return `true` if the cell text is one of the [`MISSING_MARKERS`].
    #[must_use]
    pub fn is_missing_marker(raw: &str) -> bool {
        MISSING_MARKERS.contains(&raw.trim())
    }

    /// Interpret a raw cell of a categorical column.
    #[must_use]
    pub fn categorical(raw: &str) -> Self {
        if Self::is_missing_marker(raw) {
            Value::Missing
        } else {
            Value::Text(raw.trim().to_string())
        }
    }

    /// Interpret a raw cell of a numeric column.
    ///
    /// Returns `None` when the cell is neither a missing marker nor a number.
    #[must_use]
    pub fn numeric(raw: &str) -> Option<Self> {
        if Self::is_missing_marker(raw) {
            return Some(Value::Missing);
        }
        raw.trim().parse::<f64>().ok().map(|n| {
            if n.is_nan() { Value::Missing } else { Value::Number(n) }
        })
    }

    /// Return `true` for [`Value::Missing`] and for `NaN` numbers.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Missing => true,
            Value::Number(n) => n.is_nan(),
            Value::Text(_) => false,
        }
    }

    /// The key under which a categorical encoder looks this value up.
    ///
    /// Integral numbers render without a fractional part so that `1.0`
    /// matches a declared category `"1"`.
    #[must_use]
    pub fn category_key(&self) -> Option<Cow<'_, str>> {
        match self {
            Value::Missing => None,
            Value::Text(s) => Some(Cow::Borrowed(s.as_str())),
            Value::Number(n) if n.is_nan() => None,
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                Some(Cow::Owned(format!("{}", *n as i64)))
            }
            Value::Number(n) => Some(Cow::Owned(n.to_string())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Missing => Ok(()),
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_markers_recognised() {
        for raw in ["", "?", " ? ", "NA", "nan"] {
            assert_eq!(Value::categorical(raw), Value::Missing, "raw = {raw:?}");
        }
        assert_eq!(Value::numeric("NaN"), Some(Value::Missing));
    }

    #[test]
    fn numeric_parse() {
        assert_eq!(Value::numeric(" 2.5"), Some(Value::Number(2.5)));
        assert_eq!(Value::numeric("abc"), None);
    }

    #[test]
    fn category_key_of_integral_number() {
        assert_eq!(Value::Number(1.0).category_key().as_deref(), Some("1"));
        assert_eq!(Value::Number(0.5).category_key().as_deref(), Some("0.5"));
        assert_eq!(Value::Missing.category_key(), None);
    }
}
