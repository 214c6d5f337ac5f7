//! ARFF header parsing and ARFF-backed splits.
//!
//! Only dense ARFF is supported. The data section is read with the `csv`
//! crate configured for ARFF quoting (`%` comments, backslash escapes).
//! Values may be quoted with either `'` or `"`; double-quoted values are
//! rewritten to single quotes before the reader sees them.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Read};
use std::path::{Path, PathBuf};

use ndarray::Array2;
use tracing::{debug, info, instrument};

use crate::csv_source::CellParser;
use crate::error::{DataError, DataLoadError, DatasetLoadError};
use crate::feature::{DataType, Feature};
use crate::split::SplitSource;
use crate::value::Value;

/// One `@attribute` declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ArffAttribute {
    /// Attribute name, unquoted.
    pub name: String,
    /// Normalized type tag (`nominal` for `{...}` domains).
    pub data_type: DataType,
    /// Declared nominal domain, in declaration order.
    pub values: Option<Vec<String>>,
}

/// The header of an ARFF file: relation name and attribute declarations.
#[derive(Debug, Clone, PartialEq)]
pub struct ArffHeader {
    relation: String,
    attributes: Vec<ArffAttribute>,
}

impl ArffHeader {
    /// Parse the header of the ARFF file at `path`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DataLoadError::FileNotFound`] | File doesn't exist or is unreadable |
    /// | [`DataLoadError::ArffHeader`] | Malformed declaration, or no `@data` line |
    pub fn read(path: &Path) -> Result<Self, DataLoadError> {
        read_header(path).map(|(header, _)| header)
    }

    /// Relation name from `@relation`.
    #[must_use]
    pub fn relation(&self) -> &str {
        &self.relation
    }

    /// Attribute declarations in file order.
    #[must_use]
    pub fn attributes(&self) -> &[ArffAttribute] {
        &self.attributes
    }

    /// Attribute names in file order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.attributes.iter().map(|a| a.name.clone()).collect()
    }

    /// Features built from the declarations, without missing-value flags.
    #[must_use]
    pub fn features(&self) -> Vec<Feature> {
        self.attributes
            .iter()
            .enumerate()
            .map(|(index, attr)| {
                let feature = Feature::new(index, attr.name.clone(), Some(attr.data_type.clone()));
                match &attr.values {
                    Some(values) => feature.with_values(values.iter().cloned()),
                    None => feature,
                }
            })
            .collect()
    }

    fn parse_line(&mut self, raw: &str, line: usize, path: &Path) -> Result<bool, DataLoadError> {
        let header_error = |reason: String| DataLoadError::ArffHeader {
            path: path.to_path_buf(),
            line,
            reason,
        };

        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('%') {
            return Ok(false);
        }
        let (keyword, rest) = trimmed
            .split_once(char::is_whitespace)
            .unwrap_or((trimmed, ""));

        match keyword.to_ascii_lowercase().as_str() {
            "@relation" => {
                self.relation = unquote(rest.trim()).to_string();
                Ok(false)
            }
            "@attribute" => {
                let (name, decl) = split_name(rest.trim())
                    .ok_or_else(|| header_error(format!("cannot read attribute name from \"{rest}\"")))?;
                let attr = parse_attribute(name, decl).map_err(header_error)?;
                self.attributes.push(attr);
                Ok(false)
            }
            "@data" => Ok(true),
            other => Err(header_error(format!("unexpected declaration \"{other}\""))),
        }
    }
}

/// Split `'my name' numeric` or `age numeric` into name and type declaration.
fn split_name(rest: &str) -> Option<(&str, &str)> {
    let first = rest.chars().next()?;
    if first == '\'' || first == '"' {
        let close = rest[1..].find(first)? + 1;
        Some((&rest[1..close], rest[close + 1..].trim()))
    } else {
        let (name, decl) = rest.split_once(char::is_whitespace)?;
        Some((name, decl.trim()))
    }
}

fn parse_attribute(name: &str, decl: &str) -> Result<ArffAttribute, String> {
    if decl.is_empty() {
        return Err(format!("attribute \"{name}\" has no type"));
    }

    if let Some(inner) = decl.strip_prefix('{') {
        let inner = inner
            .strip_suffix('}')
            .ok_or_else(|| format!("unterminated nominal domain for \"{name}\""))?;
        return Ok(ArffAttribute {
            name: name.to_string(),
            data_type: DataType::Nominal,
            values: Some(parse_domain(inner)?),
        });
    }

    let tag = decl.split_whitespace().next().unwrap_or(decl);
    let data_type = match DataType::parse(tag) {
        DataType::Other(t) if t == "relational" => {
            return Err(format!("relational attribute \"{name}\" is not supported"));
        }
        t => t,
    };
    Ok(ArffAttribute {
        name: name.to_string(),
        data_type,
        values: None,
    })
}

fn parse_domain(inner: &str) -> Result<Vec<String>, String> {
    let inner = normalize_quotes(inner);
    let mut rdr = arff_reader_builder().from_reader(inner.as_bytes());
    let record = match rdr.records().next() {
        Some(record) => record.map_err(|e| format!("bad nominal domain: {e}"))?,
        None => return Ok(Vec::new()),
    };
    Ok(record
        .iter()
        .map(|v| unquote(v).to_string())
        .filter(|v| !v.is_empty())
        .collect())
}

fn unquote(s: &str) -> &str {
    let s = s.trim();
    for q in ['\'', '"'] {
        if s.len() >= 2 && s.starts_with(q) && s.ends_with(q) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

/// Rewrite one ARFF line so that every quoted value uses single quotes.
///
/// A quote only opens a value at the start of a field. Leading whitespace
/// of a field is dropped, so `a, 'b c'` still opens a quoted field. Escapes
/// inside quotes are kept for the reader.
pub(crate) fn normalize_quotes(line: &str) -> Cow<'_, str> {
    if !line.contains(['\'', '"']) {
        return Cow::Borrowed(line);
    }

    let mut out = String::with_capacity(line.len() + 2);
    let mut quote: Option<char> = None;
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some('"'), '\\') => match chars.next() {
                Some('"') => out.push('"'),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            },
            (Some(_), '\\') => {
                out.push('\\');
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            (Some('"'), '\'') => out.push_str("\\'"),
            (Some(q), c) if c == q => {
                quote = None;
                out.push('\'');
            }
            (None, c) if at_field_start(&out) && (c == '\'' || c == '"') => {
                quote = Some(c);
                out.push('\'');
            }
            (None, c) if at_field_start(&out) && c.is_whitespace() => {}
            (_, c) => out.push(c),
        }
    }
    Cow::Owned(out)
}

fn at_field_start(out: &str) -> bool {
    out.is_empty() || out.ends_with(',')
}

fn arff_reader_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .flexible(true)
        .quote(b'\'')
        .escape(Some(b'\\'))
        .comment(Some(b'%'))
        .trim(csv::Trim::All);
    builder
}

type DataReader = csv::Reader<Cursor<Vec<u8>>>;

/// Parse the header, leaving the reader on the first data line.
fn read_header(path: &Path) -> Result<(ArffHeader, BufReader<File>), DataLoadError> {
    let file = File::open(path).map_err(|e| DataLoadError::FileNotFound {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut reader = BufReader::new(file);
    let mut header = ArffHeader {
        relation: String::new(),
        attributes: Vec::new(),
    };

    let mut buf = String::new();
    let mut line = 0;
    loop {
        buf.clear();
        let n = reader.read_line(&mut buf).map_err(|e| DataLoadError::FileNotFound {
            path: path.to_path_buf(),
            source: e,
        })?;
        if n == 0 {
            return Err(DataLoadError::ArffHeader {
                path: path.to_path_buf(),
                line,
                reason: "no @data section".to_string(),
            });
        }
        line += 1;
        if header.parse_line(&buf, line, path)? {
            break;
        }
    }

    debug!(
        relation = %header.relation,
        n_attributes = header.attributes.len(),
        "ARFF header parsed"
    );
    Ok((header, reader))
}

/// Parse the header and position a CSV reader on the first data line.
fn open_data(path: &Path) -> Result<(ArffHeader, DataReader), DataLoadError> {
    let (header, mut reader) = read_header(path)?;
    let mut rest = String::new();
    reader
        .read_to_string(&mut rest)
        .map_err(|e| DataLoadError::FileNotFound {
            path: path.to_path_buf(),
            source: e,
        })?;

    let mut data = String::with_capacity(rest.len());
    for row in rest.lines() {
        data.push_str(&normalize_quotes(row));
        data.push('\n');
    }
    Ok((header, arff_reader_builder().from_reader(Cursor::new(data.into_bytes()))))
}

/// Walk the dense data rows of an ARFF file, checking row shape.
fn for_each_row(
    path: &Path,
    mut f: impl FnMut(usize, &csv::StringRecord) -> Result<(), DataLoadError>,
) -> Result<ArffHeader, DataLoadError> {
    let (header, mut rdr) = open_data(path)?;
    let n_cols = header.attributes.len();

    for (row_index, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| DataLoadError::CsvParse {
            path: path.to_path_buf(),
            offset: e.position().map_or(0, |p| p.byte()),
            source: e,
        })?;
        if record.get(0).is_some_and(|c| c.starts_with('{')) {
            return Err(DataLoadError::SparseArff {
                path: path.to_path_buf(),
                row_index,
            });
        }
        if record.len() != n_cols {
            return Err(DataLoadError::InconsistentRowLength {
                path: path.to_path_buf(),
                row_index,
                expected: n_cols,
                got: record.len(),
            });
        }
        f(row_index, &record)?;
    }
    Ok(header)
}

/// A split read from a dense ARFF file.
///
/// The file's attribute names must equal the feature names in order;
/// otherwise loading fails with [`DataLoadError::HeaderMismatch`].
#[derive(Debug, Clone)]
pub struct ArffSource {
    path: PathBuf,
}

impl ArffSource {
    /// Create a source for the given ARFF file path.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl SplitSource for ArffSource {
    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    #[instrument(skip_all, fields(path = %self.path.display()))]
    fn load(&self, features: &[Feature]) -> Result<Array2<Value>, DataLoadError> {
        let expected: Vec<String> = features.iter().map(|f| f.name().to_string()).collect();
        let header = ArffHeader::read(&self.path)?;
        if header.names() != expected {
            return Err(DataLoadError::HeaderMismatch {
                path: self.path.clone(),
                expected,
                found: header.names(),
            });
        }

        let parsers: Vec<CellParser> = features.iter().map(CellParser::for_feature).collect();
        let mut cells = Vec::new();
        let mut n_rows = 0;
        for_each_row(&self.path, |row_index, record| {
            for ((raw, parser), feature) in record.iter().zip(&parsers).zip(features) {
                let value = parser.parse(raw).ok_or_else(|| DataLoadError::NonNumericValue {
                    path: self.path.clone(),
                    row_index,
                    column: feature.name().to_string(),
                    raw: raw.to_string(),
                })?;
                cells.push(value);
            }
            n_rows += 1;
            Ok(())
        })?;

        info!(n_rows, n_cols = features.len(), "ARFF split loaded");
        Ok(Array2::from_shape_vec((n_rows, features.len()), cells)
            .expect("one cell per attribute was pushed for every row"))
    }
}

/// Distinct non-missing cells of one column across ARFF files, as category text.
pub(crate) fn scan_arff_column(paths: &[&Path], column: usize) -> Result<BTreeSet<String>, DataLoadError> {
    let mut distinct = BTreeSet::new();
    for &path in paths {
        for_each_row(path, |_, record| {
            if let Some(Value::Text(cell)) = record.get(column).map(Value::categorical) {
                distinct.insert(cell);
            }
            Ok(())
        })?;
    }
    Ok(distinct)
}

/// Build features from the headers of a train and a test ARFF file.
///
/// Types and nominal domains come from the train header. Attributes with
/// no declared domain that are not numeric (`string`, `date`) take the
/// sorted distinct cells of both files as their values. A feature is flagged
/// as having missing values when any cell of either file is a missing marker.
///
/// # Errors
///
/// Returns [`DatasetLoadError::SplitSchemaMismatch`] when the files declare
/// different attribute names, and [`DataLoadError`]s for unreadable,
/// malformed or sparse files.
#[instrument(skip_all, fields(train = %train.display(), test = %test.display()))]
pub fn infer_arff_features(train: &Path, test: &Path) -> Result<Vec<Feature>, DataError> {
    let train_header = ArffHeader::read(train)?;
    let test_header = ArffHeader::read(test)?;
    if train_header.names() != test_header.names() {
        return Err(DatasetLoadError::SplitSchemaMismatch {
            train: train_header.names(),
            test: test_header.names(),
        }
        .into());
    }

    // string and date attributes declare no domain; collect one from the data
    let mut domains: Vec<Option<BTreeSet<String>>> = train_header
        .attributes
        .iter()
        .map(|a| {
            let open_domain = a.values.is_none() && !matches!(
                a.data_type,
                DataType::Numeric | DataType::Integer | DataType::Real
            );
            open_domain.then(BTreeSet::new)
        })
        .collect();
    let mut missing = vec![false; train_header.attributes.len()];
    for path in [train, test] {
        for_each_row(path, |_, record| {
            for ((raw, flag), domain) in record.iter().zip(missing.iter_mut()).zip(domains.iter_mut()) {
                if Value::is_missing_marker(raw) {
                    *flag = true;
                } else if let Some(domain) = domain
                    && !domain.contains(raw)
                {
                    domain.insert(raw.to_string());
                }
            }
            Ok(())
        })?;
    }

    let features: Vec<Feature> = train_header
        .features()
        .into_iter()
        .zip(missing)
        .zip(domains)
        .map(|((f, has_missing), domain)| {
            let f = match domain {
                Some(values) => f.with_values(values),
                None => f,
            };
            f.with_missing_values(has_missing)
        })
        .collect();
    debug!(
        n_with_missing = features.iter().filter(|f| f.has_missing_values()).count(),
        "ARFF features built"
    );
    Ok(features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_arff(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    const WEATHER: &str = "% weather\n@RELATION weather\n\n@attribute outlook {sunny, overcast, 'light rain'}\n@attribute temperature real\n@attribute 'wind speed' INTEGER\n@attribute play {yes,no}\n\n@data\nsunny,85,3,no\n'light rain',?,5,yes\n% trailing comment\novercast,64,?,yes\n";

    #[test]
    fn parse_header_declarations() {
        let f = write_arff(WEATHER);
        let header = ArffHeader::read(f.path()).unwrap();
        assert_eq!(header.relation(), "weather");
        assert_eq!(header.names(), vec!["outlook", "temperature", "wind speed", "play"]);

        let outlook = &header.attributes()[0];
        assert_eq!(outlook.data_type, DataType::Nominal);
        assert_eq!(
            outlook.values.as_deref().unwrap(),
            &["sunny", "overcast", "light rain"]
        );
        assert_eq!(header.attributes()[1].data_type, DataType::Real);
        assert_eq!(header.attributes()[2].data_type, DataType::Integer);
    }

    #[test]
    fn load_rows_with_missing_cells() {
        let f = write_arff(WEATHER);
        let features = ArffHeader::read(f.path()).unwrap().features();
        let data = ArffSource::new(f.path()).load(&features).unwrap();

        assert_eq!(data.dim(), (3, 4));
        assert_eq!(data[[1, 0]], Value::Text("light rain".into()));
        assert_eq!(data[[1, 1]], Value::Missing);
        assert_eq!(data[[2, 2]], Value::Missing);
        assert_eq!(data[[0, 1]], Value::Number(85.0));
    }

    #[test]
    fn double_quotes_rewritten_to_single() {
        assert_eq!(normalize_quotes("1,plain"), "1,plain");
        assert_eq!(normalize_quotes("\"a b\", c"), "'a b',c");
        assert_eq!(normalize_quotes("\"it's\",'x'"), r"'it\'s','x'");
        assert_eq!(normalize_quotes(r#""say \"hi\"""#), "'say \"hi\"'");
        assert_eq!(normalize_quotes("O'Brien,1"), "O'Brien,1");
    }

    #[test]
    fn double_quoted_domain_and_cells_agree() {
        let f = write_arff(
            "@relation q\n@attribute c {\"a b\", c, \"x, y\"}\n@attribute s string\n@data\n\"a b\",\"it's\"\n\"x, y\", 'say \"hi\"'\nc,plain\n",
        );
        let header = ArffHeader::read(f.path()).unwrap();
        assert_eq!(
            header.attributes()[0].values.as_deref().unwrap(),
            &["a b", "c", "x, y"]
        );

        let features = header.features();
        let data = ArffSource::new(f.path()).load(&features).unwrap();
        assert_eq!(data.dim(), (3, 2));
        assert_eq!(data[[0, 0]], Value::Text("a b".into()));
        assert_eq!(data[[1, 0]], Value::Text("x, y".into()));
        assert_eq!(data[[0, 1]], Value::Text("it's".into()));
        assert_eq!(data[[1, 1]], Value::Text("say \"hi\"".into()));

        let codes = features[0].label_encoder().transform(data.column(0)).unwrap();
        assert_eq!(codes.column(0).to_vec(), vec![0.0, 2.0, 1.0]);
    }

    #[test]
    fn missing_flags_scan_both_files() {
        let train = write_arff("@relation t\n@attribute a numeric\n@attribute b {x,y}\n@data\n1,x\n2,y\n");
        let test = write_arff("@relation t\n@attribute a numeric\n@attribute b {x,y}\n@data\n?,x\n");
        let features = infer_arff_features(train.path(), test.path()).unwrap();
        assert!(features[0].has_missing_values());
        assert!(!features[1].has_missing_values());
    }

    #[test]
    fn mismatched_headers_rejected() {
        let train = write_arff("@relation t\n@attribute a numeric\n@data\n1\n");
        let test = write_arff("@relation t\n@attribute b numeric\n@data\n1\n");
        let err = infer_arff_features(train.path(), test.path()).unwrap_err();
        assert!(matches!(
            err,
            DataError::Dataset(DatasetLoadError::SplitSchemaMismatch { .. })
        ));
    }

    #[test]
    fn sparse_rows_rejected() {
        let f = write_arff("@relation t\n@attribute a numeric\n@attribute b numeric\n@data\n{0 1, 1 2}\n");
        let features = ArffHeader::read(f.path()).unwrap().features();
        let err = ArffSource::new(f.path()).load(&features).unwrap_err();
        assert!(matches!(err, DataLoadError::SparseArff { row_index: 0, .. }));
    }

    #[test]
    fn missing_data_section_error() {
        let f = write_arff("@relation t\n@attribute a numeric\n");
        let err = ArffHeader::read(f.path()).unwrap_err();
        assert!(matches!(err, DataLoadError::ArffHeader { .. }));
    }

    #[test]
    fn bad_declaration_reports_line() {
        let f = write_arff("@relation t\n@attribute a\n@data\n");
        let err = ArffHeader::read(f.path()).unwrap_err();
        assert!(matches!(err, DataLoadError::ArffHeader { line: 2, .. }));
    }
}
