//! CSV-backed splits and feature inference from CSV files.

use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use tracing::{debug, info, instrument};

use crate::error::{DataLoadError, DatasetLoadError, DataError};
use crate::feature::{CategoricalRule, DataType, Feature};
use crate::split::SplitSource;
use crate::value::Value;

/// A split read from a CSV file with a header row naming the features.
///
/// Expected CSV format:
/// - Header row required, one column per feature in declared order
/// - All rows must have the same number of columns as the header
/// - Missing cells use one of the [`MISSING_MARKERS`](crate::MISSING_MARKERS)
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`DataLoadError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`DataLoadError::CsvParse`] | Malformed CSV record |
/// | [`DataLoadError::HeaderMismatch`] | Header names differ from the features |
/// | [`DataLoadError::InconsistentRowLength`] | Row has different column count than header |
/// | [`DataLoadError::NonNumericValue`] | Unparseable cell in a numeric column |
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    /// Create a source for the given CSV file path.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl SplitSource for CsvSource {
    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    #[instrument(skip_all, fields(path = %self.path.display()))]
    fn load(&self, features: &[Feature]) -> Result<Array2<Value>, DataLoadError> {
        let mut rdr = open(&self.path)?;
        let header = read_header(&mut rdr, &self.path)?;
        let expected: Vec<String> = features.iter().map(|f| f.name().to_string()).collect();
        if header != expected {
            return Err(DataLoadError::HeaderMismatch {
                path: self.path.clone(),
                expected,
                found: header,
            });
        }

        let parsers: Vec<CellParser> = features.iter().map(CellParser::for_feature).collect();
        let n_cols = features.len();
        let mut cells = Vec::new();
        let mut n_rows = 0;

        for (row_index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| csv_error(&self.path, e))?;
            if record.len() != n_cols {
                return Err(DataLoadError::InconsistentRowLength {
                    path: self.path.clone(),
                    row_index,
                    expected: n_cols,
                    got: record.len(),
                });
            }
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
        }

        info!(n_rows, n_cols, "CSV split loaded");
        Ok(Array2::from_shape_vec((n_rows, n_cols), cells)
            .expect("one cell per column was pushed for every row"))
    }
}

/// How one column's raw text turns into a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CellParser {
    /// Text kept as a category.
    Categorical,
    /// Must parse as a number.
    Numeric,
    /// Untyped: a number when it parses, text otherwise.
    Untyped,
}

impl CellParser {
    pub(crate) fn for_feature(feature: &Feature) -> Self {
        if feature.is_categorical(CategoricalRule::Lax) {
            CellParser::Categorical
        } else if feature.data_type().is_none() {
            CellParser::Untyped
        } else {
            CellParser::Numeric
        }
    }

    /// Returns `None` when a numeric column holds a non-numeric cell.
    pub(crate) fn parse(self, raw: &str) -> Option<Value> {
        match self {
            CellParser::Categorical => Some(Value::categorical(raw)),
            CellParser::Numeric => Value::numeric(raw),
            CellParser::Untyped => Value::numeric(raw).or_else(|| Some(Value::categorical(raw))),
        }
    }
}

/// Per-column observations gathered while scanning files.
#[derive(Debug, Default)]
struct ColumnScan {
    all_numeric: bool,
    has_missing: bool,
    distinct: BTreeSet<String>,
}

/// Infer features from the header and cells of one or more CSV files.
///
/// A column whose non-missing cells all parse as numbers is
/// [`DataType::Numeric`]; otherwise it is [`DataType::Categorical`] with the
/// sorted distinct cells of all files as its values.
///
/// # Errors
///
/// Returns [`DatasetLoadError::SplitSchemaMismatch`] when files disagree on
/// their header, and [`DataLoadError`]s for unreadable or malformed files.
#[instrument(skip_all, fields(n_files = paths.len()))]
pub fn infer_csv_features(paths: &[&Path]) -> Result<Vec<Feature>, DataError> {
    let mut names: Option<Vec<String>> = None;
    let mut scans: Vec<ColumnScan> = Vec::new();

    for &path in paths {
        let mut rdr = open(path)?;
        let header = read_header(&mut rdr, path)?;
        match &names {
            None => {
                scans = header
                    .iter()
                    .map(|_| ColumnScan {
                        all_numeric: true,
                        ..ColumnScan::default()
                    })
                    .collect();
                names = Some(header);
            }
            Some(first) if *first != header => {
                return Err(DatasetLoadError::SplitSchemaMismatch {
                    train: first.clone(),
                    test: header,
                }
                .into());
            }
            Some(_) => {}
        }

        for (row_index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| csv_error(path, e))?;
            if record.len() != scans.len() {
                return Err(DataLoadError::InconsistentRowLength {
                    path: path.to_path_buf(),
                    row_index,
                    expected: scans.len(),
                    got: record.len(),
                }
                .into());
            }
            for (raw, scan) in record.iter().zip(scans.iter_mut()) {
                if Value::is_missing_marker(raw) {
                    scan.has_missing = true;
                    continue;
                }
                let raw = raw.trim();
                if scan.all_numeric && raw.parse::<f64>().is_err() {
                    scan.all_numeric = false;
                }
                if !scan.distinct.contains(raw) {
                    scan.distinct.insert(raw.to_string());
                }
            }
        }
    }

    let names = names.unwrap_or_default();
    let features: Vec<Feature> = names
        .into_iter()
        .zip(scans)
        .enumerate()
        .map(|(index, (name, scan))| {
            let feature = if scan.all_numeric {
                Feature::new(index, name, Some(DataType::Numeric))
            } else {
                Feature::new(index, name, Some(DataType::Categorical)).with_values(scan.distinct)
            };
            feature.with_missing_values(scan.has_missing)
        })
        .collect();

    debug!(n_features = features.len(), "CSV features inferred");
    Ok(features)
}

/// Distinct non-missing cells of one column across CSV files, as category text.
pub(crate) fn scan_csv_column(paths: &[&Path], column: usize) -> Result<BTreeSet<String>, DataLoadError> {
    let mut distinct = BTreeSet::new();
    for &path in paths {
        let mut rdr = open(path)?;
        for result in rdr.records() {
            let record = result.map_err(|e| csv_error(path, e))?;
            if let Some(Value::Text(cell)) = record.get(column).map(Value::categorical) {
                distinct.insert(cell);
            }
        }
    }
    Ok(distinct)
}

fn open(path: &Path) -> Result<csv::Reader<File>, DataLoadError> {
    let file = File::open(path).map_err(|e| DataLoadError::FileNotFound {
        path: path.to_path_buf(),
        source: e,
    })?;
    // flexible(true) lets our own InconsistentRowLength check fire instead of
    // a low-level CsvParse error.
    Ok(csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file))
}

fn read_header(rdr: &mut csv::Reader<File>, path: &Path) -> Result<Vec<String>, DataLoadError> {
    let header = rdr.headers().map_err(|e| csv_error(path, e))?;
    Ok(header.iter().map(|h| h.trim().to_string()).collect())
}

fn csv_error(path: &Path, e: csv::Error) -> DataLoadError {
    DataLoadError::CsvParse {
        path: path.to_path_buf(),
        offset: e.position().map_or(0, |p| p.byte()),
        source: e,
    }
}
