use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::AppError;

/// Parse an indicator cell. Missing and non-numeric values become NaN.
pub fn parse_indicator(s: &str) -> f64 {
    let trimmed = s.trim().trim_matches('"').trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") || trimmed.eq_ignore_ascii_case("na") {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// Column-oriented table of per-line stress indicators.
///
/// Every column has exactly `n_rows` values; missing cells are stored as NaN.
#[derive(Debug, Clone, Default)]
pub struct ObservationTable {
    columns: Vec<(String, Vec<f64>)>,
    n_rows: usize,
}

impl ObservationTable {
    /// Build a table from named columns of equal length.
    pub fn from_columns<S: Into<String>>(columns: Vec<(S, Vec<f64>)>) -> Result<Self, AppError> {
        let columns: Vec<(String, Vec<f64>)> = columns
            .into_iter()
            .map(|(name, values)| (name.into(), values))
            .collect();
        let n_rows = columns.first().map(|(_, v)| v.len()).unwrap_or(0);
        for (name, values) in &columns {
            if values.len() != n_rows {
                return Err(AppError::RaggedColumns {
                    column: name.clone(),
                    expected: n_rows,
                    found: values.len(),
                });
            }
        }
        Ok(Self { columns, n_rows })
    }

    /// Build a table from a header and row-major values.
    /// Short rows are padded with NaN, extra fields are dropped.
    pub fn from_rows<S: AsRef<str>>(headers: &[S], rows: &[Vec<f64>]) -> Self {
        let mut columns: Vec<(String, Vec<f64>)> = headers
            .iter()
            .map(|h| (h.as_ref().to_string(), Vec::with_capacity(rows.len())))
            .collect();
        for row in rows {
            for (idx, (_, values)) in columns.iter_mut().enumerate() {
                values.push(row.get(idx).copied().unwrap_or(f64::NAN));
            }
        }
        Self {
            columns,
            n_rows: rows.len(),
        }
    }

    /// Load a delimited text file whose first line is the header.
    pub fn from_csv<P: AsRef<Path>>(path: P, delimiter: char) -> Result<Self, AppError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), delimiter)
            .map_err(|e| match e {
                AppError::EmptyInput(_) => AppError::EmptyInput(path.display().to_string()),
                other => other,
            })
    }

    pub fn from_reader<R: BufRead>(reader: R, delimiter: char) -> Result<Self, AppError> {
        let mut lines = reader.lines();
        let header = loop {
            match lines.next() {
                Some(line) => {
                    let line = line?;
                    if !line.trim().is_empty() {
                        break line;
                    }
                }
                None => return Err(AppError::EmptyInput("missing header line".to_string())),
            }
        };
        let headers: Vec<String> = header
            .trim_start_matches('\u{feff}')
            .split(delimiter)
            .map(|h| h.trim().trim_matches('"').to_string())
            .collect();

        let mut rows: Vec<Vec<f64>> = Vec::new();
        for line in lines {
            let l = line?;
            if l.trim().is_empty() {
                continue;
            }
            rows.push(l.split(delimiter).map(parse_indicator).collect());
        }

        Ok(Self::from_rows(&headers, &rows))
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|(n, _)| n == name)
    }

    /// Values of the named column, or `ColumnNotFound`.
    pub fn column(&self, name: &str) -> Result<&[f64], AppError> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
            .ok_or_else(|| AppError::ColumnNotFound(name.to_string()))
    }

    /// Resolve several columns at once, preserving the requested order.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<&[f64]>, AppError> {
        names.iter().map(|n| self.column(n.as_ref())).collect()
    }
}
