use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::AppError;
use crate::table::ObservationTable;

/// Number of syllable positions on each matrix axis.
pub const POSITION_COUNT: usize = 10;

/// Ordered list of the ten position labels that define both matrix axes.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSet {
    labels: Vec<String>,
}

impl PositionSet {
    pub fn new<S: AsRef<str>>(labels: &[S]) -> Result<Self, AppError> {
        let labels: Vec<String> = labels.iter().map(|l| l.as_ref().trim().to_string()).collect();
        if labels.len() != POSITION_COUNT {
            return Err(AppError::InvalidPositions(format!(
                "expected {} labels, got {}",
                POSITION_COUNT,
                labels.len()
            )));
        }
        let mut seen = HashSet::new();
        for label in &labels {
            if label.is_empty() {
                return Err(AppError::InvalidPositions("empty label".to_string()));
            }
            if !seen.insert(label.as_str()) {
                return Err(AppError::InvalidPositions(format!("duplicate label {}", label)));
            }
        }
        Ok(Self { labels })
    }

    /// Syllable positions "1".."10".
    pub fn syllables() -> Self {
        Self {
            labels: (1..=POSITION_COUNT).map(|i| i.to_string()).collect(),
        }
    }

    /// Parse a comma-separated label list such as `1,2,3,4,5,6,7,8,9,10`.
    pub fn parse(list: &str) -> Result<Self, AppError> {
        let labels: Vec<&str> = list.split(',').collect();
        Self::new(&labels)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }
}

impl Default for PositionSet {
    fn default() -> Self {
        Self::syllables()
    }
}

/// What the diagonal of the matrix holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiagonalPolicy {
    /// A line stressed at `i` is stressed at `i`: the diagonal reads 100.0
    /// even for positions without any observation.
    #[default]
    ForceHundred,
    /// Keep the computed value; undefined when the position has no observation.
    Empirical,
}

/// How indicator values outside {0, 1, missing} are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueCheck {
    /// Accept any numeric value and sum it as-is.
    #[default]
    Lenient,
    /// Reject the table on the first value outside {0, 1, NaN}.
    StrictBinary,
}

/// Square matrix of conditional co-occurrence percentages.
///
/// `cells[i][j]` is the percentage of lines stressed at `labels[i]` that are
/// also stressed at `labels[j]`, or `None` when row `i` has no observation.
#[derive(Debug, Clone, PartialEq)]
pub struct CoOccurrenceMatrix {
    labels: Vec<String>,
    cells: Vec<Vec<Option<f64>>>,
}

impl CoOccurrenceMatrix {
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn size(&self) -> usize {
        self.labels.len()
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<f64> {
        self.cells.get(row).and_then(|r| r.get(col)).copied().flatten()
    }

    /// Cell lookup by position labels.
    pub fn value(&self, row: &str, col: &str) -> Option<f64> {
        let i = self.labels.iter().position(|l| l == row)?;
        let j = self.labels.iter().position(|l| l == col)?;
        self.cell(i, j)
    }

    /// Cells of one row, or `None` past the last position.
    pub fn row(&self, row: usize) -> Option<&[Option<f64>]> {
        self.cells.get(row).map(|r| r.as_slice())
    }

    /// `true` where a cell is undefined and must be left blank.
    pub fn mask(&self) -> Vec<Vec<bool>> {
        self.cells
            .iter()
            .map(|row| row.iter().map(|c| c.is_none()).collect())
            .collect()
    }

    /// Iterate `(row, col, value)` over defined cells only.
    pub fn defined_cells(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.cells.iter().enumerate().flat_map(|(i, row)| {
            row.iter()
                .enumerate()
                .filter_map(move |(j, c)| c.map(|v| (i, j, v)))
        })
    }
}

/// Count of lines stressed at one position over the full table.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSummary {
    pub label: String,
    pub count: usize,
    /// `None` when the table has no rows.
    pub percentage: Option<f64>,
}

impl PositionSummary {
    /// Side-panel text: `"40 (40.00%)"`, or `"0 (n/d)"` without rows.
    pub fn annotation(&self) -> String {
        match self.percentage {
            Some(pct) if !pct.is_nan() => format!("{} ({:.2}%)", self.count, pct),
            _ => format!("{} (n/d)", self.count),
        }
    }
}

/// Two decimals, ties to even.
fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

fn is_stressed(value: f64) -> bool {
    value == 1.0
}

/// Builds co-occurrence matrices and position summaries from observation tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeatmapBuilder {
    pub diagonal: DiagonalPolicy,
    pub value_check: ValueCheck,
}

impl HeatmapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_diagonal(mut self, diagonal: DiagonalPolicy) -> Self {
        self.diagonal = diagonal;
        self
    }

    pub fn with_value_check(mut self, value_check: ValueCheck) -> Self {
        self.value_check = value_check;
        self
    }

    /// Compute the matrix and the per-position summaries.
    ///
    /// Fails with `ColumnNotFound` before any computation when a position is
    /// not a column of `table`, and with `NonBinaryValue` under
    /// `ValueCheck::StrictBinary`.
    pub fn build(
        &self,
        table: &ObservationTable,
        positions: &PositionSet,
    ) -> Result<(CoOccurrenceMatrix, Vec<PositionSummary>), AppError> {
        let columns = table.select(positions.labels())?;
        if self.value_check == ValueCheck::StrictBinary {
            check_binary(positions.labels(), &columns)?;
        }

        let n = positions.len();
        let n_rows = table.n_rows();
        let mut cells = vec![vec![None; n]; n];

        for (i, row_cells) in cells.iter_mut().enumerate() {
            let subset: Vec<usize> = (0..n_rows).filter(|&r| is_stressed(columns[i][r])).collect();
            let total = subset.len();

            if total > 0 {
                for (j, cell) in row_cells.iter_mut().enumerate() {
                    // NaN contributes nothing, any other value is summed as-is
                    let count: f64 = subset
                        .iter()
                        .map(|&r| columns[j][r])
                        .filter(|v| !v.is_nan())
                        .sum();
                    *cell = Some(round2(count / total as f64 * 100.0));
                }
            }

            if self.diagonal == DiagonalPolicy::ForceHundred {
                row_cells[i] = Some(100.0);
            }
        }

        let summaries = positions
            .labels()
            .iter()
            .zip(&columns)
            .map(|(label, values)| {
                let count = values.iter().filter(|&&v| is_stressed(v)).count();
                let percentage = if n_rows > 0 {
                    Some(count as f64 / n_rows as f64 * 100.0)
                } else {
                    None
                };
                PositionSummary {
                    label: label.clone(),
                    count,
                    percentage,
                }
            })
            .collect();

        Ok((
            CoOccurrenceMatrix {
                labels: positions.labels().to_vec(),
                cells,
            },
            summaries,
        ))
    }
}

fn check_binary(labels: &[String], columns: &[&[f64]]) -> Result<(), AppError> {
    for (label, values) in labels.iter().zip(columns) {
        if let Some((row, &value)) = values
            .iter()
            .enumerate()
            .find(|(_, v)| !(v.is_nan() || **v == 0.0 || **v == 1.0))
        {
            return Err(AppError::NonBinaryValue {
                column: label.clone(),
                row,
                value,
            });
        }
    }
    Ok(())
}

/// Write the matrix and summaries as CSV: `position,<labels>,count,percentage`.
/// Undefined values are written as empty fields.
pub fn write_matrix_csv<P: AsRef<Path>>(
    matrix: &CoOccurrenceMatrix,
    summaries: &[PositionSummary],
    path: P,
) -> Result<(), AppError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_matrix(&mut writer, matrix, summaries)?;
    writer.flush()?;
    Ok(())
}

pub fn write_matrix<W: Write>(
    writer: &mut W,
    matrix: &CoOccurrenceMatrix,
    summaries: &[PositionSummary],
) -> Result<(), AppError> {
    writeln!(writer, "position,{},count,percentage", matrix.labels().join(","))?;
    for (i, label) in matrix.labels().iter().enumerate() {
        let mut line = label.clone();
        for cell in matrix.row(i).unwrap_or(&[]) {
            line.push(',');
            if let Some(v) = cell {
                line.push_str(&format!("{:.2}", v));
            }
        }
        match summaries.get(i) {
            Some(summary) => {
                line.push_str(&format!(",{},", summary.count));
                if let Some(pct) = summary.percentage {
                    line.push_str(&format!("{:.2}", pct));
                }
            }
            None => line.push_str(",,"),
        }
        writeln!(writer, "{}", line)?;
    }
    Ok(())
}
