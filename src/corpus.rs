use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::cooccurrence::{PositionSet, POSITION_COUNT};
use crate::error::AppError;
use crate::table::ObservationTable;

/// Lines in the built-in example corpus.
pub const EXAMPLE_LINES: usize = 200;

/// (metre length, lines) blocks of the example corpus, in row order.
/// Hendecasyllables carry their last stress on the tenth syllable.
const EXAMPLE_BLOCKS: [(usize, usize); 6] = [(4, 10), (6, 40), (7, 20), (8, 50), (10, 50), (10, 30)];

/// (metre length, weight) for the random corpus.
const METRE_WEIGHTS: [(usize, u32); 5] = [(4, 5), (6, 20), (7, 10), (8, 30), (10, 35)];

fn empty_columns(n_rows: usize) -> Vec<(String, Vec<f64>)> {
    PositionSet::syllables()
        .labels()
        .iter()
        .map(|label| (label.clone(), vec![0.0; n_rows]))
        .collect()
}

/// Deterministic corpus of 200 lines, each stressed at exactly one position:
/// 10 at 4, 40 at 6, 20 at 7, 50 at 8 and 80 at 10.
pub fn example_corpus() -> Result<ObservationTable, AppError> {
    let mut columns = empty_columns(EXAMPLE_LINES);
    let mut assigned = 0;
    for (position, lines) in EXAMPLE_BLOCKS {
        let end = (assigned + lines).min(EXAMPLE_LINES);
        for row in assigned..end {
            columns[position - 1].1[row] = 1.0;
        }
        assigned = end;
        if assigned >= EXAMPLE_LINES {
            break;
        }
    }
    ObservationTable::from_columns(columns)
}

/// Seeded random corpus. Each line gets a metre, a final stress on its last
/// syllable, a caesura stress for decasyllables and occasional secondary
/// stresses on even syllables.
pub fn random_corpus(rows: usize, seed: u64) -> Result<ObservationTable, AppError> {
    if rows == 0 {
        return Err(AppError::InvalidArgument("Row count must be positive".to_string()));
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let mut columns = empty_columns(rows);
    let total_weight: u32 = METRE_WEIGHTS.iter().map(|(_, w)| w).sum();

    for row in 0..rows {
        let mut pick = rng.gen_range(0..total_weight);
        let mut length = POSITION_COUNT;
        for (metre, weight) in METRE_WEIGHTS {
            if pick < weight {
                length = metre;
                break;
            }
            pick -= weight;
        }

        columns[length - 1].1[row] = 1.0;
        if length == 10 {
            let caesura = if rng.gen_bool(0.7) { 4 } else { 6 };
            columns[caesura - 1].1[row] = 1.0;
        }
        for position in (2..length).step_by(2) {
            if rng.gen_bool(0.25) {
                columns[position - 1].1[row] = 1.0;
            }
        }
    }

    ObservationTable::from_columns(columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(table: &ObservationTable, label: &str) -> usize {
        table.column(label).unwrap().iter().filter(|&&v| v == 1.0).count()
    }

    #[test]
    fn example_corpus_distribution() {
        let table = example_corpus().unwrap();
        assert_eq!(table.n_rows(), EXAMPLE_LINES);
        assert_eq!(count(&table, "4"), 10);
        assert_eq!(count(&table, "6"), 40);
        assert_eq!(count(&table, "7"), 20);
        assert_eq!(count(&table, "8"), 50);
        assert_eq!(count(&table, "10"), 80);
        for label in ["1", "2", "3", "5", "9"] {
            assert_eq!(count(&table, label), 0);
        }
    }

    #[test]
    fn random_corpus_is_reproducible() {
        let a = random_corpus(300, 42).unwrap();
        let b = random_corpus(300, 42).unwrap();
        for label in PositionSet::syllables().labels() {
            assert_eq!(a.column(label).unwrap(), b.column(label).unwrap());
        }
    }

    #[test]
    fn random_lines_are_binary_and_stressed() {
        let table = random_corpus(500, 7).unwrap();
        let positions = PositionSet::syllables();
        let columns = table.select(positions.labels()).unwrap();
        for row in 0..table.n_rows() {
            let marks: Vec<f64> = columns.iter().map(|c| c[row]).collect();
            assert!(marks.iter().all(|&v| v == 0.0 || v == 1.0));
            assert!(marks.iter().any(|&v| v == 1.0));
            // the first syllable is never stressed by the generator
            assert_eq!(marks[0], 0.0);
        }
    }

    #[test]
    fn random_corpus_needs_rows() {
        assert!(random_corpus(0, 1).is_err());
    }
}
