use std::io::Write;

use tonicity_heatmap::cooccurrence::write_matrix_csv;
use tonicity_heatmap::corpus::{example_corpus, random_corpus};
use tonicity_heatmap::{AppError, HeatmapBuilder, ObservationTable, PositionSet};

fn write_csv(lines: &[&str]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file
}

#[test]
fn csv_with_extra_columns_and_junk_values() {
    let file = write_csv(&[
        "vers,1,2,3,4,5,6,7,8,9,10,metre",
        "Quan la vida,0,0,0,1,0,1,0,0,0,1,10",
        "se'n va,0,0,0,0,0,1,0,,0,0,6",
        "amb el vent,0,x,0,0,0,0,0,1,0,0,8",
    ]);
    let table = ObservationTable::from_csv(file.path(), ',').unwrap();
    let (matrix, summaries) = HeatmapBuilder::new()
        .build(&table, &PositionSet::syllables())
        .unwrap();

    assert_eq!(matrix.value("6", "10"), Some(50.0));
    assert_eq!(matrix.value("10", "6"), Some(100.0));
    assert_eq!(matrix.value("4", "6"), Some(100.0));
    assert_eq!(matrix.value("8", "2"), Some(0.0));
    assert_eq!(matrix.value("2", "2"), Some(100.0));
    assert_eq!(matrix.value("2", "8"), None);

    let six = &summaries[5];
    assert_eq!(six.count, 2);
    assert_eq!(six.annotation(), "2 (66.67%)");
}

#[test]
fn example_corpus_lines_have_single_stress() {
    let table = example_corpus().unwrap();
    let (matrix, summaries) = HeatmapBuilder::new()
        .build(&table, &PositionSet::syllables())
        .unwrap();

    for stressed in ["4", "6", "7", "8", "10"] {
        for other in PositionSet::syllables().labels() {
            let expected = if other == stressed { 100.0 } else { 0.0 };
            assert_eq!(matrix.value(stressed, other), Some(expected));
        }
    }
    for unstressed in ["1", "2", "3", "5", "9"] {
        assert_eq!(matrix.value(unstressed, unstressed), Some(100.0));
        assert_eq!(matrix.value(unstressed, "10"), None);
    }
    let counts: Vec<usize> = summaries.iter().map(|s| s.count).collect();
    assert_eq!(counts, vec![0, 0, 0, 10, 0, 40, 20, 50, 0, 80]);
    assert_eq!(summaries[9].annotation(), "80 (40.00%)");
}

#[test]
fn random_corpus_respects_matrix_invariants() {
    let table = random_corpus(1000, 2024).unwrap();
    let positions = PositionSet::syllables();
    let (matrix, summaries) = HeatmapBuilder::new().build(&table, &positions).unwrap();
    let columns = table.select(positions.labels()).unwrap();

    for (i, summary) in summaries.iter().enumerate() {
        assert!(summary.count <= table.n_rows());
        assert_eq!(matrix.cell(i, i), Some(100.0));
        if summary.count == 0 {
            continue;
        }
        for j in 0..positions.len() {
            let pct = matrix.cell(i, j).unwrap();
            assert!((0.0..=100.0).contains(&pct));
            let joint = (0..table.n_rows())
                .filter(|&r| columns[i][r] == 1.0 && columns[j][r] == 1.0)
                .count() as f64;
            let expected = (joint / summary.count as f64 * 100.0 * 100.0).round_ties_even() / 100.0;
            assert!((pct - expected).abs() < 1e-9);
        }
    }
}

#[test]
fn missing_position_column_is_reported_before_export() {
    let file = write_csv(&["1,2,3,4,5,6,7,8,9", "0,0,0,0,0,1,0,0,0"]);
    let table = ObservationTable::from_csv(file.path(), ',').unwrap();
    let err = HeatmapBuilder::new()
        .build(&table, &PositionSet::syllables())
        .unwrap_err();
    assert!(matches!(err, AppError::ColumnNotFound(ref c) if c == "10"));
}

#[test]
fn exported_matrix_round_trips_through_csv_reader() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("matrix.csv");
    let table = example_corpus().unwrap();
    let (matrix, summaries) = HeatmapBuilder::new()
        .build(&table, &PositionSet::syllables())
        .unwrap();
    write_matrix_csv(&matrix, &summaries, &path).unwrap();

    let exported = ObservationTable::from_csv(&path, ',').unwrap();
    assert_eq!(exported.n_rows(), 10);
    assert_eq!(exported.column("count").unwrap()[7], 50.0);
    assert_eq!(exported.column("percentage").unwrap()[3], 5.0);
    assert!(exported.column("10").unwrap()[0].is_nan());
}
