//! Resilient Isolation Tests
//!
//! End-to-end coverage of per-record failure isolation against a real SQLite
//! backend: rejected records are captured with their original index, payload,
//! and a classified code, while every surrounding record still commits.

mod common;

use bulkline::{FailureCode, Operation, ResilientProcessor};

use common::{count_rows, create_temp_db_file, insert_row, make_records, row_ids, SqliteSink};

/// Pre-seeded even ids make every even-index insert hit a primary-key
/// violation; the failure list must contain exactly those indices, in
/// ascending order, classified as unique violations.
#[test]
fn even_index_conflicts_are_isolated() {
    let (_dir, path) = create_temp_db_file("resilient_even.db");
    for id in [0i64, 2, 4, 6, 8] {
        insert_row(&path, id, "pre-seeded");
    }

    let sink = SqliteSink::open(&path).unwrap();
    let records = make_records(10);

    let mut processor = ResilientProcessor::new(sink);
    let result = processor.run(&records, Operation::Insert).unwrap();

    assert_eq!(result.summary.total_records, 10);
    assert_eq!(result.summary.successful_records, 5);
    assert_eq!(result.summary.failed_records, 5);
    assert_eq!(result.failures.len(), 5);

    let indices: Vec<usize> = result.failures.iter().map(|f| f.index).collect();
    assert_eq!(indices, vec![0, 2, 4, 6, 8]);

    for failure in &result.failures {
        assert_eq!(failure.code, FailureCode::UniqueViolation);
        assert_eq!(failure.record.id as usize, failure.index);
    }

    // Odd-index records all committed; nothing was dropped or re-ordered.
    assert_eq!(row_ids(&path), (0..10).collect::<Vec<i64>>());
}

#[test]
fn detailed_invariant_holds_under_mixed_outcomes() {
    let (_dir, path) = create_temp_db_file("resilient_mixed.db");
    insert_row(&path, 3, "conflict");
    insert_row(&path, 7, "conflict");

    let sink = SqliteSink::open(&path).unwrap();
    let records = make_records(20);

    let mut processor = ResilientProcessor::new(sink);
    let result = processor.run(&records, Operation::Insert).unwrap();

    assert_eq!(
        result.failures.len() as u64,
        result.summary.failed_records
    );
    assert_eq!(
        result.summary.successful_records + result.summary.failed_records,
        result.summary.total_records
    );
    assert_eq!(result.summary.successful_records, 18);
}

/// One bad record in an otherwise clean batch costs exactly that record.
#[test]
fn single_conflict_costs_single_record() {
    let (_dir, path) = create_temp_db_file("resilient_single.db");
    insert_row(&path, 500, "conflict");

    let sink = SqliteSink::open(&path).unwrap();
    let records = make_records(1000);

    let mut processor = ResilientProcessor::new(sink);
    let result = processor.run(&records, Operation::Insert).unwrap();

    assert_eq!(result.summary.successful_records, 999);
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].index, 500);
    assert_eq!(count_rows(&path), 1000);
}

#[test]
fn clean_batch_has_no_failures() {
    let (_dir, path) = create_temp_db_file("resilient_clean.db");
    let sink = SqliteSink::open(&path).unwrap();
    let records = make_records(100);

    let mut processor = ResilientProcessor::new(sink);
    let result = processor.run(&records, Operation::Insert).unwrap();

    assert_eq!(result.summary.successful_records, 100);
    assert!(result.failures.is_empty());
    assert_eq!(count_rows(&path), 100);
}
