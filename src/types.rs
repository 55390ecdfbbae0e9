//! # Domain Types for Bulkline
//!
//! This module defines the value types exchanged between the execution modes
//! and their callers: operation kinds, per-chunk outcomes, aggregated run
//! results, and the size metrics that drive adaptive tuning.
//!
//! ## Design
//!
//! Everything here is a plain owned value struct built with ordinary field
//! initialization. Results never hold references back into engine internals,
//! so callers may copy, store, or send them freely.
//!
//! Records themselves are opaque to the engine: every type is generic over
//! the caller's record type `R` where it needs to carry one, and the engine
//! only ever counts, indexes, and (in resilient mode) clones records.
//!
//! ## Invariants
//!
//! - [`ChunkOutcome`]: `records_accepted <= records_attempted`
//! - [`RunResult`]: `successful_records + failed_records == total_records`,
//!   `throughput == successful * 1000 / elapsed_ms` (zero when elapsed is zero)
//! - [`DetailedRunResult`]: `failures.len() == summary.failed_records`

use std::fmt;
use std::time::Duration;

use crate::error::FailureCode;

// =============================================================================
// Operations
// =============================================================================

/// The kind of write a run performs against the backing store.
///
/// The operation selects what the [`Sink`](crate::sink::Sink) does with each
/// chunk; it does not affect engine control flow. It does affect the
/// [`BatchOptimizer`](crate::optimizer::BatchOptimizer)'s size proposals,
/// since deletes are cheaper per record than updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Insert,
    Update,
    Delete,
    Upsert,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Upsert => "upsert",
        };
        write!(f, "{}", s)
    }
}

// =============================================================================
// Throughput
// =============================================================================

/// Computes throughput as records per second from a record count and elapsed
/// time, using millisecond resolution.
///
/// A zero-duration measurement yields zero throughput, never a division
/// fault. Sub-millisecond durations therefore also read as zero; the
/// adaptive loop treats that as "no signal" rather than as infinite speed.
pub fn records_per_second(records: u64, elapsed: Duration) -> f64 {
    let millis = elapsed.as_millis();
    if millis == 0 {
        return 0.0;
    }
    records as f64 * 1000.0 / millis as f64
}

// =============================================================================
// Chunk Outcome
// =============================================================================

/// The outcome of a single [`Sink`](crate::sink::Sink) write call.
///
/// Elapsed time is reported by the Sink itself: the backend knows how long
/// its write took, and synthetic Sinks in tests can script it to drive the
/// adaptive loop deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkOutcome {
    /// Records handed to the Sink in this call.
    pub records_attempted: u64,
    /// Records the backend accepted. Always `<= records_attempted`.
    pub records_accepted: u64,
    /// Time the backend spent executing the write.
    pub elapsed: Duration,
}

impl ChunkOutcome {
    /// Creates an outcome, asserting the acceptance invariant in debug builds.
    pub fn new(records_attempted: u64, records_accepted: u64, elapsed: Duration) -> Self {
        debug_assert!(
            records_accepted <= records_attempted,
            "accepted {} exceeds attempted {}",
            records_accepted,
            records_attempted
        );
        Self {
            records_attempted,
            records_accepted,
            elapsed,
        }
    }

    /// Records the backend rejected in this call.
    pub fn records_rejected(&self) -> u64 {
        self.records_attempted - self.records_accepted
    }

    /// Throughput of this single chunk, in records per second.
    pub fn throughput(&self) -> f64 {
        records_per_second(self.records_accepted, self.elapsed)
    }
}

// =============================================================================
// Run Result
// =============================================================================

/// Aggregate outcome of one end-to-end run over a full record list.
///
/// Every execution mode returns one of these (the resilient processor wraps
/// it in [`DetailedRunResult`]). `elapsed` is the sum of backend time across
/// all chunks. For parallel runs that is aggregate backend time, not wall
/// clock, because merge sums field-wise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunResult {
    /// Records in the input list.
    pub total_records: u64,
    /// Records the backend accepted and committed.
    pub successful_records: u64,
    /// Records rejected, aborted with a failed chunk, or never attempted.
    pub failed_records: u64,
    /// Summed backend time across all chunks of the run.
    pub elapsed: Duration,
    /// `successful_records` per second over `elapsed`; zero when elapsed is zero.
    pub throughput: f64,
}

impl RunResult {
    /// The all-zero result returned for empty input without touching the Sink.
    pub fn empty() -> Self {
        Self {
            total_records: 0,
            successful_records: 0,
            failed_records: 0,
            elapsed: Duration::ZERO,
            throughput: 0.0,
        }
    }

    /// Builds a result from counts, deriving throughput from the elapsed time.
    pub fn from_counts(
        total_records: u64,
        successful_records: u64,
        failed_records: u64,
        elapsed: Duration,
    ) -> Self {
        debug_assert_eq!(
            successful_records + failed_records,
            total_records,
            "successful + failed must equal total"
        );
        Self {
            total_records,
            successful_records,
            failed_records,
            elapsed,
            throughput: records_per_second(successful_records, elapsed),
        }
    }

    /// Merges two run results by field-wise sum, recomputing throughput.
    ///
    /// Merge is commutative and associative, so the parallel coordinator can
    /// fold slice outcomes in any completion order and get identical totals.
    pub fn merge(self, other: RunResult) -> RunResult {
        RunResult::from_counts(
            self.total_records + other.total_records,
            self.successful_records + other.successful_records,
            self.failed_records + other.failed_records,
            self.elapsed + other.elapsed,
        )
    }

    /// A result in which every record of a slice counts as failed.
    ///
    /// Used when a parallel worker cannot acquire its Sink or dies: the slice
    /// reports all-failed rather than aborting sibling slices.
    pub fn all_failed(total_records: u64) -> Self {
        RunResult::from_counts(total_records, 0, total_records, Duration::ZERO)
    }
}

// =============================================================================
// Per-Record Failures (resilient mode)
// =============================================================================

/// One record the backend rejected during a resilient run.
///
/// Captures the record's position in the input list and the payload itself,
/// so callers can re-queue, dead-letter, or report rejected records without
/// correlating against the original input.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedRecord<R> {
    /// Index of the record in the input list.
    pub index: usize,
    /// The rejected payload.
    pub record: R,
    /// Engine-level classification of the backend's rejection.
    pub code: FailureCode,
    /// The backend's message for the rejection.
    pub message: String,
}

/// A [`RunResult`] plus the ordered list of per-record failures.
///
/// Produced only by the resilient processor. `failures` is ordered by input
/// index and its length always equals `summary.failed_records`.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailedRunResult<R> {
    /// Aggregate counts for the run.
    pub summary: RunResult,
    /// Every rejected record, in input order.
    pub failures: Vec<FailedRecord<R>>,
}

// =============================================================================
// Size Metrics (adaptive mode)
// =============================================================================

/// One measured chunk in an adaptive run's history.
///
/// The adaptive controller records one of these per chunk and clears the
/// history at the start of each run; the history is never persisted and is
/// also the input to [`BatchOptimizer::analyze`](crate::optimizer::BatchOptimizer::analyze).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeMetric {
    /// Chunk size in effect when this chunk executed.
    pub chunk_size: usize,
    /// Backend time for this chunk.
    pub elapsed: Duration,
    /// Accepted records per second for this chunk.
    pub throughput: f64,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throughput_formula() {
        // 500 records in 250ms = 2000 records/sec
        assert_eq!(records_per_second(500, Duration::from_millis(250)), 2000.0);
    }

    /// Zero-duration chunks contribute zero throughput, never a division fault.
    #[test]
    fn test_throughput_zero_duration() {
        assert_eq!(records_per_second(1000, Duration::ZERO), 0.0);
        assert_eq!(records_per_second(1000, Duration::from_micros(500)), 0.0);
    }

    #[test]
    fn test_chunk_outcome_rejected() {
        let outcome = ChunkOutcome::new(100, 97, Duration::from_millis(10));
        assert_eq!(outcome.records_rejected(), 3);
        assert_eq!(outcome.throughput(), 9700.0);
    }

    #[test]
    fn test_run_result_counts() {
        let result = RunResult::from_counts(100, 90, 10, Duration::from_millis(1000));
        assert_eq!(
            result.successful_records + result.failed_records,
            result.total_records
        );
        assert_eq!(result.throughput, 90.0);
    }

    #[test]
    fn test_run_result_empty() {
        let result = RunResult::empty();
        assert_eq!(result.total_records, 0);
        assert_eq!(result.throughput, 0.0);
    }

    /// Merge must be commutative: slice completion order cannot change totals.
    #[test]
    fn test_merge_commutative() {
        let a = RunResult::from_counts(250, 240, 10, Duration::from_millis(100));
        let b = RunResult::from_counts(250, 250, 0, Duration::from_millis(300));
        let c = RunResult::from_counts(500, 0, 500, Duration::ZERO);

        let forward = a.merge(b).merge(c);
        let reverse = c.merge(b).merge(a);

        assert_eq!(forward, reverse);
        assert_eq!(forward.total_records, 1000);
        assert_eq!(forward.successful_records, 490);
        assert_eq!(forward.failed_records, 510);
        assert_eq!(forward.elapsed, Duration::from_millis(400));
    }

    #[test]
    fn test_all_failed() {
        let result = RunResult::all_failed(42);
        assert_eq!(result.total_records, 42);
        assert_eq!(result.successful_records, 0);
        assert_eq!(result.failed_records, 42);
        assert_eq!(result.throughput, 0.0);
    }
}
