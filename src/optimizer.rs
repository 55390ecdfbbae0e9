//! # Batch Optimizer
//!
//! A stateless advisor, separate from the live adaptive loop. It proposes a
//! starting chunk size and execution plan before a run, and retrospectively
//! analyzes a completed run's [`SizeMetric`] history to recommend a starting
//! size for future runs. Its output is advisory: nothing happens unless the
//! caller applies it.
//!
//! ## Tunables
//!
//! The per-operation ceilings and the 1 000 / 10 000 rec/s analysis
//! thresholds are carried over from the source system as tunable constants.
//! Both the low and the high band recommend doubling, for different reasons:
//! below the low band each call carries too few records to amortize its
//! overhead; above the high band the backend demonstrably absorbs more per
//! call, so fewer round trips win.

use std::time::Duration;

use crate::types::{Operation, SizeMetric};

// =============================================================================
// Tunables
// =============================================================================

/// Global default lower bound for chunk sizes.
pub const DEFAULT_MIN_CHUNK_SIZE: usize = 10;

/// Global default upper bound for chunk sizes.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 10_000;

/// Chunk size recommended when no metric history exists.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Proposal ceiling for deletes. Delete batches carry no payload per record,
/// so the backend tolerates much larger chunks.
const DELETE_CEILING: usize = 5_000;

/// Proposal ceiling for inserts and upserts.
const INSERT_CEILING: usize = 2_000;

/// Proposal ceiling for updates, the most expensive operation per record.
const UPDATE_CEILING: usize = 1_000;

/// Mean throughput (rec/s) below which per-call overhead dominates.
const LOW_THROUGHPUT: f64 = 1_000.0;

/// Mean throughput (rec/s) above which the backend can absorb bigger calls.
const HIGH_THROUGHPUT: f64 = 10_000.0;

/// Last-vs-first throughput ratio that counts as an improving trend.
const TREND_FACTOR: f64 = 1.2;

/// Ceiling on recommended worker count.
const MAX_RECOMMENDED_PARALLELISM: usize = 4;

/// Coarse per-chunk duration estimate used by planning.
const ESTIMATED_CHUNK_MILLIS: u64 = 50;

// =============================================================================
// Advisory Outputs
// =============================================================================

/// Planning constraints supplied by the caller.
#[derive(Debug, Clone, Copy)]
pub struct Constraints {
    /// Largest chunk the caller's backend is willing to take per call.
    pub max_chunk_size: usize,
}

/// Advisory execution plan for an upcoming run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionPlan {
    /// Chunk size the plan assumes.
    pub chunk_size: usize,
    /// `ceil(total_records / chunk_size)`.
    pub chunk_count: usize,
    /// Coarse estimate, linear in chunk count.
    pub estimated_duration: Duration,
    /// Suggested worker count, capped at 4 or the chunk count.
    pub recommended_parallelism: usize,
}

/// Retrospective recommendation derived from a run's metric history.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationReport {
    /// Starting chunk size to use for future runs.
    pub recommended_chunk_size: usize,
    /// Human-readable notes explaining the recommendation.
    pub recommendations: Vec<String>,
    /// Rough expected throughput gain from applying the recommendation.
    pub expected_improvement_percent: f64,
}

// =============================================================================
// Batch Optimizer
// =============================================================================

/// Stateless advisor over a global `[min_size, max_size]` chunk range.
///
/// Every method is a pure function of its inputs: analyzing the same
/// history twice yields identical reports.
#[derive(Debug, Clone, Copy)]
pub struct BatchOptimizer {
    min_size: usize,
    max_size: usize,
}

impl Default for BatchOptimizer {
    fn default() -> Self {
        Self {
            min_size: DEFAULT_MIN_CHUNK_SIZE,
            max_size: DEFAULT_MAX_CHUNK_SIZE,
        }
    }
}

impl BatchOptimizer {
    /// Creates an optimizer with custom global size bounds.
    pub fn new(min_size: usize, max_size: usize) -> Self {
        Self { min_size, max_size }
    }

    /// Proposes an initial chunk size for a run over `sample_size` records.
    ///
    /// Starts from the operation-specific ceiling, clamps it to the global
    /// range, and never proposes more than the sample itself. Always returns
    /// at least 1 so the proposal is a valid chunk size.
    pub fn propose_size(&self, sample_size: usize, op: Operation) -> usize {
        let ceiling = match op {
            Operation::Delete => DELETE_CEILING,
            Operation::Update => UPDATE_CEILING,
            Operation::Insert | Operation::Upsert => INSERT_CEILING,
        };

        ceiling
            .clamp(self.min_size, self.max_size)
            .min(sample_size.max(1))
    }

    /// Builds an advisory plan for a run over `total_records`.
    pub fn plan(&self, total_records: usize, constraints: &Constraints) -> ExecutionPlan {
        let chunk_size = constraints
            .max_chunk_size
            .clamp(self.min_size, self.max_size)
            .min(total_records.max(1));
        let chunk_count = total_records.div_ceil(chunk_size);

        ExecutionPlan {
            chunk_size,
            chunk_count,
            estimated_duration: Duration::from_millis(
                chunk_count as u64 * ESTIMATED_CHUNK_MILLIS,
            ),
            recommended_parallelism: MAX_RECOMMENDED_PARALLELISM.min(chunk_count).max(1),
        }
    }

    /// Analyzes a completed run's metric history.
    ///
    /// Pure function of its input: mean throughput outside the low/high band
    /// recommends doubling the mean chunk size (clamped to the global
    /// range); within the band the size is left unchanged. A last-vs-first
    /// throughput gain beyond the trend factor appends a trend note. An
    /// empty history yields a default-size, no-op report.
    pub fn analyze(&self, history: &[SizeMetric]) -> OptimizationReport {
        if history.is_empty() {
            return OptimizationReport {
                recommended_chunk_size: DEFAULT_CHUNK_SIZE,
                recommendations: vec![
                    "no metrics recorded, keeping the default chunk size".to_string()
                ],
                expected_improvement_percent: 0.0,
            };
        }

        let count = history.len() as f64;
        let mean_throughput = history.iter().map(|m| m.throughput).sum::<f64>() / count;
        let mean_size =
            (history.iter().map(|m| m.chunk_size).sum::<usize>() as f64 / count).round() as usize;
        let doubled = (mean_size * 2).clamp(self.min_size, self.max_size);

        let mut recommendations = Vec::new();
        let (recommended_chunk_size, expected_improvement_percent) =
            if mean_throughput < LOW_THROUGHPUT {
                recommendations.push(format!(
                    "mean throughput {:.0} rec/s is below {:.0}, per-call overhead dominates, \
                     double the chunk size to {}",
                    mean_throughput, LOW_THROUGHPUT, doubled
                ));
                (doubled, 30.0)
            } else if mean_throughput > HIGH_THROUGHPUT {
                recommendations.push(format!(
                    "mean throughput {:.0} rec/s is above {:.0}, the backend can absorb more \
                     per call, double the chunk size to {} for fewer round trips",
                    mean_throughput, HIGH_THROUGHPUT, doubled
                ));
                (doubled, 15.0)
            } else {
                recommendations.push(format!(
                    "mean throughput {:.0} rec/s is in the expected band, keeping chunk size {}",
                    mean_throughput, mean_size
                ));
                (mean_size, 0.0)
            };

        let first = history[0].throughput;
        let last = history[history.len() - 1].throughput;
        if last > first * TREND_FACTOR {
            recommendations.push(format!(
                "throughput trend improving, {:.0} rec/s at the start vs {:.0} at the end",
                first, last
            ));
        }

        OptimizationReport {
            recommended_chunk_size,
            recommendations,
            expected_improvement_percent,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
